//! Ready-to-play battle setups for tests and demos.
//!
//! The builder assembles a board and two rosters into an initial
//! `GameState`. [`skirmish`] is the canonical small battle used across
//! the integration tests.

use crate::core::geometry::{Pos, Rect, OBJECTIVE_RANGE};
use crate::core::player::PlayerId;
use crate::rules::rolls::RerollPolicy;
use crate::state::board::Board;
use crate::state::game_state::GameState;
use crate::state::unit::{Damage, StatBlock, Unit, UnitId, Weapon, WeaponStrength};
use std::collections::BTreeMap;

/// Incrementally assembles an initial game state.
#[derive(Debug)]
pub struct ScenarioBuilder {
    board: Board,
    units: BTreeMap<UnitId, Unit>,
}

impl ScenarioBuilder {
    /// Start from a board of the given size.
    #[must_use]
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            board: Board::new(width, height),
            units: BTreeMap::new(),
        }
    }

    /// Give each player a full-width deployment strip of `depth` inches
    /// on their own edge.
    #[must_use]
    pub fn with_edge_deployment(mut self, depth: f32) -> Self {
        let width = self.board.width;
        let height = self.board.height;
        self.board = self
            .board
            .with_deployment_zone(
                PlayerId::new(0),
                Rect::new(Pos::new(0.0, 0.0), Pos::new(width, depth)),
            )
            .with_deployment_zone(
                PlayerId::new(1),
                Rect::new(Pos::new(0.0, height - depth), Pos::new(width, height)),
            );
        self
    }

    /// Add an objective marker.
    #[must_use]
    pub fn with_objective(mut self, id: impl Into<String>, pos: Pos, radius: f32) -> Self {
        self.board = self.board.with_objective(id, pos, radius);
        self
    }

    /// Add a blocking terrain piece.
    #[must_use]
    pub fn with_ruin(mut self, id: impl Into<String>, area: Rect) -> Self {
        self.board = self.board.with_terrain(id, area, true);
        self
    }

    /// Add a unit to a player's roster. A unit with the same id as an
    /// earlier one replaces it.
    #[must_use]
    pub fn with_unit(mut self, unit: Unit) -> Self {
        self.units.insert(unit.id.clone(), unit);
        self
    }

    /// Produce the initial state. Rosters are fixed at creation.
    #[must_use]
    pub fn build(self) -> GameState {
        let mut state = GameState::new(self.board);
        state.units = self.units;
        state
    }
}

/// Line infantry: five one-wound models with rifles and sidearm blades.
#[must_use]
pub fn troopers(id: &str, name: &str, owner: PlayerId) -> Unit {
    let stats = StatBlock {
        movement: 6.0,
        skill: 3,
        strength: 4,
        toughness: 4,
        save: 4,
        invuln: None,
        wounds: 1,
        leadership: 7,
        objective_control: 2,
    };
    Unit::new(UnitId::new(id), name, owner, stats)
        .with_models(5)
        .with_weapon(Weapon::ranged("rifle", 24.0, 1, 4, -1, Damage::Fixed(1)))
        .with_weapon(Weapon::melee(
            "blade",
            1,
            WeaponStrength::User(0),
            0,
            Damage::Fixed(1),
        ))
}

/// Assault specialists: three two-wound models with an invulnerable
/// save, reroll-ones hammers, and short-range pistols.
#[must_use]
pub fn shock_squad(id: &str, name: &str, owner: PlayerId) -> Unit {
    let stats = StatBlock {
        movement: 5.0,
        skill: 3,
        strength: 4,
        toughness: 5,
        save: 3,
        invuln: Some(5),
        wounds: 2,
        leadership: 8,
        objective_control: 1,
    };
    Unit::new(UnitId::new(id), name, owner, stats)
        .with_models(3)
        .with_weapon(Weapon::ranged("pistol", 12.0, 1, 4, 0, Damage::Fixed(1)))
        .with_weapon(
            Weapon::melee("hammer", 2, WeaponStrength::Fixed(8), -2, Damage::D3)
                .with_reroll(RerollPolicy::Ones),
        )
}

/// The standard two-player test battle: a 44x30 board, one central
/// objective, a ruin, and two units per side.
#[must_use]
pub fn skirmish() -> GameState {
    ScenarioBuilder::new(44.0, 30.0)
        .with_edge_deployment(8.0)
        .with_objective("center", Pos::new(22.0, 15.0), OBJECTIVE_RANGE)
        .with_ruin(
            "ruin",
            Rect::new(Pos::new(10.0, 13.0), Pos::new(14.0, 17.0)),
        )
        .with_unit(troopers("red-troopers", "Red Troopers", PlayerId::new(0)))
        .with_unit(shock_squad("red-shock", "Red Shock Squad", PlayerId::new(0)))
        .with_unit(troopers("blue-troopers", "Blue Troopers", PlayerId::new(1)))
        .with_unit(shock_squad("blue-shock", "Blue Shock Squad", PlayerId::new(1)))
        .build()
}
