//! The canonical game state container.
//!
//! Exactly one `GameState` is authoritative per session. It is mutated
//! only through [`GameState::apply_diffs`], which the routing layer calls
//! on behalf of the active phase; every other consumer treats it as
//! read-only. All contents are plain serde-representable data, so an
//! external serializer can snapshot and resume a session.
//!
//! Units live in a `BTreeMap` so iteration and serialization order are
//! deterministic. Hash-order iteration would break replay convergence.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::board::Board;
use super::diff::Diff;
use super::unit::{Unit, UnitId, UnitStatus};
use crate::core::geometry::ENGAGEMENT_RANGE;
use crate::core::player::{PlayerId, PlayerMap};
use crate::error::{EngineError, EngineResult};

/// The eight gameplay phases.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhaseKind {
    Command,
    Deployment,
    Movement,
    Shooting,
    Charge,
    Fight,
    Morale,
    Scoring,
}

impl std::fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PhaseKind::Command => "Command",
            PhaseKind::Deployment => "Deployment",
            PhaseKind::Movement => "Movement",
            PhaseKind::Shooting => "Shooting",
            PhaseKind::Charge => "Charge",
            PhaseKind::Fight => "Fight",
            PhaseKind::Morale => "Morale",
            PhaseKind::Scoring => "Scoring",
        };
        write!(f, "{}", name)
    }
}

/// Game progression meta: where in the turn structure the session is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub phase: PhaseKind,
    /// Battle round. Increments when both players have completed a turn.
    pub battle_round: u32,
    /// Player turns elapsed, starting at 1.
    pub turn_number: u32,
    pub active_player: PlayerId,
    /// The one-time deployment phase has finished.
    pub deployment_complete: bool,
}

impl Meta {
    /// Meta for a freshly created session.
    #[must_use]
    pub fn initial() -> Self {
        Self {
            phase: PhaseKind::Command,
            battle_round: 1,
            turn_number: 1,
            active_player: PlayerId::new(0),
            deployment_complete: false,
        }
    }
}

/// Per-player resources.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerState {
    pub command_points: i32,
    pub victory_points: i32,
}

/// The canonical mutable session state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub meta: Meta,
    pub board: Board,
    pub units: BTreeMap<UnitId, Unit>,
    pub players: PlayerMap<PlayerState>,
}

impl GameState {
    /// Create a two-player session on the given board.
    #[must_use]
    pub fn new(board: Board) -> Self {
        Self {
            meta: Meta::initial(),
            board,
            units: BTreeMap::new(),
            players: PlayerMap::default(),
        }
    }

    /// Add a unit during setup. Unit rosters are fixed at game creation;
    /// a duplicate id is rejected.
    pub fn add_unit(&mut self, unit: Unit) -> EngineResult<()> {
        if self.units.contains_key(&unit.id) {
            return Err(EngineError::Validation(format!(
                "duplicate unit id '{}'",
                unit.id
            )));
        }
        self.units.insert(unit.id.clone(), unit);
        Ok(())
    }

    /// Look up a unit.
    pub fn unit(&self, id: &UnitId) -> EngineResult<&Unit> {
        self.units
            .get(id)
            .ok_or_else(|| EngineError::ResourceNotFound(format!("unit '{}'", id)))
    }

    fn unit_mut(&mut self, id: &UnitId) -> EngineResult<&mut Unit> {
        self.units
            .get_mut(id)
            .ok_or_else(|| EngineError::ResourceNotFound(format!("unit '{}'", id)))
    }

    /// Iterate a player's units in id order.
    pub fn units_of(&self, player: PlayerId) -> impl Iterator<Item = &Unit> {
        self.units.values().filter(move |u| u.owner == player)
    }

    /// Whether a unit has any enemy alive model within engagement range.
    pub fn is_engaged(&self, id: &UnitId) -> EngineResult<bool> {
        let unit = self.unit(id)?;
        Ok(self
            .units
            .values()
            .filter(|u| u.owner != unit.owner && u.status == UnitStatus::Deployed)
            .any(|enemy| unit.is_within(enemy, ENGAGEMENT_RANGE)))
    }

    /// Enemy units of `id` within `range`, in id order.
    pub fn enemies_within(&self, id: &UnitId, range: f32) -> EngineResult<Vec<&Unit>> {
        let unit = self.unit(id)?;
        Ok(self
            .units
            .values()
            .filter(|u| u.owner != unit.owner && u.status == UnitStatus::Deployed)
            .filter(|enemy| unit.is_within(enemy, range))
            .collect())
    }

    // === Diff application ===

    /// Apply an ordered list of diffs, all-or-nothing.
    ///
    /// Diffs are checked, then staged on a scratch copy that only
    /// replaces the live state once every diff has applied. A bad batch
    /// leaves the state untouched, even when the failure surfaces
    /// mid-batch (a status revert after earlier valid diffs).
    pub fn apply_diffs(&mut self, diffs: &[Diff]) -> EngineResult<()> {
        for diff in diffs {
            self.check_diff(diff)?;
        }
        let mut staged = self.clone();
        for diff in diffs {
            staged.apply_diff(diff)?;
        }
        *self = staged;
        Ok(())
    }

    /// Validate a single diff against current state without applying it.
    fn check_diff(&self, diff: &Diff) -> EngineResult<()> {
        match diff {
            Diff::UnitStatus { unit, .. }
            | Diff::SetFlag { unit, .. }
            | Diff::MoraleTested { unit } => {
                self.unit(unit)?;
            }
            Diff::ModelPosition { unit, model, .. }
            | Diff::ModelWounds { unit, model, .. }
            | Diff::ModelSlain { unit, model } => {
                let u = self.unit(unit)?;
                if *model >= u.models.len() {
                    return Err(EngineError::ResourceNotFound(format!(
                        "model {} in unit '{}'",
                        model, unit
                    )));
                }
            }
            Diff::ResetTurnState { player }
            | Diff::CommandPoints { player, .. }
            | Diff::VictoryPoints { player, .. } => {
                if !self.players.contains(*player) {
                    return Err(EngineError::ResourceNotFound(format!("{}", player)));
                }
            }
            Diff::PhaseTransition { .. } => {}
        }
        Ok(())
    }

    fn apply_diff(&mut self, diff: &Diff) -> EngineResult<()> {
        match diff {
            Diff::UnitStatus { unit, status } => {
                self.unit_mut(unit)?.advance_status(*status)?;
            }
            Diff::SetFlag { unit, flag, value } => {
                self.unit_mut(unit)?.flags.set(*flag, *value);
            }
            Diff::ResetTurnState { player } => {
                let player = *player;
                for unit in self.units.values_mut().filter(|u| u.owner == player) {
                    unit.reset_turn_state();
                }
            }
            Diff::ModelPosition { unit, model, pos } => {
                self.unit_mut(unit)?.models[*model].pos = Some(*pos);
            }
            Diff::ModelWounds { unit, model, wounds } => {
                self.unit_mut(unit)?.models[*model].wounds = *wounds;
            }
            Diff::ModelSlain { unit, model } => {
                let u = self.unit_mut(unit)?;
                let m = &mut u.models[*model];
                if m.alive {
                    m.alive = false;
                    m.wounds = 0;
                    u.casualties_this_turn += 1;
                }
            }
            Diff::MoraleTested { unit } => {
                self.unit_mut(unit)?.morale_tested = true;
            }
            Diff::CommandPoints { player, delta } => {
                self.players[*player].command_points += delta;
            }
            Diff::VictoryPoints { player, delta } => {
                self.players[*player].victory_points += delta;
            }
            Diff::PhaseTransition { meta } => {
                self.meta = *meta;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::Pos;
    use crate::state::unit::{StatBlock, TurnFlag};

    fn stats() -> StatBlock {
        StatBlock {
            movement: 6.0,
            skill: 3,
            strength: 4,
            toughness: 4,
            save: 3,
            invuln: None,
            wounds: 2,
            leadership: 7,
            objective_control: 2,
        }
    }

    fn state_with_units() -> GameState {
        let mut state = GameState::new(Board::new(44.0, 30.0));
        state
            .add_unit(
                Unit::new(UnitId::new("a"), "Alpha", PlayerId::new(0), stats()).with_models(3),
            )
            .unwrap();
        state
            .add_unit(
                Unit::new(UnitId::new("b"), "Bravo", PlayerId::new(1), stats()).with_models(3),
            )
            .unwrap();
        state
    }

    fn deploy_at(state: &mut GameState, id: &str, y: f32) {
        let unit = state.units.get_mut(&UnitId::new(id)).unwrap();
        unit.status = UnitStatus::Deployed;
        for (i, m) in unit.models.iter_mut().enumerate() {
            m.pos = Some(Pos::new(i as f32, y));
        }
    }

    #[test]
    fn test_unit_lookup() {
        let state = state_with_units();
        assert!(state.unit(&UnitId::new("a")).is_ok());
        assert!(matches!(
            state.unit(&UnitId::new("zz")),
            Err(EngineError::ResourceNotFound(_))
        ));
    }

    #[test]
    fn test_units_of() {
        let state = state_with_units();
        let ids: Vec<_> = state
            .units_of(PlayerId::new(0))
            .map(|u| u.id.as_str().to_string())
            .collect();
        assert_eq!(ids, vec!["a"]);
    }

    #[test]
    fn test_engagement() {
        let mut state = state_with_units();
        deploy_at(&mut state, "a", 0.0);
        deploy_at(&mut state, "b", 0.5);

        assert!(state.is_engaged(&UnitId::new("a")).unwrap());
        assert!(state.is_engaged(&UnitId::new("b")).unwrap());

        deploy_at(&mut state, "b", 10.0);
        assert!(!state.is_engaged(&UnitId::new("a")).unwrap());
    }

    #[test]
    fn test_apply_diffs_all_or_nothing() {
        let mut state = state_with_units();
        let before = state.clone();

        let diffs = vec![
            Diff::SetFlag {
                unit: UnitId::new("a"),
                flag: TurnFlag::Moved,
                value: true,
            },
            // Bad target: unknown unit.
            Diff::ModelSlain {
                unit: UnitId::new("zz"),
                model: 0,
            },
        ];

        let err = state.apply_diffs(&diffs).unwrap_err();
        assert!(matches!(err, EngineError::ResourceNotFound(_)));
        assert_eq!(state, before);
    }

    #[test]
    fn test_duplicate_unit_id_rejected() {
        let mut state = state_with_units();
        let err = state
            .add_unit(
                Unit::new(UnitId::new("a"), "Impostor", PlayerId::new(1), stats()).with_models(1),
            )
            .unwrap_err();

        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(state.unit(&UnitId::new("a")).unwrap().name, "Alpha");
    }

    #[test]
    fn test_status_revert_mid_batch_leaves_state_untouched() {
        let mut state = state_with_units();
        state
            .apply_diffs(&[Diff::UnitStatus {
                unit: UnitId::new("a"),
                status: UnitStatus::Deployed,
            }])
            .unwrap();
        let before = state.clone();

        // A valid resource diff followed by an illegal status revert:
        // the whole batch must be discarded, not just the revert.
        let diffs = vec![
            Diff::CommandPoints {
                player: PlayerId::new(0),
                delta: 5,
            },
            Diff::UnitStatus {
                unit: UnitId::new("a"),
                status: UnitStatus::Undeployed,
            },
        ];

        let err = state.apply_diffs(&diffs).unwrap_err();
        assert!(matches!(err, EngineError::RuleViolation(_)));
        assert_eq!(state, before);
        assert_eq!(state.players[PlayerId::new(0)].command_points, 0);
    }

    #[test]
    fn test_status_revert_within_batch_leaves_state_untouched() {
        let mut state = state_with_units();
        let before = state.clone();

        // The second diff is legal against the pre-batch state but not
        // after the first has advanced the unit.
        let diffs = vec![
            Diff::UnitStatus {
                unit: UnitId::new("a"),
                status: UnitStatus::Deployed,
            },
            Diff::UnitStatus {
                unit: UnitId::new("a"),
                status: UnitStatus::Undeployed,
            },
        ];

        assert!(state.apply_diffs(&diffs).is_err());
        assert_eq!(state, before);
        assert_eq!(
            state.unit(&UnitId::new("a")).unwrap().status,
            UnitStatus::Undeployed
        );
    }

    #[test]
    fn test_model_slain_tracks_casualties() {
        let mut state = state_with_units();
        let id = UnitId::new("a");

        state
            .apply_diffs(&[
                Diff::ModelSlain {
                    unit: id.clone(),
                    model: 0,
                },
                Diff::ModelSlain {
                    unit: id.clone(),
                    model: 1,
                },
            ])
            .unwrap();

        let unit = state.unit(&id).unwrap();
        assert_eq!(unit.alive_count(), 1);
        assert_eq!(unit.casualties_this_turn, 2);
        assert_eq!(unit.models[0].wounds, 0);
    }

    #[test]
    fn test_slaying_twice_counts_once() {
        let mut state = state_with_units();
        let id = UnitId::new("a");
        let diff = Diff::ModelSlain {
            unit: id.clone(),
            model: 0,
        };

        state.apply_diffs(&[diff.clone()]).unwrap();
        state.apply_diffs(&[diff]).unwrap();

        assert_eq!(state.unit(&id).unwrap().casualties_this_turn, 1);
    }

    #[test]
    fn test_reset_turn_state_scoped_to_player() {
        let mut state = state_with_units();
        for unit in state.units.values_mut() {
            unit.flags.set(TurnFlag::Moved, true);
        }

        state
            .apply_diffs(&[Diff::ResetTurnState {
                player: PlayerId::new(0),
            }])
            .unwrap();

        assert!(!state.unit(&UnitId::new("a")).unwrap().flags.moved);
        assert!(state.unit(&UnitId::new("b")).unwrap().flags.moved);
    }

    #[test]
    fn test_resource_diffs() {
        let mut state = state_with_units();
        state
            .apply_diffs(&[
                Diff::CommandPoints {
                    player: PlayerId::new(0),
                    delta: 2,
                },
                Diff::VictoryPoints {
                    player: PlayerId::new(1),
                    delta: 5,
                },
            ])
            .unwrap();

        assert_eq!(state.players[PlayerId::new(0)].command_points, 2);
        assert_eq!(state.players[PlayerId::new(1)].victory_points, 5);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut state = state_with_units();
        deploy_at(&mut state, "a", 0.0);

        let json = serde_json::to_string(&state).unwrap();
        let restored: GameState = serde_json::from_str(&json).unwrap();

        assert_eq!(state, restored);
        // BTreeMap keys serialize in order, so equal states produce
        // identical snapshots.
        assert_eq!(json, serde_json::to_string(&restored).unwrap());
    }
}
