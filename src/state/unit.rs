//! Units, models, stat blocks, and weapon profiles.
//!
//! A [`Unit`] is an ordered list of [`Model`]s sharing a stat block and a
//! weapon list. Lifecycle status is monotonic: Undeployed → Deployed →
//! Destroyed, never backwards. Per-turn flags (moved, advanced, fell back,
//! charged, fought) gate what a unit may still do this turn and reset at
//! the start of its owner's next turn.

use serde::{Deserialize, Serialize};

use crate::core::geometry::Pos;
use crate::core::player::PlayerId;
use crate::error::{EngineError, EngineResult};
use crate::rules::rolls::RerollPolicy;

/// Unit identifier. String-keyed: the external action envelope addresses
/// units by string id.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnitId(pub String);

impl UnitId {
    /// Create a new unit id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw string id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UnitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unit lifecycle status. Transitions are strictly forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UnitStatus {
    Undeployed,
    Deployed,
    Destroyed,
}

/// One per-turn flag on a unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnFlag {
    Moved,
    Advanced,
    FellBack,
    Charged,
    Fought,
}

/// The set of per-turn flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnFlags {
    pub moved: bool,
    pub advanced: bool,
    pub fell_back: bool,
    pub charged: bool,
    pub fought: bool,
}

impl TurnFlags {
    /// Read one flag.
    #[must_use]
    pub fn get(&self, flag: TurnFlag) -> bool {
        match flag {
            TurnFlag::Moved => self.moved,
            TurnFlag::Advanced => self.advanced,
            TurnFlag::FellBack => self.fell_back,
            TurnFlag::Charged => self.charged,
            TurnFlag::Fought => self.fought,
        }
    }

    /// Write one flag.
    pub fn set(&mut self, flag: TurnFlag, value: bool) {
        match flag {
            TurnFlag::Moved => self.moved = value,
            TurnFlag::Advanced => self.advanced = value,
            TurnFlag::FellBack => self.fell_back = value,
            TurnFlag::Charged => self.charged = value,
            TurnFlag::Fought => self.fought = value,
        }
    }

    /// Clear every flag.
    pub fn clear(&mut self) {
        *self = TurnFlags::default();
    }
}

/// Shared unit characteristics.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatBlock {
    /// Movement allowance in inches.
    pub movement: f32,
    /// Required hit roll, shooting and melee (e.g. 3 for "3+").
    pub skill: u8,
    /// Wielder strength, fed into melee weapons that scale with the
    /// user.
    pub strength: u8,
    pub toughness: u8,
    /// Base armour save (e.g. 3 for "3+").
    pub save: u8,
    /// Invulnerable save, immune to AP. `None` if the unit has none.
    pub invuln: Option<u8>,
    /// Wounds per model.
    pub wounds: u32,
    pub leadership: u8,
    /// Objective control per model.
    pub objective_control: u32,
}

/// Damage characteristic of a weapon.
///
/// Variable damage is rolled once per damage instance (one failed save),
/// never once per model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Damage {
    Fixed(u32),
    D3,
    D6,
}

/// Whether a weapon is used in the Shooting or Fight phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeaponKind {
    Ranged,
    Melee,
}

/// Strength characteristic feeding the wound roll.
///
/// Ranged profiles are always fixed. Melee profiles either carry their
/// own value or swing with the wielder's strength plus a modifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeaponStrength {
    /// Fixed profile value, independent of the wielder.
    Fixed(u8),
    /// The wielder's strength plus a modifier.
    User(i8),
}

/// A weapon profile carried by every model in the unit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Weapon {
    pub name: String,
    pub kind: WeaponKind,
    /// Maximum range in inches. Unused for melee.
    pub range: f32,
    /// Attacks per model.
    pub attacks: u32,
    pub strength: WeaponStrength,
    /// Armour penetration, stored as the conventional non-positive
    /// modifier (0, -1, -2, ...).
    pub ap: i8,
    pub damage: Damage,
    /// Hits automatically, skipping the hit roll entirely.
    pub auto_hit: bool,
    /// Damage bypasses the save step (mortal wounds).
    pub mortal: bool,
    /// Flat to-hit modifier (+1 / -1).
    pub hit_modifier: i8,
    pub reroll: RerollPolicy,
}

impl Weapon {
    /// Create a ranged weapon with no special rules.
    #[must_use]
    pub fn ranged(
        name: impl Into<String>,
        range: f32,
        attacks: u32,
        strength: u8,
        ap: i8,
        damage: Damage,
    ) -> Self {
        Self {
            name: name.into(),
            kind: WeaponKind::Ranged,
            range,
            attacks,
            strength: WeaponStrength::Fixed(strength),
            ap,
            damage,
            auto_hit: false,
            mortal: false,
            hit_modifier: 0,
            reroll: RerollPolicy::None,
        }
    }

    /// Create a melee weapon with no special rules.
    #[must_use]
    pub fn melee(
        name: impl Into<String>,
        attacks: u32,
        strength: WeaponStrength,
        ap: i8,
        damage: Damage,
    ) -> Self {
        Self {
            name: name.into(),
            kind: WeaponKind::Melee,
            range: 0.0,
            attacks,
            strength,
            ap,
            damage,
            auto_hit: false,
            mortal: false,
            hit_modifier: 0,
            reroll: RerollPolicy::None,
        }
    }

    /// Mark as auto-hitting (no hit roll).
    #[must_use]
    pub fn with_auto_hit(mut self) -> Self {
        self.auto_hit = true;
        self
    }

    /// Mark damage as mortal (bypasses saves).
    #[must_use]
    pub fn with_mortal(mut self) -> Self {
        self.mortal = true;
        self
    }

    /// Set a flat to-hit modifier.
    #[must_use]
    pub fn with_hit_modifier(mut self, modifier: i8) -> Self {
        self.hit_modifier = modifier;
        self
    }

    /// Set the reroll policy for hit rolls.
    #[must_use]
    pub fn with_reroll(mut self, reroll: RerollPolicy) -> Self {
        self.reroll = reroll;
        self
    }

    /// Strength on the wound roll for a model with `wielder` stats.
    #[must_use]
    pub fn wound_strength(&self, wielder: &StatBlock) -> u8 {
        match self.strength {
            WeaponStrength::Fixed(s) => s,
            WeaponStrength::User(modifier) => {
                (i16::from(wielder.strength) + i16::from(modifier)).clamp(1, 255) as u8
            }
        }
    }
}

/// One miniature in a unit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Model {
    /// Battlefield position. `None` until deployed.
    pub pos: Option<Pos>,
    pub alive: bool,
    /// Current wounds. Never negative; the model is removed from play
    /// exactly when this reaches zero.
    pub wounds: u32,
    pub max_wounds: u32,
    /// Base radius in inches.
    pub base_radius: f32,
}

impl Model {
    /// Create a fresh model with full wounds and no position.
    #[must_use]
    pub fn new(max_wounds: u32) -> Self {
        Self {
            pos: None,
            alive: true,
            wounds: max_wounds,
            max_wounds,
            base_radius: 0.5,
        }
    }

    /// Alive but below full wounds.
    #[must_use]
    pub fn is_wounded(&self) -> bool {
        self.alive && self.wounds < self.max_wounds
    }
}

/// A unit: owner, status, flags, models, stats, weapons.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub name: String,
    pub owner: PlayerId,
    pub status: UnitStatus,
    pub flags: TurnFlags,
    pub stats: StatBlock,
    pub models: Vec<Model>,
    pub weapons: Vec<Weapon>,
    /// Models lost this player turn. Feeds morale.
    pub casualties_this_turn: u32,
    /// Morale already tested this turn.
    pub morale_tested: bool,
}

impl Unit {
    /// Create a unit with no models.
    #[must_use]
    pub fn new(id: UnitId, name: impl Into<String>, owner: PlayerId, stats: StatBlock) -> Self {
        Self {
            id,
            name: name.into(),
            owner,
            status: UnitStatus::Undeployed,
            flags: TurnFlags::default(),
            stats,
            models: Vec::new(),
            weapons: Vec::new(),
            casualties_this_turn: 0,
            morale_tested: false,
        }
    }

    /// Add `count` fresh models at the stat block's wound value.
    #[must_use]
    pub fn with_models(mut self, count: usize) -> Self {
        for _ in 0..count {
            self.models.push(Model::new(self.stats.wounds));
        }
        self
    }

    /// Add a weapon profile.
    #[must_use]
    pub fn with_weapon(mut self, weapon: Weapon) -> Self {
        self.weapons.push(weapon);
        self
    }

    /// Advance lifecycle status. Rejects any backwards transition.
    pub fn advance_status(&mut self, next: UnitStatus) -> EngineResult<()> {
        if next < self.status {
            return Err(EngineError::RuleViolation(format!(
                "unit {} cannot revert status {:?} -> {:?}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        Ok(())
    }

    /// Look up a weapon profile by name.
    pub fn weapon(&self, name: &str) -> EngineResult<&Weapon> {
        self.weapons
            .iter()
            .find(|w| w.name == name)
            .ok_or_else(|| {
                EngineError::ResourceNotFound(format!("weapon '{}' on unit {}", name, self.id))
            })
    }

    /// Iterate alive models with their indices.
    pub fn alive_models(&self) -> impl Iterator<Item = (usize, &Model)> {
        self.models.iter().enumerate().filter(|(_, m)| m.alive)
    }

    /// Number of alive models.
    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.models.iter().filter(|m| m.alive).count()
    }

    /// Positions of alive, deployed models.
    #[must_use]
    pub fn alive_positions(&self) -> Vec<Pos> {
        self.models
            .iter()
            .filter(|m| m.alive)
            .filter_map(|m| m.pos)
            .collect()
    }

    /// Total attacks for a weapon across alive models.
    #[must_use]
    pub fn total_attacks(&self, weapon: &Weapon) -> u32 {
        weapon.attacks * self.alive_count() as u32
    }

    /// Minimum distance between this unit's and another unit's alive
    /// models. `None` if either unit has no deployed alive models.
    #[must_use]
    pub fn distance_to(&self, other: &Unit) -> Option<f32> {
        let mut min: Option<f32> = None;
        for a in self.alive_positions() {
            for b in other.alive_positions() {
                let d = a.distance_to(b);
                min = Some(match min {
                    Some(m) if m <= d => m,
                    _ => d,
                });
            }
        }
        min
    }

    /// Whether any alive model is within `range` of another unit's alive
    /// models.
    #[must_use]
    pub fn is_within(&self, other: &Unit, range: f32) -> bool {
        self.distance_to(other).is_some_and(|d| d <= range)
    }

    /// Clear per-turn bookkeeping at the start of the owner's turn.
    pub fn reset_turn_state(&mut self) {
        self.flags.clear();
        self.casualties_this_turn = 0;
        self.morale_tested = false;
    }
}
