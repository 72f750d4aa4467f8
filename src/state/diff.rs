//! Atomic state mutation records.
//!
//! Every change to [`GameState`](super::GameState) is expressed as a
//! [`Diff`]. One action's diffs are applied in order, all-or-nothing, and
//! are the only thing broadcast to other participants, never the raw
//! input. Replicas converge by applying the same diffs in the same order.

use serde::{Deserialize, Serialize};

use super::game_state::Meta;
use super::unit::{TurnFlag, UnitId, UnitStatus};
use crate::core::geometry::Pos;
use crate::core::player::PlayerId;

/// One atomic, ordered mutation of game state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum Diff {
    /// Advance a unit's lifecycle status (monotonic).
    UnitStatus { unit: UnitId, status: UnitStatus },

    /// Set one per-turn flag on a unit.
    SetFlag {
        unit: UnitId,
        flag: TurnFlag,
        value: bool,
    },

    /// Clear per-turn flags and counters for every unit a player owns.
    /// Emitted when that player's turn begins.
    ResetTurnState { player: PlayerId },

    /// Place or move one model.
    ModelPosition {
        unit: UnitId,
        model: usize,
        pos: Pos,
    },

    /// Set one model's current wounds (absolute value, non-zero).
    ModelWounds {
        unit: UnitId,
        model: usize,
        wounds: u32,
    },

    /// Remove one model from play: wounds to zero, no longer alive.
    ModelSlain { unit: UnitId, model: usize },

    /// Mark a unit as having taken its morale test this turn.
    MoraleTested { unit: UnitId },

    /// Adjust a player's command points.
    CommandPoints { player: PlayerId, delta: i32 },

    /// Adjust a player's victory points.
    VictoryPoints { player: PlayerId, delta: i32 },

    /// Replace the game meta: phase, round, turn, active player.
    PhaseTransition { meta: Meta },
}
