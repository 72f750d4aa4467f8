//! Action and result envelopes.
//!
//! An [`Action`] is a typed request from a player: who submitted it, when,
//! and a payload naming the acting unit plus per-kind data. Actions are
//! immutable once submitted; the engine never edits one in flight.
//!
//! An [`ActionResult`] is what comes back: success, the ordered diffs to
//! apply, the ordered dice records drawn while executing, and any errors.
//! Diffs from one action apply all-or-nothing.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::geometry::Pos;
use super::player::PlayerId;
use crate::rules::rolls::RollRecord;
use crate::state::diff::Diff;
use crate::state::unit::UnitId;

/// A submitted player action.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// The submitting player.
    pub player: PlayerId,

    /// Submission timestamp (seconds). Carried for logs; never used by
    /// rules logic.
    pub timestamp: f64,

    /// The typed payload.
    pub payload: ActionPayload,
}

impl Action {
    /// Create a new action.
    #[must_use]
    pub fn new(player: PlayerId, timestamp: f64, payload: ActionPayload) -> Self {
        Self {
            player,
            timestamp,
            payload,
        }
    }

    /// The kind tag of this action's payload.
    #[must_use]
    pub fn kind(&self) -> ActionKind {
        self.payload.kind()
    }

    /// The acting unit, if this kind of action names one.
    #[must_use]
    pub fn actor(&self) -> Option<&UnitId> {
        self.payload.actor()
    }
}

/// Typed action payloads, one variant per action kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ActionPayload {
    /// Place an undeployed unit's models in the owner's deployment zone.
    Deploy {
        unit: UnitId,
        positions: SmallVec<[Pos; 8]>,
    },
    /// Signal that the submitting player has finished deploying.
    EndDeployment,

    /// Move a unit's models, one destination per alive model.
    Move {
        unit: UnitId,
        destinations: SmallVec<[Pos; 8]>,
    },
    /// Roll an advance for a unit; the follow-up `Move` spends the
    /// increased allowance.
    Advance { unit: UnitId },
    /// Leave melee. Destinations must end outside engagement range.
    FallBack {
        unit: UnitId,
        destinations: SmallVec<[Pos; 8]>,
    },
    /// Explicitly hold position this turn.
    RemainStationary { unit: UnitId },

    /// Shoot a ranged weapon at an enemy unit. Halts awaiting saves.
    Shoot {
        unit: UnitId,
        weapon: String,
        target: UnitId,
    },
    /// Attack in melee. Halts awaiting saves, like `Shoot`.
    Fight {
        unit: UnitId,
        weapon: String,
        target: UnitId,
    },
    /// Defender resolves the pending saves and takes the damage.
    RollSaves,
    /// Attacker abandons the pending attack resolution.
    AbandonAttack,

    /// Declare a charge; 2d6 decides whether the unit reaches melee.
    DeclareCharge { unit: UnitId, target: UnitId },

    /// Take a morale test for a unit that lost models this turn.
    MoraleTest { unit: UnitId },

    /// End the current phase for the submitting player.
    EndPhase,
}

impl ActionPayload {
    /// The fieldless kind tag for this payload.
    #[must_use]
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionPayload::Deploy { .. } => ActionKind::Deploy,
            ActionPayload::EndDeployment => ActionKind::EndDeployment,
            ActionPayload::Move { .. } => ActionKind::Move,
            ActionPayload::Advance { .. } => ActionKind::Advance,
            ActionPayload::FallBack { .. } => ActionKind::FallBack,
            ActionPayload::RemainStationary { .. } => ActionKind::RemainStationary,
            ActionPayload::Shoot { .. } => ActionKind::Shoot,
            ActionPayload::Fight { .. } => ActionKind::Fight,
            ActionPayload::RollSaves => ActionKind::RollSaves,
            ActionPayload::AbandonAttack => ActionKind::AbandonAttack,
            ActionPayload::DeclareCharge { .. } => ActionKind::DeclareCharge,
            ActionPayload::MoraleTest { .. } => ActionKind::MoraleTest,
            ActionPayload::EndPhase => ActionKind::EndPhase,
        }
    }

    /// The acting unit named by this payload, if any.
    #[must_use]
    pub fn actor(&self) -> Option<&UnitId> {
        match self {
            ActionPayload::Deploy { unit, .. }
            | ActionPayload::Move { unit, .. }
            | ActionPayload::Advance { unit }
            | ActionPayload::FallBack { unit, .. }
            | ActionPayload::RemainStationary { unit }
            | ActionPayload::Shoot { unit, .. }
            | ActionPayload::Fight { unit, .. }
            | ActionPayload::DeclareCharge { unit, .. }
            | ActionPayload::MoraleTest { unit } => Some(unit),
            ActionPayload::EndDeployment
            | ActionPayload::RollSaves
            | ActionPayload::AbandonAttack
            | ActionPayload::EndPhase => None,
        }
    }
}

/// Fieldless action kind, used by legality discovery.
///
/// `get_available_actions` returns these; the presentation layer builds
/// its menu from them and nothing else.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Deploy,
    EndDeployment,
    Move,
    Advance,
    FallBack,
    RemainStationary,
    Shoot,
    Fight,
    RollSaves,
    AbandonAttack,
    DeclareCharge,
    MoraleTest,
    EndPhase,
}

/// Outcome of executing one action.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    /// Whether the action executed.
    pub success: bool,

    /// Ordered atomic mutations. Applied all-or-nothing.
    pub diffs: Vec<Diff>,

    /// Ordered dice records drawn during execution.
    pub dice: Vec<RollRecord>,

    /// Error messages. Only reaches the submitting player.
    pub errors: Vec<String>,
}

impl ActionResult {
    /// Successful result carrying diffs and dice records.
    #[must_use]
    pub fn ok(diffs: Vec<Diff>, dice: Vec<RollRecord>) -> Self {
        Self {
            success: true,
            diffs,
            dice,
            errors: Vec::new(),
        }
    }

    /// Rejected result. No diffs, no dice.
    #[must_use]
    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            success: false,
            diffs: Vec::new(),
            dice: Vec::new(),
            errors: vec![error.into()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn test_kind_and_actor() {
        let action = Action::new(
            PlayerId::new(0),
            1.5,
            ActionPayload::Shoot {
                unit: UnitId::new("intercessors"),
                weapon: "bolt rifle".into(),
                target: UnitId::new("boyz"),
            },
        );

        assert_eq!(action.kind(), ActionKind::Shoot);
        assert_eq!(action.actor(), Some(&UnitId::new("intercessors")));
    }

    #[test]
    fn test_no_actor_kinds() {
        for payload in [
            ActionPayload::EndPhase,
            ActionPayload::EndDeployment,
            ActionPayload::RollSaves,
            ActionPayload::AbandonAttack,
        ] {
            assert!(payload.actor().is_none());
        }
    }

    #[test]
    fn test_result_constructors() {
        let ok = ActionResult::ok(Vec::new(), Vec::new());
        assert!(ok.success);
        assert!(ok.errors.is_empty());

        let rejected = ActionResult::rejected("not your turn");
        assert!(!rejected.success);
        assert!(rejected.diffs.is_empty());
        assert!(rejected.dice.is_empty());
        assert_eq!(rejected.errors, vec!["not your turn".to_string()]);
    }

    #[test]
    fn test_action_serialization_round_trip() {
        let action = Action::new(
            PlayerId::new(1),
            12.0,
            ActionPayload::Move {
                unit: UnitId::new("boyz"),
                destinations: smallvec![Pos::new(1.0, 2.0), Pos::new(2.0, 2.0)],
            },
        );

        let json = serde_json::to_string(&action).unwrap();
        let deserialized: Action = serde_json::from_str(&json).unwrap();

        assert_eq!(action, deserialized);
    }
}
