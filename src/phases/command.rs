//! Command phase: resource upkeep at the start of a player turn.
//!
//! The command point grant and turn-flag reset are emitted as transition
//! diffs by the manager when the phase is entered, so the phase itself
//! only waits for the active player to move on.

use serde::{Deserialize, Serialize};

use super::{ensure_active_player, wrong_phase, Phase};
use crate::core::action::{Action, ActionKind, ActionPayload, ActionResult};
use crate::core::rng::DiceSource;
use crate::error::EngineResult;
use crate::state::game_state::{GameState, PhaseKind};

/// The command phase.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandPhase {
    done: bool,
}

impl Phase for CommandPhase {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Command
    }

    fn get_available_actions(&self, _state: &GameState) -> Vec<ActionKind> {
        vec![ActionKind::EndPhase]
    }

    fn validate_action(&self, state: &GameState, action: &Action) -> EngineResult<()> {
        match &action.payload {
            ActionPayload::EndPhase => ensure_active_player(state, action),
            other => Err(wrong_phase(other.kind(), self.kind())),
        }
    }

    fn execute_action(
        &mut self,
        state: &GameState,
        action: &Action,
        _dice: &mut dyn DiceSource,
    ) -> EngineResult<ActionResult> {
        self.validate_action(state, action)?;
        self.done = true;
        Ok(ActionResult::ok(Vec::new(), Vec::new()))
    }

    fn is_complete(&self, _state: &GameState) -> bool {
        self.done
    }
}
