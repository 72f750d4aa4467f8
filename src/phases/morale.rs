//! Morale phase: attrition tests for units that lost models this turn.
//!
//! Either player tests their own units here, the second exception to
//! active-player ownership (the defender's units also bled during the
//! active player's turn). d6 + casualties against leadership; the
//! excess flees, lowest-wounds models first.

use serde::{Deserialize, Serialize};

use super::{ensure_active_player, wrong_phase, Phase};
use crate::core::action::{Action, ActionKind, ActionPayload, ActionResult};
use crate::core::rng::DiceSource;
use crate::error::{EngineError, EngineResult};
use crate::rules::combat::remove_fleeing_models;
use crate::rules::rolls::{RollPurpose, RollRecord};
use crate::state::diff::Diff;
use crate::state::game_state::{GameState, PhaseKind};
use crate::state::unit::{UnitId, UnitStatus};

/// The morale phase.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MoralePhase {
    done: bool,
}

impl MoralePhase {
    fn validate_test(
        &self,
        state: &GameState,
        action: &Action,
        unit_id: &UnitId,
    ) -> EngineResult<()> {
        let unit = state.unit(unit_id)?;
        if unit.owner != action.player {
            return Err(EngineError::Validation(format!(
                "unit '{}' is not owned by {}",
                unit_id, action.player
            )));
        }
        if unit.status != UnitStatus::Deployed || unit.alive_count() == 0 {
            return Err(EngineError::Validation(format!(
                "unit '{}' is not on the battlefield",
                unit_id
            )));
        }
        if unit.casualties_this_turn == 0 {
            return Err(EngineError::Validation(format!(
                "unit '{}' lost no models this turn",
                unit_id
            )));
        }
        if unit.morale_tested {
            return Err(EngineError::Validation(format!(
                "unit '{}' has already tested this turn",
                unit_id
            )));
        }
        Ok(())
    }
}

impl Phase for MoralePhase {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Morale
    }

    fn get_available_actions(&self, _state: &GameState) -> Vec<ActionKind> {
        vec![ActionKind::MoraleTest, ActionKind::EndPhase]
    }

    fn validate_action(&self, state: &GameState, action: &Action) -> EngineResult<()> {
        match &action.payload {
            ActionPayload::MoraleTest { unit } => self.validate_test(state, action, unit),
            ActionPayload::EndPhase => ensure_active_player(state, action),
            other => Err(wrong_phase(other.kind(), self.kind())),
        }
    }

    fn execute_action(
        &mut self,
        state: &GameState,
        action: &Action,
        dice: &mut dyn DiceSource,
    ) -> EngineResult<ActionResult> {
        self.validate_action(state, action)?;

        match &action.payload {
            ActionPayload::MoraleTest { unit } => {
                let u = state.unit(unit)?;
                let roll = dice.roll_d6(1)?[0];
                let record = RollRecord::values(RollPurpose::Morale, &[roll]);

                let total = roll as u32 + u.casualties_this_turn;
                let mut diffs = Vec::new();
                if total > u.stats.leadership as u32 {
                    let fleeing = total - u.stats.leadership as u32;
                    diffs = remove_fleeing_models(u, fleeing);
                }
                diffs.push(Diff::MoraleTested { unit: unit.clone() });

                Ok(ActionResult::ok(diffs, vec![record]))
            }
            ActionPayload::EndPhase => {
                self.done = true;
                Ok(ActionResult::ok(Vec::new(), Vec::new()))
            }
            other => Err(wrong_phase(other.kind(), self.kind())),
        }
    }

    fn is_complete(&self, _state: &GameState) -> bool {
        self.done
    }
}
