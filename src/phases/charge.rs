//! Charge phase: 2d6 decides whether a unit reaches melee.
//!
//! A successful charge closes each model straight toward the nearest
//! enemy model, up to the rolled distance, ending just inside engagement
//! range. A failed charge records the roll and nothing else; either way
//! the unit only gets one attempt per phase.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{
    enemy_target, ensure_active_player, owned_deployed_unit, wrong_phase, Phase, DIST_EPSILON,
};
use crate::core::action::{Action, ActionKind, ActionPayload, ActionResult};
use crate::core::geometry::{CHARGE_DECLARE_RANGE, ENGAGEMENT_RANGE};
use crate::core::rng::DiceSource;
use crate::error::{EngineError, EngineResult};
use crate::rules::rolls::{RollPurpose, RollRecord};
use crate::state::diff::Diff;
use crate::state::game_state::{GameState, PhaseKind};
use crate::state::unit::{TurnFlag, Unit, UnitId};

/// Final gap a charging model leaves to its target, inside engagement
/// range.
const CHARGE_CONTACT_GAP: f32 = 0.5;

/// The charge phase.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChargePhase {
    done: bool,
    /// Units that have declared a charge this phase, successful or not.
    attempted: BTreeSet<UnitId>,
}

impl ChargePhase {
    fn validate_charge(
        &self,
        state: &GameState,
        action: &Action,
        unit_id: &UnitId,
        target_id: &UnitId,
    ) -> EngineResult<()> {
        ensure_active_player(state, action)?;
        let unit = owned_deployed_unit(state, action, unit_id)?;

        if self.attempted.contains(unit_id) {
            return Err(EngineError::Validation(format!(
                "unit '{}' has already declared a charge this phase",
                unit_id
            )));
        }
        if unit.flags.advanced || unit.flags.fell_back {
            return Err(EngineError::Validation(format!(
                "unit '{}' advanced or fell back and may not charge",
                unit_id
            )));
        }
        if unit.flags.charged {
            return Err(EngineError::Validation(format!(
                "unit '{}' has already charged this turn",
                unit_id
            )));
        }
        if state.is_engaged(unit_id)? {
            return Err(EngineError::Validation(format!(
                "unit '{}' is already engaged",
                unit_id
            )));
        }

        let target = enemy_target(state, unit, target_id)?;
        if !unit.is_within(target, CHARGE_DECLARE_RANGE) {
            return Err(EngineError::RuleViolation(format!(
                "target '{}' is beyond charge declaration range",
                target_id
            )));
        }
        Ok(())
    }

    /// Close each model toward the nearest target model, capped at the
    /// rolled distance, stopping just short of base contact.
    fn charge_moves(unit: &Unit, target: &Unit, rolled: f32) -> Vec<Diff> {
        let target_positions = target.alive_positions();
        let mut diffs = Vec::new();

        for (index, model) in unit.alive_models() {
            let Some(from) = model.pos else { continue };
            let Some(&nearest) = target_positions.iter().min_by(|&&a, &&b| {
                from.distance_to(a)
                    .partial_cmp(&from.distance_to(b))
                    .unwrap_or(std::cmp::Ordering::Equal)
            }) else {
                continue;
            };

            let gap = from.distance_to(nearest) - CHARGE_CONTACT_GAP;
            let step = gap.max(0.0).min(rolled);
            diffs.push(Diff::ModelPosition {
                unit: unit.id.clone(),
                model: index,
                pos: from.step_towards(nearest, step),
            });
        }

        diffs.push(Diff::SetFlag {
            unit: unit.id.clone(),
            flag: TurnFlag::Charged,
            value: true,
        });
        diffs
    }
}

impl Phase for ChargePhase {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Charge
    }

    fn exit_phase(&mut self, _state: &GameState) {
        self.attempted.clear();
    }

    fn get_available_actions(&self, _state: &GameState) -> Vec<ActionKind> {
        vec![ActionKind::DeclareCharge, ActionKind::EndPhase]
    }

    fn validate_action(&self, state: &GameState, action: &Action) -> EngineResult<()> {
        match &action.payload {
            ActionPayload::DeclareCharge { unit, target } => {
                self.validate_charge(state, action, unit, target)
            }
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
            ActionPayload::DeclareCharge { unit, target } => {
                let charger = state.unit(unit)?;
                let defender = state.unit(target)?;

                let rolls = dice.roll_d6(2)?;
                let record = RollRecord::values(RollPurpose::Charge, &rolls);
                let rolled = record.total() as f32;
                self.attempted.insert(unit.clone());

                // The unit needs to close to within engagement range.
                let needed = charger
                    .distance_to(defender)
                    .unwrap_or(f32::INFINITY)
                    - ENGAGEMENT_RANGE;
                if rolled + DIST_EPSILON < needed {
                    return Ok(ActionResult::ok(Vec::new(), vec![record]));
                }

                Ok(ActionResult::ok(
                    Self::charge_moves(charger, defender, rolled),
                    vec![record],
                ))
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
