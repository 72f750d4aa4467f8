//! Fight phase: melee attacks between engaged units.
//!
//! Melee runs the same hit/wound/save pipeline as shooting, including
//! the pause-before-saves handoff. A unit fights once per turn, tracked
//! by its fought flag so the spent activation replicates as a diff.

use serde::{Deserialize, Serialize};

use super::{
    enemy_target, ensure_active_player, owned_deployed_unit, wrong_phase, PendingAttack, Phase,
};
use crate::core::action::{Action, ActionKind, ActionPayload, ActionResult};
use crate::core::geometry::ENGAGEMENT_RANGE;
use crate::core::rng::DiceSource;
use crate::error::{EngineError, EngineResult};
use crate::rules::combat::{apply_save_damage, resolve_attacks_until_wounds};
use crate::state::diff::Diff;
use crate::state::game_state::{GameState, PhaseKind};
use crate::state::unit::{TurnFlag, UnitId, WeaponKind};

/// The fight phase.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FightPhase {
    done: bool,
    pending: Option<PendingAttack>,
}

impl FightPhase {
    fn validate_fight(
        &self,
        state: &GameState,
        action: &Action,
        unit_id: &UnitId,
        weapon_name: &str,
        target_id: &UnitId,
    ) -> EngineResult<()> {
        ensure_active_player(state, action)?;
        let unit = owned_deployed_unit(state, action, unit_id)?;

        if unit.flags.fought {
            return Err(EngineError::Validation(format!(
                "unit '{}' has already fought this turn",
                unit_id
            )));
        }

        let weapon = unit.weapon(weapon_name)?;
        if weapon.kind != WeaponKind::Melee {
            return Err(EngineError::RuleViolation(format!(
                "weapon '{}' is not a melee weapon",
                weapon_name
            )));
        }

        let target = enemy_target(state, unit, target_id)?;
        if !unit.is_within(target, ENGAGEMENT_RANGE) {
            return Err(EngineError::RuleViolation(format!(
                "unit '{}' is not engaged with '{}'",
                unit_id, target_id
            )));
        }
        Ok(())
    }
}

impl Phase for FightPhase {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Fight
    }

    fn exit_phase(&mut self, _state: &GameState) {
        self.pending = None;
    }

    fn get_available_actions(&self, _state: &GameState) -> Vec<ActionKind> {
        if self.pending.is_some() {
            vec![ActionKind::RollSaves, ActionKind::AbandonAttack]
        } else {
            vec![ActionKind::Fight, ActionKind::EndPhase]
        }
    }

    fn validate_action(&self, state: &GameState, action: &Action) -> EngineResult<()> {
        if let Some(pending) = &self.pending {
            return match &action.payload {
                ActionPayload::RollSaves => pending.validate_roll_saves(state, action),
                ActionPayload::AbandonAttack => pending.validate_abandon(state, action),
                other => Err(EngineError::Validation(format!(
                    "{:?} rejected: saves are pending for '{}'",
                    other.kind(),
                    pending.target
                ))),
            };
        }

        match &action.payload {
            ActionPayload::Fight {
                unit,
                weapon,
                target,
            } => self.validate_fight(state, action, unit, weapon, target),
            ActionPayload::EndPhase => ensure_active_player(state, action),
            ActionPayload::RollSaves | ActionPayload::AbandonAttack => Err(
                EngineError::Validation("no attack resolution is pending".into()),
            ),
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
            ActionPayload::Fight {
                unit,
                weapon,
                target,
            } => {
                let attacker = state.unit(unit)?;
                let profile = attacker.weapon(weapon)?;
                let defender = state.unit(target)?;

                let pause = resolve_attacks_until_wounds(dice, attacker, profile, defender)?;
                let mut diffs = vec![Diff::SetFlag {
                    unit: unit.clone(),
                    flag: TurnFlag::Fought,
                    value: true,
                }];
                let mut records = pause.records;

                if pause.wounds == 0 {
                    return Ok(ActionResult::ok(diffs, records));
                }
                if profile.mortal {
                    let (damage_diffs, damage_records) =
                        apply_save_damage(dice, defender, pause.wounds, profile.damage)?;
                    diffs.extend(damage_diffs);
                    records.extend(damage_records);
                    return Ok(ActionResult::ok(diffs, records));
                }

                self.pending = Some(PendingAttack {
                    attacker: unit.clone(),
                    weapon: weapon.clone(),
                    target: target.clone(),
                    wounds: pause.wounds,
                });
                Ok(ActionResult::ok(diffs, records))
            }
            ActionPayload::RollSaves => {
                let pending = self.pending.as_ref().ok_or_else(|| {
                    EngineError::Validation("no attack resolution is pending".into())
                })?;
                // Resolve before clearing, so a failure keeps the
                // handoff open instead of dropping the wounds.
                let result = pending.execute_roll_saves(state, dice)?;
                self.pending = None;
                Ok(result)
            }
            ActionPayload::AbandonAttack => {
                self.pending = None;
                Ok(ActionResult::ok(Vec::new(), Vec::new()))
            }
            ActionPayload::EndPhase => {
                self.done = true;
                Ok(ActionResult::ok(Vec::new(), Vec::new()))
            }
            other => Err(wrong_phase(other.kind(), self.kind())),
        }
    }

    fn is_complete(&self, _state: &GameState) -> bool {
        self.done && self.pending.is_none()
    }
}
