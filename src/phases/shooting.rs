//! Shooting phase: ranged attacks with the pause-before-saves handoff.
//!
//! A `Shoot` action resolves hit and wound rolls, then halts while the
//! defending player resolves saves. Mortal-wound weapons skip the save
//! step and allocate damage immediately.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{
    enemy_target, ensure_active_player, owned_deployed_unit, wrong_phase, PendingAttack, Phase,
};
use crate::core::action::{Action, ActionKind, ActionPayload, ActionResult};
use crate::core::rng::DiceSource;
use crate::error::{EngineError, EngineResult};
use crate::rules::combat::{apply_save_damage, resolve_attacks_until_wounds};
use crate::state::game_state::{GameState, PhaseKind};
use crate::state::unit::{UnitId, WeaponKind};

/// The shooting phase.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ShootingPhase {
    done: bool,
    pending: Option<PendingAttack>,
    /// Units that have fired this phase.
    fired: BTreeSet<UnitId>,
}

impl ShootingPhase {
    fn validate_shoot(
        &self,
        state: &GameState,
        action: &Action,
        unit_id: &UnitId,
        weapon_name: &str,
        target_id: &UnitId,
    ) -> EngineResult<()> {
        ensure_active_player(state, action)?;
        let unit = owned_deployed_unit(state, action, unit_id)?;

        if self.fired.contains(unit_id) {
            return Err(EngineError::Validation(format!(
                "unit '{}' has already shot this phase",
                unit_id
            )));
        }
        if unit.flags.advanced || unit.flags.fell_back {
            return Err(EngineError::Validation(format!(
                "unit '{}' advanced or fell back and may not shoot",
                unit_id
            )));
        }
        if state.is_engaged(unit_id)? {
            return Err(EngineError::Validation(format!(
                "unit '{}' is engaged and may not shoot",
                unit_id
            )));
        }

        let weapon = unit.weapon(weapon_name)?;
        if weapon.kind != WeaponKind::Ranged {
            return Err(EngineError::RuleViolation(format!(
                "weapon '{}' is not a ranged weapon",
                weapon_name
            )));
        }

        let target = enemy_target(state, unit, target_id)?;
        if !unit.is_within(target, weapon.range) {
            return Err(EngineError::RuleViolation(format!(
                "target '{}' is beyond the {:.0}\" range of '{}'",
                target_id, weapon.range, weapon_name
            )));
        }
        Ok(())
    }
}

impl Phase for ShootingPhase {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Shooting
    }

    fn exit_phase(&mut self, _state: &GameState) {
        self.pending = None;
        self.fired.clear();
    }

    fn get_available_actions(&self, _state: &GameState) -> Vec<ActionKind> {
        if self.pending.is_some() {
            vec![ActionKind::RollSaves, ActionKind::AbandonAttack]
        } else {
            vec![ActionKind::Shoot, ActionKind::EndPhase]
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
            ActionPayload::Shoot {
                unit,
                weapon,
                target,
            } => self.validate_shoot(state, action, unit, weapon, target),
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
            ActionPayload::Shoot {
                unit,
                weapon,
                target,
            } => {
                let attacker = state.unit(unit)?;
                let profile = attacker.weapon(weapon)?;
                let defender = state.unit(target)?;

                let pause = resolve_attacks_until_wounds(dice, attacker, profile, defender)?;
                self.fired.insert(unit.clone());

                let mut records = pause.records;
                if pause.wounds == 0 {
                    // Nothing got through; no handoff.
                    return Ok(ActionResult::ok(Vec::new(), records));
                }
                if profile.mortal {
                    // Mortal damage bypasses saves entirely.
                    let (diffs, damage_records) =
                        apply_save_damage(dice, defender, pause.wounds, profile.damage)?;
                    records.extend(damage_records);
                    return Ok(ActionResult::ok(diffs, records));
                }

                self.pending = Some(PendingAttack {
                    attacker: unit.clone(),
                    weapon: weapon.clone(),
                    target: target.clone(),
                    wounds: pause.wounds,
                });
                Ok(ActionResult::ok(Vec::new(), records))
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
