//! Pending attack resolution shared by the shooting and fight phases.
//!
//! An attack halts after hit and wound rolls; the defender then resolves
//! saves and takes the damage. While a resolution is pending, only the
//! continue (`RollSaves`) and abandon (`AbandonAttack`) actions are
//! legal. The pending record is phase-local, serializable state, so a
//! saved game resumes mid-resolution.

use serde::{Deserialize, Serialize};

use crate::core::action::{Action, ActionResult};
use crate::core::rng::DiceSource;
use crate::error::{EngineError, EngineResult};
use crate::rules::combat::{apply_save_damage, roll_saves_batch};
use crate::state::game_state::GameState;
use crate::state::unit::UnitId;

/// A halted attack awaiting the defender's saves.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingAttack {
    pub attacker: UnitId,
    pub weapon: String,
    pub target: UnitId,
    /// Wounds awaiting saves.
    pub wounds: u32,
}

impl PendingAttack {
    /// The defender must submit `RollSaves`. This is the narrow
    /// exception to active-player ownership: the defending player acts
    /// during the attacker's turn.
    pub fn validate_roll_saves(&self, state: &GameState, action: &Action) -> EngineResult<()> {
        let target = state.unit(&self.target)?;
        if action.player != target.owner {
            return Err(EngineError::Validation(format!(
                "saves for '{}' belong to {}",
                self.target, target.owner
            )));
        }
        Ok(())
    }

    /// Only the attacking (active) player may abandon the resolution.
    pub fn validate_abandon(&self, state: &GameState, action: &Action) -> EngineResult<()> {
        let attacker = state.unit(&self.attacker)?;
        if action.player != attacker.owner {
            return Err(EngineError::Validation(format!(
                "only {} may abandon the attack",
                attacker.owner
            )));
        }
        Ok(())
    }

    /// Resolve saves and allocate the damage that gets through.
    pub fn execute_roll_saves(
        &self,
        state: &GameState,
        dice: &mut dyn DiceSource,
    ) -> EngineResult<ActionResult> {
        let attacker = state.unit(&self.attacker)?;
        let weapon = attacker.weapon(&self.weapon)?;
        let target = state.unit(&self.target)?;

        let saves = roll_saves_batch(
            dice,
            self.wounds,
            target.stats.save,
            weapon.ap,
            target.stats.invuln,
        )?;
        let (diffs, damage_records) =
            apply_save_damage(dice, target, saves.fails, weapon.damage)?;

        let mut records = vec![saves];
        records.extend(damage_records);
        Ok(ActionResult::ok(diffs, records))
    }
}
