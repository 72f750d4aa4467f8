//! Deployment phase: alternating unit placement, gated on both players.
//!
//! Players take turns placing undeployed units inside their own
//! deployment zones. The phase only completes when both players have
//! signalled completion (or run out of units to place), making this the
//! one gating transition in the cycle.

use serde::{Deserialize, Serialize};

use super::{wrong_phase, Phase};
use crate::core::action::{Action, ActionKind, ActionPayload, ActionResult};
use crate::core::geometry::{in_coherency, Pos};
use crate::core::player::{PlayerId, PlayerMap};
use crate::core::rng::DiceSource;
use crate::error::{EngineError, EngineResult};
use crate::state::diff::Diff;
use crate::state::game_state::{GameState, PhaseKind};
use crate::state::unit::{UnitId, UnitStatus};

/// The deployment phase.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeploymentPhase {
    /// Players that have finished deploying.
    done: PlayerMap<bool>,
    /// Whose placement it is.
    next: PlayerId,
}

impl Default for DeploymentPhase {
    fn default() -> Self {
        Self {
            done: PlayerMap::with_value(false),
            next: PlayerId::new(0),
        }
    }
}

impl DeploymentPhase {
    fn undeployed_count(state: &GameState, player: PlayerId) -> usize {
        state
            .units_of(player)
            .filter(|u| u.status == UnitStatus::Undeployed)
            .count()
    }

    /// Hand placement to the other player if they still have work to do.
    fn advance_turn(&mut self, state: &GameState, just_placed: PlayerId) {
        let opponent = just_placed.opponent();
        if !self.done[opponent] && Self::undeployed_count(state, opponent) > 0 {
            self.next = opponent;
        }
    }

    fn validate_deploy(
        &self,
        state: &GameState,
        action: &Action,
        unit_id: &UnitId,
        positions: &[Pos],
    ) -> EngineResult<()> {
        if action.player != self.next {
            return Err(EngineError::Validation(format!(
                "it is not {}'s placement",
                action.player
            )));
        }
        if self.done[action.player] {
            return Err(EngineError::Validation(format!(
                "{} has finished deploying",
                action.player
            )));
        }

        let unit = state.unit(unit_id)?;
        if unit.owner != action.player {
            return Err(EngineError::Validation(format!(
                "unit '{}' is not owned by {}",
                unit_id, action.player
            )));
        }
        if unit.status != UnitStatus::Undeployed {
            return Err(EngineError::Validation(format!(
                "unit '{}' is already deployed",
                unit_id
            )));
        }
        if positions.len() != unit.models.len() {
            return Err(EngineError::Validation(format!(
                "unit '{}' needs {} positions, got {}",
                unit_id,
                unit.models.len(),
                positions.len()
            )));
        }

        for &pos in positions {
            if !state.board.contains(pos) {
                return Err(EngineError::RuleViolation(format!(
                    "position {} is off the board",
                    pos
                )));
            }
            if !state.board.in_deployment_zone(action.player, pos) {
                return Err(EngineError::RuleViolation(format!(
                    "position {} is outside {}'s deployment zone",
                    pos, action.player
                )));
            }
            if state.board.position_blocked(pos) {
                return Err(EngineError::RuleViolation(format!(
                    "position {} is inside blocking terrain",
                    pos
                )));
            }
        }
        if !in_coherency(positions) {
            return Err(EngineError::RuleViolation(format!(
                "unit '{}' would break coherency",
                unit_id
            )));
        }
        Ok(())
    }
}

impl Phase for DeploymentPhase {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Deployment
    }

    fn enter_phase(&mut self, state: &GameState) {
        self.next = state.meta.active_player;
        // A player with nothing to place is done from the start.
        for player in PlayerId::both() {
            if Self::undeployed_count(state, player) == 0 {
                self.done[player] = true;
            }
        }
        if self.done[self.next] {
            self.next = self.next.opponent();
        }
    }

    fn get_available_actions(&self, _state: &GameState) -> Vec<ActionKind> {
        if self.done.iter().all(|(_, &d)| d) {
            Vec::new()
        } else {
            vec![ActionKind::Deploy, ActionKind::EndDeployment]
        }
    }

    fn validate_action(&self, state: &GameState, action: &Action) -> EngineResult<()> {
        match &action.payload {
            ActionPayload::Deploy { unit, positions } => {
                self.validate_deploy(state, action, unit, positions)
            }
            ActionPayload::EndDeployment => {
                if self.done[action.player] {
                    return Err(EngineError::Validation(format!(
                        "{} has already finished deploying",
                        action.player
                    )));
                }
                Ok(())
            }
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

        match &action.payload {
            ActionPayload::Deploy { unit, positions } => {
                let mut diffs = vec![Diff::UnitStatus {
                    unit: unit.clone(),
                    status: UnitStatus::Deployed,
                }];
                for (model, &pos) in positions.iter().enumerate() {
                    diffs.push(Diff::ModelPosition {
                        unit: unit.clone(),
                        model,
                        pos,
                    });
                }

                // This was the player's last unit: they are finished.
                if Self::undeployed_count(state, action.player) == 1 {
                    self.done[action.player] = true;
                }
                self.advance_turn(state, action.player);

                Ok(ActionResult::ok(diffs, Vec::new()))
            }
            ActionPayload::EndDeployment => {
                self.done[action.player] = true;
                self.advance_turn(state, action.player);
                Ok(ActionResult::ok(Vec::new(), Vec::new()))
            }
            other => Err(wrong_phase(other.kind(), self.kind())),
        }
    }

    fn is_complete(&self, _state: &GameState) -> bool {
        self.done.iter().all(|(_, &d)| d)
    }
}
