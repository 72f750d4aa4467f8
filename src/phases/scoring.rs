//! Scoring phase: objective control tallied at the end of a player turn.
//!
//! Each objective awards one victory point to the player whose alive
//! models within its radius sum to strictly more objective control.
//! Ties score nothing. The award diffs are emitted when the active
//! player ends the phase, so scoring replicates like everything else.

use serde::{Deserialize, Serialize};

use super::{ensure_active_player, wrong_phase, Phase};
use crate::core::action::{Action, ActionKind, ActionPayload, ActionResult};
use crate::core::player::PlayerId;
use crate::core::rng::DiceSource;
use crate::error::EngineResult;
use crate::state::board::Objective;
use crate::state::diff::Diff;
use crate::state::game_state::{GameState, PhaseKind};
use crate::state::unit::UnitStatus;

/// The scoring phase.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringPhase {
    done: bool,
}

impl ScoringPhase {
    /// Summed objective control a player projects onto one marker.
    fn control(state: &GameState, player: PlayerId, objective: &Objective) -> u32 {
        state
            .units_of(player)
            .filter(|u| u.status == UnitStatus::Deployed)
            .map(|u| {
                let holding = u
                    .alive_positions()
                    .iter()
                    .filter(|&&p| p.distance_to(objective.pos) <= objective.radius)
                    .count() as u32;
                holding * u.stats.objective_control
            })
            .sum()
    }

    /// One VP per objective to whichever player controls it outright.
    fn score_diffs(state: &GameState) -> Vec<Diff> {
        let mut diffs = Vec::new();
        for objective in &state.board.objectives {
            let ours = Self::control(state, PlayerId::new(0), objective);
            let theirs = Self::control(state, PlayerId::new(1), objective);
            let winner = match ours.cmp(&theirs) {
                std::cmp::Ordering::Greater => PlayerId::new(0),
                std::cmp::Ordering::Less => PlayerId::new(1),
                std::cmp::Ordering::Equal => continue,
            };
            diffs.push(Diff::VictoryPoints {
                player: winner,
                delta: 1,
            });
        }
        diffs
    }
}

impl Phase for ScoringPhase {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Scoring
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
        Ok(ActionResult::ok(Self::score_diffs(state), Vec::new()))
    }

    fn is_complete(&self, _state: &GameState) -> bool {
        self.done
    }
}
