//! Phase sequencing.
//!
//! The cycle is fixed: Command → Deployment (first battle round only,
//! until both players finish) → Movement → Shooting → Charge → Fight →
//! Morale → Scoring → the other player's Command. The battle round
//! increments when the turn wraps back to the first player.
//!
//! Turn bookkeeping (flag resets, the command point grant) is emitted
//! as diffs alongside the phase transition, so replicas replay the same
//! mutations the host applied.

use log::debug;
use serde::{Deserialize, Serialize};

use super::{ActivePhase, Phase};
use crate::core::player::PlayerId;
use crate::error::EngineResult;
use crate::state::diff::Diff;
use crate::state::game_state::{GameState, Meta, PhaseKind};

/// Owns the active phase instance and drives the fixed cycle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhaseManager {
    active: ActivePhase,
}

impl PhaseManager {
    /// A manager synchronized to the state's current phase.
    #[must_use]
    pub fn new(state: &GameState) -> Self {
        let mut active = ActivePhase::for_kind(state.meta.phase);
        active.as_phase_mut().enter_phase(state);
        Self { active }
    }

    /// The active phase instance, for routing.
    #[must_use]
    pub fn current(&self) -> &dyn Phase {
        self.active.as_phase()
    }

    /// The active phase instance, mutably.
    pub fn current_mut(&mut self) -> &mut dyn Phase {
        self.active.as_phase_mut()
    }

    /// Diffs for the start of `player`'s turn: per-turn flags reset and
    /// the command point grant.
    #[must_use]
    pub fn turn_start_diffs(player: PlayerId) -> Vec<Diff> {
        vec![
            Diff::ResetTurnState { player },
            Diff::CommandPoints { player, delta: 1 },
        ]
    }

    /// The meta that follows `meta` in the fixed cycle.
    #[must_use]
    pub fn next_meta(meta: &Meta) -> Meta {
        let mut next = *meta;
        next.phase = match meta.phase {
            PhaseKind::Command => {
                if meta.deployment_complete {
                    PhaseKind::Movement
                } else {
                    PhaseKind::Deployment
                }
            }
            PhaseKind::Deployment => {
                next.deployment_complete = true;
                PhaseKind::Movement
            }
            PhaseKind::Movement => PhaseKind::Shooting,
            PhaseKind::Shooting => PhaseKind::Charge,
            PhaseKind::Charge => PhaseKind::Fight,
            PhaseKind::Fight => PhaseKind::Morale,
            PhaseKind::Morale => PhaseKind::Scoring,
            PhaseKind::Scoring => {
                next.active_player = meta.active_player.opponent();
                next.turn_number = meta.turn_number + 1;
                if next.active_player == PlayerId::new(0) {
                    next.battle_round = meta.battle_round + 1;
                }
                PhaseKind::Command
            }
        };
        next
    }

    /// Advance past every completed phase, applying transition diffs as
    /// we go, and return the diffs so the caller can broadcast them.
    ///
    /// Loops because a phase may be complete the moment it is entered
    /// (deployment when neither player has anything left to place).
    pub fn advance_completed(&mut self, state: &mut GameState) -> EngineResult<Vec<Diff>> {
        let mut emitted = Vec::new();

        while self.current().is_complete(state) {
            let next = Self::next_meta(&state.meta);
            debug!(
                "phase transition: {} -> {} (round {}, {})",
                state.meta.phase, next.phase, next.battle_round, next.active_player
            );

            let mut diffs = vec![Diff::PhaseTransition { meta: next }];
            if next.phase == PhaseKind::Command {
                diffs.extend(Self::turn_start_diffs(next.active_player));
            }
            state.apply_diffs(&diffs)?;

            self.current_mut().exit_phase(state);
            self.active = ActivePhase::for_kind(next.phase);
            self.current_mut().enter_phase(state);

            emitted.extend(diffs);
        }

        Ok(emitted)
    }
}
