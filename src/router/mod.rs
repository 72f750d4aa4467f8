//! Host-authoritative action routing.
//!
//! Every mutation, local or remote, enters through
//! [`ActionRouter::submit`]: validate against the active phase (no dice
//! drawn), execute (diffs + dice records computed), apply the diffs,
//! advance the phase cycle, append to the action log. The host
//! broadcasts the returned [`ActionResult`], never the raw input, and
//! a [`Replica`] converges by applying those diffs in order.
//!
//! Replaying the logged actions against the original seed rebuilds
//! bit-identical state, because the dice stream is forward-only and
//! actions are processed strictly one at a time.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::core::action::{Action, ActionResult};
use crate::core::rng::{DiceRng, DiceRngState};
use crate::error::{EngineError, EngineResult};
use crate::phases::PhaseManager;
use crate::state::game_state::GameState;

/// The single entry point for all game mutations on the host.
#[derive(Clone, Debug)]
pub struct ActionRouter {
    state: GameState,
    manager: PhaseManager,
    dice: DiceRng,
    log: Vec<Action>,
}

impl ActionRouter {
    /// Start a session from an initial snapshot and a session seed.
    ///
    /// Applies the opening turn's bookkeeping diffs (flag reset and
    /// command point grant for the first active player), so replicas
    /// constructed from the same snapshot start identical.
    pub fn new(mut state: GameState, seed: u64) -> EngineResult<Self> {
        state.apply_diffs(&PhaseManager::turn_start_diffs(state.meta.active_player))?;
        let manager = PhaseManager::new(&state);
        Ok(Self {
            state,
            manager,
            dice: DiceRng::new(seed),
            log: Vec::new(),
        })
    }

    /// Resume a persisted session: snapshot, phase instance (including
    /// any in-flight pending resolution), dice stream position, and the
    /// accepted-action log.
    #[must_use]
    pub fn resume(
        state: GameState,
        manager: PhaseManager,
        dice: &DiceRngState,
        log: Vec<Action>,
    ) -> Self {
        Self {
            state,
            manager,
            dice: DiceRng::from_state(dice),
            log,
        }
    }

    /// The authoritative state.
    #[must_use]
    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// The phase manager, for legality discovery.
    #[must_use]
    pub fn manager(&self) -> &PhaseManager {
        &self.manager
    }

    /// The accepted-action log, in application order.
    #[must_use]
    pub fn log(&self) -> &[Action] {
        &self.log
    }

    /// Dice stream state, for persistence.
    #[must_use]
    pub fn dice_state(&self) -> DiceRngState {
        self.dice.state()
    }

    /// Validate, execute, apply, and log one action.
    ///
    /// Rejections come back as an unsuccessful [`ActionResult`] with the
    /// error message: nothing was mutated and no dice were drawn, and
    /// only the submitter needs to hear about it. A successful result
    /// carries every diff the action caused, including any phase
    /// transition diffs, ready to broadcast.
    pub fn submit(&mut self, action: Action) -> EngineResult<ActionResult> {
        if let Err(err) = self.manager.current().validate_action(&self.state, &action) {
            if err.is_rejection() {
                debug!("rejected {:?} from {}: {}", action.kind(), action.player, err);
                return Ok(ActionResult::rejected(err.to_string()));
            }
            return Err(err);
        }

        let mut result =
            self.manager
                .current_mut()
                .execute_action(&self.state, &action, &mut self.dice)?;
        self.state.apply_diffs(&result.diffs)?;

        let transition_diffs = self.manager.advance_completed(&mut self.state)?;
        result.diffs.extend(transition_diffs);

        debug!(
            "applied {:?} from {}: {} diffs, {} rolls",
            action.kind(),
            action.player,
            result.diffs.len(),
            result.dice.len()
        );
        self.log.push(action);
        Ok(result)
    }

    /// Rebuild a session by replaying an action log against the seed.
    ///
    /// With the same initial snapshot, seed, and ordered log, the result
    /// is bit-identical to the session that produced the log.
    pub fn replay(initial: GameState, seed: u64, log: &[Action]) -> EngineResult<GameState> {
        let mut router = Self::new(initial, seed)?;
        for action in log {
            let result = router.submit(action.clone())?;
            if !result.success {
                return Err(EngineError::NetworkDesync(format!(
                    "logged action {:?} rejected during replay",
                    action.kind()
                )));
            }
        }
        Ok(router.state)
    }
}

/// A non-host participant's view of the session.
///
/// Converges by applying broadcast diffs in order; it never executes
/// actions and never draws dice.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Replica {
    state: GameState,
}

impl Replica {
    /// Join from the same initial snapshot the host started with.
    pub fn new(mut state: GameState) -> EngineResult<Self> {
        state.apply_diffs(&PhaseManager::turn_start_diffs(state.meta.active_player))?;
        Ok(Self { state })
    }

    /// The replicated state.
    #[must_use]
    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Apply one broadcast result. Rejected results carry no diffs and
    /// are skipped.
    pub fn apply(&mut self, result: &ActionResult) -> EngineResult<()> {
        if !result.success {
            return Ok(());
        }
        self.state.apply_diffs(&result.diffs)
    }

    /// Compare against the host's authoritative state.
    ///
    /// Divergence is detected, not healed; reconciliation belongs to the
    /// network layer.
    pub fn verify(&self, host: &GameState) -> EngineResult<()> {
        if &self.state != host {
            return Err(EngineError::NetworkDesync(
                "replica state differs from host".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::action::ActionPayload;
    use crate::core::player::PlayerId;
    use crate::state::board::Board;
    use crate::state::game_state::PhaseKind;
    use crate::state::unit::UnitId;

    fn empty_state() -> GameState {
        GameState::new(Board::new(44.0, 30.0))
    }

    fn end_phase(player: u8) -> Action {
        Action::new(PlayerId::new(player), 0.0, ActionPayload::EndPhase)
    }

    #[test]
    fn test_opening_command_point_grant() {
        let router = ActionRouter::new(empty_state(), 1).unwrap();
        assert_eq!(router.state().players[PlayerId::new(0)].command_points, 1);
        assert_eq!(router.state().players[PlayerId::new(1)].command_points, 0);
    }

    #[test]
    fn test_rejection_draws_no_dice_and_changes_nothing() {
        let mut router = ActionRouter::new(empty_state(), 1).unwrap();
        let before_state = router.state().clone();
        let before_dice = router.dice_state();

        // Shooting during the command phase.
        let action = Action::new(
            PlayerId::new(0),
            0.0,
            ActionPayload::Shoot {
                unit: UnitId::new("a1"),
                weapon: "rifle".into(),
                target: UnitId::new("b1"),
            },
        );
        let result = router.submit(action).unwrap();

        assert!(!result.success);
        assert!(result.diffs.is_empty());
        assert!(result.dice.is_empty());
        assert_eq!(router.state(), &before_state);
        assert_eq!(router.dice_state(), before_dice);
        assert!(router.log().is_empty());
    }

    #[test]
    fn test_phase_transition_diffs_broadcast() {
        let mut router = ActionRouter::new(empty_state(), 1).unwrap();

        let result = router.submit(end_phase(0)).unwrap();
        assert!(result.success);
        // No units: deployment auto-completes into movement.
        assert_eq!(router.state().meta.phase, PhaseKind::Movement);
        assert!(!result.diffs.is_empty());

        // A replica applying the same broadcast lands in the same phase.
        let mut replica = Replica::new(empty_state()).unwrap();
        replica.apply(&result).unwrap();
        replica.verify(router.state()).unwrap();
    }

    #[test]
    fn test_full_turn_cycle_hands_over() {
        let mut router = ActionRouter::new(empty_state(), 1).unwrap();

        // Command (into movement via empty deployment), then the six
        // remaining phases of player 0's turn.
        for _ in 0..7 {
            let result = router.submit(end_phase(0)).unwrap();
            assert!(result.success, "{:?}", result.errors);
        }

        assert_eq!(router.state().meta.phase, PhaseKind::Command);
        assert_eq!(router.state().meta.active_player, PlayerId::new(1));
        assert_eq!(router.state().meta.turn_number, 2);
        // The new active player got their grant and flag reset.
        assert_eq!(router.state().players[PlayerId::new(1)].command_points, 1);
    }

    #[test]
    fn test_replay_matches_original() {
        let mut router = ActionRouter::new(empty_state(), 99).unwrap();
        for _ in 0..7 {
            router.submit(end_phase(0)).unwrap();
        }
        for _ in 0..7 {
            router.submit(end_phase(1)).unwrap();
        }

        let replayed =
            ActionRouter::replay(empty_state(), 99, router.log()).unwrap();
        assert_eq!(&replayed, router.state());
        assert_eq!(
            serde_json::to_string(&replayed).unwrap(),
            serde_json::to_string(router.state()).unwrap()
        );
    }

    #[test]
    fn test_desync_detected() {
        let router = ActionRouter::new(empty_state(), 1).unwrap();
        let mut replica = Replica::new(empty_state()).unwrap();

        replica.verify(router.state()).unwrap();

        // Tamper with the replica.
        replica.state.players[PlayerId::new(1)].victory_points = 3;
        assert!(matches!(
            replica.verify(router.state()),
            Err(EngineError::NetworkDesync(_))
        ));
    }

    #[test]
    fn test_rejected_broadcast_is_a_no_op_on_replicas() {
        let mut replica = Replica::new(empty_state()).unwrap();
        let before = replica.state().clone();

        replica
            .apply(&ActionResult::rejected("not your turn"))
            .unwrap();
        assert_eq!(replica.state(), &before);
    }
}
