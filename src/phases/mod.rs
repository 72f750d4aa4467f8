//! Phase state machines.
//!
//! Each gameplay phase is its own type implementing [`Phase`]:
//! enter/exit hooks, legality discovery, validation, and execution.
//! [`ActivePhase`] is the enum-keyed dispatch over the eight concrete
//! phases, with no inheritance hierarchy behind it. [`PhaseManager`]
//! owns the active instance and the fixed phase cycle.
//!
//! Execution computes diffs and dice records but does not apply them;
//! the routing layer applies every diff through the one shared path, so
//! the host and every replica mutate state identically.

pub mod charge;
pub mod command;
pub mod deployment;
pub mod fight;
pub mod manager;
pub mod morale;
pub mod movement;
pub mod pending;
pub mod scoring;
pub mod shooting;

use serde::{Deserialize, Serialize};

use crate::core::action::{Action, ActionKind, ActionResult};
use crate::core::rng::DiceSource;
use crate::error::{EngineError, EngineResult};
use crate::state::game_state::{GameState, PhaseKind};
use crate::state::unit::{Unit, UnitId, UnitStatus};

pub use charge::ChargePhase;
pub use command::CommandPhase;
pub use deployment::DeploymentPhase;
pub use fight::FightPhase;
pub use manager::PhaseManager;
pub use morale::MoralePhase;
pub use movement::{MovementPhase, PendingAdvance};
pub use pending::PendingAttack;
pub use scoring::ScoringPhase;
pub use shooting::ShootingPhase;

/// Tolerance for movement distance comparisons.
pub(crate) const DIST_EPSILON: f32 = 1e-3;

/// Shared capability contract for all eight phases.
///
/// `validate_action` never draws dice and never mutates anything; it
/// must fully pass before `execute_action` runs. `execute_action`
/// re-validates, so the guarantee holds for every caller.
pub trait Phase {
    /// Which phase this is.
    fn kind(&self) -> PhaseKind;

    /// Capture phase-local state from the snapshot on entry.
    fn enter_phase(&mut self, _state: &GameState) {}

    /// Tear down phase-local state on exit.
    fn exit_phase(&mut self, _state: &GameState) {}

    /// The authoritative list of legal action kinds for the current
    /// actor. The only sanctioned legality source for any consumer.
    fn get_available_actions(&self, state: &GameState) -> Vec<ActionKind>;

    /// Check an action against turn ownership, unit eligibility, and
    /// spatial constraints. Draws nothing, mutates nothing.
    fn validate_action(&self, state: &GameState, action: &Action) -> EngineResult<()>;

    /// Execute a validated action: compute diffs and dice records.
    /// Never partially applies anything.
    fn execute_action(
        &mut self,
        state: &GameState,
        action: &Action,
        dice: &mut dyn DiceSource,
    ) -> EngineResult<ActionResult>;

    /// Whether the phase has finished and the manager should advance.
    fn is_complete(&self, state: &GameState) -> bool;
}

/// The active phase instance: enum-keyed dispatch over the eight
/// concrete phase types. Serializable so in-flight pending state
/// survives a save/load cycle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ActivePhase {
    Command(CommandPhase),
    Deployment(DeploymentPhase),
    Movement(MovementPhase),
    Shooting(ShootingPhase),
    Charge(ChargePhase),
    Fight(FightPhase),
    Morale(MoralePhase),
    Scoring(ScoringPhase),
}

impl ActivePhase {
    /// A fresh phase instance for the given kind.
    #[must_use]
    pub fn for_kind(kind: PhaseKind) -> Self {
        match kind {
            PhaseKind::Command => ActivePhase::Command(CommandPhase::default()),
            PhaseKind::Deployment => ActivePhase::Deployment(DeploymentPhase::default()),
            PhaseKind::Movement => ActivePhase::Movement(MovementPhase::default()),
            PhaseKind::Shooting => ActivePhase::Shooting(ShootingPhase::default()),
            PhaseKind::Charge => ActivePhase::Charge(ChargePhase::default()),
            PhaseKind::Fight => ActivePhase::Fight(FightPhase::default()),
            PhaseKind::Morale => ActivePhase::Morale(MoralePhase::default()),
            PhaseKind::Scoring => ActivePhase::Scoring(ScoringPhase::default()),
        }
    }

    /// Borrow the phase behind the trait.
    #[must_use]
    pub fn as_phase(&self) -> &dyn Phase {
        match self {
            ActivePhase::Command(p) => p,
            ActivePhase::Deployment(p) => p,
            ActivePhase::Movement(p) => p,
            ActivePhase::Shooting(p) => p,
            ActivePhase::Charge(p) => p,
            ActivePhase::Fight(p) => p,
            ActivePhase::Morale(p) => p,
            ActivePhase::Scoring(p) => p,
        }
    }

    /// Mutably borrow the phase behind the trait.
    pub fn as_phase_mut(&mut self) -> &mut dyn Phase {
        match self {
            ActivePhase::Command(p) => p,
            ActivePhase::Deployment(p) => p,
            ActivePhase::Movement(p) => p,
            ActivePhase::Shooting(p) => p,
            ActivePhase::Charge(p) => p,
            ActivePhase::Fight(p) => p,
            ActivePhase::Morale(p) => p,
            ActivePhase::Scoring(p) => p,
        }
    }
}

// === Shared validation helpers ===

/// The submitting player must be the active player.
pub(crate) fn ensure_active_player(state: &GameState, action: &Action) -> EngineResult<()> {
    if action.player != state.meta.active_player {
        return Err(EngineError::Validation(format!(
            "{} is not the active player",
            action.player
        )));
    }
    Ok(())
}

/// Look up a unit that must be owned by the submitter and deployed with
/// at least one alive model.
pub(crate) fn owned_deployed_unit<'a>(
    state: &'a GameState,
    action: &Action,
    id: &UnitId,
) -> EngineResult<&'a Unit> {
    let unit = state.unit(id)?;
    if unit.owner != action.player {
        return Err(EngineError::Validation(format!(
            "unit '{}' is not owned by {}",
            id, action.player
        )));
    }
    if unit.status != UnitStatus::Deployed {
        return Err(EngineError::Validation(format!(
            "unit '{}' is not deployed",
            id
        )));
    }
    if unit.alive_count() == 0 {
        return Err(EngineError::Validation(format!(
            "unit '{}' has no models left",
            id
        )));
    }
    Ok(unit)
}

/// Look up an enemy target that must be deployed with alive models.
pub(crate) fn enemy_target<'a>(
    state: &'a GameState,
    attacker: &Unit,
    id: &UnitId,
) -> EngineResult<&'a Unit> {
    let target = state.unit(id)?;
    if target.owner == attacker.owner {
        return Err(EngineError::RuleViolation(format!(
            "cannot target friendly unit '{}'",
            id
        )));
    }
    if target.status != UnitStatus::Deployed || target.alive_count() == 0 {
        return Err(EngineError::Validation(format!(
            "target '{}' is not on the battlefield",
            id
        )));
    }
    Ok(target)
}

/// Standard rejection for an action kind the phase does not accept.
pub(crate) fn wrong_phase(kind: ActionKind, phase: PhaseKind) -> EngineError {
    EngineError::Validation(format!("{:?} is not legal in the {} phase", kind, phase))
}
