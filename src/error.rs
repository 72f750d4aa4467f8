//! Engine-wide error taxonomy.
//!
//! Errors are split by who caused them and who must react:
//!
//! - `Validation`: the action is illegal in the current state. Reported to
//!   the submitter only; nothing is mutated and no dice are drawn.
//! - `RuleViolation`: the action is well-formed but its payload breaks a
//!   game rule (coherency, range, terrain). Same handling as `Validation`,
//!   with a rule-specific message.
//! - `ResourceNotFound`: a referenced unit/weapon/model id does not exist.
//!   Fails the single action without destabilizing the phase.
//! - `NetworkDesync`: a participant's replica diverged from the host. The
//!   engine detects this; reconciliation is an external responsibility.
//! - `DiceExhausted`: a scripted dice source ran out of rolls mid-replay.

use thiserror::Error;

/// Result alias used throughout the engine.
pub type EngineResult<T> = Result<T, EngineError>;

/// All errors the engine core can produce.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Action illegal given the current state.
    #[error("invalid action: {0}")]
    Validation(String),

    /// Well-formed action whose payload breaks a game rule.
    #[error("rule violation: {0}")]
    RuleViolation(String),

    /// A referenced unit, weapon, or model does not exist.
    #[error("unknown resource: {0}")]
    ResourceNotFound(String),

    /// Host and participant state diverged. Detection only.
    #[error("state divergence: {0}")]
    NetworkDesync(String),

    /// A scripted dice source had fewer rolls than requested.
    #[error("scripted dice exhausted: needed {needed}, had {available}")]
    DiceExhausted { needed: usize, available: usize },
}

impl EngineError {
    /// True for errors that reject an action before execution.
    ///
    /// These never mutate state and never consume dice.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            EngineError::Validation(_)
                | EngineError::RuleViolation(_)
                | EngineError::ResourceNotFound(_)
        )
    }
}
