//! # rust-wargame
//!
//! A deterministic rules engine for a two-player turn-based tabletop
//! wargame.
//!
//! ## Design Principles
//!
//! 1. **Deterministic**: one seeded, forward-only dice stream per
//!    session. Replaying the ordered action log against the same seed
//!    reproduces bit-identical dice and diffs.
//!
//! 2. **Diff-Based Mutation**: phases compute atomic [`Diff`] records;
//!    the router applies them all-or-nothing. Diffs, never raw input,
//!    are what replicas receive.
//!
//! 3. **Single Mutation Path**: every action, host-originated or remote,
//!    goes through [`ActionRouter::submit`]: validate (no dice), then
//!    execute, then apply. There is no host-only shortcut.
//!
//! 4. **Explicit State**: no globals. `GameState` is threaded into every
//!    phase call, so independent simulations never cross-talk.
//!
//! ## Modules
//!
//! - `core`: Player ids, dice service, action envelopes, geometry
//! - `state`: Game state, units, board, diffs
//! - `rules`: Stateless combat math and roll records
//! - `phases`: The eight phase state machines and their manager
//! - `router`: Host-authoritative routing, replicas, replay
//! - `scenario`: Ready-made battles for tests and demos
//! - `error`: Engine-wide error taxonomy

pub mod core;
pub mod error;
pub mod phases;
pub mod router;
pub mod rules;
pub mod scenario;
pub mod state;

// Re-export commonly used types
pub use crate::core::{
    Action, ActionKind, ActionPayload, ActionResult, DiceRng, DiceRngState, DiceSource, PlayerId,
    PlayerMap, Pos, Rect, ScriptedDice,
};

pub use crate::error::{EngineError, EngineResult};

pub use crate::phases::{ActivePhase, Phase, PhaseManager};

pub use crate::router::{ActionRouter, Replica};

pub use crate::rules::{RerollPolicy, RollPurpose, RollRecord};

pub use crate::state::{
    Board, Damage, Diff, GameState, Meta, Model, PhaseKind, StatBlock, Unit, UnitId, UnitStatus,
    Weapon, WeaponKind, WeaponStrength,
};
