//! Core building blocks: players, geometry, dice, action envelopes.

pub mod action;
pub mod geometry;
pub mod player;
pub mod rng;

pub use action::{Action, ActionKind, ActionPayload, ActionResult};
pub use geometry::{
    in_coherency, Pos, Rect, CHARGE_DECLARE_RANGE, COHERENCY_RANGE, ENGAGEMENT_RANGE,
    OBJECTIVE_RANGE,
};
pub use player::{PlayerId, PlayerMap};
pub use rng::{DiceRng, DiceRngState, DiceSource, ScriptedDice};
