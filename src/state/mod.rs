//! Canonical game data: units, board, state container, mutation records.

pub mod board;
pub mod diff;
pub mod game_state;
pub mod unit;

pub use board::{Board, DeploymentZone, Objective, TerrainPiece};
pub use diff::Diff;
pub use game_state::{GameState, Meta, PhaseKind, PlayerState};
pub use unit::{
    Damage, Model, StatBlock, TurnFlag, TurnFlags, Unit, UnitId, UnitStatus, Weapon, WeaponKind,
    WeaponStrength,
};
