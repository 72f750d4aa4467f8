//! Stateless combat algorithms and structured roll records.

pub mod combat;
pub mod rolls;

pub use combat::{
    apply_save_damage, auto_allocate_wounds, damage_rolls, remove_fleeing_models,
    resolve_attacks_until_wounds, roll_hits, roll_saves_batch, roll_wounds, save_target,
    wound_target, AttackPause,
};
pub use rolls::{roll_against, RerollNote, RerollPolicy, RollPurpose, RollRecord};
