//! Structured dice roll records.
//!
//! Every draw from the dice service is returned as a [`RollRecord`]:
//! raw faces, post-modifier values, reroll annotations, and pass/fail
//! counts. Consumers (UI, replay, logs) read these records; they never
//! re-derive randomness.
//!
//! Rerolls draw *additional* dice from the same forward-only stream and
//! replace the original face in place, keeping the record's index stable.
//! A die is rerolled at most once.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::core::rng::DiceSource;
use crate::error::EngineResult;

/// Which rolls may be rerolled. `Ones` and `AllFailed` are mutually
/// exclusive by construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RerollPolicy {
    #[default]
    None,
    /// Reroll natural 1s.
    Ones,
    /// Reroll every failed roll.
    AllFailed,
}

/// What a batch of dice was rolled for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RollPurpose {
    Hit,
    Wound,
    Save,
    Damage,
    Advance,
    Charge,
    Morale,
}

/// One die replaced by a reroll: which index, and the face it showed
/// before the reroll.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RerollNote {
    pub index: usize,
    pub original: u8,
}

/// A recorded batch of rolls against a target value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RollRecord {
    pub purpose: RollPurpose,
    /// Required value to pass. 7 or more means automatic failure.
    pub target: u8,
    /// Flat modifier applied to each raw face.
    pub modifier: i8,
    /// Final faces, post-reroll, pre-modifier, in draw order.
    pub raw: SmallVec<[u8; 12]>,
    /// Faces plus modifier, index-aligned with `raw`.
    pub modified: SmallVec<[i8; 12]>,
    /// Which dice were rerolled, and what they showed originally.
    pub rerolls: Vec<RerollNote>,
    pub passes: u32,
    pub fails: u32,
}

impl RollRecord {
    /// A record of automatic successes with no dice behind them
    /// (auto-hit weapons).
    #[must_use]
    pub fn auto_passes(purpose: RollPurpose, count: u32) -> Self {
        Self {
            purpose,
            target: 0,
            modifier: 0,
            raw: SmallVec::new(),
            modified: SmallVec::new(),
            rerolls: Vec::new(),
            passes: count,
            fails: 0,
        }
    }

    /// A record of raw values with no pass/fail semantics (advance,
    /// charge, damage, morale dice).
    #[must_use]
    pub fn values(purpose: RollPurpose, raw: &[u8]) -> Self {
        Self {
            purpose,
            target: 0,
            modifier: 0,
            raw: SmallVec::from_slice(raw),
            modified: raw.iter().map(|&r| r as i8).collect(),
            rerolls: Vec::new(),
            passes: 0,
            fails: 0,
        }
    }

    /// Sum of the final faces.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.raw.iter().map(|&r| r as u32).sum()
    }
}

fn passes(raw: u8, modifier: i8, target: u8) -> bool {
    if target >= 7 {
        return false;
    }
    raw as i8 + modifier >= target as i8
}

/// Roll `count` dice against `target`, applying a flat modifier and a
/// reroll policy, and return the structured record.
///
/// Rerolled dice consume additional draws from `dice` in index order.
pub fn roll_against(
    dice: &mut dyn DiceSource,
    purpose: RollPurpose,
    count: u32,
    target: u8,
    modifier: i8,
    reroll: RerollPolicy,
) -> EngineResult<RollRecord> {
    let mut raw: SmallVec<[u8; 12]> = SmallVec::from_vec(dice.roll_d6(count as usize)?);

    let reroll_indices: Vec<usize> = raw
        .iter()
        .enumerate()
        .filter(|(_, &face)| match reroll {
            RerollPolicy::None => false,
            RerollPolicy::Ones => face == 1,
            RerollPolicy::AllFailed => !passes(face, modifier, target),
        })
        .map(|(i, _)| i)
        .collect();

    let mut rerolls = Vec::with_capacity(reroll_indices.len());
    if !reroll_indices.is_empty() {
        let fresh = dice.roll_d6(reroll_indices.len())?;
        for (&index, &face) in reroll_indices.iter().zip(fresh.iter()) {
            rerolls.push(RerollNote {
                index,
                original: raw[index],
            });
            raw[index] = face;
        }
    }

    let modified: SmallVec<[i8; 12]> = raw.iter().map(|&r| r as i8 + modifier).collect();
    let pass_count = raw
        .iter()
        .filter(|&&face| passes(face, modifier, target))
        .count() as u32;

    Ok(RollRecord {
        purpose,
        target,
        modifier,
        raw,
        modified,
        rerolls,
        passes: pass_count,
        fails: count - pass_count,
    })
}
