//! Deterministic dice service.
//!
//! ## Key guarantees
//!
//! - **Deterministic**: same seed produces an identical d6 sequence.
//! - **Forward-only**: one stream per session, never rewound or reseeded.
//!   Rerolls consume *additional* draws from the same stream.
//! - **Serializable**: O(1) state capture and restore via the ChaCha8 word
//!   position, so a saved game resumes mid-stream.
//!
//! Replaying an identical ordered action log against an identical seed
//! reproduces bit-identical dice and diffs; that is the whole basis of
//! lockstep multiplayer convergence here.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::error::{EngineError, EngineResult};

/// Source of d6 rolls.
///
/// The session RNG implements this, and so does [`ScriptedDice`], which
/// feeds predetermined rolls for replay display and tests. Rules code only
/// ever sees this trait, so recorded rolls are data, never regenerated.
pub trait DiceSource {
    /// Roll `count` six-sided dice, returning values 1-6 in draw order.
    fn roll_d6(&mut self, count: usize) -> EngineResult<Vec<u8>>;
}

/// Seeded session dice stream.
///
/// Uses ChaCha8 for speed while keeping high-quality randomness.
#[derive(Clone, Debug)]
pub struct DiceRng {
    inner: ChaCha8Rng,
    seed: u64,
}

impl DiceRng {
    /// Create a new dice stream with the given seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            inner: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }

    /// The seed this stream was created with.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Get the current state for serialization.
    #[must_use]
    pub fn state(&self) -> DiceRngState {
        DiceRngState {
            seed: self.seed,
            word_pos: self.inner.get_word_pos(),
        }
    }

    /// Restore from a saved state, resuming mid-stream.
    #[must_use]
    pub fn from_state(state: &DiceRngState) -> Self {
        let mut inner = ChaCha8Rng::seed_from_u64(state.seed);
        inner.set_word_pos(state.word_pos);
        Self {
            inner,
            seed: state.seed,
        }
    }
}

impl DiceSource for DiceRng {
    fn roll_d6(&mut self, count: usize) -> EngineResult<Vec<u8>> {
        Ok((0..count).map(|_| self.inner.gen_range(1..=6u8)).collect())
    }
}

/// Serializable dice stream state.
///
/// The ChaCha8 word position makes capture O(1) regardless of how many
/// dice have been rolled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceRngState {
    /// Original session seed.
    pub seed: u64,
    /// ChaCha8 word position (128-bit counter).
    pub word_pos: u128,
}

/// Dice source backed by a fixed queue of rolls.
///
/// Used to drive the rules with known dice in tests, and to re-present
/// recorded rolls without touching the live stream.
#[derive(Clone, Debug, Default)]
pub struct ScriptedDice {
    queue: VecDeque<u8>,
}

impl ScriptedDice {
    /// Create from a list of rolls, consumed front to back.
    #[must_use]
    pub fn from_rolls(rolls: &[u8]) -> Self {
        Self {
            queue: rolls.iter().copied().collect(),
        }
    }

    /// Number of rolls remaining.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

impl DiceSource for ScriptedDice {
    fn roll_d6(&mut self, count: usize) -> EngineResult<Vec<u8>> {
        if self.queue.len() < count {
            return Err(EngineError::DiceExhausted {
                needed: count,
                available: self.queue.len(),
            });
        }
        Ok(self.queue.drain(..count).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_determinism() {
        let mut rng1 = DiceRng::new(42);
        let mut rng2 = DiceRng::new(42);

        for _ in 0..50 {
            assert_eq!(rng1.roll_d6(5).unwrap(), rng2.roll_d6(5).unwrap());
        }
    }

    #[test]
    fn test_different_seeds() {
        let mut rng1 = DiceRng::new(1);
        let mut rng2 = DiceRng::new(2);

        let seq1: Vec<_> = rng1.roll_d6(20).unwrap();
        let seq2: Vec<_> = rng2.roll_d6(20).unwrap();

        assert_ne!(seq1, seq2);
    }

    #[test]
    fn test_rolls_in_range() {
        let mut rng = DiceRng::new(7);
        for roll in rng.roll_d6(1000).unwrap() {
            assert!((1..=6).contains(&roll));
        }
    }

    #[test]
    fn test_state_restore_resumes_stream() {
        let mut rng = DiceRng::new(42);
        rng.roll_d6(100).unwrap();

        let state = rng.state();
        let expected = rng.roll_d6(10).unwrap();

        let mut restored = DiceRng::from_state(&state);
        assert_eq!(restored.roll_d6(10).unwrap(), expected);
    }

    #[test]
    fn test_state_serde() {
        let mut rng = DiceRng::new(42);
        rng.roll_d6(33).unwrap();

        let state = rng.state();
        let json = serde_json::to_string(&state).unwrap();
        let deserialized: DiceRngState = serde_json::from_str(&json).unwrap();

        assert_eq!(state, deserialized);
    }

    #[test]
    fn test_scripted_dice() {
        let mut dice = ScriptedDice::from_rolls(&[3, 6, 2, 5, 4]);

        assert_eq!(dice.roll_d6(3).unwrap(), vec![3, 6, 2]);
        assert_eq!(dice.remaining(), 2);
        assert_eq!(dice.roll_d6(2).unwrap(), vec![5, 4]);
    }

    #[test]
    fn test_scripted_dice_exhaustion() {
        let mut dice = ScriptedDice::from_rolls(&[1, 2]);

        let err = dice.roll_d6(3).unwrap_err();
        assert_eq!(err, EngineError::DiceExhausted { needed: 3, available: 2 });
        // A failed request consumes nothing.
        assert_eq!(dice.remaining(), 2);
    }
}
