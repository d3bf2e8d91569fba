//! Weighted random outcome generator.
//!
//! # Responsibilities
//! - Hold a fixed table of outcomes with integer weights
//! - Draw one outcome per call, proportional to its weight
//!
//! # Design Decisions
//! - Tables are built once at startup and shared read-only
//! - Uses the thread-local RNG, so draws never contend across requests

use rand::distributions::{Distribution, WeightedError, WeightedIndex};
use rand::Rng;

/// Outcome table used by `/status` when no explicit code is requested.
///
/// Nine equally likely draws: five successes and one of each error code.
pub const RANDOM_HTTP_STATUSES: [(u16, u32); 5] = [(200, 5), (400, 1), (500, 1), (502, 1), (503, 1)];

/// A discrete distribution over a fixed set of outcomes.
#[derive(Debug, Clone)]
pub struct WeightedTable<T> {
    outcomes: Vec<T>,
    index: WeightedIndex<u32>,
}

impl<T: Clone> WeightedTable<T> {
    /// Build a table from `(outcome, weight)` pairs.
    ///
    /// Fails when the table is empty or every weight is zero.
    pub fn new(entries: impl IntoIterator<Item = (T, u32)>) -> Result<Self, WeightedError> {
        let (outcomes, weights): (Vec<T>, Vec<u32>) = entries.into_iter().unzip();
        let index = WeightedIndex::new(weights)?;
        Ok(Self { outcomes, index })
    }

    /// Draw one outcome using the thread-local RNG.
    pub fn draw(&self) -> T {
        self.draw_with(&mut rand::thread_rng())
    }

    /// Draw one outcome from the given RNG.
    pub fn draw_with<R: Rng + ?Sized>(&self, rng: &mut R) -> T {
        self.outcomes[self.index.sample(rng)].clone()
    }

    /// All outcomes the table can produce.
    pub fn outcomes(&self) -> &[T] {
        &self.outcomes
    }
}
