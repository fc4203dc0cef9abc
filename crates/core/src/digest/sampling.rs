//! Bounded random sampling of cohort rows ahead of summarizer calls.

use std::sync::atomic::{AtomicU64, Ordering};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Odd 64-bit constant that spreads consecutive call numbers across the
/// seed space.
const CALL_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

/// Returns `rows` untouched when it fits in `max`, otherwise a uniformly
/// shuffled prefix of length `max`.
pub fn sample_limit<T, R>(mut rows: Vec<T>, max: usize, rng: &mut R) -> Vec<T>
where
    R: Rng + ?Sized,
{
    if rows.len() <= max {
        return rows;
    }
    rows.shuffle(rng);
    rows.truncate(max);
    rows
}

/// Hands every call its own generator. Seeded limiters are reproducible
/// across runs but still vary from one call to the next.
#[derive(Debug)]
pub struct SamplingLimiter {
    seed: Option<u64>,
    calls: AtomicU64,
}

impl SamplingLimiter {
    pub fn from_entropy() -> Self {
        Self { seed: None, calls: AtomicU64::new(0) }
    }

    pub fn seeded(seed: u64) -> Self {
        Self { seed: Some(seed), calls: AtomicU64::new(0) }
    }

    pub fn limit<T>(&self, rows: Vec<T>, max: usize) -> Vec<T> {
        let mut rng = self.next_rng();
        sample_limit(rows, max, &mut rng)
    }

    fn next_rng(&self) -> StdRng {
        let call = self.calls.fetch_add(1, Ordering::Relaxed);
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ call.wrapping_mul(CALL_MIX)),
            None => StdRng::from_entropy(),
        }
    }
}

impl Default for SamplingLimiter {
    fn default() -> Self {
        Self::from_entropy()
    }
}
