//! Seeded randomness.
//!
//! Every random choice made while generating traces goes through
//! [`DeterministicRng`], so a seed fully determines the trace. Failing runs
//! print their seed; rerun with `TV_SEED=<seed>` to reproduce.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

/// Environment variable holding a seed to replay.
pub const SEED_ENV: &str = "TV_SEED";

/// Random source with a recorded seed.
#[derive(Debug, Clone)]
pub struct DeterministicRng {
    seed: u64,
    inner: StdRng,
}

impl DeterministicRng {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            inner: StdRng::seed_from_u64(seed),
        }
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn next_u64(&mut self) -> u64 {
        self.inner.gen()
    }

    /// Uniform index in `0..len`.
    pub fn index(&mut self, len: usize) -> usize {
        debug_assert!(len > 0, "cannot choose from an empty range");
        self.inner.gen_range(0..len)
    }

    /// Uniform element of `items`, or `None` when empty.
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let index = self.index(items.len());
        items.get(index)
    }

    /// `true` with probability `p`.
    pub fn gen_bool(&mut self, p: f64) -> bool {
        debug_assert!((0.0..=1.0).contains(&p), "probability out of range: {}", p);
        self.inner.gen_bool(p)
    }

    /// Independent generator derived from this one.
    pub fn fork(&mut self) -> Self {
        Self::new(self.next_u64())
    }
}

/// Seed from `TV_SEED`, or a fresh random one. Logged either way.
///
/// An unparseable `TV_SEED` is ignored.
#[must_use]
pub fn get_or_generate_seed() -> u64 {
    match std::env::var(SEED_ENV).ok().and_then(|s| s.trim().parse().ok()) {
        Some(seed) => {
            info!(seed, "TV_SEED from environment");
            seed
        }
        None => {
            let seed = rand::random::<u64>();
            info!(seed, "TV_SEED randomly generated");
            seed
        }
    }
}
