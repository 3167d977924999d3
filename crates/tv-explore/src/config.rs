//! Exploration configuration.

/// Configuration for exhaustive exploration and random walks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExploreConfig {
    /// Threads scheduled by exploration and random walks.
    pub threads_count: u64,
    /// Longest trace explored exhaustively.
    pub max_depth: usize,
    /// Steps per random walk.
    pub walk_steps: usize,
    /// Random walks per seed sweep.
    pub walks_count: usize,
    /// Worker threads for the model checker.
    pub checker_threads: usize,
}

impl Default for ExploreConfig {
    fn default() -> Self {
        Self {
            threads_count: 3,
            max_depth: 5,
            walk_steps: 64,
            walks_count: 32,
            checker_threads: 1,
        }
    }
}

impl ExploreConfig {
    /// Small bounds for unit tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            threads_count: 2,
            max_depth: 4,
            walk_steps: 24,
            walks_count: 8,
            checker_threads: 1,
        }
    }

    /// Larger bounds for soak runs.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            threads_count: 3,
            max_depth: 7,
            walk_steps: 512,
            walks_count: 256,
            checker_threads: 4,
        }
    }

    /// Thread ids `0..threads_count`.
    #[must_use]
    pub fn threads(&self) -> Vec<u64> {
        debug_assert!(self.threads_count > 0, "need at least one thread");
        (0..self.threads_count).collect()
    }
}
