//! # tv-explore
//!
//! Trace generation for exercising [`tv_core`].
//!
//! All behavior is reproducible from a seed.
//!
//! ## Modules
//!
//! - `space`: bounded exhaustive exploration of every trace a step model can
//!   produce, checked with stateright
//! - `walk`: seeded random walks over a step model
//! - `subjects`: reference queue, cache and rate limiter implementations that
//!   record their own traces, with injectable flaws
//!
//! ## Usage
//!
//! ```rust
//! use tv_core::domains::bounded_queue::{QueueModel, QueueState};
//! use tv_core::domains::BoundedQueue;
//! use tv_explore::{random_walk, DeterministicRng};
//!
//! let model = QueueModel::new(["A".to_string(), "B".to_string()]);
//! let mut rng = DeterministicRng::new(12345);
//! let trace = random_walk(&model, &QueueState::empty(2), &[0, 1], 20, &mut rng).unwrap();
//!
//! let verdict = tv_core::check::<BoundedQueue>(&trace, &Default::default()).unwrap();
//! assert!(verdict.safe());
//! ```
//!
//! ## Reproducing failures
//!
//! Seeded tests print their seed. Replay one with:
//!
//! ```bash
//! TV_SEED=12345 cargo test -p tv-explore
//! ```

pub mod config;
pub mod random;
pub mod space;
pub mod subjects;
pub mod walk;

pub use config::ExploreConfig;
pub use random::{get_or_generate_seed, DeterministicRng, SEED_ENV};
pub use space::{explore, ExplorationReport, TraceSpace};
pub use subjects::{drive, CacheSubject, Flaw, QueueSubject, RateSubject, Subject};
pub use walk::random_walk;
