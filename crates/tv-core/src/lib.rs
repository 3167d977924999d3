//! # tv-core
//!
//! Trace-based verification of concurrent data structures.
//!
//! An execution of a concurrent structure is captured as a finite trace of
//! `(operation, state)` entries. This crate decides two independent things
//! about such a trace:
//! - whether it is consistent with *some* legal interleaving of atomic steps
//!   (`validity`, driven by a per-domain step model)
//! - whether it satisfies the domain's named safety and liveness properties
//!   (`invariants`, built from the temporal operators in `temporal`)
//!
//! Domains plug in through the [`Domain`] trait and are looked up by name in
//! the [`Registry`]. Three are built in: `bounded_queue`, `lru_cache` and
//! `rate_limiter`.

pub mod codec;
pub mod config;
pub mod counterexample;
pub mod domain;
pub mod domains;
pub mod engine;
pub mod error;
pub mod invariants;
pub mod model;
pub mod property;
pub mod registry;
pub mod temporal;
pub mod trace;
pub mod validity;

pub use codec::{from_ndjson, to_ndjson};
pub use config::CheckConfig;
pub use counterexample::{Counterexample, StateSnapshot, ThreadAction};
pub use domain::{Domain, DomainTrace, Operation, Phase};
pub use engine::{check, safe, TraceVerdict};
pub use error::{CheckError, IngestError, PluginError};
pub use model::SystemModel;
pub use property::{safety_holds, PropertyChecker, PropertyKind, PropertyResult};
pub use registry::Registry;
pub use temporal::{Outcome, Witness};
pub use trace::{ThreadId, Trace, TraceEntry, TraceRecorder};
pub use validity::{is_valid_execution, ExecutionValidity};
