//! Domain plug-in contract.
//!
//! The generic engine never looks inside an operation or a state. Everything
//! it needs goes through the traits here: which thread an operation belongs
//! to, whether it is a request, a blocked observation or a completion, how to
//! build the step model for a trace, and which properties to evaluate.

use std::fmt::{Debug, Display};
use std::hash::Hash;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::CheckConfig;
use crate::error::PluginError;
use crate::model::SystemModel;
use crate::property::PropertyResult;
use crate::trace::{ThreadId, Trace};

/// Lifecycle position of an observed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// A request was issued; the outcome is not yet known.
    Request,
    /// The thread was observed waiting.
    Blocked,
    /// The operation took effect.
    Completed,
}

/// Accessors every domain operation supports.
pub trait Operation: Display {
    fn thread(&self) -> ThreadId;
    fn phase(&self) -> Phase;

    /// Whether this operation answers the request recorded as `blocked`.
    /// Defaults to any completion by the same thread.
    fn completes(&self, blocked: &Self) -> bool
    where
        Self: Sized,
    {
        self.thread() == blocked.thread() && self.phase() == Phase::Completed
    }
}

/// One verification domain: operation and state vocabulary, step model and
/// property library.
pub trait Domain: 'static {
    /// Registry key, e.g. `"bounded_queue"`.
    const ID: &'static str;

    type Operation: Operation
        + Clone
        + Debug
        + Eq
        + Hash
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static;
    type State: Clone + Debug + Eq + Hash + Serialize + DeserializeOwned + Send + Sync + 'static;
    type Model: SystemModel<Operation = Self::Operation, State = Self::State> + Send + Sync + 'static;

    /// Step model over the finite universe of values mentioned in `trace`.
    fn model_for(trace: &DomainTrace<Self>) -> Self::Model;

    /// Structural check of one decoded state, applied at ingestion.
    fn check_schema(state: &Self::State) -> Result<(), String>;

    /// Evaluate every safety and liveness property.
    fn check_properties(
        trace: &DomainTrace<Self>,
        config: &CheckConfig,
    ) -> Result<Vec<PropertyResult>, PluginError>;
}

/// Trace over a domain's vocabulary.
pub type DomainTrace<D> = Trace<<D as Domain>::Operation, <D as Domain>::State>;
