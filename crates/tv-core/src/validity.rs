//! Validity checker: is a trace consistent with some legal interleaving?
//!
//! This says nothing about whether the trace satisfies any named property;
//! that is the property library's job.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::PluginError;
use crate::model::SystemModel;
use crate::trace::{ThreadId, Trace};

/// Outcome of checking a trace against a step model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionValidity {
    /// Whether every consecutive transition was admissible.
    pub valid: bool,
    /// Index `i` of the first entry whose state is unreachable from entry `i - 1`.
    pub first_violation: Option<usize>,
    /// Transitions examined before stopping.
    pub transitions_checked_count: usize,
    /// Witness thread for each admissible transition, in order.
    pub witnesses: Vec<ThreadId>,
}

/// Check every consecutive pair of `trace` against `model`.
///
/// Traces with at most one entry are trivially valid. The scan is linear and
/// stops at the first inadmissible transition.
pub fn is_valid_execution<M>(
    trace: &Trace<M::Operation, M::State>,
    model: &M,
) -> Result<ExecutionValidity, PluginError>
where
    M: SystemModel,
{
    let mut witnesses = Vec::with_capacity(trace.len().saturating_sub(1));

    for (index, pair) in trace.entries().windows(2).enumerate() {
        match model.valid_transition(&pair[0].state, &pair[1].state)? {
            Some(thread) => witnesses.push(thread),
            None => {
                warn!(index = index + 1, "inadmissible transition");
                return Ok(ExecutionValidity {
                    valid: false,
                    first_violation: Some(index + 1),
                    transitions_checked_count: index + 1,
                    witnesses,
                });
            }
        }
    }

    Ok(ExecutionValidity {
        valid: true,
        first_violation: None,
        transitions_checked_count: witnesses.len(),
        witnesses,
    })
}
