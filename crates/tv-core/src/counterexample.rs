//! Counterexample representation and rendering.
//!
//! When a property fails, the counterexample carries the witness (offending
//! index or index pair) together with the entries it names, in a form an
//! external refinement loop can consume as JSON or a human can read as a
//! thread diagram.

use serde::{Deserialize, Serialize};

use crate::domain::{Operation, Phase};
use crate::temporal::Witness;
use crate::trace::{ThreadId, Trace};

/// The failure location plus the entries needed to diagnose it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Counterexample {
    /// Where the property first failed.
    pub witness: Witness,
    /// State after each relevant entry.
    pub states: Vec<StateSnapshot>,
    /// Operation of each relevant entry.
    pub interleaving: Vec<ThreadAction>,
    /// Seed that regenerates the trace (when it came from exploration).
    pub seed: Option<u64>,
    /// Human-readable description of the failure.
    pub description: Option<String>,
}

/// State recorded at one trace index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Trace index.
    pub step: usize,
    /// The state, as JSON.
    pub state: serde_json::Value,
}

/// Operation recorded at one trace index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadAction {
    pub thread_id: ThreadId,
    /// Trace index.
    pub step: usize,
    pub action: String,
    /// False for blocked observations.
    pub success: bool,
}

impl Counterexample {
    /// Collect the entries named by `witness` from `trace`.
    ///
    /// For a pair witness, the entries strictly between the two indices are
    /// included when `with_context` is set, so a diagram shows what happened
    /// in between.
    #[must_use]
    pub fn capture<O, S>(trace: &Trace<O, S>, witness: Witness, with_context: bool) -> Self
    where
        O: Operation,
        S: Serialize,
    {
        let indices: Vec<usize> = match witness {
            Witness::Pair(first, second) if with_context => (first..=second).collect(),
            other => other.indices(),
        };

        let mut ce = Self::new(witness);
        for index in indices {
            let Some(entry) = trace.at(index) else {
                continue;
            };
            ce.interleaving.push(ThreadAction {
                thread_id: entry.op.thread(),
                step: index,
                action: entry.op.to_string(),
                success: entry.op.phase() != Phase::Blocked,
            });
            ce.states.push(StateSnapshot {
                step: index,
                state: serde_json::to_value(&entry.state).unwrap_or(serde_json::Value::Null),
            });
        }
        ce
    }

    /// Empty counterexample for `witness`.
    #[must_use]
    pub fn new(witness: Witness) -> Self {
        Self {
            witness,
            states: Vec::new(),
            interleaving: Vec::new(),
            seed: None,
            description: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Render as a thread diagram.
    ///
    /// ```text
    /// Failure: A removed after B
    ///
    /// Step | Thread 1 | Thread 2 | State
    /// -----|----------|----------|------
    ///    0 | put(A)   |          | {"buffer":["A"],...}
    ///    1 |          | put(B)   | {"buffer":["A","B"],...}
    /// ```
    #[must_use]
    pub fn render_diagram(&self) -> String {
        let mut output = String::new();

        if let Some(seed) = self.seed {
            output.push_str(&format!("TV_SEED={}\n\n", seed));
        }

        if let Some(ref desc) = self.description {
            output.push_str("Failure: ");
            output.push_str(desc);
            output.push_str("\n\n");
        }

        let mut threads: Vec<ThreadId> = self.interleaving.iter().map(|a| a.thread_id).collect();
        threads.sort_unstable();
        threads.dedup();

        if threads.is_empty() {
            output.push_str("(no entries recorded)\n");
            return output;
        }

        output.push_str("Step |");
        for tid in &threads {
            output.push_str(&format!(" Thread {} |", tid));
        }
        output.push_str(" State\n");

        output.push_str("-----|");
        for _ in &threads {
            output.push_str("----------|");
        }
        output.push_str("------\n");

        for action in &self.interleaving {
            output.push_str(&format!("{:4} |", action.step));
            for tid in &threads {
                if *tid == action.thread_id {
                    let status = if action.success { "" } else { " [BLOCKED]" };
                    output.push_str(&format!(" {}{} |", action.action, status));
                } else {
                    output.push_str("          |");
                }
            }
            if let Some(snapshot) = self.states.iter().find(|s| s.step == action.step) {
                output.push_str(&format!(" {}", snapshot.state));
            }
            output.push('\n');
        }

        output
    }
}
