//! Property results and the checker trait every domain implements.

use serde::Serialize;

use crate::counterexample::Counterexample;
use crate::domain::Operation;
use crate::error::PluginError;
use crate::temporal::{Outcome, Witness};
use crate::trace::Trace;

/// Whether a property must hold at every position or asserts progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    Safety,
    Liveness,
}

/// Verdict for one named property on one trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyResult {
    pub name: &'static str,
    pub kind: PropertyKind,
    pub holds: bool,
    /// Offending index or index pair.
    pub witness: Option<Witness>,
    /// What went wrong, in words.
    pub violation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counterexample: Option<Counterexample>,
}

impl PropertyResult {
    #[must_use]
    pub fn pass(name: &'static str, kind: PropertyKind) -> Self {
        Self {
            name,
            kind,
            holds: true,
            witness: None,
            violation: None,
            counterexample: None,
        }
    }

    #[must_use]
    pub fn fail(
        name: &'static str,
        kind: PropertyKind,
        violation: impl Into<String>,
        counterexample: Counterexample,
    ) -> Self {
        Self {
            name,
            kind,
            holds: false,
            witness: Some(counterexample.witness),
            violation: Some(violation.into()),
            counterexample: Some(counterexample),
        }
    }

    /// Turn a temporal outcome into a result, capturing the offending
    /// entries from `trace` on failure.
    pub fn from_outcome<O, S, F>(
        name: &'static str,
        kind: PropertyKind,
        outcome: Outcome,
        trace: &Trace<O, S>,
        describe: F,
    ) -> Self
    where
        O: Operation,
        S: Serialize,
        F: FnOnce(Witness) -> String,
    {
        match outcome {
            Outcome::Holds => Self::pass(name, kind),
            Outcome::Violated(witness) => {
                let violation = describe(witness);
                let ce = Counterexample::capture(trace, witness, kind == PropertyKind::Liveness)
                    .with_description(violation.clone());
                Self::fail(name, kind, violation, ce)
            }
        }
    }

    /// Single-line status.
    #[must_use]
    pub fn format_status(&self) -> String {
        if self.holds {
            format!("[PASS] {}", self.name)
        } else {
            format!(
                "[FAIL] {}: {}",
                self.name,
                self.violation.as_deref().unwrap_or("violated")
            )
        }
    }
}

/// A domain's property library evaluated against one trace.
pub trait PropertyChecker {
    /// Evaluate every property. Never short-circuits on a failed property;
    /// only a plug-in contract violation stops evaluation.
    fn check_all(&self) -> Result<Vec<PropertyResult>, PluginError>;
}

/// Conjunction of the safety properties among `results`.
#[must_use]
pub fn safety_holds(results: &[PropertyResult]) -> bool {
    results
        .iter()
        .filter(|r| r.kind == PropertyKind::Safety)
        .all(|r| r.holds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_status() {
        let pass = PropertyResult::pass("CapacityBound", PropertyKind::Safety);
        assert_eq!(pass.format_status(), "[PASS] CapacityBound");

        let fail = PropertyResult::fail(
            "CapacityBound",
            PropertyKind::Safety,
            "3 items, capacity 2",
            Counterexample::new(Witness::Entry(4)),
        );
        assert!(!fail.holds);
        assert_eq!(fail.witness, Some(Witness::Entry(4)));
        assert_eq!(fail.format_status(), "[FAIL] CapacityBound: 3 items, capacity 2");
    }

    #[test]
    fn test_safety_holds_ignores_liveness() {
        let starved = PropertyResult::fail(
            "EventualCompletion",
            PropertyKind::Liveness,
            "never completed",
            Counterexample::new(Witness::Entry(0)),
        );
        let mut results = vec![PropertyResult::pass("CapacityBound", PropertyKind::Safety), starved];
        assert!(safety_holds(&results));
        assert!(safety_holds(&[]));

        results.push(PropertyResult::fail(
            "NoOverflow",
            PropertyKind::Safety,
            "full",
            Counterexample::new(Witness::Pair(0, 1)),
        ));
        assert!(!safety_holds(&results));
    }
}
