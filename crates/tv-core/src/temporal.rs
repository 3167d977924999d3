//! Temporal operators over finite traces.
//!
//! Every operator is pure and total, defined for traces of any length
//! including 0 and 1, and reports *where* it first failed so a verdict can
//! carry a counterexample:
//!
//! | Operator | Meaning | Witness on failure |
//! |----------|---------|--------------------|
//! | `always(P)` | every entry satisfies P (vacuous on empty) | first failing index |
//! | `eventually(P)` | some entry satisfies P (false on empty) | `Unwitnessed` |
//! | `implies(P, Q)` | trace-level P ⇒ Q | Q's witness |
//! | `always_step(R)` | R holds for every consecutive pair | `(i-1, i)` |
//! | `pairwise(R)` | R holds for every ordered pair i < j | first `(i, j)` in lexicographic order |
//! | `leads_to(T, R)` | every trigger is followed by a response | trigger index |
//!
//! The `try_` forms accept predicates that may fail with a domain error; the
//! first error aborts evaluation and is returned as is.

use std::convert::Infallible;

use serde::{Deserialize, Serialize};

use crate::trace::{Trace, TraceEntry};

/// Location at which a temporal formula was first violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Witness {
    /// A single offending entry.
    Entry(usize),
    /// An offending ordered pair of entries, `first < second`.
    Pair(usize, usize),
    /// An existential claim with no satisfying entry anywhere in the trace.
    Unwitnessed,
}

impl Witness {
    /// Trace indices named by this witness.
    #[must_use]
    pub fn indices(&self) -> Vec<usize> {
        match *self {
            Witness::Entry(index) => vec![index],
            Witness::Pair(first, second) => vec![first, second],
            Witness::Unwitnessed => Vec::new(),
        }
    }
}

/// Result of evaluating a temporal formula against one trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Holds,
    Violated(Witness),
}

impl Outcome {
    #[must_use]
    pub fn holds(&self) -> bool {
        matches!(self, Outcome::Holds)
    }

    #[must_use]
    pub fn witness(&self) -> Option<Witness> {
        match self {
            Outcome::Holds => None,
            Outcome::Violated(witness) => Some(*witness),
        }
    }

    /// Conjunction; keeps the first violation.
    #[must_use]
    pub fn and(self, other: Outcome) -> Outcome {
        match self {
            Outcome::Holds => other,
            violated => violated,
        }
    }
}

/// Entry paired with its trace index.
pub type Indexed<'a, O, S> = (usize, &'a TraceEntry<O, S>);

fn infallible<T>(result: Result<T, Infallible>) -> T {
    match result {
        Ok(value) => value,
        Err(never) => match never {},
    }
}

// ============================================================================
// Single-entry operators
// ============================================================================

/// `□P`: every entry satisfies `pred`.
pub fn always<O, S, P>(trace: &Trace<O, S>, pred: P) -> Outcome
where
    P: Fn(&TraceEntry<O, S>) -> bool,
{
    infallible(try_always(trace, |entry| Ok(pred(entry))))
}

pub fn try_always<O, S, P, E>(trace: &Trace<O, S>, mut pred: P) -> Result<Outcome, E>
where
    P: FnMut(&TraceEntry<O, S>) -> Result<bool, E>,
{
    for (index, entry) in trace.iter().enumerate() {
        if !pred(entry)? {
            return Ok(Outcome::Violated(Witness::Entry(index)));
        }
    }
    Ok(Outcome::Holds)
}

/// `◇P`: at least one entry satisfies `pred`.
pub fn eventually<O, S, P>(trace: &Trace<O, S>, pred: P) -> Outcome
where
    P: Fn(&TraceEntry<O, S>) -> bool,
{
    if trace.iter().any(pred) {
        Outcome::Holds
    } else {
        Outcome::Violated(Witness::Unwitnessed)
    }
}

/// Trace-level implication: holds when `antecedent` fails, otherwise
/// whatever `consequent` says.
pub fn implies<O, S, P, Q>(trace: &Trace<O, S>, antecedent: P, consequent: Q) -> Outcome
where
    P: Fn(&Trace<O, S>) -> Outcome,
    Q: Fn(&Trace<O, S>) -> Outcome,
{
    if antecedent(trace).holds() {
        consequent(trace)
    } else {
        Outcome::Holds
    }
}

// ============================================================================
// Two-entry operators
// ============================================================================

/// `R(entry[i-1], entry[i])` for every consecutive pair.
pub fn always_step<O, S, R>(trace: &Trace<O, S>, relation: R) -> Outcome
where
    R: Fn(&TraceEntry<O, S>, &TraceEntry<O, S>) -> bool,
{
    infallible(try_always_step(trace, |prev, next| Ok(relation(prev, next))))
}

pub fn try_always_step<O, S, R, E>(trace: &Trace<O, S>, mut relation: R) -> Result<Outcome, E>
where
    R: FnMut(&TraceEntry<O, S>, &TraceEntry<O, S>) -> Result<bool, E>,
{
    for (index, pair) in trace.entries().windows(2).enumerate() {
        if !relation(&pair[0], &pair[1])? {
            return Ok(Outcome::Violated(Witness::Pair(index, index + 1)));
        }
    }
    Ok(Outcome::Holds)
}

/// `∀ i < j. R(entry[i], entry[j])`. Quadratic in trace length.
pub fn pairwise<O, S, R>(trace: &Trace<O, S>, relation: R) -> Outcome
where
    R: Fn(Indexed<'_, O, S>, Indexed<'_, O, S>) -> bool,
{
    infallible(try_pairwise(trace, |earlier, later| Ok(relation(earlier, later))))
}

pub fn try_pairwise<O, S, R, E>(trace: &Trace<O, S>, mut relation: R) -> Result<Outcome, E>
where
    R: FnMut(Indexed<'_, O, S>, Indexed<'_, O, S>) -> Result<bool, E>,
{
    let entries = trace.entries();
    for (i, earlier) in entries.iter().enumerate() {
        for (offset, later) in entries[i + 1..].iter().enumerate() {
            let j = i + 1 + offset;
            if !relation((i, earlier), (j, later))? {
                return Ok(Outcome::Violated(Witness::Pair(i, j)));
            }
        }
    }
    Ok(Outcome::Holds)
}

/// `trigger ~> response`: every triggering entry `i` is followed by some
/// `j > i` with `response(i, j)`; with `bound = Some(n)`, also `j - i <= n`.
pub fn leads_to<O, S, T, R>(
    trace: &Trace<O, S>,
    trigger: T,
    response: R,
    bound: Option<usize>,
) -> Outcome
where
    T: Fn(Indexed<'_, O, S>) -> bool,
    R: Fn(Indexed<'_, O, S>, Indexed<'_, O, S>) -> bool,
{
    infallible(try_leads_to(
        trace,
        |entry| Ok(trigger(entry)),
        |cause, effect| Ok(response(cause, effect)),
        bound,
    ))
}

pub fn try_leads_to<O, S, T, R, E>(
    trace: &Trace<O, S>,
    mut trigger: T,
    mut response: R,
    bound: Option<usize>,
) -> Result<Outcome, E>
where
    T: FnMut(Indexed<'_, O, S>) -> Result<bool, E>,
    R: FnMut(Indexed<'_, O, S>, Indexed<'_, O, S>) -> Result<bool, E>,
{
    let entries = trace.entries();
    for (i, cause) in entries.iter().enumerate() {
        if !trigger((i, cause))? {
            continue;
        }
        let end = match bound {
            Some(steps) => entries.len().min(i.saturating_add(steps).saturating_add(1)),
            None => entries.len(),
        };
        let mut answered = false;
        for (j, effect) in entries.iter().enumerate().take(end).skip(i + 1) {
            if response((i, cause), (j, effect))? {
                answered = true;
                break;
            }
        }
        if !answered {
            return Ok(Outcome::Violated(Witness::Entry(i)));
        }
    }
    Ok(Outcome::Holds)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trace_of(values: &[i32]) -> Trace<i32, i32> {
        values
            .iter()
            .map(|&value| TraceEntry::new(value, value))
            .collect()
    }

    #[test]
    fn test_always_vacuous_on_empty() {
        let empty = trace_of(&[]);
        assert!(always(&empty, |_| false).holds());
    }

    #[test]
    fn test_eventually_false_on_empty() {
        let empty = trace_of(&[]);
        assert_eq!(
            eventually(&empty, |_| true),
            Outcome::Violated(Witness::Unwitnessed)
        );
    }

    #[test]
    fn test_single_entry() {
        let one = trace_of(&[5]);
        assert!(always(&one, |e| e.state == 5).holds());
        assert!(!always(&one, |e| e.state == 6).holds());
        assert!(eventually(&one, |e| e.state == 5).holds());
        assert!(!eventually(&one, |e| e.state == 6).holds());
        assert!(pairwise(&one, |_, _| false).holds());
        assert!(always_step(&one, |_, _| false).holds());
    }

    #[test]
    fn test_always_reports_first_failure() {
        let trace = trace_of(&[1, 2, -1, 3, -2]);
        assert_eq!(
            always(&trace, |e| e.state > 0),
            Outcome::Violated(Witness::Entry(2))
        );
    }

    #[test]
    fn test_pairwise_reports_first_pair() {
        let trace = trace_of(&[1, 3, 2, 0]);
        // Sortedness fails first at (1, 2).
        assert_eq!(
            pairwise(&trace, |(_, a), (_, b)| a.state <= b.state),
            Outcome::Violated(Witness::Pair(1, 2))
        );
    }

    #[test]
    fn test_always_step() {
        let trace = trace_of(&[1, 2, 2, 1]);
        assert_eq!(
            always_step(&trace, |prev, next| prev.state <= next.state),
            Outcome::Violated(Witness::Pair(2, 3))
        );
    }

    #[test]
    fn test_implies_vacuous_when_antecedent_fails() {
        let trace = trace_of(&[0, 0]);
        let outcome = implies(
            &trace,
            |t| eventually(t, |e| e.state > 0),
            |t| eventually(t, |e| e.state > 100),
        );
        assert!(outcome.holds());

        let trace = trace_of(&[0, 1]);
        let outcome = implies(
            &trace,
            |t| eventually(t, |e| e.state > 0),
            |t| eventually(t, |e| e.state > 100),
        );
        assert!(!outcome.holds());
    }

    fn is_negative(entry: Indexed<'_, i32, i32>) -> bool {
        entry.1.state < 0
    }

    fn is_zero(_cause: Indexed<'_, i32, i32>, effect: Indexed<'_, i32, i32>) -> bool {
        effect.1.state == 0
    }

    #[test]
    fn test_leads_to_with_and_without_bound() {
        // Every negative value is later answered by a zero.
        let trace = trace_of(&[-1, 5, 5, 0, -2]);

        assert_eq!(
            leads_to(&trace, is_negative, is_zero, None),
            Outcome::Violated(Witness::Entry(4))
        );
        assert_eq!(
            leads_to(&trace.prefix(4), is_negative, is_zero, None),
            Outcome::Holds
        );
        assert_eq!(
            leads_to(&trace.prefix(4), is_negative, is_zero, Some(2)),
            Outcome::Violated(Witness::Entry(0))
        );
    }

    #[test]
    fn test_try_always_propagates_error() {
        let trace = trace_of(&[1, 2, 3]);
        let result: Result<Outcome, &str> =
            try_always(&trace, |e| if e.state == 2 { Err("bad") } else { Ok(true) });
        assert_eq!(result, Err("bad"));
    }
}
