//! Immutable execution traces.
//!
//! A trace is the ordered record of one execution: each entry pairs an
//! observed operation with the state snapshot taken *after* it. Index 0 is
//! the first observed step, which need not be an initial state.
//!
//! Traces have value semantics. [`Trace::append`] returns the extended trace
//! and leaves the original untouched, so a finalized trace can be shared by
//! any number of readers without synchronization. Online capture goes
//! through [`TraceRecorder`], the single writer, which hands out frozen
//! snapshots to the checker.

use serde::{Deserialize, Serialize};

/// Logical concurrent actor, unique within one trace.
pub type ThreadId = u64;

/// One observed step: the operation and the state after applying it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TraceEntry<O, S> {
    pub op: O,
    pub state: S,
}

impl<O, S> TraceEntry<O, S> {
    #[must_use]
    pub fn new(op: O, state: S) -> Self {
        Self { op, state }
    }
}

/// Finite, immutable sequence of trace entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Trace<O, S> {
    entries: Vec<TraceEntry<O, S>>,
}

impl<O, S> Trace<O, S> {
    /// The empty trace.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Entry at position `index`, or `None` when out of range.
    #[must_use]
    pub fn at(&self, index: usize) -> Option<&TraceEntry<O, S>> {
        self.entries.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn entries(&self) -> &[TraceEntry<O, S>] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TraceEntry<O, S>> {
        self.entries.iter()
    }

    /// Last recorded entry.
    #[must_use]
    pub fn last(&self) -> Option<&TraceEntry<O, S>> {
        self.entries.last()
    }

    /// Indices of the entries selected by `belongs`, in trace order.
    ///
    /// Used to view one thread's local sub-trace, e.g.
    /// `trace.project(|op| thread_of(op) == 3)`.
    pub fn project<F>(&self, belongs: F) -> Vec<usize>
    where
        F: Fn(&O) -> bool,
    {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| belongs(&entry.op))
            .map(|(index, _)| index)
            .collect()
    }
}

impl<O: Clone, S: Clone> Trace<O, S> {
    /// Produce the trace extended by `entry`.
    #[must_use]
    pub fn append(&self, entry: TraceEntry<O, S>) -> Self {
        let mut entries = Vec::with_capacity(self.entries.len() + 1);
        entries.extend_from_slice(&self.entries);
        entries.push(entry);
        Self { entries }
    }

    /// Frozen copy of the first `len` entries (the whole trace if shorter).
    #[must_use]
    pub fn prefix(&self, len: usize) -> Self {
        let end = len.min(self.entries.len());
        Self {
            entries: self.entries[..end].to_vec(),
        }
    }
}

impl<O, S> Default for Trace<O, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O, S> FromIterator<TraceEntry<O, S>> for Trace<O, S> {
    fn from_iter<I: IntoIterator<Item = TraceEntry<O, S>>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a, O, S> IntoIterator for &'a Trace<O, S> {
    type Item = &'a TraceEntry<O, S>;
    type IntoIter = std::slice::Iter<'a, TraceEntry<O, S>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Single-writer capture handle for a trace that is still growing.
///
/// The instrumentation layer owns the recorder; the checker only ever sees
/// [`TraceRecorder::snapshot`] results, which never change afterwards.
#[derive(Debug)]
pub struct TraceRecorder<O, S> {
    entries: Vec<TraceEntry<O, S>>,
}

impl<O: Clone, S: Clone> TraceRecorder<O, S> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Record one observed step.
    pub fn record(&mut self, op: O, state: S) {
        self.entries.push(TraceEntry::new(op, state));
    }

    /// Number of entries recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Frozen prefix of everything recorded so far.
    #[must_use]
    pub fn snapshot(&self) -> Trace<O, S> {
        Trace {
            entries: self.entries.clone(),
        }
    }

    /// Finish capture and take the trace.
    #[must_use]
    pub fn finish(self) -> Trace<O, S> {
        Trace {
            entries: self.entries,
        }
    }
}

impl<O: Clone, S: Clone> Default for TraceRecorder<O, S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(op: u32, state: &str) -> TraceEntry<u32, String> {
        TraceEntry::new(op, state.to_string())
    }

    #[test]
    fn test_append_has_value_semantics() {
        let empty: Trace<u32, String> = Trace::new();
        let one = empty.append(entry(1, "a"));
        let two = one.append(entry(2, "b"));

        assert!(empty.is_empty());
        assert_eq!(one.len(), 1);
        assert_eq!(two.len(), 2);
        assert_eq!(two.at(1), Some(&entry(2, "b")));
    }

    #[test]
    fn test_at_out_of_range_is_absent() {
        let trace: Trace<u32, String> = [entry(1, "a")].into_iter().collect();
        assert!(trace.at(1).is_none());
        assert!(trace.at(usize::MAX).is_none());
    }

    #[test]
    fn test_equality_is_entry_sequence_equality() {
        let a: Trace<u32, String> = [entry(1, "a"), entry(2, "b")].into_iter().collect();
        let b = Trace::new().append(entry(1, "a")).append(entry(2, "b"));
        let c: Trace<u32, String> = [entry(2, "b"), entry(1, "a")].into_iter().collect();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_snapshot_is_frozen() {
        let mut recorder = TraceRecorder::new();
        recorder.record(1u32, "a".to_string());
        let snapshot = recorder.snapshot();
        recorder.record(2u32, "b".to_string());

        assert_eq!(snapshot.len(), 1);
        assert_eq!(recorder.finish().len(), 2);
    }

    #[test]
    fn test_prefix_and_project() {
        let trace: Trace<u32, String> =
            [entry(1, "a"), entry(2, "b"), entry(1, "c")].into_iter().collect();

        assert_eq!(trace.prefix(2).len(), 2);
        assert_eq!(trace.prefix(10), trace);
        assert_eq!(trace.project(|op| *op == 1), vec![0, 2]);
    }
}
