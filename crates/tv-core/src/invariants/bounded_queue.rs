//! Bounded queue properties.
//!
//! | Property | Kind | Description |
//! |----------|------|-------------|
//! | CapacityBound | safety | buffer never holds more than `capacity` items |
//! | NoOverflow | safety | an add completes only from a non-full buffer |
//! | NoUnderflow | safety | a remove completes only from a non-empty buffer |
//! | FifoOrder | safety | items leave in arrival order; the buffer changes only by the recorded add or remove |
//! | BlockingSound | safety | producers block only when full, consumers only when empty |
//! | MutualExclusion | safety | completions of different threads occupy distinct positions |
//! | EventualCompletion | liveness | an enabled blocked thread eventually completes |

use std::collections::{BTreeMap, VecDeque};

use crate::domain::{Operation, Phase};
use crate::domains::bounded_queue::{Item, QueueOp, QueueState, QueueTrace};
use crate::error::PluginError;
use crate::invariants::liveness::eventual_completion;
use crate::property::{PropertyChecker, PropertyKind, PropertyResult};
use crate::temporal::{always, always_step, pairwise, Witness};

/// Property checker for one bounded queue trace.
pub struct BoundedQueuePropertyChecker<'a> {
    trace: &'a QueueTrace,
    liveness_bound: Option<usize>,
}

impl<'a> BoundedQueuePropertyChecker<'a> {
    #[must_use]
    pub fn new(trace: &'a QueueTrace) -> Self {
        Self {
            trace,
            liveness_bound: None,
        }
    }

    #[must_use]
    pub fn with_liveness_bound(mut self, bound: Option<usize>) -> Self {
        self.liveness_bound = bound;
        self
    }

    fn state_at(&self, index: usize) -> Option<&QueueState> {
        self.trace.at(index).map(|entry| &entry.state)
    }

    fn check_capacity_bound(&self) -> PropertyResult {
        let outcome = always(self.trace, |e| e.state.buffer.len() <= e.state.capacity);
        PropertyResult::from_outcome(
            "CapacityBound",
            PropertyKind::Safety,
            outcome,
            self.trace,
            |witness| match (witness, witness.indices().first().and_then(|&i| self.state_at(i))) {
                (Witness::Entry(i), Some(state)) => format!(
                    "entry {}: {} items exceed capacity {}",
                    i,
                    state.buffer.len(),
                    state.capacity
                ),
                _ => "buffer exceeds capacity".to_string(),
            },
        )
    }

    fn check_no_overflow(&self) -> PropertyResult {
        let outcome = always_step(self.trace, |prev, next| {
            next.op.added_item().is_none() || !prev.state.is_full()
        });
        PropertyResult::from_outcome(
            "NoOverflow",
            PropertyKind::Safety,
            outcome,
            self.trace,
            |witness| match witness {
                Witness::Pair(_, j) => format!("entry {}: item added to a full buffer", j),
                _ => "item added to a full buffer".to_string(),
            },
        )
    }

    fn check_no_underflow(&self) -> PropertyResult {
        let outcome = always_step(self.trace, |prev, next| {
            next.op.removed_item().is_none() || !prev.state.buffer.is_empty()
        });
        PropertyResult::from_outcome(
            "NoUnderflow",
            PropertyKind::Safety,
            outcome,
            self.trace,
            |witness| match witness {
                Witness::Pair(_, j) => format!("entry {}: item removed from an empty buffer", j),
                _ => "item removed from an empty buffer".to_string(),
            },
        )
    }

    /// For each add completion, the index of the removal that took its item.
    ///
    /// Occurrences of an item are matched first-in first-out. Items already
    /// buffered before entry 0 are consumed before any item added in the trace.
    fn removal_matching(&self) -> BTreeMap<usize, Option<usize>> {
        let entries = self.trace.entries();
        let mut pending: BTreeMap<Item, VecDeque<Option<usize>>> = BTreeMap::new();

        if let Some(first) = entries.first() {
            for item in pre_state_buffer(&first.op, &first.state) {
                pending.entry(item).or_default().push_back(None);
            }
        }

        let mut matched = BTreeMap::new();
        for (index, entry) in entries.iter().enumerate() {
            if let Some(item) = entry.op.added_item() {
                matched.insert(index, None);
                pending.entry(item.clone()).or_default().push_back(Some(index));
            } else if let Some(item) = entry.op.removed_item() {
                if let Some(Some(add)) = pending.get_mut(item).and_then(VecDeque::pop_front) {
                    matched.insert(add, Some(index));
                }
            }
        }
        matched
    }

    /// Items leave in arrival order, and the buffer changes only by the
    /// recorded operation: an add appends its item, a removal takes the front.
    fn check_fifo_order(&self) -> PropertyResult {
        let matched = self.removal_matching();
        let ordered = pairwise(self.trace, |(i, _), (j, _)| {
            match (matched.get(&i), matched.get(&j)) {
                (Some(first), Some(Some(second))) => matches!(first, Some(r) if r < second),
                _ => true,
            }
        });
        let intact = always_step(self.trace, |prev, next| {
            expected_buffer(&prev.state.buffer, &next.op).as_ref() == Some(&next.state.buffer)
        });
        let reordered = !ordered.holds();
        PropertyResult::from_outcome(
            "FifoOrder",
            PropertyKind::Safety,
            ordered.and(intact),
            self.trace,
            |witness| match witness {
                Witness::Pair(i, j) if reordered => format!(
                    "item added at entry {} was removed before the item added at entry {}",
                    j, i
                ),
                Witness::Pair(_, j) => format!(
                    "entry {}: buffer does not match the operation ({})",
                    j, self.trace.at(j).map_or_else(String::new, |e| e.op.to_string())
                ),
                _ => "items removed out of order".to_string(),
            },
        )
    }

    fn check_blocking_sound(&self) -> PropertyResult {
        let outcome = always(self.trace, |e| match e.op {
            QueueOp::PutBlocked { .. } => e.state.is_full(),
            QueueOp::GetBlocked { .. } => e.state.buffer.is_empty(),
            _ => true,
        });
        PropertyResult::from_outcome(
            "BlockingSound",
            PropertyKind::Safety,
            outcome,
            self.trace,
            |witness| match witness {
                Witness::Entry(i) => format!("entry {}: thread blocked although it could proceed", i),
                _ => "thread blocked although it could proceed".to_string(),
            },
        )
    }

    /// Completions by different threads sit at distinct, ordered positions.
    /// Any single linear trace satisfies this.
    fn check_mutual_exclusion(&self) -> PropertyResult {
        let outcome = pairwise(self.trace, |(i, a), (j, b)| {
            let both_complete =
                a.op.phase() == Phase::Completed && b.op.phase() == Phase::Completed;
            !both_complete || a.op.thread() == b.op.thread() || i < j
        });
        PropertyResult::from_outcome(
            "MutualExclusion",
            PropertyKind::Safety,
            outcome,
            self.trace,
            |_| "completions overlap".to_string(),
        )
    }

    fn check_eventual_completion(&self) -> Result<PropertyResult, PluginError> {
        let outcome = eventual_completion(self.trace, enabling_condition, self.liveness_bound)?;
        Ok(PropertyResult::from_outcome(
            "EventualCompletion",
            PropertyKind::Liveness,
            outcome,
            self.trace,
            |witness| match witness {
                Witness::Entry(i) => format!(
                    "thread blocked at entry {} was enabled later but never completed",
                    i
                ),
                _ => "blocked thread never completed".to_string(),
            },
        ))
    }
}

impl PropertyChecker for BoundedQueuePropertyChecker<'_> {
    fn check_all(&self) -> Result<Vec<PropertyResult>, PluginError> {
        Ok(vec![
            self.check_capacity_bound(),
            self.check_no_overflow(),
            self.check_no_underflow(),
            self.check_fifo_order(),
            self.check_blocking_sound(),
            self.check_mutual_exclusion(),
            self.check_eventual_completion()?,
        ])
    }
}

/// Whether the blocked operation `op` could proceed from `state`.
fn enabling_condition(op: &QueueOp, state: &QueueState) -> Result<bool, PluginError> {
    match op {
        QueueOp::PutBlocked { .. } => Ok(!state.is_full()),
        QueueOp::GetBlocked { .. } => Ok(!state.buffer.is_empty()),
        other => Err(PluginError::WrongVariant {
            accessor: "enabling_condition",
            found: other.to_string(),
        }),
    }
}

/// Buffer after `op` applied to `before`, or `None` when `op` removes an item
/// that is not at the front.
fn expected_buffer(before: &[Item], op: &QueueOp) -> Option<Vec<Item>> {
    if let Some(item) = op.added_item() {
        let mut after = before.to_vec();
        after.push(item.clone());
        return Some(after);
    }
    match op.removed_item() {
        Some(item) if before.first() == Some(item) => Some(before[1..].to_vec()),
        Some(_) => None,
        None => Some(before.to_vec()),
    }
}

/// Buffer contents before `op` produced `state`.
fn pre_state_buffer(op: &QueueOp, state: &QueueState) -> Vec<Item> {
    let mut buffer = state.buffer.clone();
    if op.added_item().is_some() {
        buffer.pop();
    } else if let Some(item) = op.removed_item() {
        buffer.insert(0, item.clone());
    }
    buffer
}
