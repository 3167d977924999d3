//! Bounded blocking FIFO queue.
//!
//! Producers `put` items and block while the buffer is full; consumers `get`
//! the front item and block while it is empty. A blocked participant is part
//! of the state, so its later completion is an ordinary step.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::CheckConfig;
use crate::domain::{Domain, Operation, Phase};
use crate::error::PluginError;
use crate::invariants::bounded_queue::BoundedQueuePropertyChecker;
use crate::model::{fresh_thread, SystemModel};
use crate::property::{PropertyChecker, PropertyResult};
use crate::trace::{ThreadId, Trace};

/// Opaque queue element.
pub type Item = String;

pub type QueueTrace = Trace<QueueOp, QueueState>;

/// Observed queue operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueueOp {
    /// Put that succeeded without waiting.
    Put { thread: ThreadId, item: Item },
    /// Get that succeeded without waiting.
    Get { thread: ThreadId, item: Item },
    /// Producer found the buffer full.
    PutBlocked { thread: ThreadId, item: Item },
    /// Consumer found the buffer empty.
    GetBlocked { thread: ThreadId },
    /// Previously blocked producer completed.
    PutSuccess { thread: ThreadId, item: Item },
    /// Previously blocked consumer completed.
    GetSuccess { thread: ThreadId, item: Item },
}

impl QueueOp {
    /// Item appended to the buffer, for add completions.
    #[must_use]
    pub fn added_item(&self) -> Option<&Item> {
        match self {
            QueueOp::Put { item, .. } | QueueOp::PutSuccess { item, .. } => Some(item),
            _ => None,
        }
    }

    /// Item taken from the buffer, for remove completions.
    #[must_use]
    pub fn removed_item(&self) -> Option<&Item> {
        match self {
            QueueOp::Get { item, .. } | QueueOp::GetSuccess { item, .. } => Some(item),
            _ => None,
        }
    }

    fn item(&self) -> Option<&Item> {
        match self {
            QueueOp::GetBlocked { .. } => None,
            QueueOp::Put { item, .. }
            | QueueOp::Get { item, .. }
            | QueueOp::PutBlocked { item, .. }
            | QueueOp::PutSuccess { item, .. }
            | QueueOp::GetSuccess { item, .. } => Some(item),
        }
    }
}

impl Operation for QueueOp {
    fn thread(&self) -> ThreadId {
        match self {
            QueueOp::Put { thread, .. }
            | QueueOp::Get { thread, .. }
            | QueueOp::PutBlocked { thread, .. }
            | QueueOp::GetBlocked { thread }
            | QueueOp::PutSuccess { thread, .. }
            | QueueOp::GetSuccess { thread, .. } => *thread,
        }
    }

    fn phase(&self) -> Phase {
        match self {
            QueueOp::PutBlocked { .. } | QueueOp::GetBlocked { .. } => Phase::Blocked,
            _ => Phase::Completed,
        }
    }

    fn completes(&self, blocked: &Self) -> bool {
        match (blocked, self) {
            (
                QueueOp::PutBlocked { thread: waiter, item: wanted },
                QueueOp::PutSuccess { thread, item },
            ) => waiter == thread && wanted == item,
            (QueueOp::GetBlocked { thread: waiter }, QueueOp::GetSuccess { thread, .. }) => {
                waiter == thread
            }
            _ => false,
        }
    }
}

impl fmt::Display for QueueOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueOp::Put { item, .. } | QueueOp::PutBlocked { item, .. } => write!(f, "put({item})"),
            QueueOp::PutSuccess { item, .. } => write!(f, "put({item}) ok"),
            QueueOp::Get { item, .. } => write!(f, "get()={item}"),
            QueueOp::GetBlocked { .. } => write!(f, "get()"),
            QueueOp::GetSuccess { item, .. } => write!(f, "get()={item} ok"),
        }
    }
}

/// Queue snapshot after an operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueState {
    /// Front is the next item removed.
    pub buffer: Vec<Item>,
    pub capacity: usize,
    /// Waiting producers and the item each is trying to add.
    #[serde(default)]
    pub blocked_producers: BTreeMap<ThreadId, Item>,
    #[serde(default)]
    pub blocked_consumers: BTreeSet<ThreadId>,
}

impl QueueState {
    /// Empty queue with no waiting participants.
    #[must_use]
    pub fn empty(capacity: usize) -> Self {
        debug_assert!(capacity > 0, "capacity must be positive");
        Self {
            buffer: Vec::new(),
            capacity,
            blocked_producers: BTreeMap::new(),
            blocked_consumers: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.buffer.len() >= self.capacity
    }

    fn named_threads(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.blocked_producers
            .keys()
            .chain(self.blocked_consumers.iter())
            .copied()
    }
}

/// Step relation over a fixed item universe.
#[derive(Debug, Clone, Default)]
pub struct QueueModel {
    items: BTreeSet<Item>,
}

impl QueueModel {
    #[must_use]
    pub fn new<I: IntoIterator<Item = Item>>(items: I) -> Self {
        Self {
            items: items.into_iter().collect(),
        }
    }
}

impl SystemModel for QueueModel {
    type Operation = QueueOp;
    type State = QueueState;

    fn transitions(
        &self,
        state: &QueueState,
        thread: ThreadId,
    ) -> Result<Vec<(QueueOp, QueueState)>, PluginError> {
        let producing = state.blocked_producers.get(&thread);
        let consuming = state.blocked_consumers.contains(&thread);

        match (producing, consuming) {
            (Some(_), true) => Err(PluginError::UninterpretableState {
                domain: BoundedQueue::ID,
                reason: format!("thread {thread} is both a blocked producer and consumer"),
            }),
            (Some(item), false) => {
                if state.is_full() {
                    return Ok(Vec::new());
                }
                let mut next = state.clone();
                next.blocked_producers.remove(&thread);
                next.buffer.push(item.clone());
                Ok(vec![(
                    QueueOp::PutSuccess {
                        thread,
                        item: item.clone(),
                    },
                    next,
                )])
            }
            (None, true) => {
                if state.buffer.is_empty() {
                    return Ok(Vec::new());
                }
                let mut next = state.clone();
                next.blocked_consumers.remove(&thread);
                let item = next.buffer.remove(0);
                Ok(vec![(QueueOp::GetSuccess { thread, item }, next)])
            }
            (None, false) => Ok(self.idle_transitions(state, thread)),
        }
    }

    fn candidate_threads(&self, from: &QueueState, to: &QueueState) -> Vec<ThreadId> {
        let mut named: BTreeSet<ThreadId> = from.named_threads().chain(to.named_threads()).collect();
        named.insert(fresh_thread(named.iter().copied()));
        named.into_iter().collect()
    }
}

impl QueueModel {
    fn idle_transitions(&self, state: &QueueState, thread: ThreadId) -> Vec<(QueueOp, QueueState)> {
        let mut transitions = Vec::with_capacity(self.items.len() + 1);

        for item in &self.items {
            let mut next = state.clone();
            let op = if state.is_full() {
                next.blocked_producers.insert(thread, item.clone());
                QueueOp::PutBlocked {
                    thread,
                    item: item.clone(),
                }
            } else {
                next.buffer.push(item.clone());
                QueueOp::Put {
                    thread,
                    item: item.clone(),
                }
            };
            transitions.push((op, next));
        }

        let mut next = state.clone();
        if next.buffer.is_empty() {
            next.blocked_consumers.insert(thread);
            transitions.push((QueueOp::GetBlocked { thread }, next));
        } else {
            let item = next.buffer.remove(0);
            transitions.push((QueueOp::Get { thread, item }, next));
        }

        transitions
    }
}

/// Plug-in for the bounded queue.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundedQueue;

impl Domain for BoundedQueue {
    const ID: &'static str = "bounded_queue";

    type Operation = QueueOp;
    type State = QueueState;
    type Model = QueueModel;

    fn model_for(trace: &QueueTrace) -> QueueModel {
        let mut items = BTreeSet::new();
        for entry in trace {
            if let Some(item) = entry.op.item() {
                items.insert(item.clone());
            }
            items.extend(entry.state.buffer.iter().cloned());
            items.extend(entry.state.blocked_producers.values().cloned());
        }
        QueueModel { items }
    }

    fn check_schema(state: &QueueState) -> Result<(), String> {
        if state.capacity == 0 {
            return Err("queue capacity must be positive".to_string());
        }
        Ok(())
    }

    fn check_properties(
        trace: &QueueTrace,
        config: &CheckConfig,
    ) -> Result<Vec<PropertyResult>, PluginError> {
        BoundedQueuePropertyChecker::new(trace)
            .with_liveness_bound(config.liveness_bound)
            .check_all()
    }
}
