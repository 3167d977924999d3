//! LRU cache behind a single lock.
//!
//! A thread `Enter`s (takes the lock), performs one `get`, `put` or `delete`,
//! and the completion releases the lock. A thread that finds the lock held is
//! recorded as waiting until the lock is free again.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::CheckConfig;
use crate::domain::{Domain, Operation, Phase};
use crate::error::PluginError;
use crate::invariants::lru_cache::LruCachePropertyChecker;
use crate::model::{fresh_thread, SystemModel};
use crate::property::{PropertyChecker, PropertyResult};
use crate::trace::{ThreadId, Trace};

pub type Key = String;
pub type Value = String;

pub type CacheTrace = Trace<CacheOp, CacheState>;

/// Observed cache operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CacheOp {
    /// Lock acquired.
    Enter { thread: ThreadId },
    /// Lock held by another thread.
    Blocked { thread: ThreadId },
    /// Lookup; `value` is `None` on a miss.
    Get {
        thread: ThreadId,
        key: Key,
        value: Option<Value>,
    },
    /// Insert or update; `evicted` names the key pushed out, if any.
    Put {
        thread: ThreadId,
        key: Key,
        value: Value,
        evicted: Option<Key>,
    },
    /// Removal; `removed` is false when the key was absent.
    Delete {
        thread: ThreadId,
        key: Key,
        removed: bool,
    },
}

impl CacheOp {
    /// Key touched by a completion.
    #[must_use]
    pub fn key(&self) -> Option<&Key> {
        match self {
            CacheOp::Get { key, .. } | CacheOp::Put { key, .. } | CacheOp::Delete { key, .. } => {
                Some(key)
            }
            CacheOp::Enter { .. } | CacheOp::Blocked { .. } => None,
        }
    }
}

impl Operation for CacheOp {
    fn thread(&self) -> ThreadId {
        match self {
            CacheOp::Enter { thread }
            | CacheOp::Blocked { thread }
            | CacheOp::Get { thread, .. }
            | CacheOp::Put { thread, .. }
            | CacheOp::Delete { thread, .. } => *thread,
        }
    }

    fn phase(&self) -> Phase {
        match self {
            CacheOp::Enter { .. } => Phase::Request,
            CacheOp::Blocked { .. } => Phase::Blocked,
            _ => Phase::Completed,
        }
    }
}

impl fmt::Display for CacheOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheOp::Enter { .. } | CacheOp::Blocked { .. } => write!(f, "enter"),
            CacheOp::Get {
                key,
                value: Some(value),
                ..
            } => write!(f, "get({key})={value}"),
            CacheOp::Get { key, value: None, .. } => write!(f, "get({key})=miss"),
            CacheOp::Put {
                key,
                value,
                evicted: Some(evicted),
                ..
            } => write!(f, "put({key},{value}) evicts {evicted}"),
            CacheOp::Put { key, value, .. } => write!(f, "put({key},{value})"),
            CacheOp::Delete { key, .. } => write!(f, "delete({key})"),
        }
    }
}

/// Cache snapshot after an operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheState {
    /// Least recently used first.
    pub entries: Vec<(Key, Value)>,
    pub capacity: usize,
    /// Thread holding the cache lock.
    #[serde(default)]
    pub holder: Option<ThreadId>,
    #[serde(default)]
    pub waiting: BTreeSet<ThreadId>,
}

impl CacheState {
    #[must_use]
    pub fn empty(capacity: usize) -> Self {
        debug_assert!(capacity > 0, "capacity must be positive");
        Self {
            entries: Vec::new(),
            capacity,
            holder: None,
            waiting: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn lookup(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    /// Key that the next eviction removes.
    #[must_use]
    pub fn lru_key(&self) -> Option<&Key> {
        self.entries.first().map(|(k, _)| k)
    }

    /// Most recently used key.
    #[must_use]
    pub fn mru_key(&self) -> Option<&Key> {
        self.entries.last().map(|(k, _)| k)
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    fn named_threads(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.holder.into_iter().chain(self.waiting.iter().copied())
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == key)
    }

    fn touch(&mut self, key: &str) -> Option<Value> {
        let index = self.position(key)?;
        let entry = self.entries.remove(index);
        let value = entry.1.clone();
        self.entries.push(entry);
        Some(value)
    }

    fn insert(&mut self, key: &str, value: &str) -> Option<Key> {
        if let Some(index) = self.position(key) {
            self.entries.remove(index);
            self.entries.push((key.to_string(), value.to_string()));
            return None;
        }
        let evicted = if self.is_full() && !self.entries.is_empty() {
            Some(self.entries.remove(0).0)
        } else {
            None
        };
        self.entries.push((key.to_string(), value.to_string()));
        evicted
    }

    fn remove(&mut self, key: &str) -> bool {
        match self.position(key) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    fn release(&mut self, thread: ThreadId) {
        self.holder = None;
        self.waiting.remove(&thread);
    }
}

/// Step relation over fixed key and value universes.
#[derive(Debug, Clone, Default)]
pub struct CacheModel {
    keys: BTreeSet<Key>,
    values: BTreeSet<Value>,
}

impl CacheModel {
    #[must_use]
    pub fn new<K, V>(keys: K, values: V) -> Self
    where
        K: IntoIterator<Item = Key>,
        V: IntoIterator<Item = Value>,
    {
        Self {
            keys: keys.into_iter().collect(),
            values: values.into_iter().collect(),
        }
    }

    fn completions(&self, state: &CacheState, thread: ThreadId) -> Vec<(CacheOp, CacheState)> {
        let mut transitions = Vec::new();

        for key in &self.keys {
            let mut next = state.clone();
            let value = next.touch(key);
            next.release(thread);
            transitions.push((
                CacheOp::Get {
                    thread,
                    key: key.clone(),
                    value,
                },
                next,
            ));

            for value in &self.values {
                let mut next = state.clone();
                let evicted = next.insert(key, value);
                next.release(thread);
                transitions.push((
                    CacheOp::Put {
                        thread,
                        key: key.clone(),
                        value: value.clone(),
                        evicted,
                    },
                    next,
                ));
            }

            let mut next = state.clone();
            let removed = next.remove(key);
            next.release(thread);
            transitions.push((
                CacheOp::Delete {
                    thread,
                    key: key.clone(),
                    removed,
                },
                next,
            ));
        }

        transitions
    }
}

impl SystemModel for CacheModel {
    type Operation = CacheOp;
    type State = CacheState;

    fn transitions(
        &self,
        state: &CacheState,
        thread: ThreadId,
    ) -> Result<Vec<(CacheOp, CacheState)>, PluginError> {
        let waiting = state.waiting.contains(&thread);

        match state.holder {
            Some(holder) if holder == thread && waiting => Err(PluginError::UninterpretableState {
                domain: LruCache::ID,
                reason: format!("thread {thread} holds the lock and waits for it"),
            }),
            Some(holder) if holder != thread => {
                if waiting {
                    return Ok(Vec::new());
                }
                let mut next = state.clone();
                next.waiting.insert(thread);
                Ok(vec![(CacheOp::Blocked { thread }, next)])
            }
            Some(_) => Ok(self.completions(state, thread)),
            None => {
                let mut next = state.clone();
                next.holder = Some(thread);
                next.waiting.remove(&thread);
                let mut transitions = vec![(CacheOp::Enter { thread }, next)];
                transitions.extend(self.completions(state, thread));
                Ok(transitions)
            }
        }
    }

    fn candidate_threads(&self, from: &CacheState, to: &CacheState) -> Vec<ThreadId> {
        let mut named: BTreeSet<ThreadId> = from.named_threads().chain(to.named_threads()).collect();
        named.insert(fresh_thread(named.iter().copied()));
        named.into_iter().collect()
    }
}

/// Plug-in for the LRU cache.
#[derive(Debug, Clone, Copy, Default)]
pub struct LruCache;

impl Domain for LruCache {
    const ID: &'static str = "lru_cache";

    type Operation = CacheOp;
    type State = CacheState;
    type Model = CacheModel;

    fn model_for(trace: &CacheTrace) -> CacheModel {
        let mut model = CacheModel::default();
        for entry in trace {
            match &entry.op {
                CacheOp::Get {
                    key,
                    value: Some(value),
                    ..
                }
                | CacheOp::Put { key, value, .. } => {
                    model.keys.insert(key.clone());
                    model.values.insert(value.clone());
                }
                op => model.keys.extend(op.key().cloned()),
            }
            if let CacheOp::Put {
                evicted: Some(evicted),
                ..
            } = &entry.op
            {
                model.keys.insert(evicted.clone());
            }
            for (key, value) in &entry.state.entries {
                model.keys.insert(key.clone());
                model.values.insert(value.clone());
            }
        }
        model
    }

    fn check_schema(state: &CacheState) -> Result<(), String> {
        if state.capacity == 0 {
            return Err("cache capacity must be positive".to_string());
        }
        Ok(())
    }

    fn check_properties(
        trace: &CacheTrace,
        config: &CheckConfig,
    ) -> Result<Vec<PropertyResult>, PluginError> {
        LruCachePropertyChecker::new(trace)
            .with_liveness_bound(config.liveness_bound)
            .check_all()
    }
}
