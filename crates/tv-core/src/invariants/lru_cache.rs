//! LRU cache properties.
//!
//! | Property | Kind | Description |
//! |----------|------|-------------|
//! | CapacityBound | safety | never more than `capacity` entries |
//! | KeyUniqueness | safety | no key appears twice |
//! | LruEviction | safety | a put evicts the least recently used key, and only when full |
//! | ReadConsistency | safety | get and delete report what the cache held; a put is readable afterwards |
//! | RecencyUpdate | safety | a key read or written becomes most recently used |
//! | MutualExclusion | safety | nobody else enters or completes while a thread holds the lock |
//! | EventualCompletion | liveness | a waiting thread completes once the lock is free |

use std::collections::BTreeSet;

use crate::domain::{Operation, Phase};
use crate::domains::lru_cache::{CacheOp, CacheState, CacheTrace};
use crate::error::PluginError;
use crate::invariants::liveness::eventual_completion;
use crate::property::{PropertyChecker, PropertyKind, PropertyResult};
use crate::temporal::{always, always_step, pairwise, Outcome, Witness};

/// Property checker for one LRU cache trace.
pub struct LruCachePropertyChecker<'a> {
    trace: &'a CacheTrace,
    liveness_bound: Option<usize>,
}

impl<'a> LruCachePropertyChecker<'a> {
    #[must_use]
    pub fn new(trace: &'a CacheTrace) -> Self {
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

    fn result<F>(&self, name: &'static str, outcome: Outcome, describe: F) -> PropertyResult
    where
        F: FnOnce(Witness) -> String,
    {
        PropertyResult::from_outcome(name, PropertyKind::Safety, outcome, self.trace, describe)
    }

    fn check_capacity_bound(&self) -> PropertyResult {
        let outcome = always(self.trace, |e| e.state.entries.len() <= e.state.capacity);
        self.result("CapacityBound", outcome, |w| {
            format!("{}: entry count exceeds capacity", at(w))
        })
    }

    fn check_key_uniqueness(&self) -> PropertyResult {
        let outcome = always(self.trace, |e| {
            let mut seen = BTreeSet::new();
            e.state.entries.iter().all(|(key, _)| seen.insert(key))
        });
        self.result("KeyUniqueness", outcome, |w| {
            format!("{}: a key is stored twice", at(w))
        })
    }

    /// A put of a new key into a full cache evicts exactly the pre-state LRU
    /// key; any other put evicts nothing.
    fn check_lru_eviction(&self) -> PropertyResult {
        let outcome = always_step(self.trace, |prev, next| match &next.op {
            CacheOp::Put { key, evicted, .. } => {
                let expected = if !prev.state.contains(key) && prev.state.is_full() {
                    prev.state.lru_key()
                } else {
                    None
                };
                evicted.as_ref() == expected
            }
            _ => true,
        });
        self.result("LruEviction", outcome, |w| {
            format!("{}: evicted key is not the least recently used", at(w))
        })
    }

    fn check_read_consistency(&self) -> PropertyResult {
        let outcome = always_step(self.trace, |prev, next| match &next.op {
            CacheOp::Get { key, value, .. } => value.as_ref() == prev.state.lookup(key),
            CacheOp::Put { key, value, .. } => next.state.lookup(key) == Some(value),
            CacheOp::Delete { key, removed, .. } => {
                *removed == prev.state.contains(key) && !next.state.contains(key)
            }
            _ => true,
        });
        self.result("ReadConsistency", outcome, |w| {
            format!("{}: result disagrees with the cache contents", at(w))
        })
    }

    fn check_recency_update(&self) -> PropertyResult {
        let outcome = always(self.trace, |e| match &e.op {
            CacheOp::Get {
                key,
                value: Some(_),
                ..
            }
            | CacheOp::Put { key, .. } => e.state.mru_key() == Some(key),
            _ => true,
        });
        self.result("RecencyUpdate", outcome, |w| {
            format!("{}: touched key is not most recently used", at(w))
        })
    }

    /// Between a thread's `Enter` and its completion no other thread enters
    /// or completes, and the lock holder is never waiting.
    fn check_mutual_exclusion(&self) -> PropertyResult {
        let release = self.release_indices();
        let exclusive = pairwise(self.trace, |(i, a), (j, b)| {
            if !matches!(a.op, CacheOp::Enter { .. }) || b.op.thread() == a.op.thread() {
                return true;
            }
            let acting = matches!(b.op.phase(), Phase::Request | Phase::Completed);
            !acting || matches!(release[i], Some(k) if k < j)
        });
        let holder_not_waiting = always(self.trace, |e| {
            e.state
                .holder
                .map_or(true, |holder| !e.state.waiting.contains(&holder))
        });
        self.result(
            "MutualExclusion",
            exclusive.and(holder_not_waiting),
            |w| match w {
                Witness::Pair(i, j) => format!(
                    "entry {}: another thread acted while the lock taken at entry {} was held",
                    j, i
                ),
                other => format!("{}: lock holder is also waiting", at(other)),
            },
        )
    }

    /// For each entry, the index of the next completion by the same thread.
    fn release_indices(&self) -> Vec<Option<usize>> {
        let entries = self.trace.entries();
        let mut release = vec![None; entries.len()];
        for (i, entry) in entries.iter().enumerate() {
            let thread = entry.op.thread();
            release[i] = entries
                .iter()
                .enumerate()
                .skip(i + 1)
                .find(|(_, later)| {
                    later.op.thread() == thread && later.op.phase() == Phase::Completed
                })
                .map(|(k, _)| k);
        }
        release
    }

    fn check_eventual_completion(&self) -> Result<PropertyResult, PluginError> {
        let outcome = eventual_completion(self.trace, enabling_condition, self.liveness_bound)?;
        Ok(PropertyResult::from_outcome(
            "EventualCompletion",
            PropertyKind::Liveness,
            outcome,
            self.trace,
            |w| format!("{}: waiting thread saw the lock free but never completed", at(w)),
        ))
    }
}

impl PropertyChecker for LruCachePropertyChecker<'_> {
    fn check_all(&self) -> Result<Vec<PropertyResult>, PluginError> {
        Ok(vec![
            self.check_capacity_bound(),
            self.check_key_uniqueness(),
            self.check_lru_eviction(),
            self.check_read_consistency(),
            self.check_recency_update(),
            self.check_mutual_exclusion(),
            self.check_eventual_completion()?,
        ])
    }
}

fn enabling_condition(op: &CacheOp, state: &CacheState) -> Result<bool, PluginError> {
    match op {
        CacheOp::Blocked { .. } => Ok(state.holder.is_none()),
        other => Err(PluginError::WrongVariant {
            accessor: "enabling_condition",
            found: other.to_string(),
        }),
    }
}

/// Location phrase for a witness; step witnesses name the later entry.
fn at(witness: Witness) -> String {
    match witness {
        Witness::Entry(i) | Witness::Pair(_, i) => format!("entry {}", i),
        Witness::Unwitnessed => "trace".to_string(),
    }
}
