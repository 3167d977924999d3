//! Reference implementations that record their own traces.
//!
//! Each subject is a small, single-threaded implementation of one of the
//! built-in structures. A seeded scheduler decides which logical thread acts
//! next, and the subject records every observable step through a
//! [`TraceRecorder`]. Subjects can carry a deliberate [`Flaw`] so the
//! property library can be shown to catch it.
//!
//! # Flaw Catalog
//!
//! | Flaw | Subject | Caught By |
//! |------|---------|-----------|
//! | OverflowingPut | QueueSubject | CapacityBound, NoOverflow |
//! | MruEviction | CacheSubject | LruEviction |
//! | RoundingUpRefill | RateSubject | RefillAccounting |

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tracing::debug;
use tv_core::domain::{Domain, DomainTrace};
use tv_core::domains::bounded_queue::{Item, QueueOp, QueueState};
use tv_core::domains::lru_cache::{CacheOp, CacheState, Key, Value};
use tv_core::domains::rate_limiter::{replenish, RateOp, RateState};
use tv_core::domains::{BoundedQueue, LruCache, RateLimiter};
use tv_core::{ThreadId, TraceRecorder};

use crate::random::DeterministicRng;

/// Deliberate implementation bug.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flaw {
    /// Queue put appends even when the buffer is full.
    OverflowingPut,
    /// Cache evicts the most recently used key instead of the least.
    MruEviction,
    /// Rate limiter rounds partial refills up instead of down.
    RoundingUpRefill,
}

/// Implementation that records its execution as a trace of `Domain`.
pub trait Subject {
    type Domain: Domain;

    /// Let `thread` take its next step. Returns `false` when the thread is
    /// blocked and nothing was recorded.
    fn step(&mut self, thread: ThreadId, rng: &mut DeterministicRng) -> bool;

    /// Stop recording and take the trace.
    fn finish(self) -> DomainTrace<Self::Domain>;
}

/// Schedule `steps` random thread picks against `subject`.
pub fn drive<S: Subject>(
    mut subject: S,
    threads: &[ThreadId],
    steps: usize,
    rng: &mut DeterministicRng,
) -> DomainTrace<S::Domain> {
    debug_assert!(!threads.is_empty(), "scheduler needs at least one thread");

    let mut blocked_picks_count = 0usize;
    for _ in 0..steps {
        let Some(&thread) = rng.choose(threads) else {
            break;
        };
        if !subject.step(thread, rng) {
            blocked_picks_count += 1;
        }
    }

    let trace = subject.finish();
    debug!(
        domain = <S::Domain as Domain>::ID,
        seed = rng.seed(),
        entries = trace.len(),
        blocked_picks = blocked_picks_count,
        "subject run finished"
    );
    trace
}

// =============================================================================
// Bounded queue
// =============================================================================

/// Blocking FIFO queue.
pub struct QueueSubject {
    capacity: usize,
    buffer: VecDeque<Item>,
    blocked_producers: BTreeMap<ThreadId, Item>,
    blocked_consumers: BTreeSet<ThreadId>,
    next_item: u64,
    flaw: Option<Flaw>,
    recorder: TraceRecorder<QueueOp, QueueState>,
}

impl QueueSubject {
    #[must_use]
    pub fn new(capacity: usize, flaw: Option<Flaw>) -> Self {
        debug_assert!(capacity > 0, "capacity must be positive");
        Self {
            capacity,
            buffer: VecDeque::new(),
            blocked_producers: BTreeMap::new(),
            blocked_consumers: BTreeSet::new(),
            next_item: 0,
            flaw,
            recorder: TraceRecorder::new(),
        }
    }

    fn is_full(&self) -> bool {
        self.buffer.len() >= self.capacity && self.flaw != Some(Flaw::OverflowingPut)
    }

    fn snapshot(&self) -> QueueState {
        QueueState {
            buffer: self.buffer.iter().cloned().collect(),
            capacity: self.capacity,
            blocked_producers: self.blocked_producers.clone(),
            blocked_consumers: self.blocked_consumers.clone(),
        }
    }

    fn record(&mut self, op: QueueOp) {
        let state = self.snapshot();
        self.recorder.record(op, state);
    }

    fn put(&mut self, thread: ThreadId, item: Item) {
        if self.is_full() {
            self.blocked_producers.insert(thread, item.clone());
            self.record(QueueOp::PutBlocked { thread, item });
        } else {
            self.buffer.push_back(item.clone());
            self.record(QueueOp::Put { thread, item });
        }
    }

    fn get(&mut self, thread: ThreadId) {
        match self.buffer.pop_front() {
            Some(item) => self.record(QueueOp::Get { thread, item }),
            None => {
                self.blocked_consumers.insert(thread);
                self.record(QueueOp::GetBlocked { thread });
            }
        }
    }
}

impl Subject for QueueSubject {
    type Domain = BoundedQueue;

    fn step(&mut self, thread: ThreadId, rng: &mut DeterministicRng) -> bool {
        if let Some(item) = self.blocked_producers.get(&thread).cloned() {
            if self.is_full() {
                return false;
            }
            self.blocked_producers.remove(&thread);
            self.buffer.push_back(item.clone());
            self.record(QueueOp::PutSuccess { thread, item });
            return true;
        }

        if self.blocked_consumers.contains(&thread) {
            let Some(item) = self.buffer.pop_front() else {
                return false;
            };
            self.blocked_consumers.remove(&thread);
            self.record(QueueOp::GetSuccess { thread, item });
            return true;
        }

        if rng.gen_bool(0.5) {
            let item = format!("i{}", self.next_item);
            self.next_item += 1;
            self.put(thread, item);
        } else {
            self.get(thread);
        }
        true
    }

    fn finish(self) -> DomainTrace<BoundedQueue> {
        self.recorder.finish()
    }
}

// =============================================================================
// LRU cache
// =============================================================================

const CACHE_KEYS: [&str; 4] = ["a", "b", "c", "d"];
const CACHE_VALUES: [&str; 2] = ["1", "2"];

/// LRU cache behind a lock; each access is enter, operate, release.
pub struct CacheSubject {
    capacity: usize,
    /// Least recently used first.
    entries: Vec<(Key, Value)>,
    holder: Option<ThreadId>,
    waiting: BTreeSet<ThreadId>,
    flaw: Option<Flaw>,
    recorder: TraceRecorder<CacheOp, CacheState>,
}

impl CacheSubject {
    #[must_use]
    pub fn new(capacity: usize, flaw: Option<Flaw>) -> Self {
        debug_assert!(capacity > 0, "capacity must be positive");
        Self {
            capacity,
            entries: Vec::new(),
            holder: None,
            waiting: BTreeSet::new(),
            flaw,
            recorder: TraceRecorder::new(),
        }
    }

    fn record(&mut self, op: CacheOp) {
        let state = CacheState {
            entries: self.entries.clone(),
            capacity: self.capacity,
            holder: self.holder,
            waiting: self.waiting.clone(),
        };
        self.recorder.record(op, state);
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == key)
    }

    fn get(&mut self, key: &str) -> Option<Value> {
        let index = self.position(key)?;
        let entry = self.entries.remove(index);
        let value = entry.1.clone();
        self.entries.push(entry);
        Some(value)
    }

    fn put(&mut self, key: &str, value: &str) -> Option<Key> {
        if let Some(index) = self.position(key) {
            self.entries.remove(index);
            self.entries.push((key.to_string(), value.to_string()));
            return None;
        }
        let evicted = if self.entries.len() >= self.capacity {
            let victim = match self.flaw {
                Some(Flaw::MruEviction) => self.entries.len() - 1,
                _ => 0,
            };
            Some(self.entries.remove(victim).0)
        } else {
            None
        };
        self.entries.push((key.to_string(), value.to_string()));
        evicted
    }

    fn delete(&mut self, key: &str) -> bool {
        match self.position(key) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    fn access(&mut self, thread: ThreadId, rng: &mut DeterministicRng) -> CacheOp {
        let key = CACHE_KEYS[rng.index(CACHE_KEYS.len())].to_string();
        match rng.index(4) {
            0 => {
                let value = self.get(&key);
                CacheOp::Get { thread, key, value }
            }
            1 => {
                let removed = self.delete(&key);
                CacheOp::Delete {
                    thread,
                    key,
                    removed,
                }
            }
            _ => {
                let value = CACHE_VALUES[rng.index(CACHE_VALUES.len())].to_string();
                let evicted = self.put(&key, &value);
                CacheOp::Put {
                    thread,
                    key,
                    value,
                    evicted,
                }
            }
        }
    }
}

impl Subject for CacheSubject {
    type Domain = LruCache;

    fn step(&mut self, thread: ThreadId, rng: &mut DeterministicRng) -> bool {
        match self.holder {
            Some(holder) if holder == thread => {
                let op = self.access(thread, rng);
                self.holder = None;
                self.record(op);
            }
            Some(_) => {
                if !self.waiting.insert(thread) {
                    return false;
                }
                self.record(CacheOp::Blocked { thread });
            }
            None => {
                self.waiting.remove(&thread);
                self.holder = Some(thread);
                self.record(CacheOp::Enter { thread });
            }
        }
        true
    }

    fn finish(self) -> DomainTrace<LruCache> {
        self.recorder.finish()
    }
}

// =============================================================================
// Rate limiter
// =============================================================================

const NANOS_PER_SEC: u64 = 1_000_000_000;
const ACQUIRE_AMOUNTS: [u64; 3] = [500, 1_500, 3_000];

/// Token bucket with a simulated clock that advances on every scheduled step.
pub struct RateSubject {
    tokens: i64,
    capacity: u64,
    rate: u64,
    last_refill_ns: u64,
    now_ns: u64,
    waiting: BTreeMap<ThreadId, u64>,
    flaw: Option<Flaw>,
    recorder: TraceRecorder<RateOp, RateState>,
}

impl RateSubject {
    /// Full bucket at time zero. Quantities are thousandths of a token.
    #[must_use]
    pub fn new(capacity: u64, rate: u64, flaw: Option<Flaw>) -> Self {
        debug_assert!(capacity > 0, "capacity must be positive");
        Self {
            tokens: i64::try_from(capacity).unwrap_or(i64::MAX),
            capacity,
            rate,
            last_refill_ns: 0,
            now_ns: 0,
            waiting: BTreeMap::new(),
            flaw,
            recorder: TraceRecorder::new(),
        }
    }

    fn level(&self) -> i64 {
        let elapsed = self.now_ns.saturating_sub(self.last_refill_ns);
        match self.flaw {
            Some(Flaw::RoundingUpRefill) => {
                let added = (u128::from(self.rate) * u128::from(elapsed))
                    .div_ceil(u128::from(NANOS_PER_SEC));
                let added = i128::try_from(added).unwrap_or(i128::MAX);
                let level = i128::from(self.tokens)
                    .saturating_add(added)
                    .min(i128::from(self.capacity));
                i64::try_from(level).unwrap_or(i64::MAX)
            }
            _ => replenish(self.tokens, self.capacity, self.rate, elapsed),
        }
    }

    fn refill(&mut self) {
        self.tokens = self.level();
        self.last_refill_ns = self.now_ns;
    }

    fn record(&mut self, op: RateOp) {
        let state = RateState {
            tokens: self.tokens,
            capacity: self.capacity,
            rate: self.rate,
            last_refill_ns: self.last_refill_ns,
            waiting: self.waiting.clone(),
        };
        self.recorder.record(op, state);
    }

    fn covers(level: i64, amount: u64) -> bool {
        i128::from(level) >= i128::from(amount)
    }
}

impl Subject for RateSubject {
    type Domain = RateLimiter;

    fn step(&mut self, thread: ThreadId, rng: &mut DeterministicRng) -> bool {
        let tick = NANOS_PER_SEC / 3;
        self.now_ns += 1 + rng.next_u64() % tick;
        let at_ns = self.now_ns;

        if let Some(&amount) = self.waiting.get(&thread) {
            if !Self::covers(self.level(), amount) {
                return false;
            }
            self.refill();
            self.tokens -= i64::try_from(amount).unwrap_or(i64::MAX);
            self.waiting.remove(&thread);
            self.record(RateOp::AcquireSuccess {
                thread,
                amount,
                at_ns,
            });
            return true;
        }

        self.refill();
        if rng.gen_bool(0.2) {
            self.record(RateOp::Observe { thread, at_ns });
            return true;
        }

        let amount = ACQUIRE_AMOUNTS[rng.index(ACQUIRE_AMOUNTS.len())];
        if Self::covers(self.tokens, amount) {
            self.tokens -= i64::try_from(amount).unwrap_or(i64::MAX);
            self.record(RateOp::Acquire {
                thread,
                amount,
                at_ns,
            });
        } else {
            self.waiting.insert(thread, amount);
            self.record(RateOp::Blocked {
                thread,
                amount,
                at_ns,
            });
        }
        true
    }

    fn finish(self) -> DomainTrace<RateLimiter> {
        self.recorder.finish()
    }
}
