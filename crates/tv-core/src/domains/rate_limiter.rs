//! Token-bucket rate limiter.
//!
//! Quantities are fixed-point integers: tokens, rate and capacity are in
//! thousandths of a token, time is in nanoseconds. Refill is computed exactly
//! in 128-bit arithmetic and floored, so replaying a trace is deterministic.
//!
//! Every operation first refills the bucket up to `capacity` for the time
//! elapsed since `last_refill_ns` and moves the refill clock to its own
//! timestamp, then consumes whatever it acquired.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::CheckConfig;
use crate::domain::{Domain, Operation, Phase};
use crate::error::PluginError;
use crate::invariants::rate_limiter::RateLimiterPropertyChecker;
use crate::model::{fresh_thread, SystemModel};
use crate::property::{PropertyChecker, PropertyResult};
use crate::trace::{ThreadId, Trace};

/// Fixed-point units per whole token.
pub const TOKEN_SCALE: u64 = 1_000;

const NANOS_PER_SEC: u128 = 1_000_000_000;

pub type RateTrace = Trace<RateOp, RateState>;

// ============================================================================
// Token arithmetic
// ============================================================================

/// Tokens added at `rate` (units per second) over `elapsed_ns`, floored.
#[must_use]
pub fn refill(rate: u64, elapsed_ns: u64) -> u64 {
    let added = u128::from(rate) * u128::from(elapsed_ns) / NANOS_PER_SEC;
    u64::try_from(added).unwrap_or(u64::MAX)
}

/// Bucket level after refilling `tokens` for `elapsed_ns`, capped at `capacity`.
#[must_use]
pub fn replenish(tokens: i64, capacity: u64, rate: u64, elapsed_ns: u64) -> i64 {
    let level = i128::from(tokens) + i128::from(refill(rate, elapsed_ns));
    let level = level.min(i128::from(capacity));
    i64::try_from(level).unwrap_or(i64::MAX)
}

// ============================================================================
// Operations and state
// ============================================================================

/// Observed limiter operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RateOp {
    /// Acquire that succeeded without waiting.
    Acquire {
        thread: ThreadId,
        amount: u64,
        at_ns: u64,
    },
    /// Acquire that found too few tokens.
    Blocked {
        thread: ThreadId,
        amount: u64,
        at_ns: u64,
    },
    /// Previously blocked acquire completed.
    AcquireSuccess {
        thread: ThreadId,
        amount: u64,
        at_ns: u64,
    },
    /// Read of the available tokens; refills but consumes nothing.
    Observe { thread: ThreadId, at_ns: u64 },
}

impl RateOp {
    #[must_use]
    pub fn at_ns(&self) -> u64 {
        match self {
            RateOp::Acquire { at_ns, .. }
            | RateOp::Blocked { at_ns, .. }
            | RateOp::AcquireSuccess { at_ns, .. }
            | RateOp::Observe { at_ns, .. } => *at_ns,
        }
    }

    /// Tokens taken from the bucket by this operation.
    #[must_use]
    pub fn consumed(&self) -> u64 {
        match self {
            RateOp::Acquire { amount, .. } | RateOp::AcquireSuccess { amount, .. } => *amount,
            RateOp::Blocked { .. } | RateOp::Observe { .. } => 0,
        }
    }

    /// Amount requested by a blocked acquire.
    pub fn pending_amount(&self) -> Result<u64, PluginError> {
        match self {
            RateOp::Blocked { amount, .. } => Ok(*amount),
            other => Err(PluginError::WrongVariant {
                accessor: "pending_amount",
                found: other.to_string(),
            }),
        }
    }

    fn amount(&self) -> Option<u64> {
        match self {
            RateOp::Acquire { amount, .. }
            | RateOp::Blocked { amount, .. }
            | RateOp::AcquireSuccess { amount, .. } => Some(*amount),
            RateOp::Observe { .. } => None,
        }
    }
}

impl Operation for RateOp {
    fn thread(&self) -> ThreadId {
        match self {
            RateOp::Acquire { thread, .. }
            | RateOp::Blocked { thread, .. }
            | RateOp::AcquireSuccess { thread, .. }
            | RateOp::Observe { thread, .. } => *thread,
        }
    }

    fn phase(&self) -> Phase {
        match self {
            RateOp::Blocked { .. } => Phase::Blocked,
            _ => Phase::Completed,
        }
    }

    fn completes(&self, blocked: &Self) -> bool {
        match (blocked, self) {
            (
                RateOp::Blocked {
                    thread: waiter,
                    amount: wanted,
                    ..
                },
                RateOp::AcquireSuccess { thread, amount, .. },
            ) => waiter == thread && wanted == amount,
            _ => false,
        }
    }
}

impl fmt::Display for RateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateOp::Acquire { amount, at_ns, .. } | RateOp::Blocked { amount, at_ns, .. } => {
                write!(f, "acquire({amount})@{at_ns}")
            }
            RateOp::AcquireSuccess { amount, at_ns, .. } => write!(f, "acquire({amount})@{at_ns} ok"),
            RateOp::Observe { at_ns, .. } => write!(f, "available()@{at_ns}"),
        }
    }
}

/// Bucket snapshot after an operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RateState {
    /// Signed so an over-consuming implementation is observable.
    pub tokens: i64,
    pub capacity: u64,
    /// Units added per second.
    pub rate: u64,
    pub last_refill_ns: u64,
    /// Waiting acquirers and the amount each needs.
    #[serde(default)]
    pub waiting: BTreeMap<ThreadId, u64>,
}

impl RateState {
    /// Full bucket at time `at_ns`.
    #[must_use]
    pub fn full(capacity: u64, rate: u64, at_ns: u64) -> Self {
        Self {
            tokens: i64::try_from(capacity).unwrap_or(i64::MAX),
            capacity,
            rate,
            last_refill_ns: at_ns,
            waiting: BTreeMap::new(),
        }
    }

    /// Level after refilling up to `at_ns`. Times before the refill clock add
    /// nothing.
    #[must_use]
    pub fn level_at(&self, at_ns: u64) -> i64 {
        replenish(
            self.tokens,
            self.capacity,
            self.rate,
            at_ns.saturating_sub(self.last_refill_ns),
        )
    }

    fn refilled(&self, at_ns: u64) -> Self {
        let mut next = self.clone();
        next.tokens = self.level_at(at_ns);
        next.last_refill_ns = at_ns;
        next
    }
}

fn covers(level: i64, amount: u64) -> bool {
    i128::from(level) >= i128::from(amount)
}

fn take(level: i64, amount: u64) -> i64 {
    let left = i128::from(level) - i128::from(amount);
    i64::try_from(left).unwrap_or(i64::MIN)
}

// ============================================================================
// Model
// ============================================================================

/// Step relation over fixed sets of instants and amounts.
#[derive(Debug, Clone, Default)]
pub struct RateModel {
    instants: BTreeSet<u64>,
    amounts: BTreeSet<u64>,
}

impl RateModel {
    #[must_use]
    pub fn new<T, A>(instants: T, amounts: A) -> Self
    where
        T: IntoIterator<Item = u64>,
        A: IntoIterator<Item = u64>,
    {
        Self {
            instants: instants.into_iter().collect(),
            amounts: amounts.into_iter().collect(),
        }
    }

    /// Instants at or after the refill clock; time never runs backwards.
    fn instants_from(&self, state: &RateState) -> impl Iterator<Item = u64> + '_ {
        self.instants.range(state.last_refill_ns..).copied()
    }
}

impl SystemModel for RateModel {
    type Operation = RateOp;
    type State = RateState;

    fn transitions(
        &self,
        state: &RateState,
        thread: ThreadId,
    ) -> Result<Vec<(RateOp, RateState)>, PluginError> {
        let mut transitions = Vec::new();

        if let Some(&amount) = state.waiting.get(&thread) {
            for at_ns in self.instants_from(state) {
                let mut next = state.refilled(at_ns);
                if covers(next.tokens, amount) {
                    next.tokens = take(next.tokens, amount);
                    next.waiting.remove(&thread);
                    transitions.push((
                        RateOp::AcquireSuccess {
                            thread,
                            amount,
                            at_ns,
                        },
                        next,
                    ));
                }
            }
            return Ok(transitions);
        }

        for at_ns in self.instants_from(state) {
            let refilled = state.refilled(at_ns);
            transitions.push((RateOp::Observe { thread, at_ns }, refilled.clone()));

            for &amount in &self.amounts {
                let mut next = refilled.clone();
                let op = if covers(next.tokens, amount) {
                    next.tokens = take(next.tokens, amount);
                    RateOp::Acquire {
                        thread,
                        amount,
                        at_ns,
                    }
                } else {
                    next.waiting.insert(thread, amount);
                    RateOp::Blocked {
                        thread,
                        amount,
                        at_ns,
                    }
                };
                transitions.push((op, next));
            }
        }
        Ok(transitions)
    }

    fn candidate_threads(&self, from: &RateState, to: &RateState) -> Vec<ThreadId> {
        let mut named: BTreeSet<ThreadId> =
            from.waiting.keys().chain(to.waiting.keys()).copied().collect();
        named.insert(fresh_thread(named.iter().copied()));
        named.into_iter().collect()
    }
}

/// Plug-in for the token-bucket rate limiter.
#[derive(Debug, Clone, Copy, Default)]
pub struct RateLimiter;

impl Domain for RateLimiter {
    const ID: &'static str = "rate_limiter";

    type Operation = RateOp;
    type State = RateState;
    type Model = RateModel;

    fn model_for(trace: &RateTrace) -> RateModel {
        let mut model = RateModel::default();
        for entry in trace {
            model.instants.insert(entry.op.at_ns());
            model.instants.insert(entry.state.last_refill_ns);
            model.amounts.extend(entry.op.amount());
            model.amounts.extend(entry.state.waiting.values().copied());
        }
        model
    }

    fn check_schema(state: &RateState) -> Result<(), String> {
        if state.capacity == 0 {
            return Err("bucket capacity must be positive".to_string());
        }
        if i64::try_from(state.capacity).is_err() {
            return Err(format!("bucket capacity {} out of range", state.capacity));
        }
        Ok(())
    }

    fn check_properties(
        trace: &RateTrace,
        config: &CheckConfig,
    ) -> Result<Vec<PropertyResult>, PluginError> {
        RateLimiterPropertyChecker::new(trace)
            .with_liveness_bound(config.liveness_bound)
            .check_all()
    }
}
