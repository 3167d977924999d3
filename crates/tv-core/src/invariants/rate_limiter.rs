//! Token-bucket rate limiter properties.
//!
//! | Property | Kind | Description |
//! |----------|------|-------------|
//! | NonNegativeTokens | safety | the bucket never goes below zero |
//! | CapacityBound | safety | the bucket never exceeds capacity |
//! | RefillAccounting | safety | each step refills exactly, then subtracts what it consumed |
//! | RateEnforcement | safety | consumption over any window is covered by refill plus the starting level |
//! | MonotonicTime | safety | operation timestamps never decrease |
//! | BlockingSound | safety | an acquirer blocks only when the bucket cannot cover it |
//! | EventualCompletion | liveness | a blocked acquirer completes once enough tokens appear |

use crate::domains::rate_limiter::{refill, RateOp, RateState, RateTrace};
use crate::error::PluginError;
use crate::invariants::liveness::eventual_completion;
use crate::property::{PropertyChecker, PropertyKind, PropertyResult};
use crate::temporal::{always, always_step, pairwise, Witness};

/// Property checker for one rate limiter trace.
pub struct RateLimiterPropertyChecker<'a> {
    trace: &'a RateTrace,
    liveness_bound: Option<usize>,
}

impl<'a> RateLimiterPropertyChecker<'a> {
    #[must_use]
    pub fn new(trace: &'a RateTrace) -> Self {
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

    fn check_non_negative_tokens(&self) -> PropertyResult {
        let outcome = always(self.trace, |e| e.state.tokens >= 0);
        PropertyResult::from_outcome(
            "NonNegativeTokens",
            PropertyKind::Safety,
            outcome,
            self.trace,
            |w| match w {
                Witness::Entry(i) => format!("entry {}: token count is negative", i),
                _ => "token count is negative".to_string(),
            },
        )
    }

    fn check_capacity_bound(&self) -> PropertyResult {
        let outcome = always(self.trace, |e| {
            i128::from(e.state.tokens) <= i128::from(e.state.capacity)
        });
        PropertyResult::from_outcome(
            "CapacityBound",
            PropertyKind::Safety,
            outcome,
            self.trace,
            |w| match w {
                Witness::Entry(i) => format!("entry {}: token count exceeds capacity", i),
                _ => "token count exceeds capacity".to_string(),
            },
        )
    }

    /// `tokens' = min(capacity, tokens + refill(rate, Δt)) - consumed`, and the
    /// refill clock moves to the operation time.
    fn check_refill_accounting(&self) -> PropertyResult {
        let outcome = always_step(self.trace, |prev, next| {
            let at_ns = next.op.at_ns();
            let expected = i128::from(prev.state.level_at(at_ns)) - i128::from(next.op.consumed());
            i128::from(next.state.tokens) == expected && next.state.last_refill_ns == at_ns
        });
        PropertyResult::from_outcome(
            "RefillAccounting",
            PropertyKind::Safety,
            outcome,
            self.trace,
            |w| match w {
                Witness::Pair(i, j) => {
                    let detail = self.accounting_detail(i, j).unwrap_or_default();
                    format!("entry {}: token count does not follow from entry {}{}", j, i, detail)
                }
                _ => "token count does not follow from refill".to_string(),
            },
        )
    }

    fn accounting_detail(&self, i: usize, j: usize) -> Option<String> {
        let prev = self.trace.at(i)?;
        let next = self.trace.at(j)?;
        let at_ns = next.op.at_ns();
        Some(format!(
            " (expected {}, found {})",
            i128::from(prev.state.level_at(at_ns)) - i128::from(next.op.consumed()),
            next.state.tokens
        ))
    }

    /// Consumed in `(i, j]` never exceeds `refill(t_j - t_i) + tokens_i`.
    fn check_rate_enforcement(&self) -> PropertyResult {
        // consumed_upto[k] = total consumed by entries 0..k
        let mut consumed_upto = Vec::with_capacity(self.trace.len() + 1);
        consumed_upto.push(0u128);
        for entry in self.trace {
            let total = consumed_upto.last().copied().unwrap_or(0);
            consumed_upto.push(total + u128::from(entry.op.consumed()));
        }

        let outcome = pairwise(self.trace, |(i, first), (j, last)| {
            let consumed = consumed_upto[j + 1] - consumed_upto[i + 1];
            let elapsed = last.op.at_ns().saturating_sub(first.op.at_ns());
            let allowance =
                i128::from(refill(first.state.rate, elapsed)) + i128::from(first.state.tokens);
            i128::try_from(consumed).map_or(false, |consumed| consumed <= allowance)
        });
        PropertyResult::from_outcome(
            "RateEnforcement",
            PropertyKind::Safety,
            outcome,
            self.trace,
            |w| match w {
                Witness::Pair(i, j) => format!(
                    "entries {}..={}: consumed more than refill plus the level at entry {}",
                    i + 1,
                    j,
                    i
                ),
                _ => "rate exceeded".to_string(),
            },
        )
    }

    fn check_monotonic_time(&self) -> PropertyResult {
        let outcome = always_step(self.trace, |prev, next| prev.op.at_ns() <= next.op.at_ns());
        PropertyResult::from_outcome(
            "MonotonicTime",
            PropertyKind::Safety,
            outcome,
            self.trace,
            |w| match w {
                Witness::Pair(_, j) => format!("entry {}: timestamp runs backwards", j),
                _ => "timestamp runs backwards".to_string(),
            },
        )
    }

    fn check_blocking_sound(&self) -> PropertyResult {
        let outcome = always(self.trace, |e| match e.op {
            RateOp::Blocked { amount, .. } => i128::from(e.state.tokens) < i128::from(amount),
            _ => true,
        });
        PropertyResult::from_outcome(
            "BlockingSound",
            PropertyKind::Safety,
            outcome,
            self.trace,
            |w| match w {
                Witness::Entry(i) => format!("entry {}: acquirer blocked with enough tokens", i),
                _ => "acquirer blocked with enough tokens".to_string(),
            },
        )
    }

    fn check_eventual_completion(&self) -> Result<PropertyResult, PluginError> {
        let outcome = eventual_completion(self.trace, enabling_condition, self.liveness_bound)?;
        Ok(PropertyResult::from_outcome(
            "EventualCompletion",
            PropertyKind::Liveness,
            outcome,
            self.trace,
            |w| match w {
                Witness::Entry(i) => format!(
                    "acquirer blocked at entry {} saw enough tokens but never completed",
                    i
                ),
                _ => "blocked acquirer never completed".to_string(),
            },
        ))
    }
}

impl PropertyChecker for RateLimiterPropertyChecker<'_> {
    fn check_all(&self) -> Result<Vec<PropertyResult>, PluginError> {
        Ok(vec![
            self.check_non_negative_tokens(),
            self.check_capacity_bound(),
            self.check_refill_accounting(),
            self.check_rate_enforcement(),
            self.check_monotonic_time(),
            self.check_blocking_sound(),
            self.check_eventual_completion()?,
        ])
    }
}

fn enabling_condition(op: &RateOp, state: &RateState) -> Result<bool, PluginError> {
    let amount = op.pending_amount()?;
    Ok(i128::from(state.tokens) >= i128::from(amount))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::trace::TraceEntry;

    const SEC: u64 = 1_000_000_000;

    fn bucket(tokens: i64, last_refill_ns: u64) -> RateState {
        RateState {
            tokens,
            last_refill_ns,
            ..RateState::full(10_000, 1_000, 0)
        }
    }

    fn acquire(thread: u64, amount: u64, at_ns: u64) -> RateOp {
        RateOp::Acquire {
            thread,
            amount,
            at_ns,
        }
    }

    fn results(trace: &RateTrace) -> BTreeMap<&'static str, PropertyResult> {
        RateLimiterPropertyChecker::new(trace)
            .check_all()
            .unwrap()
            .into_iter()
            .map(|r| (r.name, r))
            .collect()
    }

    #[test]
    fn test_refill_then_consume() {
        // 2 s at 1 token/s refills 2 tokens; consuming 1.5 leaves +0.5.
        let trace: RateTrace = [
            TraceEntry::new(acquire(1, 5_000, 0), bucket(3_000, 0)),
            TraceEntry::new(acquire(2, 1_500, 2 * SEC), bucket(3_500, 2 * SEC)),
        ]
        .into_iter()
        .collect();
        let results = results(&trace);
        assert!(results.values().all(|r| r.holds), "{:?}", results);
    }

    #[test]
    fn test_rounding_up_refill_is_caught() {
        // A third of a second at 1 token/s refills 333 units, not 334.
        let trace: RateTrace = [
            TraceEntry::new(acquire(1, 10_000, 0), bucket(0, 0)),
            TraceEntry::new(
                RateOp::Observe {
                    thread: 1,
                    at_ns: SEC / 3,
                },
                bucket(334, SEC / 3),
            ),
        ]
        .into_iter()
        .collect();
        let results = results(&trace);
        assert_eq!(results["RefillAccounting"].witness, Some(Witness::Pair(0, 1)));
        assert!(results["NonNegativeTokens"].holds);
    }

    #[test]
    fn test_burst_beyond_rate_is_caught() {
        let trace: RateTrace = [
            TraceEntry::new(acquire(1, 9_000, 0), bucket(1_000, 0)),
            TraceEntry::new(acquire(2, 1_000, 1), bucket(0, 1)),
            TraceEntry::new(acquire(3, 1_000, 2), bucket(0, 2)),
        ]
        .into_iter()
        .collect();
        let results = results(&trace);
        assert_eq!(results["RateEnforcement"].witness, Some(Witness::Pair(0, 2)));
        assert!(!results["RefillAccounting"].holds);
    }

    #[test]
    fn test_time_runs_backwards() {
        let trace: RateTrace = [
            TraceEntry::new(RateOp::Observe { thread: 1, at_ns: SEC }, bucket(10_000, SEC)),
            TraceEntry::new(RateOp::Observe { thread: 1, at_ns: 0 }, bucket(10_000, 0)),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            results(&trace)["MonotonicTime"].witness,
            Some(Witness::Pair(0, 1))
        );
    }

    #[test]
    fn test_starved_acquirer() {
        let mut waiting = bucket(500, 0);
        waiting.waiting.insert(1, 1_000);
        let mut refilled = bucket(1_500, SEC);
        refilled.waiting.insert(1, 1_000);

        let trace: RateTrace = [
            TraceEntry::new(
                RateOp::Blocked {
                    thread: 1,
                    amount: 1_000,
                    at_ns: 0,
                },
                waiting,
            ),
            TraceEntry::new(RateOp::Observe { thread: 2, at_ns: SEC }, refilled),
        ]
        .into_iter()
        .collect();
        let results = results(&trace);
        assert!(results["BlockingSound"].holds);
        assert_eq!(
            results["EventualCompletion"].witness,
            Some(Witness::Entry(0))
        );
    }

    #[test]
    fn test_observe_does_not_answer_blocked_acquire() {
        let mut waiting = bucket(500, 0);
        waiting.waiting.insert(1, 1_000);
        let mut refilled = bucket(1_500, SEC);
        refilled.waiting.insert(1, 1_000);
        let blocked = RateOp::Blocked {
            thread: 1,
            amount: 1_000,
            at_ns: 0,
        };

        let observed: RateTrace = [
            TraceEntry::new(blocked.clone(), waiting.clone()),
            TraceEntry::new(RateOp::Observe { thread: 1, at_ns: SEC }, refilled.clone()),
        ]
        .into_iter()
        .collect();
        assert!(!results(&observed)["EventualCompletion"].holds);

        let served: RateTrace = [
            TraceEntry::new(blocked, waiting),
            TraceEntry::new(RateOp::Observe { thread: 2, at_ns: SEC }, refilled),
            TraceEntry::new(
                RateOp::AcquireSuccess {
                    thread: 1,
                    amount: 1_000,
                    at_ns: SEC,
                },
                bucket(500, SEC),
            ),
        ]
        .into_iter()
        .collect();
        assert!(results(&served)["EventualCompletion"].holds);
    }
}
