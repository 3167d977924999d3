//! End-to-end checks of small hand-written executions, one per domain.

use std::collections::BTreeMap;

use tv_core::domains::bounded_queue::{QueueOp, QueueState};
use tv_core::domains::lru_cache::{CacheOp, CacheState};
use tv_core::domains::rate_limiter::{RateOp, RateState};
use tv_core::domains::{BoundedQueue, LruCache, RateLimiter};
use tv_core::{check, safe, to_ndjson, CheckConfig, Registry, Trace, TraceEntry, Witness};

const SEC: u64 = 1_000_000_000;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("tv_core=debug")
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Bounded queue
// ============================================================================

fn queue(buffer: &[&str], producers: &[(u64, &str)]) -> QueueState {
    QueueState {
        buffer: buffer.iter().map(|s| s.to_string()).collect(),
        blocked_producers: producers
            .iter()
            .map(|(t, item)| (*t, item.to_string()))
            .collect::<BTreeMap<_, _>>(),
        ..QueueState::empty(2)
    }
}

/// Put A, put B, put C blocks, get A, C completes.
fn blocked_producer_trace() -> Trace<QueueOp, QueueState> {
    [
        TraceEntry::new(
            QueueOp::Put {
                thread: 1,
                item: "A".into(),
            },
            queue(&["A"], &[]),
        ),
        TraceEntry::new(
            QueueOp::Put {
                thread: 2,
                item: "B".into(),
            },
            queue(&["A", "B"], &[]),
        ),
        TraceEntry::new(
            QueueOp::PutBlocked {
                thread: 3,
                item: "C".into(),
            },
            queue(&["A", "B"], &[(3, "C")]),
        ),
        TraceEntry::new(
            QueueOp::Get {
                thread: 4,
                item: "A".into(),
            },
            queue(&["B"], &[(3, "C")]),
        ),
        TraceEntry::new(
            QueueOp::PutSuccess {
                thread: 3,
                item: "C".into(),
            },
            queue(&["B", "C"], &[]),
        ),
    ]
    .into_iter()
    .collect()
}

#[test]
fn test_queue_blocked_producer_completes() {
    init_tracing();
    let trace = blocked_producer_trace();
    let verdict = check::<BoundedQueue>(&trace, &CheckConfig::default()).unwrap();

    assert!(verdict.valid(), "{}", verdict.format_report());
    assert!(verdict.passed(), "{}", verdict.format_report());
    assert_eq!(verdict.results.len(), 7);
    assert_eq!(verdict.validity.as_ref().unwrap().witnesses, vec![0, 3, 4, 3]);
}

#[test]
fn test_queue_liveness_bound() {
    let trace = blocked_producer_trace();

    let within = check::<BoundedQueue>(&trace, &CheckConfig::default().with_liveness_bound(2)).unwrap();
    assert!(within.property("EventualCompletion").unwrap().holds);

    let tight = check::<BoundedQueue>(&trace, &CheckConfig::default().with_liveness_bound(1)).unwrap();
    let liveness = tight.property("EventualCompletion").unwrap();
    assert_eq!(liveness.witness, Some(Witness::Entry(2)));
    assert!(tight.safe());
}

#[test]
fn test_queue_mutual_exclusion_has_no_false_positives() {
    // Adjacent completions by different threads are just an interleaving.
    let trace = blocked_producer_trace();
    assert!(
        check::<BoundedQueue>(&trace, &CheckConfig::default())
            .unwrap()
            .property("MutualExclusion")
            .unwrap()
            .holds
    );
}

#[test]
fn test_queue_truncated_before_completion_violates_liveness() {
    let trace = blocked_producer_trace().prefix(4);
    let verdict = check::<BoundedQueue>(&trace, &CheckConfig::default()).unwrap();

    assert!(verdict.valid());
    assert!(verdict.safe());
    let failures: Vec<_> = verdict.failures().map(|r| r.name).collect();
    assert_eq!(failures, vec!["EventualCompletion"]);

    let report = verdict.format_report();
    assert!(report.contains("First failure: EventualCompletion"));
    assert!(report.contains("[BLOCKED]"));
}

// ============================================================================
// LRU cache
// ============================================================================

fn cache(entries: &[(&str, &str)]) -> CacheState {
    CacheState {
        entries: entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        ..CacheState::empty(2)
    }
}

fn cache_put(key: &str, value: &str, evicted: Option<&str>) -> CacheOp {
    CacheOp::Put {
        thread: 1,
        key: key.into(),
        value: value.into(),
        evicted: evicted.map(Into::into),
    }
}

#[test]
fn test_cache_get_refreshes_recency_before_eviction() {
    init_tracing();
    // put a, put b, get a, put c evicts b
    let trace: Trace<CacheOp, CacheState> = [
        TraceEntry::new(cache_put("a", "1", None), cache(&[("a", "1")])),
        TraceEntry::new(cache_put("b", "2", None), cache(&[("a", "1"), ("b", "2")])),
        TraceEntry::new(
            CacheOp::Get {
                thread: 1,
                key: "a".into(),
                value: Some("1".into()),
            },
            cache(&[("b", "2"), ("a", "1")]),
        ),
        TraceEntry::new(cache_put("c", "3", Some("b")), cache(&[("a", "1"), ("c", "3")])),
    ]
    .into_iter()
    .collect();

    let verdict = check::<LruCache>(&trace, &CheckConfig::default()).unwrap();
    assert!(verdict.passed(), "{}", verdict.format_report());

    // Evicting "a" instead is the classic recency bug.
    let mut wrong = trace.prefix(3);
    wrong = wrong.append(TraceEntry::new(
        cache_put("c", "3", Some("a")),
        cache(&[("b", "2"), ("c", "3")]),
    ));
    let verdict = check::<LruCache>(&wrong, &CheckConfig::default()).unwrap();
    assert_eq!(
        verdict.property("LruEviction").unwrap().witness,
        Some(Witness::Pair(2, 3))
    );
    assert!(!verdict.valid());
}

// ============================================================================
// Rate limiter
// ============================================================================

fn bucket(tokens: i64, last_refill_ns: u64) -> RateState {
    RateState {
        tokens,
        last_refill_ns,
        ..RateState::full(10_000, 1_000, 0)
    }
}

#[test]
fn test_rate_limiter_refill_over_two_seconds() {
    init_tracing();
    let trace: Trace<RateOp, RateState> = [
        TraceEntry::new(
            RateOp::Acquire {
                thread: 1,
                amount: 7_000,
                at_ns: 0,
            },
            bucket(3_000, 0),
        ),
        TraceEntry::new(
            RateOp::Acquire {
                thread: 2,
                amount: 1_500,
                at_ns: 2 * SEC,
            },
            bucket(3_000 + 2_000 - 1_500, 2 * SEC),
        ),
    ]
    .into_iter()
    .collect();

    let verdict = check::<RateLimiter>(&trace, &CheckConfig::default()).unwrap();
    assert!(verdict.passed(), "{}", verdict.format_report());
    assert_eq!(safe::<RateLimiter>(&trace), Ok(true));

    let last = trace.last().unwrap();
    assert!((0..=10_000).contains(&last.state.tokens));
}

// ============================================================================
// Registry round trip
// ============================================================================

#[test]
fn test_registry_checks_serialized_trace() {
    let trace = blocked_producer_trace();
    let text = to_ndjson(&trace).unwrap();

    let by_name = Registry::builtin()
        .check("bounded_queue", &text, &CheckConfig::default())
        .unwrap();
    let direct = check::<BoundedQueue>(&trace, &CheckConfig::default()).unwrap();
    assert_eq!(by_name, direct);

    let json = by_name.to_json().unwrap();
    assert!(json.contains("\"domain\": \"bounded_queue\""));
}
