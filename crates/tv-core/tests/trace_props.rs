//! Property-based tests over generated traces.

use proptest::prelude::*;

use tv_core::domains::bounded_queue::{QueueOp, QueueState};
use tv_core::domains::BoundedQueue;
use tv_core::temporal::{always, eventually, pairwise};
use tv_core::{check, from_ndjson, safe, to_ndjson, CheckConfig, Trace, TraceEntry, TraceRecorder};

fn proptest_cases() -> u32 {
    std::env::var("TV_PROPTEST_CASES")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(100)
}

#[derive(Debug, Clone)]
enum Action {
    Put(u64, String),
    Get(u64),
}

fn action() -> impl Strategy<Value = Action> {
    prop_oneof![
        (0u64..4, "[A-D]").prop_map(|(t, item)| Action::Put(t, item)),
        (0u64..4).prop_map(Action::Get),
    ]
}

/// Drive a reference blocking queue. Actions of a blocked thread retry its
/// pending operation and are dropped while it still cannot proceed.
fn simulate(actions: &[Action], capacity: usize) -> Trace<QueueOp, QueueState> {
    let mut state = QueueState::empty(capacity);
    let mut recorder = TraceRecorder::new();

    for action in actions {
        let thread = match action {
            Action::Put(t, _) | Action::Get(t) => *t,
        };

        let op = if let Some(item) = state.blocked_producers.get(&thread).cloned() {
            if state.is_full() {
                continue;
            }
            state.blocked_producers.remove(&thread);
            state.buffer.push(item.clone());
            QueueOp::PutSuccess { thread, item }
        } else if state.blocked_consumers.contains(&thread) {
            if state.buffer.is_empty() {
                continue;
            }
            state.blocked_consumers.remove(&thread);
            let item = state.buffer.remove(0);
            QueueOp::GetSuccess { thread, item }
        } else {
            match action {
                Action::Put(_, item) if state.is_full() => {
                    state.blocked_producers.insert(thread, item.clone());
                    QueueOp::PutBlocked {
                        thread,
                        item: item.clone(),
                    }
                }
                Action::Put(_, item) => {
                    state.buffer.push(item.clone());
                    QueueOp::Put {
                        thread,
                        item: item.clone(),
                    }
                }
                Action::Get(_) if state.buffer.is_empty() => {
                    state.blocked_consumers.insert(thread);
                    QueueOp::GetBlocked { thread }
                }
                Action::Get(_) => {
                    let item = state.buffer.remove(0);
                    QueueOp::Get { thread, item }
                }
            }
        };
        recorder.record(op, state.clone());
    }

    recorder.finish()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(proptest_cases()))]

    #[test]
    fn prop_reference_queue_is_valid_and_safe(
        actions in prop::collection::vec(action(), 0..40),
        capacity in 1usize..4,
    ) {
        let trace = simulate(&actions, capacity);
        let verdict = check::<BoundedQueue>(&trace, &CheckConfig::default()).unwrap();

        prop_assert!(verdict.valid(), "{}", verdict.format_report());
        prop_assert!(verdict.safe(), "{}", verdict.format_report());
    }

    #[test]
    fn prop_ndjson_round_trip(
        actions in prop::collection::vec(action(), 0..40),
        capacity in 1usize..4,
    ) {
        let trace = simulate(&actions, capacity);
        let text = to_ndjson(&trace).unwrap();
        let decoded = from_ndjson::<BoundedQueue>(&text, usize::MAX).unwrap();
        prop_assert_eq!(decoded, trace);
    }

    #[test]
    fn prop_verdict_is_idempotent(
        actions in prop::collection::vec(action(), 0..30),
        capacity in 1usize..3,
    ) {
        let trace = simulate(&actions, capacity);
        let first = check::<BoundedQueue>(&trace, &CheckConfig::default()).unwrap();
        let second = check::<BoundedQueue>(&trace, &CheckConfig::default()).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_safety_is_prefix_closed(
        actions in prop::collection::vec(action(), 0..30),
        capacity in 1usize..3,
        cut in 0usize..30,
    ) {
        let trace = simulate(&actions, capacity);
        if safe::<BoundedQueue>(&trace).unwrap() {
            prop_assert!(safe::<BoundedQueue>(&trace.prefix(cut)).unwrap());
        }
    }

    #[test]
    fn prop_short_traces(values in prop::collection::vec(-5i32..5, 0..=1)) {
        let trace: Trace<i32, i32> = values.iter().map(|&v| TraceEntry::new(v, v)).collect();

        prop_assert!(always(&trace, |_| true).holds());
        prop_assert_eq!(always(&trace, |e| e.state > 0).holds(), values.iter().all(|&v| v > 0));
        prop_assert_eq!(eventually(&trace, |e| e.state > 0).holds(), values.iter().any(|&v| v > 0));
        prop_assert!(pairwise(&trace, |_, _| false).holds());
    }

    #[test]
    fn prop_first_failure_is_minimal(values in prop::collection::vec(-5i32..5, 0..20)) {
        let trace: Trace<i32, i32> = values.iter().map(|&v| TraceEntry::new(v, v)).collect();
        let expected = values.iter().position(|&v| v < 0);
        let reported = always(&trace, |e| e.state >= 0).witness().map(|w| w.indices()[0]);
        prop_assert_eq!(reported, expected);
    }
}
