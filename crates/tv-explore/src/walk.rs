//! Seeded random walks over a step model.

use tracing::debug;
use tv_core::model::SystemModel;
use tv_core::{PluginError, ThreadId, Trace, TraceRecorder};

use crate::random::DeterministicRng;

/// Generate a trace of up to `steps` entries by repeatedly picking a random
/// enabled transition of a random thread that is not blocked.
///
/// The walk stops early when every thread is blocked.
pub fn random_walk<M>(
    model: &M,
    initial: &M::State,
    threads: &[ThreadId],
    steps: usize,
    rng: &mut DeterministicRng,
) -> Result<Trace<M::Operation, M::State>, PluginError>
where
    M: SystemModel,
{
    debug_assert!(!threads.is_empty(), "random walk needs at least one thread");

    let mut recorder = TraceRecorder::new();
    let mut state = initial.clone();

    for step in 0..steps {
        let mut enabled = Vec::with_capacity(threads.len());
        for &thread in threads {
            let transitions = model.transitions(&state, thread)?;
            if !transitions.is_empty() {
                enabled.push(transitions);
            }
        }

        let Some(transitions) = rng.choose(&enabled) else {
            debug!(step, seed = rng.seed(), "every thread blocked, walk ends");
            break;
        };
        let Some((op, next)) = rng.choose(transitions).cloned() else {
            break;
        };
        recorder.record(op, next.clone());
        state = next;
    }

    Ok(recorder.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tv_core::domains::bounded_queue::{QueueModel, QueueState};

    fn queue_model() -> QueueModel {
        QueueModel::new(["A".to_string(), "B".to_string()])
    }

    #[test]
    fn test_walk_is_reproducible() {
        let model = queue_model();
        let initial = QueueState::empty(2);

        let a = random_walk(&model, &initial, &[0, 1, 2], 30, &mut DeterministicRng::new(5)).unwrap();
        let b = random_walk(&model, &initial, &[0, 1, 2], 30, &mut DeterministicRng::new(5)).unwrap();
        assert_eq!(a, b);
        assert!(a.len() <= 30);
    }

    #[test]
    fn test_walk_stops_when_all_threads_block() {
        // One thread, empty queue and nothing but gets eventually: at most it
        // can block once and then has no step.
        let model = QueueModel::new(Vec::new());
        let trace =
            random_walk(&model, &QueueState::empty(1), &[0], 10, &mut DeterministicRng::new(1)).unwrap();
        assert_eq!(trace.len(), 1);
    }
}
