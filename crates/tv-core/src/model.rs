//! Abstract system model: the per-domain "legal step" relation.
//!
//! A model answers one question: from `state`, which states can `thread`
//! reach in one atomic step? An empty answer means the thread is blocked.
//! The model never schedules; it only certifies that an observed transition
//! is admissible for *some* thread.

use crate::error::PluginError;
use crate::trace::ThreadId;

/// Step relation of one domain.
///
/// Implementors provide labelled transitions; the unlabelled step set and
/// the transition check are derived from them.
pub trait SystemModel {
    type Operation: Clone;
    type State: Clone + PartialEq;

    /// Every `(operation, next_state)` that `thread` can produce from `state`
    /// in one atomic step. Empty when the thread is blocked.
    fn transitions(
        &self,
        state: &Self::State,
        thread: ThreadId,
    ) -> Result<Vec<(Self::Operation, Self::State)>, PluginError>;

    /// Finite set of thread ids that could witness `from -> to`.
    ///
    /// Threads are interchangeable except where a state names them, so the
    /// threads named in either state plus one representative idle thread
    /// cover every possible witness.
    fn candidate_threads(&self, from: &Self::State, to: &Self::State) -> Vec<ThreadId>;

    /// States reachable by one atomic step of `thread`.
    fn step(&self, state: &Self::State, thread: ThreadId) -> Result<Vec<Self::State>, PluginError> {
        Ok(self
            .transitions(state, thread)?
            .into_iter()
            .map(|(_, next)| next)
            .collect())
    }

    /// Whether `thread` has no enabled step from `state`.
    fn is_blocked(&self, state: &Self::State, thread: ThreadId) -> Result<bool, PluginError> {
        Ok(self.step(state, thread)?.is_empty())
    }

    /// A thread whose step set from `from` contains `to`, if any.
    fn valid_transition(
        &self,
        from: &Self::State,
        to: &Self::State,
    ) -> Result<Option<ThreadId>, PluginError> {
        for thread in self.candidate_threads(from, to) {
            if self.step(from, thread)?.iter().any(|next| next == to) {
                return Ok(Some(thread));
            }
        }
        Ok(None)
    }
}

/// Smallest thread id strictly greater than every id in `named`.
///
/// Used by models to pick the representative idle thread.
#[must_use]
pub fn fresh_thread<I>(named: I) -> ThreadId
where
    I: IntoIterator<Item = ThreadId>,
{
    named
        .into_iter()
        .max()
        .map_or(0, |max| max.saturating_add(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Counter that only thread 0 may increment, up to 2.
    struct Counter;

    impl SystemModel for Counter {
        type Operation = &'static str;
        type State = u8;

        fn transitions(
            &self,
            state: &u8,
            thread: ThreadId,
        ) -> Result<Vec<(&'static str, u8)>, PluginError> {
            if thread == 0 && *state < 2 {
                Ok(vec![("inc", state + 1)])
            } else {
                Ok(Vec::new())
            }
        }

        fn candidate_threads(&self, _from: &u8, _to: &u8) -> Vec<ThreadId> {
            vec![0, 1]
        }
    }

    #[test]
    fn test_valid_transition_finds_witness() {
        assert_eq!(Counter.valid_transition(&0, &1), Ok(Some(0)));
        assert_eq!(Counter.valid_transition(&0, &2), Ok(None));
        assert_eq!(Counter.valid_transition(&2, &3), Ok(None));
    }

    #[test]
    fn test_empty_step_set_is_blocked() {
        assert_eq!(Counter.is_blocked(&2, 0), Ok(true));
        assert_eq!(Counter.is_blocked(&1, 0), Ok(false));
        assert_eq!(Counter.is_blocked(&0, 1), Ok(true));
    }

    #[test]
    fn test_fresh_thread() {
        assert_eq!(fresh_thread(Vec::new()), 0);
        assert_eq!(fresh_thread(vec![3, 1, 7]), 8);
    }
}
