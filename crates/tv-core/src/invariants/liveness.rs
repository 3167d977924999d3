//! Liveness schema shared by every domain.
//!
//! For every entry that records a blocked thread whose enabling condition
//! becomes true at some later entry, some later entry records the operation that
//! completes that request. Existence only, unless a step bound is supplied.

use crate::domain::{Operation, Phase};
use crate::error::PluginError;
use crate::temporal::{try_leads_to, Outcome};
use crate::trace::Trace;

/// Evaluate the eventual-completion schema.
///
/// `enabled(blocked_op, state)` says whether the operation recorded as
/// blocked could proceed from `state`. A thread that blocks again before
/// completing is still answered by its eventual completion.
pub fn eventual_completion<O, S, E>(
    trace: &Trace<O, S>,
    mut enabled: E,
    bound: Option<usize>,
) -> Result<Outcome, PluginError>
where
    O: Operation,
    E: FnMut(&O, &S) -> Result<bool, PluginError>,
{
    let entries = trace.entries();
    try_leads_to(
        trace,
        |(i, entry)| {
            if entry.op.phase() != Phase::Blocked {
                return Ok(false);
            }
            for later in &entries[i + 1..] {
                if enabled(&entry.op, &later.state)? {
                    return Ok(true);
                }
            }
            Ok(false)
        },
        |(_, cause), (_, effect)| Ok(effect.op.completes(&cause.op)),
        bound,
    )
}

#[cfg(test)]
mod tests {
    use std::fmt;

    use super::*;
    use crate::temporal::Witness;
    use crate::trace::{ThreadId, TraceEntry};

    #[derive(Debug, Clone)]
    struct Op(ThreadId, Phase);

    impl fmt::Display for Op {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{:?}", self.1)
        }
    }

    impl Operation for Op {
        fn thread(&self) -> ThreadId {
            self.0
        }
        fn phase(&self) -> Phase {
            self.1
        }
    }

    /// State is "resource free".
    fn trace_of(steps: &[(ThreadId, Phase, bool)]) -> Trace<Op, bool> {
        steps
            .iter()
            .map(|&(thread, phase, free)| TraceEntry::new(Op(thread, phase), free))
            .collect()
    }

    fn when_free(_op: &Op, free: &bool) -> Result<bool, PluginError> {
        Ok(*free)
    }

    #[test]
    fn test_never_enabled_is_not_required_to_complete() {
        let trace = trace_of(&[(1, Phase::Blocked, false), (2, Phase::Request, false)]);
        assert_eq!(eventual_completion(&trace, when_free, None), Ok(Outcome::Holds));
    }

    #[test]
    fn test_enabled_but_never_completed() {
        let trace = trace_of(&[
            (1, Phase::Blocked, false),
            (2, Phase::Completed, true),
            (2, Phase::Completed, true),
        ]);
        assert_eq!(
            eventual_completion(&trace, when_free, None),
            Ok(Outcome::Violated(Witness::Entry(0)))
        );
    }

    #[test]
    fn test_completion_within_bound() {
        let trace = trace_of(&[
            (1, Phase::Blocked, false),
            (2, Phase::Completed, true),
            (3, Phase::Request, true),
            (1, Phase::Completed, true),
        ]);
        assert_eq!(eventual_completion(&trace, when_free, None), Ok(Outcome::Holds));
        assert_eq!(eventual_completion(&trace, when_free, Some(3)), Ok(Outcome::Holds));
        assert_eq!(
            eventual_completion(&trace, when_free, Some(2)),
            Ok(Outcome::Violated(Witness::Entry(0)))
        );
    }
}
