//! Bounded exhaustive exploration with stateright.
//!
//! Every trace the step model can produce from an initial state, up to a
//! depth bound, is a state of the search. Each must be a valid execution and
//! satisfy every safety property; some trace must show a blocked thread
//! later completing. This is the empirical check that the model and the
//! property library agree.

use stateright::{Checker, Model, Property};
use tracing::{info, warn};
use tv_core::domain::{Domain, DomainTrace, Operation, Phase};
use tv_core::model::SystemModel;
use tv_core::{is_valid_execution, safe, ThreadId, TraceEntry};

use crate::config::ExploreConfig;

/// Property names used by [`TraceSpace`].
pub const VALID: &str = "valid";
pub const SAFE: &str = "safe";
pub const BLOCKED_THEN_COMPLETED: &str = "blocked then completed";

/// Search space of every trace of `D` up to `max_depth` entries.
pub struct TraceSpace<D: Domain> {
    model: D::Model,
    initial: D::State,
    threads: Vec<ThreadId>,
    max_depth: usize,
}

impl<D: Domain> TraceSpace<D> {
    #[must_use]
    pub fn new(model: D::Model, initial: D::State, config: &ExploreConfig) -> Self {
        Self {
            model,
            initial,
            threads: config.threads(),
            max_depth: config.max_depth,
        }
    }

    fn current<'a>(&'a self, trace: &'a DomainTrace<D>) -> &'a D::State {
        trace.last().map_or(&self.initial, |entry| &entry.state)
    }

    /// The trace with the initial state prepended as a pseudo-entry, so the
    /// first real step is checked against the model too.
    fn is_valid(&self, trace: &DomainTrace<D>) -> bool {
        let Some(first) = trace.at(0) else {
            return true;
        };
        let rooted: DomainTrace<D> = std::iter::once(TraceEntry::new(first.op.clone(), self.initial.clone()))
            .chain(trace.iter().cloned())
            .collect();
        match is_valid_execution(&rooted, &self.model) {
            Ok(validity) => validity.valid,
            Err(error) => {
                warn!(domain = D::ID, %error, "plug-in contract violation during exploration");
                false
            }
        }
    }
}

impl<D: Domain> Model for TraceSpace<D> {
    type State = DomainTrace<D>;
    type Action = TraceEntry<D::Operation, D::State>;

    fn init_states(&self) -> Vec<Self::State> {
        vec![DomainTrace::<D>::new()]
    }

    fn actions(&self, trace: &Self::State, actions: &mut Vec<Self::Action>) {
        if trace.len() >= self.max_depth {
            return;
        }
        let state = self.current(trace);
        for &thread in &self.threads {
            match self.model.transitions(state, thread) {
                Ok(transitions) => actions.extend(
                    transitions
                        .into_iter()
                        .map(|(op, next)| TraceEntry::new(op, next)),
                ),
                Err(error) => warn!(domain = D::ID, thread, %error, "no transitions"),
            }
        }
    }

    fn next_state(&self, trace: &Self::State, action: Self::Action) -> Option<Self::State> {
        Some(trace.append(action))
    }

    fn properties(&self) -> Vec<Property<Self>> {
        vec![
            Property::<Self>::always(VALID, |space: &Self, trace: &DomainTrace<D>| {
                space.is_valid(trace)
            }),
            Property::<Self>::always(SAFE, |_: &Self, trace: &DomainTrace<D>| {
                safe::<D>(trace).unwrap_or(false)
            }),
            Property::<Self>::sometimes(
                BLOCKED_THEN_COMPLETED,
                |_: &Self, trace: &DomainTrace<D>| blocked_then_completed(trace),
            ),
        ]
    }
}

/// Some thread is recorded blocked and later recorded completing that request.
pub fn blocked_then_completed<O: Operation, S>(trace: &tv_core::Trace<O, S>) -> bool {
    trace.iter().enumerate().any(|(i, blocked)| {
        blocked.op.phase() == Phase::Blocked
            && trace.entries()[i + 1..]
                .iter()
                .any(|later| later.op.completes(&blocked.op))
    })
}

/// Outcome of one exhaustive exploration.
#[derive(Debug, Clone)]
pub struct ExplorationReport<D: Domain> {
    pub unique_state_count: usize,
    pub max_depth: usize,
    /// A trace the validity checker rejected.
    pub invalid_trace: Option<DomainTrace<D>>,
    /// A trace violating a safety property.
    pub unsafe_trace: Option<DomainTrace<D>>,
    /// A trace where a blocked thread later completes.
    pub completion_example: Option<DomainTrace<D>>,
}

impl<D: Domain> ExplorationReport<D> {
    /// Every explored trace was valid and safe, and completion after
    /// blocking was reachable.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.invalid_trace.is_none() && self.unsafe_trace.is_none() && self.completion_example.is_some()
    }
}

/// Explore every trace of `D` from `initial` up to `config.max_depth`.
pub fn explore<D: Domain>(model: D::Model, initial: D::State, config: &ExploreConfig) -> ExplorationReport<D> {
    let space = TraceSpace::<D>::new(model, initial, config);
    let checker = space
        .checker()
        .threads(config.checker_threads)
        .spawn_bfs()
        .join();

    let found = |name: &'static str| checker.discovery(name).map(|path| path.last_state().clone());
    let report = ExplorationReport {
        unique_state_count: checker.unique_state_count(),
        max_depth: config.max_depth,
        invalid_trace: found(VALID),
        unsafe_trace: found(SAFE),
        completion_example: found(BLOCKED_THEN_COMPLETED),
    };

    info!(
        domain = D::ID,
        states = report.unique_state_count,
        max_depth = report.max_depth,
        passed = report.passed(),
        "exploration finished"
    );
    report
}
