use crate::consumers::BindingError;
use std::fmt;

/// What happened to a declaration during a [`BindingOrchestrator::run`].
///
/// [`BindingOrchestrator::run`]: crate::orchestrator::BindingOrchestrator::run
#[derive(Debug)]
pub enum DeclarationOutcome {
    /// The declaration is a dead-letter queue and is never consumed.
    SkippedDeadLetter,
    /// The declaration belongs to another deployable unit.
    SkippedNotOwned,
    /// No handler claims the declaration.
    Unbound,
    /// The binding for the queue was still running; nothing was started.
    AlreadyBound { container_name: String },
    /// A consumer was started and published under `container_name`.
    Bound { container_name: String },
    /// The consumer could not be started.
    Failed(BindingError),
}

/// Two or more handlers claimed the same queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbiguousClaim {
    pub queue_name: String,
    /// The handler the queue was bound to.
    pub selected: String,
    pub discarded: Vec<String>,
}

/// The outcome of a startup run, one entry per declaration in registry order.
#[derive(Debug, Default)]
pub struct StartupReport {
    outcomes: Vec<(String, DeclarationOutcome)>,
    ambiguous_claims: Vec<AmbiguousClaim>,
}

impl StartupReport {
    pub(crate) fn record(&mut self, queue_name: &str, outcome: DeclarationOutcome) {
        self.outcomes.push((queue_name.to_owned(), outcome));
    }

    pub(crate) fn record_ambiguous_claim(&mut self, claim: AmbiguousClaim) {
        self.ambiguous_claims.push(claim);
    }

    pub fn outcomes(&self) -> impl Iterator<Item = (&str, &DeclarationOutcome)> {
        self.outcomes
            .iter()
            .map(|(queue_name, outcome)| (queue_name.as_str(), outcome))
    }

    pub fn outcome(&self, queue_name: &str) -> Option<&DeclarationOutcome> {
        self.outcomes()
            .find(|(name, _)| *name == queue_name)
            .map(|(_, outcome)| outcome)
    }

    /// Container names of the bindings started by this run.
    pub fn bound(&self) -> Vec<&str> {
        self.outcomes()
            .filter_map(|(_, outcome)| match outcome {
                DeclarationOutcome::Bound { container_name } => Some(container_name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// The owned, consumable declarations no handler claimed.
    pub fn unbound(&self) -> UnboundReport {
        UnboundReport {
            queue_names: self
                .outcomes()
                .filter(|(_, outcome)| matches!(outcome, DeclarationOutcome::Unbound))
                .map(|(queue_name, _)| queue_name.to_owned())
                .collect(),
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &BindingError)> {
        self.outcomes().filter_map(|(queue_name, outcome)| match outcome {
            DeclarationOutcome::Failed(error) => Some((queue_name, error)),
            _ => None,
        })
    }

    pub fn ambiguous_claims(&self) -> &[AmbiguousClaim] {
        &self.ambiguous_claims
    }
}

/// The eligible queues left without a handler. A warning, never an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnboundReport {
    queue_names: Vec<String>,
}

impl UnboundReport {
    pub fn queue_names(&self) -> &[String] {
        &self.queue_names
    }

    pub fn is_empty(&self) -> bool {
        self.queue_names.is_empty()
    }
}

impl fmt::Display for UnboundReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.queue_names.join(", "))
    }
}
