//! The startup procedure binding declared queues to handlers.
pub use report::{AmbiguousClaim, DeclarationOutcome, StartupReport, UnboundReport};

mod report;

use crate::consumers::{container_name, ConsumerBindings, ContainerFactory};
use crate::declarations::{QueueDeclaration, QueueRegistry};
use crate::handlers::{match_handler, QueueHandler};
use std::sync::Arc;

/// What the host hands over to the orchestrator: who we are and which handlers exist.
pub struct BindingContext {
    application_name: String,
    handlers: Vec<Arc<dyn QueueHandler>>,
}

impl BindingContext {
    pub fn new<T: Into<String>>(application_name: T) -> Self {
        Self {
            application_name: application_name.into(),
            handlers: Vec::new(),
        }
    }

    /// Register a handler. Registration order breaks ties between handlers claiming the
    /// same queue: the first registered one wins.
    #[must_use]
    pub fn with_handler<H: QueueHandler>(self, handler: H) -> Self {
        self.with_dyn_handler(Arc::new(handler))
    }

    #[must_use]
    pub fn with_dyn_handler(mut self, handler: Arc<dyn QueueHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn application_name(&self) -> &str {
        &self.application_name
    }

    pub fn handlers(&self) -> &[Arc<dyn QueueHandler>] {
        &self.handlers
    }
}

/// Startup failed as a whole.
#[derive(thiserror::Error, Debug)]
pub enum StartupError {
    #[error("RabbitMq is unreachable: no consumer could be started for queues {failed_queues:?}.")]
    BrokerUnreachable { failed_queues: Vec<String> },
}

/// Drives the binding of every declaration of a [`QueueRegistry`].
///
/// For each declaration, in registry order:
///
/// 1. dead-letter queues are skipped;
/// 2. declarations owned by another application are skipped;
/// 3. queues whose binding is still running are left alone, exited bindings are replaced;
/// 4. the first registered handler claiming the declaration is selected;
/// 5. the [`ContainerFactory`] starts the consumer, and the binding is added to the
///    host's [`ConsumerBindings`].
///
/// A declaration that fails to bind does not prevent the others from binding.
pub struct BindingOrchestrator<F> {
    context: BindingContext,
    registry: QueueRegistry,
    factory: F,
}

impl<F: ContainerFactory> BindingOrchestrator<F> {
    pub fn new(context: BindingContext, registry: QueueRegistry, factory: F) -> Self {
        Self {
            context,
            registry,
            factory,
        }
    }

    pub fn registry(&self) -> &QueueRegistry {
        &self.registry
    }

    /// Bind every eligible declaration, adding the started bindings to `bindings`.
    ///
    /// Running it again against the same `bindings` never starts a second consumer for a
    /// queue whose consumer is still running; bindings whose consumer has exited are
    /// replaced. Queues without a handler are logged once, as a single warning, at the end.
    ///
    /// Fails with [`StartupError::BrokerUnreachable`] if consumers could not be started
    /// because the broker was unreachable and no binding is running afterwards.
    #[tracing::instrument(
        skip_all,
        name = "binding_orchestrator_run",
        fields(application = %self.context.application_name)
    )]
    pub async fn run(
        &self,
        bindings: &mut ConsumerBindings,
    ) -> Result<StartupReport, StartupError> {
        let mut report = StartupReport::default();
        for declaration in self.registry.list_all() {
            let outcome = self.bind(declaration, bindings, &mut report).await;
            report.record(&declaration.queue_name, outcome);
        }

        let unbound = report.unbound();
        if !unbound.is_empty() {
            tracing::warn!(queues = %unbound, "No consumers in the current queues");
        }

        let failed_queues: Vec<String> = report
            .failures()
            .filter(|(_, error)| error.is_connection_error())
            .map(|(queue_name, _)| queue_name.to_owned())
            .collect();
        if !failed_queues.is_empty() && bindings.running().next().is_none() {
            tracing::error!(queues = ?failed_queues, "No consumer could reach RabbitMq");
            return Err(StartupError::BrokerUnreachable { failed_queues });
        }

        tracing::info!(
            bound = report.bound().len(),
            live = bindings.running().count(),
            "Queue bindings started"
        );
        Ok(report)
    }

    async fn bind(
        &self,
        declaration: &QueueDeclaration,
        bindings: &mut ConsumerBindings,
        report: &mut StartupReport,
    ) -> DeclarationOutcome {
        let queue_name = declaration.queue_name.as_str();
        if declaration.is_dead_letter() {
            return DeclarationOutcome::SkippedDeadLetter;
        }
        if !declaration.is_owned_by(&self.context.application_name) {
            return DeclarationOutcome::SkippedNotOwned;
        }
        match bindings.get_by_queue(queue_name).map(|b| b.is_running()) {
            Some(true) => {
                return DeclarationOutcome::AlreadyBound {
                    container_name: container_name(queue_name),
                };
            }
            // The consumer has exited: drop the stale entry and bind the queue again.
            Some(false) => match bindings.stop(&container_name(queue_name)).await {
                Ok(_) => tracing::info!(queue_name, "Consumer had exited, starting it again"),
                Err(error) => tracing::warn!(
                    queue_name,
                    error = ?error,
                    "Consumer had exited with an error, starting it again"
                ),
            },
            None => {}
        }

        let matched = match_handler(declaration, &self.context.handlers);
        let Some(handler) = matched.selected else {
            return DeclarationOutcome::Unbound;
        };
        if !matched.discarded.is_empty() {
            report.record_ambiguous_claim(AmbiguousClaim {
                queue_name: queue_name.to_owned(),
                selected: handler.name().to_owned(),
                discarded: matched
                    .discarded
                    .iter()
                    .map(|h| h.name().to_owned())
                    .collect(),
            });
        }

        tracing::info!(queue_name, handler = handler.name(), "Starting queue consumer");
        let dead_letter = self.registry.dead_letter_queue_for(queue_name);
        match self
            .factory
            .create_and_start(declaration, dead_letter, handler)
            .await
        {
            Ok(binding) => {
                let container_name = binding.container_name().to_owned();
                bindings.insert(binding);
                DeclarationOutcome::Bound { container_name }
            }
            Err(error) => {
                tracing::error!(queue_name, error = ?error, "Failed to start the consumer");
                DeclarationOutcome::Failed(error)
            }
        }
    }
}
