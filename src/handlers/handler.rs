use crate::declarations::QueueDeclaration;
use crate::handlers::{HandlerError, Incoming};

/// A business consumer: it claims the queues it knows how to process and processes the
/// messages delivered from them.
///
/// Implementers are registered with the [`BindingContext`](crate::orchestrator::BindingContext);
/// the [`BindingOrchestrator`](crate::orchestrator::BindingOrchestrator) asks each of them,
/// in registration order, whether they claim a declaration.
///
/// # Acknowledgement
///
/// `handle` never touches the underlying channel. On queues consumed with
/// [`AcknowledgeMode::Manual`](crate::declarations::AcknowledgeMode::Manual) the returned
/// [`BrokerAction`] (or, on failure, the [`ErrorType`](crate::handlers::ErrorType)) decides how
/// the delivery is settled with the broker, and it is settled exactly once.
/// On automatically acknowledged queues the outcome is only logged.
#[async_trait::async_trait]
pub trait QueueHandler: Send + Sync + 'static {
    /// Used in logs and diagnostics. Defaults to the type name.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// `true` if this handler is responsible for consuming `declaration`.
    fn claims(&self, declaration: &QueueDeclaration) -> bool;

    async fn handle(&self, incoming: &Incoming) -> Result<BrokerAction, HandlerError>;
}

/// assert it's object safe
type _CHECK = Box<dyn QueueHandler>;

/// How a manually acknowledged delivery is settled with the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerAction {
    /// Positive acknowledgement - the message can be removed from the queue.
    Ack,
    /// Negative acknowledgement - the message is requeued and will be delivered again.
    Nack,
    /// The message is removed from the queue without being requeued.
    /// It is routed to the dead-letter queue, if one is declared.
    Reject,
}

impl BrokerAction {
    /// The action to take for a given processing outcome.
    ///
    /// Transient failures are requeued, fatal ones are rejected.
    pub fn for_outcome(outcome: &Result<BrokerAction, HandlerError>) -> Self {
        match outcome {
            Ok(action) => *action,
            Err(e) if e.is_transient() => Self::Nack,
            Err(_) => Self::Reject,
        }
    }
}
