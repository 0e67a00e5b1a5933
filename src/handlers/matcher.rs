use crate::declarations::QueueDeclaration;
use crate::handlers::QueueHandler;
use std::sync::Arc;

/// The result of looking for the handler responsible for a declaration.
pub struct HandlerMatch {
    /// The first registered handler claiming the declaration, if any.
    pub selected: Option<Arc<dyn QueueHandler>>,
    /// Every other handler that claimed the declaration, in registration order.
    pub discarded: Vec<Arc<dyn QueueHandler>>,
}

impl HandlerMatch {
    /// `true` if more than one handler claimed the declaration.
    pub fn is_ambiguous(&self) -> bool {
        !self.discarded.is_empty()
    }
}

/// Find the handler that claims `declaration`.
///
/// Handlers are asked in registration order and the first claimant wins.
/// Later claimants are discarded with a warning: one queue is consumed by one handler.
pub fn match_handler(
    declaration: &QueueDeclaration,
    handlers: &[Arc<dyn QueueHandler>],
) -> HandlerMatch {
    let mut claimants = handlers
        .iter()
        .filter(|handler| handler.claims(declaration))
        .cloned();

    let selected = claimants.next();
    let discarded: Vec<_> = claimants.collect();

    if let Some(winner) = &selected {
        for handler in &discarded {
            tracing::warn!(
                queue_name = %declaration.queue_name,
                selected = winner.name(),
                discarded = handler.name(),
                "More than one handler claims the queue, keeping the first registered one"
            );
        }
    }

    HandlerMatch {
        selected,
        discarded,
    }
}
