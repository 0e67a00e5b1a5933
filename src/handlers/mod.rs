//! Business handlers and how they are matched to queue declarations.
pub use error::{ErrorType, HandlerError};
pub use handler::{BrokerAction, QueueHandler};
pub use incoming::{Delivery, Incoming};
pub use matcher::{match_handler, HandlerMatch};

mod error;
mod handler;
mod incoming;
mod matcher;
