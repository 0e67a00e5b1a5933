use std::fmt;

/// The error type returned by [`QueueHandler`](crate::handlers::QueueHandler)s.
#[derive(thiserror::Error, Debug)]
#[error("Handling of a message failed due to a {error_type} issue.")]
pub struct HandlerError {
    #[source]
    pub inner_error: anyhow::Error,
    pub error_type: ErrorType,
}

impl HandlerError {
    /// Processing might succeed if the message is delivered again.
    pub fn transient<E: Into<anyhow::Error>>(error: E) -> Self {
        Self {
            inner_error: error.into(),
            error_type: ErrorType::Transient,
        }
    }

    /// Processing will never succeed for this message.
    pub fn fatal<E: Into<anyhow::Error>>(error: E) -> Self {
        Self {
            inner_error: error.into(),
            error_type: ErrorType::Fatal,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.error_type == ErrorType::Transient
    }
}

/// Types of failure when handling a message.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ErrorType {
    /// E.g. a downstream API timed out. The message is requeued.
    Transient,
    /// E.g. the payload cannot be deserialized. The message is rejected.
    Fatal,
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => write!(f, "transient"),
            Self::Fatal => write!(f, "fatal"),
        }
    }
}
