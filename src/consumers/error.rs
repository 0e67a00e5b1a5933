use crate::declarations::ConfigurationError;

/// The broker could not be reached, or refused to set up the consumer.
#[derive(thiserror::Error, Debug)]
#[error("Failed to set up a RabbitMq consumer for queue `{queue_name}`.")]
pub struct ConnectionError {
    pub queue_name: String,
    #[source]
    pub source: anyhow::Error,
}

impl ConnectionError {
    pub fn new<Q: Into<String>, E: Into<anyhow::Error>>(queue_name: Q, source: E) -> Self {
        Self {
            queue_name: queue_name.into(),
            source: source.into(),
        }
    }
}

/// Why a [`ConsumerBinding`](crate::consumers::ConsumerBinding) could not be created.
#[derive(thiserror::Error, Debug)]
pub enum BindingError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

impl BindingError {
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}
