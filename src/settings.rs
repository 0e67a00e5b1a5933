//! The configuration of a deployable unit that consumes queues.
use crate::amqp::configuration::RabbitMqSettings;
use crate::declarations::{ConfigurationError, QueueDeclaration, QueueRegistry};
use serde::Deserialize;

const DEFAULT_CONNECTION_POOL_SIZE: usize = 1;

/// Everything needed to bind the queues of a process, usually deserialized from the host's
/// configuration source.
///
/// ```rust
/// use carrot_binder::settings::BinderSettings;
///
/// let settings: BinderSettings = serde_json::from_str(r#"{
///     "application_name": "svc-a",
///     "rabbitmq": { "host": "localhost", "port": 5672 },
///     "queues": [
///         {
///             "queue_name": "orders",
///             "owned_application": "svc-a",
///             "consumer": { "prefetch_count": 10, "concurrent_consumers": 2, "manual_acknowledge": true }
///         },
///         { "queue_name": "orders.dlq", "owned_application": "svc-a", "dead_letter_queue": "orders" }
///     ]
/// }"#).unwrap();
///
/// let registry = settings.registry().unwrap();
/// assert_eq!(registry.len(), 2);
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct BinderSettings {
    /// The identity of this deployable unit, matched against
    /// [`QueueDeclaration::owned_application`].
    pub application_name: String,
    #[serde(default)]
    pub rabbitmq: RabbitMqSettings,
    /// How many connections the bindings' channels are spread over.
    #[serde(default = "default_connection_pool_size")]
    pub connection_pool_size: usize,
    /// Declare exchanges, queues and bindings on the broker before consuming.
    #[serde(default = "default_declare_topology")]
    pub declare_topology: bool,
    #[serde(default)]
    pub queues: Vec<QueueDeclaration>,
}

fn default_connection_pool_size() -> usize {
    DEFAULT_CONNECTION_POOL_SIZE
}

fn default_declare_topology() -> bool {
    true
}

impl BinderSettings {
    /// Load the queue declarations into a [`QueueRegistry`].
    pub fn registry(&self) -> Result<QueueRegistry, ConfigurationError> {
        QueueRegistry::from_settings(&self.queues)
    }
}
