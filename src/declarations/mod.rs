//! Queue declarations and the registry holding them.
pub use declaration::{
    AcknowledgeMode, ConsumerSettings, ConsumerTuning, ExchangeType, QueueDeclaration,
};
pub use registry::QueueRegistry;

mod declaration;
mod registry;

/// Queue configuration that cannot be turned into a working consumer.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Queue `{queue_name}` is declared more than once.")]
    DuplicateQueueName { queue_name: String },
    #[error("Queue `{queue_name}` is the dead-letter queue of `{dead_letter_queue}`, which is not declared.")]
    UnknownDeadLetterQueue {
        queue_name: String,
        dead_letter_queue: String,
    },
    #[error("More than one dead-letter queue is linked to queue `{queue_name}`.")]
    MultipleDeadLetterQueues { queue_name: String },
    #[error("The prefetch count of queue `{queue_name}` must be positive.")]
    NonPositivePrefetchCount { queue_name: String },
    #[error("The prefetch count of queue `{queue_name}` ({prefetch_count}) exceeds {}.", u16::MAX)]
    PrefetchCountTooLarge {
        queue_name: String,
        prefetch_count: u32,
    },
    #[error("The number of concurrent consumers of queue `{queue_name}` must be positive.")]
    NonPositiveConcurrentConsumers { queue_name: String },
}
