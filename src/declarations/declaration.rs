use crate::declarations::ConfigurationError;
use lapin::ExchangeKind;
use serde::Deserialize;

const DEFAULT_PREFETCH_COUNT: u32 = 50;
const DEFAULT_CONCURRENT_CONSUMERS: u32 = 1;

/// The static definition of a queue, the exchange it is bound to and the way it should be
/// consumed.
///
/// Declarations are loaded once, when the process starts, and never change afterwards.
/// They are usually deserialized as part of [`BinderSettings`](crate::settings::BinderSettings),
/// but can also be assembled in code:
///
/// ```rust
/// use carrot_binder::declarations::{ExchangeType, QueueDeclaration};
///
/// let orders = QueueDeclaration::new("orders", "svc-a")
///     .with_exchange("orders.exchange", ExchangeType::Topic)
///     .with_routing_key("orders.#")
///     .with_prefetch_count(10)
///     .with_concurrent_consumers(2)
///     .with_manual_acknowledge();
/// let orders_dlq = QueueDeclaration::new("orders.dlq", "svc-a").dead_letter_of("orders");
///
/// assert!(!orders.is_dead_letter());
/// assert!(orders_dlq.is_dead_letter());
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct QueueDeclaration {
    pub queue_name: String,
    /// The exchange the queue is bound to. Empty for the default exchange.
    #[serde(default)]
    pub exchange_name: String,
    #[serde(default)]
    pub exchange_kind: ExchangeType,
    #[serde(default)]
    pub routing_key: String,
    /// The deployable unit in charge of consuming this queue.
    pub owned_application: String,
    /// Set on dead-letter queues: the name of the queue whose rejected messages are routed
    /// here. A declaration carrying this link is never consumed.
    #[serde(default)]
    pub dead_letter_queue: Option<String>,
    #[serde(default)]
    pub consumer: ConsumerTuning,
}

/// The kind of exchange a queue is bound to.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeType {
    #[default]
    Direct,
    Fanout,
    Topic,
    Headers,
}

impl From<ExchangeType> for ExchangeKind {
    fn from(value: ExchangeType) -> Self {
        match value {
            ExchangeType::Direct => ExchangeKind::Direct,
            ExchangeType::Fanout => ExchangeKind::Fanout,
            ExchangeType::Topic => ExchangeKind::Topic,
            ExchangeType::Headers => ExchangeKind::Headers,
        }
    }
}

/// Consumer tuning parameters, as written in configuration.
///
/// Values are checked by [`ConsumerTuning::validate`] when a consumer is created, not when
/// the declaration is loaded: a bad value only prevents that one queue from being consumed.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConsumerTuning {
    /// Maximum number of unacknowledged messages the consumer may hold at once.
    pub prefetch_count: u32,
    /// How many messages are processed concurrently.
    pub concurrent_consumers: u32,
    /// `true` for manual acknowledgement, `false` to let the broker acknowledge on delivery.
    pub manual_acknowledge: bool,
}

impl Default for ConsumerTuning {
    fn default() -> Self {
        Self {
            prefetch_count: DEFAULT_PREFETCH_COUNT,
            concurrent_consumers: DEFAULT_CONCURRENT_CONSUMERS,
            manual_acknowledge: false,
        }
    }
}

/// Who acknowledges deliveries with the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcknowledgeMode {
    /// The broker considers a message acknowledged as soon as it is delivered.
    Automatic,
    /// Every delivery is settled (ack, nack or reject) exactly once according to the
    /// outcome returned by the handler.
    Manual,
}

/// Consumer parameters that passed [`ConsumerTuning::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerSettings {
    pub prefetch_count: u16,
    pub concurrent_consumers: usize,
    pub acknowledge_mode: AcknowledgeMode,
}

impl ConsumerTuning {
    /// Check that the tuning values can be used to configure a consumer on the broker.
    ///
    /// `queue_name` is only used to give context to the error.
    pub fn validate(&self, queue_name: &str) -> Result<ConsumerSettings, ConfigurationError> {
        if self.prefetch_count == 0 {
            return Err(ConfigurationError::NonPositivePrefetchCount {
                queue_name: queue_name.to_owned(),
            });
        }
        // AMQP carries the prefetch count as a short
        let prefetch_count = u16::try_from(self.prefetch_count).map_err(|_| {
            ConfigurationError::PrefetchCountTooLarge {
                queue_name: queue_name.to_owned(),
                prefetch_count: self.prefetch_count,
            }
        })?;
        if self.concurrent_consumers == 0 {
            return Err(ConfigurationError::NonPositiveConcurrentConsumers {
                queue_name: queue_name.to_owned(),
            });
        }

        Ok(ConsumerSettings {
            prefetch_count,
            concurrent_consumers: self.concurrent_consumers as usize,
            acknowledge_mode: if self.manual_acknowledge {
                AcknowledgeMode::Manual
            } else {
                AcknowledgeMode::Automatic
            },
        })
    }
}

impl QueueDeclaration {
    /// A declaration for a queue on the default exchange, with default consumer tuning.
    pub fn new<Q: Into<String>, A: Into<String>>(queue_name: Q, owned_application: A) -> Self {
        Self {
            queue_name: queue_name.into(),
            exchange_name: String::new(),
            exchange_kind: ExchangeType::default(),
            routing_key: String::new(),
            owned_application: owned_application.into(),
            dead_letter_queue: None,
            consumer: ConsumerTuning::default(),
        }
    }

    #[must_use]
    pub fn with_exchange<T: Into<String>>(mut self, exchange_name: T, kind: ExchangeType) -> Self {
        self.exchange_name = exchange_name.into();
        self.exchange_kind = kind;
        self
    }

    #[must_use]
    pub fn with_routing_key<T: Into<String>>(mut self, routing_key: T) -> Self {
        self.routing_key = routing_key.into();
        self
    }

    /// Mark this declaration as the dead-letter queue of `queue_name`.
    #[must_use]
    pub fn dead_letter_of<T: Into<String>>(mut self, queue_name: T) -> Self {
        self.dead_letter_queue = Some(queue_name.into());
        self
    }

    #[must_use]
    pub fn with_prefetch_count(mut self, prefetch_count: u32) -> Self {
        self.consumer.prefetch_count = prefetch_count;
        self
    }

    #[must_use]
    pub fn with_concurrent_consumers(mut self, concurrent_consumers: u32) -> Self {
        self.consumer.concurrent_consumers = concurrent_consumers;
        self
    }

    #[must_use]
    pub fn with_manual_acknowledge(mut self) -> Self {
        self.consumer.manual_acknowledge = true;
        self
    }

    /// `true` if the declaration carries a dead-letter link and must not be consumed.
    pub fn is_dead_letter(&self) -> bool {
        self.dead_letter_queue.is_some()
    }

    pub fn is_owned_by(&self, application_name: &str) -> bool {
        self.owned_application == application_name
    }

    /// Shorthand for [`ConsumerTuning::validate`] on this declaration's tuning.
    pub fn consumer_settings(&self) -> Result<ConsumerSettings, ConfigurationError> {
        self.consumer.validate(&self.queue_name)
    }
}
