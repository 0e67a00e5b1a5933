use crate::amqp::ConnectionFactory;
use crate::consumers::delivery::DeliveryLoop;
use crate::consumers::{container_name, topology, BindingError, ConnectionError, ConsumerBinding};
use crate::declarations::{AcknowledgeMode, QueueDeclaration};
use crate::handlers::QueueHandler;
use crate::pool::ConnectionPool;
use crate::settings::BinderSettings;
use amq_protocol_types::FieldTable;
use anyhow::Context;
use lapin::options::{BasicConsumeOptions, BasicQosOptions};
use std::sync::Arc;
use uuid::Uuid;

/// Creates and starts the consumer of a matched (declaration, handler) pair.
///
/// [`AmqpContainerFactory`] is the implementation talking to RabbitMq.
#[async_trait::async_trait]
pub trait ContainerFactory: Send + Sync {
    /// Start consuming `declaration` with `handler`.
    ///
    /// `dead_letter` is the dead-letter queue linked to `declaration`, if any.
    ///
    /// Fails with [`BindingError::Configuration`] if the consumer tuning is invalid and with
    /// [`BindingError::Connection`] if the broker cannot be reached. Implementations do not
    /// retry.
    async fn create_and_start(
        &self,
        declaration: &QueueDeclaration,
        dead_letter: Option<&QueueDeclaration>,
        handler: Arc<dyn QueueHandler>,
    ) -> Result<ConsumerBinding, BindingError>;
}

#[async_trait::async_trait]
impl<F: ContainerFactory + ?Sized> ContainerFactory for Arc<F> {
    async fn create_and_start(
        &self,
        declaration: &QueueDeclaration,
        dead_letter: Option<&QueueDeclaration>,
        handler: Arc<dyn QueueHandler>,
    ) -> Result<ConsumerBinding, BindingError> {
        self.as_ref()
            .create_and_start(declaration, dead_letter, handler)
            .await
    }
}

/// A [`ContainerFactory`] opening one channel per binding over pooled connections.
#[derive(Clone)]
pub struct AmqpContainerFactory {
    connection_pool: ConnectionPool,
    declare_topology: bool,
}

impl AmqpContainerFactory {
    /// By default the exchange, queue and binding of each declaration are declared on the
    /// broker before consuming.
    pub fn new(connection_pool: ConnectionPool) -> Self {
        Self {
            connection_pool,
            declare_topology: true,
        }
    }

    /// Build the connection factory and the pool described by `settings`.
    ///
    /// No connection is opened until the first binding is created.
    pub fn from_settings(settings: &BinderSettings) -> Result<Self, anyhow::Error> {
        let connection_factory = ConnectionFactory::new_from_config(&settings.rabbitmq)?
            .with_connection_name(settings.application_name.as_str());
        let connection_pool = ConnectionPool::builder(connection_factory)
            .max_size(settings.connection_pool_size)
            .build()
            .context("Failed to build the RabbitMQ connection pool.")?;

        let factory = Self::new(connection_pool);
        Ok(if settings.declare_topology {
            factory
        } else {
            factory.without_topology()
        })
    }

    /// Consume queues as they are, without declaring anything on the broker.
    #[must_use]
    pub fn without_topology(mut self) -> Self {
        self.declare_topology = false;
        self
    }

    async fn open_channel(&self, queue_name: &str) -> Result<lapin::Channel, ConnectionError> {
        let connection = self
            .connection_pool
            .get()
            .await
            .map_err(|e| ConnectionError::new(queue_name, crate::pool::Error::from(e)))?;
        connection
            .create_channel()
            .await
            .map_err(|e| ConnectionError::new(queue_name, e))
    }
}

#[async_trait::async_trait]
impl ContainerFactory for AmqpContainerFactory {
    #[tracing::instrument(
        name = "consumer_binding_start",
        skip_all,
        fields(queue_name = %declaration.queue_name, handler = handler.name())
    )]
    async fn create_and_start(
        &self,
        declaration: &QueueDeclaration,
        dead_letter: Option<&QueueDeclaration>,
        handler: Arc<dyn QueueHandler>,
    ) -> Result<ConsumerBinding, BindingError> {
        let queue_name = declaration.queue_name.as_str();
        let settings = declaration.consumer_settings()?;

        let channel = self.open_channel(queue_name).await?;
        channel
            .basic_qos(settings.prefetch_count, BasicQosOptions { global: false })
            .await
            .map_err(|e| ConnectionError::new(queue_name, e))?;

        if self.declare_topology {
            topology::declare(&channel, declaration, dead_letter)
                .await
                .map_err(|e| ConnectionError::new(queue_name, e))?;
        }

        let consumer_tag = format!("{}-{}", container_name(queue_name), Uuid::new_v4());
        let consumer = channel
            .basic_consume(
                queue_name,
                &consumer_tag,
                BasicConsumeOptions {
                    no_ack: settings.acknowledge_mode == AcknowledgeMode::Automatic,
                    ..BasicConsumeOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| ConnectionError::new(queue_name, e))?;

        tracing::info!(
            consumer_tag = %consumer_tag,
            prefetch_count = settings.prefetch_count,
            concurrent_consumers = settings.concurrent_consumers,
            acknowledge_mode = ?settings.acknowledge_mode,
            "Listening to queue"
        );

        let handler_name = handler.name().to_owned();
        let delivery_loop = DeliveryLoop {
            channel,
            consumer,
            queue_name: queue_name.to_owned(),
            handler,
            settings,
        };
        Ok(ConsumerBinding::spawn(
            queue_name,
            &handler_name,
            settings,
            move |shutdown| delivery_loop.run_until_shutdown(shutdown),
        ))
    }
}
