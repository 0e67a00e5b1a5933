use carrot_binder::amqp::configuration::RabbitMqSettings;
use carrot_binder::consumers::{BindingError, ConnectionError, ConsumerBinding, ContainerFactory};
use carrot_binder::declarations::{QueueDeclaration, QueueRegistry};
use carrot_binder::handlers::{BrokerAction, HandlerError, Incoming, QueueHandler};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn get_rabbitmq_settings() -> RabbitMqSettings {
    RabbitMqSettings::default()
}

/// `orders` consumed by `svc-a`, with `orders.dlq` as its dead-letter queue.
pub fn orders_registry() -> QueueRegistry {
    QueueRegistry::new(vec![
        QueueDeclaration::new("orders", "svc-a")
            .with_prefetch_count(10)
            .with_concurrent_consumers(2)
            .with_manual_acknowledge(),
        QueueDeclaration::new("orders.dlq", "svc-a").dead_letter_of("orders"),
    ])
    .unwrap()
}

/// A handler claiming a fixed set of queues.
pub struct ClaimingHandler {
    name: String,
    queues: Vec<String>,
}

impl ClaimingHandler {
    pub fn new(name: &str, queues: &[&str]) -> Self {
        Self {
            name: name.to_owned(),
            queues: queues.iter().map(|q| (*q).to_owned()).collect(),
        }
    }
}

#[async_trait::async_trait]
impl QueueHandler for ClaimingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn claims(&self, declaration: &QueueDeclaration) -> bool {
        self.queues.contains(&declaration.queue_name)
    }

    async fn handle(&self, _incoming: &Incoming) -> Result<BrokerAction, HandlerError> {
        Ok(BrokerAction::Ack)
    }
}

/// A call received by [`InMemoryFactory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartedConsumer {
    pub queue_name: String,
    pub handler_name: String,
    pub dead_letter: Option<String>,
}

/// A [`ContainerFactory`] that starts idle consumers instead of talking to a broker.
#[derive(Default)]
pub struct InMemoryFactory {
    started: Mutex<Vec<StartedConsumer>>,
    unreachable_queues: Vec<String>,
    broker_down: AtomicBool,
    consumers_exit: bool,
}

impl InMemoryFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every connection attempt fails.
    pub fn broker_down() -> Arc<Self> {
        let factory = Self::default();
        factory.set_broker_down(true);
        Arc::new(factory)
    }

    /// Started consumers exit straight away, as if the broker closed their channel.
    pub fn with_exiting_consumers() -> Arc<Self> {
        Arc::new(Self {
            consumers_exit: true,
            ..Self::default()
        })
    }

    pub fn set_broker_down(&self, down: bool) {
        self.broker_down.store(down, Ordering::SeqCst);
    }

    /// Connection attempts fail for the listed queues only.
    pub fn unreachable_for(queues: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            unreachable_queues: queues.iter().map(|q| (*q).to_owned()).collect(),
            ..Self::default()
        })
    }

    pub fn started(&self) -> Vec<StartedConsumer> {
        self.started.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ContainerFactory for InMemoryFactory {
    async fn create_and_start(
        &self,
        declaration: &QueueDeclaration,
        dead_letter: Option<&QueueDeclaration>,
        handler: Arc<dyn QueueHandler>,
    ) -> Result<ConsumerBinding, BindingError> {
        let settings = declaration.consumer_settings()?;
        if self.broker_down.load(Ordering::SeqCst)
            || self.unreachable_queues.contains(&declaration.queue_name)
        {
            return Err(ConnectionError::new(
                declaration.queue_name.as_str(),
                anyhow::anyhow!("Connection refused (os error 111)"),
            )
            .into());
        }

        self.started.lock().unwrap().push(StartedConsumer {
            queue_name: declaration.queue_name.clone(),
            handler_name: handler.name().to_owned(),
            dead_letter: dead_letter.map(|d| d.queue_name.clone()),
        });
        let exit = self.consumers_exit;
        Ok(ConsumerBinding::spawn(
            &declaration.queue_name,
            handler.name(),
            settings,
            move |mut shutdown| async move {
                if exit {
                    return Err(anyhow::anyhow!("channel closed by the broker"));
                }
                shutdown.recv().await;
                Ok(())
            },
        ))
    }
}

/// Wait until the consumer of `binding` has exited.
pub async fn wait_for_exit(binding: &ConsumerBinding) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while binding.is_running() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("The consumer did not exit");
}

/// Collects the `WARN` and `ERROR` events emitted on the current thread while it is alive.
pub struct CapturedLogs {
    buffer: LogBuffer,
    _guard: tracing::subscriber::DefaultGuard,
}

impl CapturedLogs {
    pub fn start() -> Self {
        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .without_time()
            .finish();
        Self {
            buffer,
            _guard: tracing::subscriber::set_default(subscriber),
        }
    }

    pub fn warnings(&self) -> Vec<String> {
        let bytes = self.buffer.0.lock().unwrap();
        String::from_utf8_lossy(&bytes)
            .lines()
            .filter(|line| line.contains("WARN"))
            .map(str::to_owned)
            .collect()
    }
}

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
