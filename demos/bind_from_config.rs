use carrot_binder::consumers::{AmqpContainerFactory, ConsumerBindings};
use carrot_binder::declarations::QueueDeclaration;
use carrot_binder::handlers::{BrokerAction, HandlerError, Incoming, QueueHandler};
use carrot_binder::orchestrator::{BindingContext, BindingOrchestrator};
use carrot_binder::settings::BinderSettings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Logs every message it receives from the `orders` queue.
struct OrderLogger;

#[async_trait::async_trait]
impl QueueHandler for OrderLogger {
    fn name(&self) -> &str {
        "order-logger"
    }

    fn claims(&self, declaration: &QueueDeclaration) -> bool {
        declaration.queue_name == "orders"
    }

    async fn handle(&self, incoming: &Incoming) -> Result<BrokerAction, HandlerError> {
        let payload = std::str::from_utf8(&incoming.message.data).map_err(HandlerError::fatal)?;
        tracing::info!(queue_name = %incoming.queue_name, payload, "Received an order");
        Ok(BrokerAction::Ack)
    }
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,carrot_binder=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Run with `cargo run --example bind_from_config -- demos/settings.json`.
    // The out-of-the-box parameters of the RabbitMq Docker image are used for anything the
    // file leaves out.
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "demos/settings.json".into());
    let settings: BinderSettings = serde_json::from_str(&std::fs::read_to_string(path)?)?;

    // Declarations are validated as a whole before anything is started.
    let registry = settings.registry()?;
    let orchestrator = BindingOrchestrator::new(
        BindingContext::new(settings.application_name.as_str()).with_handler(OrderLogger),
        registry,
        AmqpContainerFactory::from_settings(&settings)?,
    );

    let mut bindings = ConsumerBindings::new();
    let report = orchestrator.run(&mut bindings).await?;
    for (queue_name, error) in report.failures() {
        tracing::warn!(queue_name, error = %error, "Queue left without a consumer");
    }
    for binding in bindings.iter() {
        tracing::info!(
            container_name = binding.container_name(),
            handler = binding.handler_name(),
            "Consumer is live"
        );
    }

    tokio::signal::ctrl_c().await?;
    bindings.shutdown_all().await?;
    Ok(())
}
