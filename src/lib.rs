//! `carrot-binder` wires RabbitMq consumers at startup, built on top of [`lapin`].
//!
//! Queues are declared statically (see [`declarations`]), business handlers claim the
//! queues they process (see [`handlers`]), and the
//! [`BindingOrchestrator`](crate::orchestrator::BindingOrchestrator) starts one consumer per
//! claimed queue owned by the current application. Each started consumer is published in
//! [`ConsumerBindings`](crate::consumers::ConsumerBindings) under `<queue_name>Container`.
//!
//! ```rust,no_run
//! use carrot_binder::consumers::{AmqpContainerFactory, ConsumerBindings};
//! use carrot_binder::declarations::QueueDeclaration;
//! use carrot_binder::handlers::{BrokerAction, HandlerError, Incoming, QueueHandler};
//! use carrot_binder::orchestrator::{BindingContext, BindingOrchestrator};
//! use carrot_binder::settings::BinderSettings;
//!
//! struct Orders;
//!
//! #[async_trait::async_trait]
//! impl QueueHandler for Orders {
//!     fn claims(&self, declaration: &QueueDeclaration) -> bool {
//!         declaration.queue_name == "orders"
//!     }
//!
//!     async fn handle(&self, incoming: &Incoming) -> Result<BrokerAction, HandlerError> {
//!         println!("{} bytes", incoming.message.data.len());
//!         Ok(BrokerAction::Ack)
//!     }
//! }
//!
//! async fn start(settings: BinderSettings) -> anyhow::Result<ConsumerBindings> {
//!     let orchestrator = BindingOrchestrator::new(
//!         BindingContext::new(settings.application_name.as_str()).with_handler(Orders),
//!         settings.registry()?,
//!         AmqpContainerFactory::from_settings(&settings)?,
//!     );
//!
//!     let mut bindings = ConsumerBindings::new();
//!     orchestrator.run(&mut bindings).await?;
//!     Ok(bindings)
//! }
//! ```
//!
//! ## Examples
//!
//! Check the `demos` directory as well to see the library in action.

pub mod amqp;
pub mod consumers;
pub mod declarations;
pub mod handlers;
pub mod orchestrator;
pub mod pool;
pub mod settings;
