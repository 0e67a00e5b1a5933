//! Facilities to start and stop RabbitMq consumers. Check out [`ContainerFactory`] and
//! [`ConsumerBindings`] as starting points.
pub use binding::{
    container_name, ConsumerBinding, ConsumerBindings, ShutdownSignal, CONTAINER_SUFFIX,
};
pub use error::{BindingError, ConnectionError};
pub use factory::{AmqpContainerFactory, ContainerFactory};

mod binding;
mod delivery;
mod error;
mod factory;
mod topology;
