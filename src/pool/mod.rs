//! Shares [`lapin::Connection`]s across consumer bindings using [`deadpool`].
//!
//! Every [`ConsumerBinding`](crate::consumers::ConsumerBinding) opens its own channel, but
//! channels are multiplexed over the connections held by the pool. Broken connections are
//! disposed of and recreated on demand.
//!
//! ```rust
//! use carrot_binder::amqp::configuration::RabbitMqSettings;
//! use carrot_binder::amqp::ConnectionFactory;
//! use carrot_binder::pool::ConnectionPool;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let settings = RabbitMqSettings::default();
//!     let pool = ConnectionPool::builder(ConnectionFactory::new_from_config(&settings)?)
//!         .max_size(1)
//!         .build()?;
//!
//!     let connection = pool.get().await?;
//!     let _channel = connection.create_channel().await?;
//!     Ok(())
//! }
//! ```

mod connection;
mod error;

pub use connection::ConnectionPool;
pub use error::Error;
