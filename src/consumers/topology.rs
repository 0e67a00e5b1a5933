//! Broker-side setup executed before a queue is consumed.
//!
//! Exchanges and queues are declared durable. The default exchange (empty name) is never
//! declared nor bound: the broker routes to queues by name on it.
use crate::declarations::QueueDeclaration;
use amq_protocol_types::{AMQPValue, FieldTable, LongString};
use lapin::options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions};
use lapin::Channel;

/// Declare the exchange, queue and binding of `declaration`.
///
/// If `dead_letter` is provided, its own exchange, queue and binding are declared first and
/// the queue of `declaration` is configured to dead-letter into it.
pub(crate) async fn declare(
    channel: &Channel,
    declaration: &QueueDeclaration,
    dead_letter: Option<&QueueDeclaration>,
) -> Result<(), anyhow::Error> {
    let mut queue_args = FieldTable::default();
    if let Some(dead_letter) = dead_letter {
        declare_bound_queue(channel, dead_letter, FieldTable::default()).await?;
        for (key, value) in dead_letter_arguments(dead_letter) {
            queue_args.insert(key.into(), value);
        }
    }
    declare_bound_queue(channel, declaration, queue_args).await
}

/// The `x-dead-letter-*` queue arguments routing rejected messages to `dead_letter`.
fn dead_letter_arguments(dead_letter: &QueueDeclaration) -> Vec<(&'static str, AMQPValue)> {
    // On the default exchange the routing key is the queue name.
    let routing_key = if dead_letter.exchange_name.is_empty() {
        dead_letter.queue_name.as_str()
    } else {
        dead_letter.routing_key.as_str()
    };

    let mut args = vec![(
        "x-dead-letter-exchange",
        AMQPValue::LongString(LongString::from(dead_letter.exchange_name.as_str())),
    )];
    if !routing_key.is_empty() {
        args.push((
            "x-dead-letter-routing-key",
            AMQPValue::LongString(LongString::from(routing_key)),
        ));
    }
    args
}

async fn declare_bound_queue(
    channel: &Channel,
    declaration: &QueueDeclaration,
    queue_args: FieldTable,
) -> Result<(), anyhow::Error> {
    let default_exchange = declaration.exchange_name.is_empty();
    if !default_exchange {
        channel
            .exchange_declare(
                &declaration.exchange_name,
                declaration.exchange_kind.into(),
                ExchangeDeclareOptions {
                    passive: false,
                    durable: true,
                    auto_delete: false,
                    internal: false,
                    nowait: false,
                },
                FieldTable::default(),
            )
            .await?;
    }

    channel
        .queue_declare(
            &declaration.queue_name,
            QueueDeclareOptions {
                passive: false,
                durable: true,
                exclusive: false,
                auto_delete: false,
                nowait: false,
            },
            queue_args,
        )
        .await?;

    if !default_exchange {
        channel
            .queue_bind(
                &declaration.queue_name,
                &declaration.exchange_name,
                &declaration.routing_key,
                QueueBindOptions { nowait: false },
                FieldTable::default(),
            )
            .await?;
    }
    Ok(())
}
