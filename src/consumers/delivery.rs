use crate::consumers::ShutdownSignal;
use crate::declarations::{AcknowledgeMode, ConsumerSettings};
use crate::handlers::{BrokerAction, HandlerError, Incoming, QueueHandler};
use futures_util::{stream::FuturesUnordered, FutureExt, StreamExt};
use lapin::acker::Acker;
use lapin::options::{BasicAckOptions, BasicCancelOptions, BasicNackOptions, BasicRejectOptions};
use lapin::Channel;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Semaphore;

const REPLY_SUCCESS: u16 = 200;

/// The delivery path of a single binding: pulls messages from a started consumer and hands
/// them to the handler, at most `concurrent_consumers` at a time.
pub(crate) struct DeliveryLoop {
    pub(crate) channel: Channel,
    pub(crate) consumer: lapin::Consumer,
    pub(crate) queue_name: String,
    pub(crate) handler: Arc<dyn QueueHandler>,
    pub(crate) settings: ConsumerSettings,
}

impl DeliveryLoop {
    /// Process deliveries until the shutdown signal fires or the consumer fails (e.g. the
    /// channel is closed or the connection with RabbitMq is lost).
    ///
    /// On exit the consumer is cancelled, in-flight deliveries are awaited and the channel
    /// is closed, in this order.
    #[tracing::instrument(skip_all, name = "consumer_run", fields(queue_name = %self.queue_name))]
    pub(crate) async fn run_until_shutdown(
        self,
        mut shutdown: ShutdownSignal,
    ) -> Result<(), anyhow::Error> {
        let Self {
            channel,
            mut consumer,
            queue_name,
            handler,
            settings,
        } = self;
        let permits = Arc::new(Semaphore::new(settings.concurrent_consumers));
        let mut in_flight = FuturesUnordered::new();

        let result = 'event_loop: loop {
            tokio::select! {
                // Shutdown takes precedence over new deliveries.
                biased;

                _ = shutdown.recv() => {
                    tracing::info!("consumer received shutdown event");
                    if let Err(e) = channel
                        .basic_cancel(consumer.tag().as_str(), BasicCancelOptions::default())
                        .await
                    {
                        tracing::warn!(error = ?e, "Failed to cancel the consumer");
                    }
                    break 'event_loop Ok(());
                }

                // Reap completed deliveries.
                _ = in_flight.next(), if !in_flight.is_empty() => {}

                event = consumer.next() => {
                    match event {
                        None => break 'event_loop Ok(()),
                        Some(Err(e)) => {
                            tracing::error!("Consumer error: {}", e);
                            break 'event_loop Err(e.into());
                        }
                        Some(Ok(delivery)) => {
                            let permit = match Arc::clone(&permits).acquire_owned().await {
                                Ok(permit) => permit,
                                Err(e) => break 'event_loop Err(e.into()),
                            };
                            // Each delivery runs on its own task, bounded by the permits.
                            let processing = process(
                                delivery,
                                queue_name.clone(),
                                Arc::clone(&handler),
                                settings.acknowledge_mode,
                            );
                            in_flight.push(tokio::spawn(async move {
                                processing.await;
                                drop(permit);
                            }));
                        }
                    }
                }
            }
        };

        while in_flight.next().await.is_some() {}

        if let Err(e) = channel.close(REPLY_SUCCESS, "consumer stopped").await {
            tracing::debug!(error = ?e, "Channel was already closed");
        }
        result
    }
}

#[tracing::instrument(
    name = "process_delivery",
    skip(delivery, handler),
    fields(delivery_tag = delivery.delivery_tag, handler = handler.name()),
    level = tracing::Level::DEBUG
)]
async fn process(
    delivery: lapin::message::Delivery,
    queue_name: String,
    handler: Arc<dyn QueueHandler>,
    acknowledge_mode: AcknowledgeMode,
) {
    let incoming = Incoming {
        queue_name,
        acknowledge_mode,
        message: delivery.into(),
    };
    let outcome = guard_panics(handler.handle(&incoming)).await;

    if let Err(e) = &outcome {
        tracing::error!(error = ?e, error_type = %e.error_type, "Message handler failed");
    }

    if acknowledge_mode == AcknowledgeMode::Manual {
        let action = BrokerAction::for_outcome(&outcome);
        if let Err(e) = settle(&incoming.message.acker, action).await {
            tracing::error!(error = ?e, ?action, "Failed to settle the delivery with the broker");
        }
    }
}

/// A panicking handler is reported as a fatal failure, so the delivery is still settled.
async fn guard_panics<F>(handling: F) -> Result<BrokerAction, HandlerError>
where
    F: Future<Output = Result<BrokerAction, HandlerError>>,
{
    match AssertUnwindSafe(handling).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(_) => Err(HandlerError::fatal(anyhow::anyhow!(
            "The message handler panicked"
        ))),
    }
}

async fn settle(acker: &Acker, action: BrokerAction) -> Result<(), lapin::Error> {
    let settled = match action {
        BrokerAction::Ack => acker.ack(BasicAckOptions { multiple: false }).await,
        BrokerAction::Nack => {
            acker
                .nack(BasicNackOptions {
                    multiple: false,
                    requeue: true,
                })
                .await
        }
        BrokerAction::Reject => acker.reject(BasicRejectOptions { requeue: false }).await,
    };
    settled.map(|_| ())
}
