use crate::declarations::AcknowledgeMode;
use amq_protocol_types::{DeliveryTag, ShortString};
use lapin::{acker::Acker, BasicProperties};

/// A message pulled from a bound queue, ready for processing.
pub struct Incoming {
    /// The name of the queue the message was consumed from.
    pub queue_name: String,
    /// How the delivery is acknowledged with the broker.
    pub acknowledge_mode: AcknowledgeMode,
    pub message: Delivery,
}

/// A received AMQP message.
#[derive(Debug)]
pub struct Delivery {
    pub delivery_tag: DeliveryTag,
    /// May be empty if the default exchange was used.
    pub exchange: ShortString,
    pub routing_key: ShortString,
    pub redelivered: bool,
    pub properties: BasicProperties,
    pub data: Vec<u8>,
    // Kept private: the consumer settles each delivery once, handlers never ack on their own.
    pub(crate) acker: Acker,
}

impl From<lapin::message::Delivery> for Delivery {
    fn from(value: lapin::message::Delivery) -> Self {
        Self {
            delivery_tag: value.delivery_tag,
            exchange: value.exchange,
            routing_key: value.routing_key,
            redelivered: value.redelivered,
            properties: value.properties,
            data: value.data,
            acker: value.acker,
        }
    }
}
