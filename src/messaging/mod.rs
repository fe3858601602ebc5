// ============================================================================
// Messaging - Broker Port
// ============================================================================
//
// The publisher only knows `MessageBroker`. `RedpandaClient` is the Kafka
// protocol implementation; tests plug in scripted brokers.
//
// ============================================================================

use async_trait::async_trait;
use rdkafka::error::KafkaError;
use std::time::Duration;

pub mod redpanda;

pub use redpanda::{RedpandaClient, RedpandaConfig};

/// One outbox row on its way to the broker.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub topic: String,
    /// Partitioning key. Always the aggregate id so one aggregate's events
    /// land on one partition in order.
    pub key: String,
    pub payload: String,
    pub event_type: String,
    pub sequence: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("kafka error: {0}")]
    Kafka(#[from] KafkaError),

    #[error("broker rejected message: {0}")]
    Rejected(String),

    #[error("no acknowledgement within {0:?}")]
    Timeout(Duration),
}

impl DeliveryError {
    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            DeliveryError::Kafka(_) => "kafka",
            DeliveryError::Rejected(_) => "rejected",
            DeliveryError::Timeout(_) => "timeout",
        }
    }
}

#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Resolves once the broker has acknowledged the message.
    async fn send(&self, message: &OutboundMessage) -> Result<(), DeliveryError>;

    /// Flush anything still buffered and release the connection.
    async fn close(&self) -> Result<(), DeliveryError>;
}
