use async_trait::async_trait;
use rdkafka::{
    config::ClientConfig,
    message::{Header, OwnedHeaders},
    producer::{FutureProducer, FutureRecord, Producer},
    util::Timeout,
};
use std::time::Duration;

use super::{DeliveryError, MessageBroker, OutboundMessage};

// ============================================================================
// Redpanda Client - Kafka-protocol producer
// ============================================================================
//
// Producer settings give per-partition ordering without duplicates from
// internal retries: acks=all, idempotence on, one in-flight request per
// connection. Each record carries `event-type` and `sequence` headers.
//
// ============================================================================

#[derive(Debug, Clone)]
pub struct RedpandaConfig {
    pub brokers: String,
    /// Upper bound on how long the producer may hold a message before
    /// giving up. Also used as the flush timeout on close.
    pub message_timeout: Duration,
}

impl Default for RedpandaConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            message_timeout: Duration::from_secs(5),
        }
    }
}

pub struct RedpandaClient {
    producer: FutureProducer,
    message_timeout: Duration,
}

impl RedpandaClient {
    pub fn new(config: &RedpandaConfig) -> Result<Self, DeliveryError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("acks", "all")
            .set("enable.idempotence", "true")
            .set("max.in.flight.requests.per.connection", "1")
            .set("linger.ms", "0")
            .set("retries", "10")
            .set("message.timeout.ms", config.message_timeout.as_millis().to_string())
            .create()?;

        tracing::info!(brokers = %config.brokers, "✅ Redpanda producer created");

        Ok(Self {
            producer,
            message_timeout: config.message_timeout,
        })
    }
}

#[async_trait]
impl MessageBroker for RedpandaClient {
    async fn send(&self, message: &OutboundMessage) -> Result<(), DeliveryError> {
        let sequence = message.sequence.to_string();
        let headers = OwnedHeaders::new()
            .insert(Header {
                key: "event-type",
                value: Some(message.event_type.as_str()),
            })
            .insert(Header {
                key: "sequence",
                value: Some(sequence.as_str()),
            });

        let record = FutureRecord::to(&message.topic)
            .key(&message.key)
            .payload(&message.payload)
            .headers(headers);

        self.producer
            .send(record, Timeout::After(self.message_timeout))
            .await
            .map_err(|(e, _)| DeliveryError::Kafka(e))?;

        tracing::debug!(
            topic = %message.topic,
            key = %message.key,
            sequence = message.sequence,
            "Published to Redpanda"
        );
        Ok(())
    }

    async fn close(&self) -> Result<(), DeliveryError> {
        let producer = self.producer.clone();
        let timeout = self.message_timeout;

        // librdkafka's flush blocks the calling thread.
        tokio::task::spawn_blocking(move || producer.flush(Timeout::After(timeout)))
            .await
            .map_err(|e| DeliveryError::Rejected(format!("flush task failed: {e}")))??;

        tracing::info!("Redpanda producer flushed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_points_at_local_broker() {
        let config = RedpandaConfig::default();
        assert_eq!(config.brokers, "localhost:9092");
        assert_eq!(config.message_timeout, Duration::from_secs(5));
    }

    // Creating a producer does not connect; librdkafka only dials out on the
    // first request.
    #[tokio::test]
    async fn test_producer_accepts_idempotent_settings() {
        let client = RedpandaClient::new(&RedpandaConfig {
            brokers: "localhost:1".to_string(),
            message_timeout: Duration::from_millis(100),
        });
        assert!(client.is_ok());
    }
}
