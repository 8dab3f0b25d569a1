use anyhow::Result;
use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use shared::OrderEvent;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, event: &OrderEvent) -> Result<()>;
}

/// Publishes order events to a Kafka topic, keyed by order number.
pub struct KafkaNotifier {
    producer: FutureProducer,
    topic: String,
}

impl KafkaNotifier {
    pub fn new(brokers: &str, topic: String) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self { producer, topic })
    }
}

#[async_trait]
impl Notifier for KafkaNotifier {
    async fn publish(&self, event: &OrderEvent) -> Result<()> {
        let json = serde_json::to_string(event)?;
        let key = event.order_number().to_string();
        let record = FutureRecord::to(&self.topic).payload(&json).key(&key);

        self.producer
            .send(record, Duration::from_secs(5))
            .await
            .map_err(|(e, _)| anyhow::anyhow!("Failed to publish event: {}", e))?;

        Ok(())
    }
}

/// Used when no broker is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn publish(&self, event: &OrderEvent) -> Result<()> {
        info!("Order event: {}", serde_json::to_string(event)?);
        Ok(())
    }
}

/// Publishes on a background task. The caller never waits on, or fails with, delivery.
pub fn spawn_publish(notifier: Arc<dyn Notifier>, event: OrderEvent) {
    tokio::spawn(async move {
        if let Err(e) = notifier.publish(&event).await {
            error!(
                "Failed to publish event for order {}: {}",
                event.order_number(),
                e
            );
        }
    });
}
