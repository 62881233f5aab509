//! Order event publishers

use async_trait::async_trait;
use tracing::debug;

use crate::domain::events::OrderEvent;
use crate::ports::EventPublisher;

/// Publishes order events as JSON on NATS
#[derive(Clone)]
pub struct NatsEventPublisher { client: async_nats::Client }

impl NatsEventPublisher {
    pub fn new(client: async_nats::Client) -> Self { Self { client } }
}

#[async_trait]
impl EventPublisher for NatsEventPublisher {
    async fn publish(&self, event: &OrderEvent) -> anyhow::Result<()> {
        let payload = serde_json::to_vec(event)?;
        self.client.publish(event.subject().to_string(), payload.into()).await?;
        debug!(subject = event.subject(), order_id = %event.order_id(), "order event published");
        Ok(())
    }
}

/// Used when no broker is configured
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopEventPublisher;

#[async_trait]
impl EventPublisher for NoopEventPublisher {
    async fn publish(&self, _event: &OrderEvent) -> anyhow::Result<()> { Ok(()) }
}
