use async_trait::async_trait;

use super::error::PublishError;

/// Seam between [`super::EventPublisher`] and the concrete message-queue
/// client. The production implementation is [`NatsBroker`]; tests substitute
/// a fake so publishes can be asserted without a running broker (spec.md §8:
/// "verified by instrumenting the broker").
#[async_trait]
pub trait Broker: Send + Sync {
    async fn publish(
        &self,
        topic: &'static str,
        payload: Vec<u8>,
    ) -> Result<(), PublishError>;
}

pub struct NatsBroker {
    client: async_nats::Client,
}

impl NatsBroker {
    pub async fn connect(bootstrap_servers: &str) -> Result<Self, PublishError> {
        let client = async_nats::connect(bootstrap_servers).await?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Broker for NatsBroker {
    async fn publish(
        &self,
        topic: &'static str,
        payload: Vec<u8>,
    ) -> Result<(), PublishError> {
        self.client.publish(topic, payload.into()).await?;
        // Round-trips to the server so the publish is acknowledged before we
        // return, matching the "synchronous send-and-await-ack" contract.
        self.client.flush().await?;
        Ok(())
    }
}
