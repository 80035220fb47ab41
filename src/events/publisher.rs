use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::broker::Broker;
use super::broker::NatsBroker;
use super::error::PublishError;
use crate::domain::Status;

const PAYMENT_TOPIC: &str = "payment";
const REFUND_TOPIC: &str = "refund";

#[derive(Debug, Serialize)]
pub struct PaymentEvent {
    pub id: Uuid,
    pub status: Status,
    pub extra_data: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct RefundEvent {
    pub id: Uuid,
    pub status: Status,
    pub external_cancellation_reason: Option<String>,
    pub extra_data: Option<Value>,
}

/// Synchronous send-and-acknowledge publisher over two topics, `payment` and
/// `refund`. Messages are unkeyed UTF-8 JSON (spec.md §4.5, §6).
///
/// Lifecycle is tied to the worker process: workers must not publish before
/// [`start`](EventPublisher::start) completes.
pub struct EventPublisher {
    broker: Box<dyn Broker>,
}

impl EventPublisher {
    /// Connect to the broker. Failure here is the one fatal boot condition
    /// spec.md §7 allows — callers should propagate it and abort startup.
    pub async fn start(bootstrap_servers: &str) -> Result<Self, PublishError> {
        let broker = NatsBroker::connect(bootstrap_servers).await?;
        Ok(Self::with_broker(Box::new(broker)))
    }

    /// For tests: substitute any [`Broker`] implementation, bypassing the
    /// real connection.
    pub fn with_broker(broker: Box<dyn Broker>) -> Self {
        Self { broker }
    }

    async fn publish(
        &self,
        topic: &'static str,
        payload: &impl Serialize,
    ) -> Result<(), PublishError> {
        let bytes = serde_json::to_vec(payload)?;
        self.broker.publish(topic, bytes).await
    }

    #[tracing::instrument(skip(self, event), fields(payment_id = %event.id))]
    pub async fn publish_payment_event(
        &self,
        event: PaymentEvent,
    ) -> Result<(), PublishError> {
        self.publish(PAYMENT_TOPIC, &event).await
    }

    #[tracing::instrument(skip(self, event), fields(refund_id = %event.id))]
    pub async fn publish_refund_event(
        &self,
        event: RefundEvent,
    ) -> Result<(), PublishError> {
        self.publish(REFUND_TOPIC, &event).await
    }
}
