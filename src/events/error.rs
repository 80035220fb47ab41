#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("failed to connect to broker: {0}")]
    Connect(#[from] async_nats::ConnectError),

    #[error("failed to publish event: {0}")]
    Publish(#[from] async_nats::PublishError),

    #[error("failed to flush pending publishes: {0}")]
    Flush(#[from] async_nats::client::FlushError),

    #[error("failed to serialize event payload: {0}")]
    Serialize(#[from] serde_json::Error),
}
