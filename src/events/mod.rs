mod broker;
mod error;
mod publisher;

pub use broker::Broker;
pub use broker::NatsBroker;
pub use error::PublishError;
pub use publisher::{EventPublisher, PaymentEvent, RefundEvent};
