mod dispatcher;
mod error;

pub use dispatcher::WebhookDispatcher;
pub use error::DispatchError;
