mod handler_notification_request;
mod payment;
mod payment_request;
mod refund;
mod refund_request;
mod status;

pub use handler_notification_request::HandlerNotificationRequest;
pub use payment::Payment;
pub use payment_request::PaymentRequest;
pub use refund::Refund;
pub use refund_request::RefundRequest;
pub use status::Status;
