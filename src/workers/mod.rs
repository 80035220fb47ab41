mod notify;
mod poll;
mod refund;

pub use notify::init_notification_worker;
pub use notify::notify_tick;
pub use poll::init_poll_worker;
pub use poll::poll_tick;
pub use refund::init_refund_worker;
pub use refund::refund_tick;
