mod dispatcher;
pub mod messages;
mod worker;

pub use dispatcher::NotificationDispatcher;
pub use worker::{Delivery, NotificationWorker, RetryPolicy};
