pub mod borrowing;
pub mod catalog;
mod dependencies;
pub mod notification;
pub mod payment;
pub mod reminder;

pub use dependencies::{FinePolicy, ServiceDependencies};
