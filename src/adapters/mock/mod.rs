pub mod checkout_gateway;
pub mod message_sender;

pub use checkout_gateway::CheckoutGateway;
pub use message_sender::MessageSender;
