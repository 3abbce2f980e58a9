pub mod book_repository;
pub mod borrowing_repository;
pub mod checkout_gateway;
pub mod message_sender;
pub mod payment_repository;
pub mod user_directory;
pub mod webhook_verifier;

pub use book_repository::*;
pub use borrowing_repository::*;
pub use checkout_gateway::*;
pub use message_sender::*;
pub use payment_repository::*;
pub use user_directory::*;
pub use webhook_verifier::*;

/// ポート境界のエラー（アダプター固有のエラーをboxして運ぶ）
pub type PortError = Box<dyn std::error::Error + Send + Sync>;

/// ポート境界の Result型
pub type Result<T> = std::result::Result<T, PortError>;
