pub mod book_repository;
pub mod borrowing_repository;
pub mod payment_repository;
pub mod user_directory;

// パブリックに型を再エクスポート
pub use book_repository::BookRepository as PostgresBookRepository;
pub use borrowing_repository::BorrowingRepository as PostgresBorrowingRepository;
pub use payment_repository::PaymentRepository as PostgresPaymentRepository;
pub use user_directory::UserDirectory as PostgresUserDirectory;

use crate::ports::PortError;

/// 保存データがドメインの制約に合わない場合のエラー
fn invalid_data(message: impl Into<String>) -> PortError {
    Box::new(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        message.into(),
    ))
}
