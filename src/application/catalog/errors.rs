use crate::domain::BookValidationError;
use crate::ports::PortError;
use thiserror::Error;

/// カタログ管理アプリケーション層のエラー
#[derive(Debug, Error)]
pub enum CatalogApplicationError {
    #[error("Book not found")]
    BookNotFound,

    /// 入力値がビジネスルールに反する
    #[error("{0}")]
    InvalidBook(String),

    #[error("Repository error")]
    RepositoryError(#[source] PortError),
}

impl From<BookValidationError> for CatalogApplicationError {
    fn from(err: BookValidationError) -> Self {
        let message = match err {
            BookValidationError::EmptyTitle => "Title must not be empty.",
            BookValidationError::EmptyAuthor => "Author must not be empty.",
            BookValidationError::NegativeDailyFee => "Daily fee must not be negative.",
        };
        CatalogApplicationError::InvalidBook(message.to_string())
    }
}

/// カタログ管理アプリケーション層の Result型
pub type Result<T> = std::result::Result<T, CatalogApplicationError>;
