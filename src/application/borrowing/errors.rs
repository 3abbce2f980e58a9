use crate::application::payment::PaymentApplicationError;
use crate::domain::{AssessFineError, BorrowBookError, ReturnBookError};
use crate::ports::PortError;
use thiserror::Error;

/// 貸出管理アプリケーション層のエラー
#[derive(Debug, Error)]
pub enum BorrowingApplicationError {
    /// コールバックURLを組み立てるリクエスト文脈がない
    #[error("Request context is required for payment creation")]
    MissingRequestContext,

    /// 書籍が存在しない
    #[error("Book not found")]
    BookNotFound,

    /// 貸出が存在しない（他人の貸出も含む）
    #[error("Borrowing not found")]
    BorrowingNotFound,

    /// 返却予定日が貸出日以前
    #[error("The return date must be later than the borrowing date.")]
    ReturnDateNotAfterBorrowDate,

    /// 在庫切れ
    #[error("This book is currently not available.")]
    BookNotAvailable,

    /// 既に返却済み
    #[error("Book already returned.")]
    AlreadyReturned,

    /// 延滞していない貸出への延滞料金請求
    #[error("Borrowing is not overdue.")]
    NotOverdue,

    /// 延滞日数はすべて請求済み
    #[error("All overdue days have already been fined.")]
    AlreadyFined,

    /// 未払いの延滞料金が既にある
    #[error("A fine is already awaiting payment for this borrowing.")]
    FineAlreadyPending,

    /// 同じ貸出への延滞料金の請求が競合した
    #[error("Fines for this borrowing changed concurrently. Please retry.")]
    FineConflict,

    /// 決済処理のエラー
    #[error(transparent)]
    Payment(#[from] PaymentApplicationError),

    /// リポジトリのエラー
    #[error("Repository error")]
    RepositoryError(#[source] PortError),
}

impl From<BorrowBookError> for BorrowingApplicationError {
    fn from(err: BorrowBookError) -> Self {
        match err {
            BorrowBookError::ReturnDateNotAfterBorrowDate => {
                BorrowingApplicationError::ReturnDateNotAfterBorrowDate
            }
            BorrowBookError::BookNotAvailable => BorrowingApplicationError::BookNotAvailable,
        }
    }
}

impl From<ReturnBookError> for BorrowingApplicationError {
    fn from(err: ReturnBookError) -> Self {
        match err {
            ReturnBookError::AlreadyReturned => BorrowingApplicationError::AlreadyReturned,
        }
    }
}

impl From<AssessFineError> for BorrowingApplicationError {
    fn from(err: AssessFineError) -> Self {
        match err {
            AssessFineError::NotOverdue => BorrowingApplicationError::NotOverdue,
            AssessFineError::AlreadyFined => BorrowingApplicationError::AlreadyFined,
        }
    }
}

/// 貸出管理アプリケーション層の Result型
pub type Result<T> = std::result::Result<T, BorrowingApplicationError>;
