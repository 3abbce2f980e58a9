use crate::application::{
    borrowing::BorrowingApplicationError, catalog::CatalogApplicationError,
    payment::PaymentApplicationError,
};
use crate::ports::PortError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::types::ErrorResponse;

/// API層のエラー型
///
/// アプリケーション層のエラーをラップし、HTTPレスポンスへのマッピングを提供する。
#[derive(Debug)]
pub enum ApiError {
    Borrowing(BorrowingApplicationError),
    Payment(PaymentApplicationError),
    Catalog(CatalogApplicationError),
    /// 401 - 利用者を特定できない
    Unauthenticated,
    /// 403 - スタッフ専用
    Forbidden,
    /// 400 - リクエストの形式エラー
    BadRequest(String),
    /// 500 - 認証などで発生したストレージ障害
    Internal(PortError),
}

impl From<BorrowingApplicationError> for ApiError {
    fn from(err: BorrowingApplicationError) -> Self {
        ApiError::Borrowing(err)
    }
}

impl From<PaymentApplicationError> for ApiError {
    fn from(err: PaymentApplicationError) -> Self {
        ApiError::Payment(err)
    }
}

impl From<CatalogApplicationError> for ApiError {
    fn from(err: CatalogApplicationError) -> Self {
        ApiError::Catalog(err)
    }
}

type Mapped = (StatusCode, &'static str, String);

fn validation(message: impl ToString) -> Mapped {
    (
        StatusCode::BAD_REQUEST,
        "VALIDATION_ERROR",
        message.to_string(),
    )
}

// 内部エラーの詳細はログに記録し、クライアントには一般的なメッセージのみを返す
fn internal(context: &str, err: &PortError) -> Mapped {
    tracing::error!("{}: {}", context, err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "Internal server error".to_string(),
    )
}

fn map_payment(err: &PaymentApplicationError) -> Mapped {
    match err {
        // 400 Bad Request - Webhookの検証失敗
        PaymentApplicationError::InvalidSignature(_) | PaymentApplicationError::MalformedPayload(_) => {
            tracing::warn!("Rejected webhook: {}", err);
            (StatusCode::BAD_REQUEST, "INVALID_WEBHOOK", err.to_string())
        }
        PaymentApplicationError::AmountOutOfRange => validation(err),
        PaymentApplicationError::PaymentSessionNotFound => (
            StatusCode::NOT_FOUND,
            "PAYMENT_SESSION_NOT_FOUND",
            err.to_string(),
        ),
        PaymentApplicationError::PaymentNotCompleted => (
            StatusCode::CONFLICT,
            "PAYMENT_NOT_COMPLETED",
            err.to_string(),
        ),
        // 502 Bad Gateway - 外部決済サービスの障害
        PaymentApplicationError::GatewayError(e) => {
            tracing::error!("Payment gateway error: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                "PAYMENT_GATEWAY_ERROR",
                "Payment gateway is unavailable".to_string(),
            )
        }
        PaymentApplicationError::RepositoryError(e) => internal("Payment repository error", e),
    }
}

fn map_borrowing(err: &BorrowingApplicationError) -> Mapped {
    match err {
        BorrowingApplicationError::MissingRequestContext
        | BorrowingApplicationError::ReturnDateNotAfterBorrowDate
        | BorrowingApplicationError::BookNotAvailable
        | BorrowingApplicationError::AlreadyReturned
        | BorrowingApplicationError::NotOverdue
        | BorrowingApplicationError::AlreadyFined
        | BorrowingApplicationError::FineAlreadyPending => validation(err),

        // 409 Conflict - 同時に請求された
        BorrowingApplicationError::FineConflict => {
            (StatusCode::CONFLICT, "FINE_CONFLICT", err.to_string())
        }

        // 404 Not Found - 他人の貸出も含む
        BorrowingApplicationError::BookNotFound => {
            (StatusCode::NOT_FOUND, "BOOK_NOT_FOUND", err.to_string())
        }
        BorrowingApplicationError::BorrowingNotFound => {
            (StatusCode::NOT_FOUND, "BORROWING_NOT_FOUND", err.to_string())
        }

        BorrowingApplicationError::Payment(inner) => map_payment(inner),
        BorrowingApplicationError::RepositoryError(e) => internal("Borrowing repository error", e),
    }
}

fn map_catalog(err: &CatalogApplicationError) -> Mapped {
    match err {
        CatalogApplicationError::InvalidBook(message) => validation(message),
        CatalogApplicationError::BookNotFound => {
            (StatusCode::NOT_FOUND, "BOOK_NOT_FOUND", err.to_string())
        }
        CatalogApplicationError::RepositoryError(e) => internal("Book repository error", e),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            ApiError::Borrowing(err) => map_borrowing(err),
            ApiError::Payment(err) => map_payment(err),
            ApiError::Catalog(err) => map_catalog(err),
            ApiError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHENTICATED",
                "Authentication credentials were not provided".to_string(),
            ),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "This action is restricted to staff".to_string(),
            ),
            ApiError::BadRequest(message) => validation(message),
            ApiError::Internal(e) => internal("User directory error", e),
        };

        let body = Json(ErrorResponse::new(error_type, message));
        (status, body).into_response()
    }
}
