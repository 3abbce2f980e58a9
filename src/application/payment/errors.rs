use crate::ports::{PortError, SignatureError};
use thiserror::Error;

/// 決済アプリケーション層のエラー
#[derive(Debug, Error)]
pub enum PaymentApplicationError {
    /// Webhookの署名が不正
    #[error("Invalid webhook signature: {0}")]
    InvalidSignature(#[from] SignatureError),

    /// Webhookのペイロードが解釈できない
    #[error("Malformed webhook payload: {0}")]
    MalformedPayload(String),

    /// セッションIDに対応する支払いがない
    #[error("Payment session not found")]
    PaymentSessionNotFound,

    /// 決済サービス上でまだ支払われていない
    #[error("Payment has not been completed")]
    PaymentNotCompleted,

    /// 請求金額が支払い可能な上限を超える
    #[error("The amount to pay exceeds the maximum of a single payment.")]
    AmountOutOfRange,

    /// 決済ゲートウェイのエラー
    #[error("Payment gateway error")]
    GatewayError(#[source] PortError),

    /// リポジトリのエラー
    #[error("Repository error")]
    RepositoryError(#[source] PortError),
}

/// 決済アプリケーション層の Result型
pub type Result<T> = std::result::Result<T, PaymentApplicationError>;
