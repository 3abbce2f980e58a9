use thiserror::Error;

/// Webhook署名検証のエラー
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Signature header is malformed")]
    MalformedHeader,

    #[error("Signature timestamp is outside the tolerance window")]
    TimestampOutOfTolerance,

    #[error("No signature matches the payload")]
    Mismatch,
}

/// Webhook署名検証ポート
///
/// 生のリクエストボディと署名ヘッダーを共有シークレットで検証する。
pub trait WebhookVerifier: Send + Sync {
    fn verify(&self, payload: &[u8], signature_header: &str) -> Result<(), SignatureError>;
}
