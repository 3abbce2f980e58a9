use async_trait::async_trait;
use rust_decimal::Decimal;

use super::Result;

/// 決済セッション作成リクエスト
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    /// 明細に表示される説明
    pub description: String,
    pub amount: Decimal,
    pub success_url: String,
    pub cancel_url: String,
}

/// 外部決済サービスのホスト型決済セッション
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub session_id: String,
    pub url: String,
}

/// 決済ゲートウェイポート
#[async_trait]
pub trait CheckoutGateway: Send + Sync {
    async fn create_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession>;

    /// セッションを失効させる（ローカル保存に失敗したときの補償）
    async fn expire_session(&self, session_id: &str) -> Result<()>;

    /// セッションが支払い済みか外部決済サービスに問い合わせる
    async fn is_session_paid(&self, session_id: &str) -> Result<bool>;
}
