use async_trait::async_trait;

use super::Result;

/// メッセージ送信ポート
///
/// メッセージングボットAPIへの配信を抽象化する。
/// 配信はリトライされるため、受け手は重複を許容する前提。
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()>;
}
