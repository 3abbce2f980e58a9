use crate::ports::{MessageSender, Result};
use async_trait::async_trait;
use serde::Serialize;
use url::Url;

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
}

/// Telegram Bot API の MessageSender 実装
///
/// `POST {api_base}/bot{token}/sendMessage` にJSONで送信する。
pub struct TelegramMessageSender {
    http: reqwest::Client,
    endpoint: Url,
}

impl TelegramMessageSender {
    pub fn new(api_base: &Url, bot_token: &str) -> Result<Self> {
        let mut endpoint = api_base.clone();
        endpoint
            .path_segments_mut()
            .map_err(|_| "Telegram API base URL cannot have a path")?
            .pop_if_empty()
            .push(&format!("bot{}", bot_token))
            .push("sendMessage");

        Ok(Self {
            http: reqwest::Client::new(),
            endpoint,
        })
    }
}

#[async_trait]
impl MessageSender for TelegramMessageSender {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let resp = self
            .http
            .post(self.endpoint.clone())
            .json(&SendMessage { chat_id, text })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(format!("Telegram sendMessage failed (status {}): {}", status, body).into());
        }

        Ok(())
    }
}
