use crate::domain::{LibraryEvent, UserId};
use crate::ports::{MessageSender, PortError, UserDirectory};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::messages;

/// 配信のリトライ方針
///
/// `attempt`回目（1始まり）の失敗後は `base_delay * 2^(attempt-1)` 待つ。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// 1通分の配信（宛先と本文）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub chat_id: i64,
    pub text: String,
}

/// 通知ワーカー
///
/// キューからイベントを取り出し、宛先を解決して送信する。
/// 送信失敗はリトライし、最終的な失敗はログに残すのみ。
pub struct NotificationWorker {
    users: Arc<dyn UserDirectory>,
    sender: Arc<dyn MessageSender>,
    retry: RetryPolicy,
}

impl NotificationWorker {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        sender: Arc<dyn MessageSender>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            users,
            sender,
            retry,
        }
    }

    /// 送信側がすべてdropされるまでイベントを処理し続ける
    pub async fn run(self, mut receiver: mpsc::Receiver<LibraryEvent>) {
        tracing::info!("notification worker started");
        while let Some(event) = receiver.recv().await {
            self.handle(&event).await;
        }
        tracing::info!("notification worker stopped");
    }

    /// 1イベントを処理し、配信に成功した件数を返す
    pub async fn handle(&self, event: &LibraryEvent) -> usize {
        let deliveries = match self.plan_deliveries(event).await {
            Ok(deliveries) => deliveries,
            Err(e) => {
                tracing::error!(event = event.kind(), error = %e, "failed to resolve recipients");
                return 0;
            }
        };

        let mut delivered = 0;
        for delivery in &deliveries {
            if self.deliver(delivery).await {
                delivered += 1;
            }
        }

        tracing::debug!(
            event = event.kind(),
            planned = deliveries.len(),
            delivered,
            "notification handled"
        );
        delivered
    }

    /// イベントの宛先と本文を決める
    pub async fn plan_deliveries(
        &self,
        event: &LibraryEvent,
    ) -> Result<Vec<Delivery>, PortError> {
        let deliveries = match event {
            LibraryEvent::BorrowingCreated(created) => {
                let text = messages::borrowing_created(created);
                let owner = self.owner_chat_id(created.user_id).await?;

                // 所有者に通知先がある場合のみ、全購読者へも配信する
                match owner {
                    Some(owner_chat) => {
                        let mut recipients = vec![owner_chat];
                        recipients.extend(
                            self.subscriber_chat_ids()
                                .await?
                                .into_iter()
                                .filter(|chat_id| *chat_id != owner_chat),
                        );
                        to_deliveries(recipients, &text)
                    }
                    None => Vec::new(),
                }
            }
            LibraryEvent::BookSaved(saved) => {
                to_deliveries(self.subscriber_chat_ids().await?, &messages::book_saved(saved))
            }
            LibraryEvent::PaymentConfirmed(confirmed) => {
                let text = messages::payment_confirmed(confirmed);
                to_deliveries(self.owner_chat_id(confirmed.user_id).await?, &text)
            }
            LibraryEvent::FineAssessed(assessed) => {
                let text = messages::fine_assessed(assessed);
                to_deliveries(self.owner_chat_id(assessed.user_id).await?, &text)
            }
            LibraryEvent::ReturnDueTomorrow(due) => vec![Delivery {
                chat_id: due.chat_id,
                text: messages::return_due_tomorrow(due),
            }],
            LibraryEvent::BorrowingOverdue(overdue) => vec![Delivery {
                chat_id: overdue.chat_id,
                text: messages::borrowing_overdue(overdue),
            }],
        };

        Ok(deliveries)
    }

    async fn owner_chat_id(&self, user_id: UserId) -> Result<Option<i64>, PortError> {
        Ok(self
            .users
            .get_by_id(user_id)
            .await?
            .and_then(|user| user.chat_id))
    }

    async fn subscriber_chat_ids(&self) -> Result<Vec<i64>, PortError> {
        let mut chat_ids: Vec<i64> = self
            .users
            .find_with_delivery_address()
            .await?
            .into_iter()
            .filter_map(|user| user.chat_id)
            .collect();
        chat_ids.sort_unstable();
        chat_ids.dedup();
        Ok(chat_ids)
    }

    async fn deliver(&self, delivery: &Delivery) -> bool {
        let max_attempts = self.retry.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match self
                .sender
                .send_message(delivery.chat_id, &delivery.text)
                .await
            {
                Ok(()) => return true,
                Err(e) if attempt < max_attempts => {
                    let delay = self.retry.delay_after(attempt);
                    tracing::warn!(
                        chat_id = delivery.chat_id,
                        attempt,
                        error = %e,
                        "message delivery failed; retrying in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::error!(
                        chat_id = delivery.chat_id,
                        attempts = max_attempts,
                        error = %e,
                        "message delivery failed permanently"
                    );
                }
            }
        }

        false
    }
}

fn to_deliveries(chat_ids: impl IntoIterator<Item = i64>, text: &str) -> Vec<Delivery> {
    chat_ids
        .into_iter()
        .map(|chat_id| Delivery {
            chat_id,
            text: text.to_string(),
        })
        .collect()
}
