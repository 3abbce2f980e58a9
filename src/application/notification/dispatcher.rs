use crate::domain::LibraryEvent;
use tokio::sync::mpsc::{self, error::TrySendError};

/// 通知ディスパッチャー
///
/// アプリケーション層がコミット後に呼び出すイベントの発行口。
/// 有界キューへの非ブロッキングなenqueueのみを行い、配信はワーカーに任せる。
/// キューが満杯・停止済みでもリクエストは失敗させず、ログに残して破棄する。
#[derive(Debug, Clone)]
pub struct NotificationDispatcher {
    sender: mpsc::Sender<LibraryEvent>,
}

impl NotificationDispatcher {
    /// ディスパッチャーと、ワーカーが消費する受信側を作る
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<LibraryEvent>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    pub fn publish(&self, event: LibraryEvent) {
        let kind = event.kind();
        match self.sender.try_send(event) {
            Ok(()) => tracing::debug!(event = kind, "notification queued"),
            Err(TrySendError::Full(_)) => {
                tracing::warn!(event = kind, "notification queue is full; event dropped")
            }
            Err(TrySendError::Closed(_)) => {
                tracing::warn!(event = kind, "notification worker has stopped; event dropped")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BorrowingId, BorrowingOverdue};
    use chrono::NaiveDate;

    fn overdue_event() -> LibraryEvent {
        LibraryEvent::BorrowingOverdue(BorrowingOverdue {
            borrowing_id: BorrowingId::new(),
            chat_id: 1,
            book_title: "Dune".to_string(),
            expected_return_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        })
    }

    #[tokio::test]
    async fn test_publish_enqueues_event() {
        let (dispatcher, mut receiver) = NotificationDispatcher::channel(4);
        let event = overdue_event();

        dispatcher.publish(event.clone());

        assert_eq!(receiver.recv().await, Some(event));
    }

    #[tokio::test]
    async fn test_publish_drops_when_queue_is_full() {
        let (dispatcher, mut receiver) = NotificationDispatcher::channel(1);

        dispatcher.publish(overdue_event());
        dispatcher.publish(overdue_event());

        assert!(receiver.recv().await.is_some());
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_publish_does_not_panic_when_worker_is_gone() {
        let (dispatcher, receiver) = NotificationDispatcher::channel(1);
        drop(receiver);

        dispatcher.publish(overdue_event());
    }
}
