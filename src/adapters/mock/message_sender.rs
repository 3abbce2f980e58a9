use crate::ports::{MessageSender as MessageSenderTrait, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};

/// Mock implementation of MessageSender
///
/// Stores every delivered message. Can be told to fail a number of
/// attempts first to exercise the worker's retry path.
#[derive(Default)]
pub struct MessageSender {
    sent: Mutex<Vec<(i64, String)>>,
    failures_remaining: AtomicU32,
    attempts: AtomicU32,
}

impl MessageSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_first(failures: u32) -> Self {
        Self {
            failures_remaining: AtomicU32::new(failures),
            ..Self::default()
        }
    }

    /// Successfully delivered messages as (chat_id, text)
    pub fn sent(&self) -> Vec<(i64, String)> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of send attempts, including failed ones
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageSenderTrait for MessageSender {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let should_fail = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err("messaging API unavailable".into());
        }

        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((chat_id, text.to_string()));
        Ok(())
    }
}
