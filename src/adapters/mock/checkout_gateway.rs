use crate::ports::{CheckoutGateway as CheckoutGatewayTrait, CheckoutRequest, CheckoutSession, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

/// Mock implementation of CheckoutGateway
///
/// Records every session request and expiry so tests can assert on them.
/// Sessions are reported unpaid until `mark_paid` is called.
#[derive(Default)]
pub struct CheckoutGateway {
    requests: Mutex<Vec<CheckoutRequest>>,
    expired: Mutex<Vec<String>>,
    paid: Mutex<HashSet<String>>,
    failing: AtomicBool,
    next_id: AtomicU64,
}

impl CheckoutGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent gateway calls fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn mark_paid(&self, session_id: &str) {
        self.paid
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session_id.to_string());
    }

    pub fn requests(&self) -> Vec<CheckoutRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn expired_sessions(&self) -> Vec<String> {
        self.expired
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn check_available(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err("payment gateway unavailable".into());
        }
        Ok(())
    }
}

#[async_trait]
impl CheckoutGatewayTrait for CheckoutGateway {
    async fn create_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession> {
        self.check_available()?;

        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let session_id = format!("cs_test_{}", n);
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        Ok(CheckoutSession {
            url: format!("https://checkout.test/pay/{}", session_id),
            session_id,
        })
    }

    async fn expire_session(&self, session_id: &str) -> Result<()> {
        self.check_available()?;
        self.expired
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(session_id.to_string());
        Ok(())
    }

    async fn is_session_paid(&self, session_id: &str) -> Result<bool> {
        self.check_available()?;
        Ok(self
            .paid
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(session_id))
    }
}
