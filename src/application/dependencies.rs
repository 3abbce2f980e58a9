use crate::ports::{
    BookRepository, BorrowingRepository, CheckoutGateway, PaymentRepository, UserDirectory,
    WebhookVerifier,
};
use std::sync::Arc;

use super::notification::NotificationDispatcher;

/// 延滞料金の請求ポリシー（デプロイ設定）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FinePolicy {
    /// 返却時には請求しない。延滞料金は明示的な請求操作でのみ発生する
    #[default]
    Manual,
    /// 延滞して返却された場合、返却と同時に延滞料金の決済セッションを作る
    OnReturn,
}

impl std::str::FromStr for FinePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(FinePolicy::Manual),
            "on_return" => Ok(FinePolicy::OnReturn),
            _ => Err(format!("Invalid fine policy: {}", s)),
        }
    }
}

/// サービスの依存関係
///
/// 振る舞いは持たず、アプリケーション層の関数に引数として渡す。
#[derive(Clone)]
pub struct ServiceDependencies {
    pub books: Arc<dyn BookRepository>,
    pub borrowings: Arc<dyn BorrowingRepository>,
    pub payments: Arc<dyn PaymentRepository>,
    pub users: Arc<dyn UserDirectory>,
    pub checkout_gateway: Arc<dyn CheckoutGateway>,
    pub webhook_verifier: Arc<dyn WebhookVerifier>,
    pub notifier: NotificationDispatcher,
    pub fine_policy: FinePolicy,
}
