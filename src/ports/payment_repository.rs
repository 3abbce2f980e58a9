use crate::domain::{BorrowingId, Payment};
use async_trait::async_trait;

use super::Result;

/// 支払い確定処理の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    /// PENDING → PAID に遷移した
    Settled {
        payment: Payment,
        /// この支払いで貸出が初めて支払い済みになったか
        borrowing_newly_paid: bool,
    },
    /// 既にPAID（何も変更していない）
    AlreadyPaid,
    /// セッションIDに対応する支払いがない
    UnknownSession,
}

/// 支払いリポジトリポート
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// 貸出に紐づく支払いを作成順で返す
    async fn find_by_borrowing(&self, borrowing_id: BorrowingId) -> Result<Vec<Payment>>;

    async fn find_by_session_id(&self, session_id: &str) -> Result<Option<Payment>>;

    /// セッションIDの支払いを確定する
    ///
    /// PENDINGの場合のみ遷移させる条件付き更新で、同じセッションの
    /// 同時・重複確定が1回しか効かないことを保証する。
    async fn settle(&self, session_id: &str) -> Result<Settlement>;
}
