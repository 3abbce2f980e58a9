use crate::domain::{Borrowing, BorrowingId, Payment, UserId};
use async_trait::async_trait;
use chrono::NaiveDate;

use super::Result;

/// 貸出作成時の在庫確保の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reservation {
    /// 在庫を1冊確保し、貸出と支払いを保存した
    Reserved,
    /// 在庫切れ（何も保存していない）
    OutOfStock,
    /// 返却予定日が貸出日以前でストレージの制約に違反した（何も保存していない）
    InvalidReturnWindow,
}

/// 返却処理の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Closure {
    /// 返却を記録し、在庫を1冊戻した
    Closed,
    /// 既に返却済み（何も変更していない）
    AlreadyReturned,
    /// 読み込み後に請求済み日数が変わっていた（何も変更していない）
    FinesChanged,
}

/// 延滞料金の保存結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FineRecording {
    /// 請求済み日数を更新し、延滞料金の支払いを保存した
    Recorded,
    /// 未払いの延滞料金が既にある（何も変更していない）
    PendingFineExists,
    /// 読み込み後に請求済み日数が変わっていた（何も変更していない）
    FinesChanged,
}

/// 保存する延滞料金と、それが覆う延滞日数
///
/// `fined_days_before`は貸出を読み込んだ時点の請求済み日数。
/// 保存時に一致しなければ別の請求が先に入ったとみなし、何も保存しない。
#[derive(Debug, Clone, Copy)]
pub struct NewFine<'a> {
    pub payment: &'a Payment,
    pub fined_days_before: u32,
    pub fined_days_after: u32,
}

/// 一覧表示用の貸出（書籍タイトル付き）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BorrowingSummary {
    pub borrowing: Borrowing,
    pub book_title: String,
}

/// リマインド対象の貸出
///
/// 未返却かつ利用者が通知先を登録しているものだけが返される。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderCandidate {
    pub borrowing_id: BorrowingId,
    pub user_id: UserId,
    pub chat_id: i64,
    pub book_title: String,
    pub expected_return_date: NaiveDate,
}

/// 貸出リポジトリポート
///
/// 在庫という共有カウンタの整合性はこのポートの実装が保証する。
/// 貸出作成と返却は、それぞれ1つのトランザクションとして原子的に実行されなければならない。
#[async_trait]
pub trait BorrowingRepository: Send + Sync {
    /// 在庫の条件付き減算・貸出の保存・支払いの保存を1トランザクションで行う
    ///
    /// 在庫が0なら何も保存せず`Reservation::OutOfStock`を返す。
    /// 返却予定日の制約違反は`Reservation::InvalidReturnWindow`。
    async fn create_with_payment(
        &self,
        borrowing: &Borrowing,
        payment: &Payment,
    ) -> Result<Reservation>;

    /// 未返却の貸出に返却日を記録し、在庫を1冊戻す
    ///
    /// `fine`が指定された場合は同じトランザクションで請求済み日数を比較更新し、
    /// 延滞料金の支払いも保存する。
    async fn close(
        &self,
        borrowing_id: BorrowingId,
        returned_on: NaiveDate,
        fine: Option<NewFine<'_>>,
    ) -> Result<Closure>;

    /// 延滞料金を単独で保存する（スタッフによる請求）
    ///
    /// 未払いの延滞料金がないこと・請求済み日数が`fined_days_before`のままであることの検査と、
    /// 請求済み日数の更新・支払いの保存を1トランザクションで行う。
    async fn add_fine(
        &self,
        borrowing_id: BorrowingId,
        fine: NewFine<'_>,
    ) -> Result<FineRecording>;

    async fn get_by_id(&self, borrowing_id: BorrowingId) -> Result<Option<Borrowing>>;

    /// 利用者の貸出を貸出日の新しい順で返す
    ///
    /// `active`: Some(true)で未返却のみ、Some(false)で返却済みのみ。
    async fn find_by_user(
        &self,
        user_id: UserId,
        active: Option<bool>,
    ) -> Result<Vec<BorrowingSummary>>;

    /// 全利用者の貸出を貸出日の新しい順で返す（管理者用）
    async fn find_all(&self, active: Option<bool>) -> Result<Vec<BorrowingSummary>>;

    /// 返却予定日が`due_on`の未返却貸出
    async fn find_due_on(&self, due_on: NaiveDate) -> Result<Vec<ReminderCandidate>>;

    /// 返却予定日が`today`より前の未返却貸出
    async fn find_overdue_as_of(&self, today: NaiveDate) -> Result<Vec<ReminderCandidate>>;
}
