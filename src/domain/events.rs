use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Book, BookId, BorrowingId, PaymentType, UserId};

/// イベント：貸出が作成された
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowingCreated {
    pub borrowing_id: BorrowingId,
    pub book_id: BookId,
    pub book_title: String,
    pub user_id: UserId,
    pub borrow_date: NaiveDate,
    pub expected_return_date: NaiveDate,
}

/// イベント：書籍が登録・更新された
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookSaved {
    pub book: Book,
    /// 新規登録ならtrue、更新ならfalse
    pub created: bool,
}

/// イベント：支払いが確定した
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfirmed {
    pub borrowing_id: BorrowingId,
    pub user_id: UserId,
    pub payment_type: PaymentType,
    pub amount: Decimal,
}

/// イベント：延滞料金が請求された
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FineAssessed {
    pub borrowing_id: BorrowingId,
    pub user_id: UserId,
    pub overdue_days: u32,
    pub amount: Decimal,
    pub session_url: String,
}

/// イベント：返却期限の前日リマインド
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnDueTomorrow {
    pub borrowing_id: BorrowingId,
    pub chat_id: i64,
    pub book_title: String,
    pub expected_return_date: NaiveDate,
}

/// イベント：延滞通知
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowingOverdue {
    pub borrowing_id: BorrowingId,
    pub chat_id: i64,
    pub book_title: String,
    pub expected_return_date: NaiveDate,
}

/// 通知対象となるイベントの統合型
///
/// 状態変更のコミット後にアプリケーション層から明示的に発行される。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LibraryEvent {
    BorrowingCreated(BorrowingCreated),
    BookSaved(BookSaved),
    PaymentConfirmed(PaymentConfirmed),
    FineAssessed(FineAssessed),
    ReturnDueTomorrow(ReturnDueTomorrow),
    BorrowingOverdue(BorrowingOverdue),
}

impl LibraryEvent {
    /// ログ用のイベント種別名
    pub fn kind(&self) -> &'static str {
        match self {
            LibraryEvent::BorrowingCreated(_) => "BorrowingCreated",
            LibraryEvent::BookSaved(_) => "BookSaved",
            LibraryEvent::PaymentConfirmed(_) => "PaymentConfirmed",
            LibraryEvent::FineAssessed(_) => "FineAssessed",
            LibraryEvent::ReturnDueTomorrow(_) => "ReturnDueTomorrow",
            LibraryEvent::BorrowingOverdue(_) => "BorrowingOverdue",
        }
    }
}
