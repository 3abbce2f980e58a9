use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{BookChanges, BookId, BorrowingId, CoverType, UserId};

/// コマンド：書籍を借りる
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowBook {
    pub book_id: BookId,
    pub user_id: UserId,
    pub borrow_date: NaiveDate,
    pub expected_return_date: NaiveDate,
}

/// コマンド：書籍を返却する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnBorrowing {
    pub borrowing_id: BorrowingId,
    pub user_id: UserId,
    pub returned_on: NaiveDate,
}

/// コマンド：延滞料金を請求する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessFine {
    pub borrowing_id: BorrowingId,
    pub as_of: NaiveDate,
}

/// コマンド：書籍を登録する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddBook {
    pub title: String,
    pub author: String,
    pub cover: CoverType,
    pub inventory: u32,
    pub daily_fee: Decimal,
}

/// コマンド：書籍情報を更新する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateBook {
    pub book_id: BookId,
    pub changes: BookChanges,
}
