use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{AssessFineError, Book, BookId, BorrowBookError, BorrowingId, ReturnBookError, UserId};

/// Borrowing集約 - 1人の利用者による1冊の書籍の1回の貸出
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Borrowing {
    // 識別子
    pub borrowing_id: BorrowingId,

    // 他の集約への参照（IDのみ）
    pub book_id: BookId,
    pub user_id: UserId,

    // 貸出管理の責務
    pub borrow_date: NaiveDate,
    pub expected_return_date: NaiveDate,
    pub actual_return_date: Option<NaiveDate>,

    // 支払い状態（最初の支払い確定でtrue）
    pub is_paid: bool,

    // 延滞料金を請求済みの延滞日数
    pub fined_days: u32,
}

impl Borrowing {
    /// 貸出中か（未返却か）
    pub fn is_active(&self) -> bool {
        self.actual_return_date.is_none()
    }

    /// 貸出予定日数（返却予定日 - 貸出日）
    pub fn rental_days(&self) -> i64 {
        (self.expected_return_date - self.borrow_date).num_days()
    }

    /// 指定ユーザーが所有者か
    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }
}

/// 純粋関数：返却予定日の検証
///
/// 返却予定日は貸出日より厳密に後でなければならない。
/// 永続化アダプターも同じ関数で検証する。
pub fn validate_return_window(
    borrow_date: NaiveDate,
    expected_return_date: NaiveDate,
) -> Result<(), BorrowBookError> {
    if expected_return_date <= borrow_date {
        return Err(BorrowBookError::ReturnDateNotAfterBorrowDate);
    }
    Ok(())
}

/// 純粋関数：書籍を貸し出す
///
/// ビジネスルール：
/// - 返却予定日は貸出日より後
/// - 在庫が1冊以上あること
///
/// 在庫の減算はここでは行わない。永続化層が条件付き減算で原子的に行う。
pub fn borrow_book(
    book: &Book,
    user_id: UserId,
    borrow_date: NaiveDate,
    expected_return_date: NaiveDate,
) -> Result<Borrowing, BorrowBookError> {
    validate_return_window(borrow_date, expected_return_date)?;

    if !book.is_available() {
        return Err(BorrowBookError::BookNotAvailable);
    }

    Ok(Borrowing {
        borrowing_id: BorrowingId::new(),
        book_id: book.book_id,
        user_id,
        borrow_date,
        expected_return_date,
        actual_return_date: None,
        is_paid: false,
        fined_days: 0,
    })
}

/// 純粋関数：書籍を返却する
///
/// 延滞していても返却は受け付ける。延滞料金の扱いは呼び出し側のポリシーで決める。
pub fn return_borrowing(
    borrowing: &Borrowing,
    returned_on: NaiveDate,
) -> Result<Borrowing, ReturnBookError> {
    if !borrowing.is_active() {
        return Err(ReturnBookError::AlreadyReturned);
    }

    Ok(Borrowing {
        actual_return_date: Some(returned_on),
        ..borrowing.clone()
    })
}

/// 純粋関数：延滞日数
///
/// 返却済みなら実返却日、未返却なら`as_of`を基準にする。延滞していなければ0。
pub fn overdue_days(borrowing: &Borrowing, as_of: NaiveDate) -> u32 {
    let reference = borrowing.actual_return_date.unwrap_or(as_of);
    let days = (reference - borrowing.expected_return_date).num_days();
    u32::try_from(days.max(0)).unwrap_or(u32::MAX)
}

/// 純粋関数：まだ延滞料金を請求していない延滞日数
pub fn unfined_overdue_days(borrowing: &Borrowing, as_of: NaiveDate) -> u32 {
    overdue_days(borrowing, as_of).saturating_sub(borrowing.fined_days)
}

/// 純粋関数：延滞料金の対象日数を確定する
///
/// 請求済みの日数は除く。同じ延滞日を二度請求しない。
pub fn assess_overdue(borrowing: &Borrowing, as_of: NaiveDate) -> Result<u32, AssessFineError> {
    if overdue_days(borrowing, as_of) == 0 {
        return Err(AssessFineError::NotOverdue);
    }
    match unfined_overdue_days(borrowing, as_of) {
        0 => Err(AssessFineError::AlreadyFined),
        days => Ok(days),
    }
}
