use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{BookId, BookValidationError, CoverType};

/// Book集約 - 蔵書1タイトル分の在庫と料金
///
/// 不変条件：
/// - 在庫数は0以上（u32で型保証）
/// - 日額料金は0以上
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub book_id: BookId,
    pub title: String,
    pub author: String,
    pub cover: CoverType,
    pub inventory: u32,
    pub daily_fee: Decimal,
}

impl Book {
    /// 貸出可能か（在庫が1冊以上あるか）
    pub fn is_available(&self) -> bool {
        self.inventory > 0
    }
}

/// 書籍の部分更新内容
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookChanges {
    pub title: Option<String>,
    pub author: Option<String>,
    pub cover: Option<CoverType>,
    pub inventory: Option<u32>,
    pub daily_fee: Option<Decimal>,
}

fn validate(book: &Book) -> Result<(), BookValidationError> {
    if book.title.trim().is_empty() {
        return Err(BookValidationError::EmptyTitle);
    }
    if book.author.trim().is_empty() {
        return Err(BookValidationError::EmptyAuthor);
    }
    if book.daily_fee < Decimal::ZERO {
        return Err(BookValidationError::NegativeDailyFee);
    }
    Ok(())
}

/// 純粋関数：書籍を登録する
///
/// 日額料金は小数点以下2桁に丸めて保持する。
pub fn register_book(
    title: String,
    author: String,
    cover: CoverType,
    inventory: u32,
    daily_fee: Decimal,
) -> Result<Book, BookValidationError> {
    let book = Book {
        book_id: BookId::new(),
        title,
        author,
        cover,
        inventory,
        daily_fee: daily_fee.round_dp(2),
    };
    validate(&book)?;
    Ok(book)
}

/// 純粋関数：書籍情報を更新する
///
/// 指定されたフィールドのみ置き換えた新しいBookを返す。
pub fn revise_book(book: &Book, changes: &BookChanges) -> Result<Book, BookValidationError> {
    let revised = Book {
        book_id: book.book_id,
        title: changes.title.clone().unwrap_or_else(|| book.title.clone()),
        author: changes.author.clone().unwrap_or_else(|| book.author.clone()),
        cover: changes.cover.unwrap_or(book.cover),
        inventory: changes.inventory.unwrap_or(book.inventory),
        daily_fee: changes
            .daily_fee
            .map(|fee| fee.round_dp(2))
            .unwrap_or(book.daily_fee),
    };
    validate(&revised)?;
    Ok(revised)
}
