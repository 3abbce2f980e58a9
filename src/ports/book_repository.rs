use crate::domain::{Book, BookId, CoverType};
use async_trait::async_trait;

use super::Result;

/// 書籍検索条件
///
/// title / author は大文字小文字を区別しない部分一致。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookFilter {
    pub title: Option<String>,
    pub author: Option<String>,
    pub cover: Option<CoverType>,
}

impl BookFilter {
    /// 条件に一致するか（インメモリ実装と検証用）
    pub fn matches(&self, book: &Book) -> bool {
        fn contains_ci(haystack: &str, needle: &Option<String>) -> bool {
            needle
                .as_ref()
                .is_none_or(|n| haystack.to_lowercase().contains(&n.to_lowercase()))
        }

        contains_ci(&book.title, &self.title)
            && contains_ci(&book.author, &self.author)
            && self.cover.is_none_or(|c| c == book.cover)
    }
}

/// 書籍リポジトリポート
///
/// カタログの永続化を抽象化する。
/// 在庫の増減は貸出・返却のトランザクション（BorrowingRepository）が担当し、
/// ここでの更新はカタログ編集による上書きのみ。
#[async_trait]
pub trait BookRepository: Send + Sync {
    /// 書籍を新規登録する
    async fn insert(&self, book: &Book) -> Result<()>;

    /// 書籍を更新する
    ///
    /// 対象が存在しなければfalseを返す。
    async fn update(&self, book: &Book) -> Result<bool>;

    async fn get_by_id(&self, book_id: BookId) -> Result<Option<Book>>;

    /// 条件に一致する書籍をタイトル順で返す
    async fn search(&self, filter: &BookFilter) -> Result<Vec<Book>>;
}
