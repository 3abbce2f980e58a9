use crate::domain::{Book, BookId, CoverType};
use crate::ports::{BookFilter, BookRepository as BookRepositoryTrait, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use std::str::FromStr;

use super::invalid_data;

/// PostgreSQLの行データをBookに変換する
fn map_row_to_book(row: &PgRow) -> Result<Book> {
    let inventory: i32 = row.get("inventory");
    let inventory = u32::try_from(inventory)
        .map_err(|_| invalid_data(format!("inventory out of range: {}", inventory)))?;

    let cover_str: &str = row.get("cover");
    let cover = CoverType::from_str(cover_str).map_err(invalid_data)?;

    Ok(Book {
        book_id: BookId::from_uuid(row.get("id")),
        title: row.get("title"),
        author: row.get("author"),
        cover,
        inventory,
        daily_fee: row.get("daily_fee"),
    })
}

/// ILIKE用の部分一致パターン（ワイルドカード文字はエスケープする）
fn contains_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn inventory_column(book: &Book) -> Result<i32> {
    i32::try_from(book.inventory)
        .map_err(|_| invalid_data(format!("inventory out of range: {}", book.inventory)))
}

/// BookRepositoryのPostgreSQL実装
pub struct BookRepository {
    pool: PgPool,
}

impl BookRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookRepositoryTrait for BookRepository {
    async fn insert(&self, book: &Book) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO books (id, title, author, cover, inventory, daily_fee)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(book.book_id.value())
        .bind(&book.title)
        .bind(&book.author)
        .bind(book.cover.as_str())
        .bind(inventory_column(book)?)
        .bind(book.daily_fee)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, book: &Book) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE books
            SET title = $2, author = $3, cover = $4, inventory = $5, daily_fee = $6
            WHERE id = $1
            "#,
        )
        .bind(book.book_id.value())
        .bind(&book.title)
        .bind(&book.author)
        .bind(book.cover.as_str())
        .bind(inventory_column(book)?)
        .bind(book.daily_fee)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn get_by_id(&self, book_id: BookId) -> Result<Option<Book>> {
        let row = sqlx::query(
            r#"
            SELECT id, title, author, cover, inventory, daily_fee
            FROM books
            WHERE id = $1
            "#,
        )
        .bind(book_id.value())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_row_to_book).transpose()
    }

    async fn search(&self, filter: &BookFilter) -> Result<Vec<Book>> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, author, cover, inventory, daily_fee
            FROM books
            WHERE ($1::TEXT IS NULL OR title ILIKE $1)
              AND ($2::TEXT IS NULL OR author ILIKE $2)
              AND ($3::TEXT IS NULL OR cover = $3)
            ORDER BY title, id
            "#,
        )
        .bind(filter.title.as_deref().map(contains_pattern))
        .bind(filter.author.as_deref().map(contains_pattern))
        .bind(filter.cover.map(|c| c.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row_to_book).collect()
    }
}
