use crate::domain::{Borrowing, BorrowingId, BookId, Payment, UserId};
use crate::ports::{
    BorrowingRepository as BorrowingRepositoryTrait, BorrowingSummary, Closure, FineRecording,
    NewFine, ReminderCandidate, Reservation, Result,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgPool, Row, postgres::PgRow};

use super::invalid_data;
use super::payment_repository::insert_payment;

/// borrowingsテーブルの返却予定日のCHECK制約名
const RETURN_WINDOW_CONSTRAINT: &str = "expected_return_after_borrow";

const SUMMARY_QUERY: &str = r#"
    SELECT
        b.id,
        b.book_id,
        b.user_id,
        b.borrow_date,
        b.expected_return_date,
        b.actual_return_date,
        b.is_paid,
        b.fined_days,
        bk.title AS book_title
    FROM borrowings b
    JOIN books bk ON bk.id = b.book_id
"#;

const REMINDER_QUERY: &str = r#"
    SELECT
        b.id,
        b.user_id,
        u.chat_id,
        bk.title AS book_title,
        b.expected_return_date
    FROM borrowings b
    JOIN users u ON u.id = b.user_id
    JOIN books bk ON bk.id = b.book_id
    WHERE b.actual_return_date IS NULL
      AND u.chat_id IS NOT NULL
"#;

/// PostgreSQLの行データをBorrowingに変換する
fn map_row_to_borrowing(row: &PgRow) -> Result<Borrowing> {
    let fined_days: i32 = row.get("fined_days");
    let fined_days = u32::try_from(fined_days)
        .map_err(|_| invalid_data(format!("fined_days out of range: {}", fined_days)))?;

    Ok(Borrowing {
        borrowing_id: BorrowingId::from_uuid(row.get("id")),
        book_id: BookId::from_uuid(row.get("book_id")),
        user_id: UserId::from_uuid(row.get("user_id")),
        borrow_date: row.get("borrow_date"),
        expected_return_date: row.get("expected_return_date"),
        actual_return_date: row.get("actual_return_date"),
        is_paid: row.get("is_paid"),
        fined_days,
    })
}

fn map_row_to_summary(row: &PgRow) -> Result<BorrowingSummary> {
    Ok(BorrowingSummary {
        borrowing: map_row_to_borrowing(row)?,
        book_title: row.get("book_title"),
    })
}

fn days_column(days: u32) -> Result<i32> {
    i32::try_from(days).map_err(|_| invalid_data(format!("fined_days out of range: {}", days)))
}

fn violates_return_window(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|e| e.constraint())
        .is_some_and(|name| name == RETURN_WINDOW_CONSTRAINT)
}

fn map_row_to_candidate(row: &PgRow) -> ReminderCandidate {
    ReminderCandidate {
        borrowing_id: BorrowingId::from_uuid(row.get("id")),
        user_id: UserId::from_uuid(row.get("user_id")),
        chat_id: row.get("chat_id"),
        book_title: row.get("book_title"),
        expected_return_date: row.get("expected_return_date"),
    }
}

/// BorrowingRepositoryのPostgreSQL実装
///
/// 在庫の増減は条件付きUPDATEで行い、貸出・支払いの保存と同じトランザクションに含める。
pub struct BorrowingRepository {
    pool: PgPool,
}

impl BorrowingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BorrowingRepositoryTrait for BorrowingRepository {
    async fn create_with_payment(
        &self,
        borrowing: &Borrowing,
        payment: &Payment,
    ) -> Result<Reservation> {
        let mut tx = self.pool.begin().await?;

        // 在庫の条件付き減算（同時貸出でも負にならない）
        let reserved = sqlx::query(
            r#"
            UPDATE books
            SET inventory = inventory - 1
            WHERE id = $1 AND inventory > 0
            "#,
        )
        .bind(borrowing.book_id.value())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if reserved == 0 {
            tx.rollback().await?;
            return Ok(Reservation::OutOfStock);
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO borrowings (
                id,
                book_id,
                user_id,
                borrow_date,
                expected_return_date,
                actual_return_date,
                is_paid,
                fined_days
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(borrowing.borrowing_id.value())
        .bind(borrowing.book_id.value())
        .bind(borrowing.user_id.value())
        .bind(borrowing.borrow_date)
        .bind(borrowing.expected_return_date)
        .bind(borrowing.actual_return_date)
        .bind(borrowing.is_paid)
        .bind(days_column(borrowing.fined_days)?)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(e) if violates_return_window(&e) => {
                tx.rollback().await?;
                return Ok(Reservation::InvalidReturnWindow);
            }
            Err(e) => return Err(e.into()),
        }

        insert_payment(&mut tx, payment).await?;

        tx.commit().await?;
        Ok(Reservation::Reserved)
    }

    /// 返却を記録する
    ///
    /// `actual_return_date IS NULL`を条件にしたUPDATEで、二重返却を防ぐ。
    /// 延滞料金を伴う場合は`fined_days`も比較更新する。
    /// 存在しない貸出も`AlreadyReturned`として扱う（呼び出し側で事前に存在確認済み）。
    async fn close(
        &self,
        borrowing_id: BorrowingId,
        returned_on: NaiveDate,
        fine: Option<NewFine<'_>>,
    ) -> Result<Closure> {
        let (fined_before, fined_after) = match &fine {
            Some(fine) => (
                Some(days_column(fine.fined_days_before)?),
                Some(days_column(fine.fined_days_after)?),
            ),
            None => (None, None),
        };

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            UPDATE borrowings
            SET actual_return_date = $2,
                fined_days = COALESCE($4, fined_days)
            WHERE id = $1
              AND actual_return_date IS NULL
              AND ($3::INTEGER IS NULL OR fined_days = $3)
            RETURNING book_id
            "#,
        )
        .bind(borrowing_id.value())
        .bind(returned_on)
        .bind(fined_before)
        .bind(fined_after)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            let still_open: Option<bool> = sqlx::query_scalar(
                "SELECT actual_return_date IS NULL FROM borrowings WHERE id = $1",
            )
            .bind(borrowing_id.value())
            .fetch_optional(&mut *tx)
            .await?;
            tx.rollback().await?;

            return Ok(match still_open {
                Some(true) => Closure::FinesChanged,
                _ => Closure::AlreadyReturned,
            });
        };
        let book_id: uuid::Uuid = row.get("book_id");

        sqlx::query("UPDATE books SET inventory = inventory + 1 WHERE id = $1")
            .bind(book_id)
            .execute(&mut *tx)
            .await?;

        if let Some(fine) = fine {
            insert_payment(&mut tx, fine.payment).await?;
        }

        tx.commit().await?;
        Ok(Closure::Closed)
    }

    /// 延滞料金を保存する
    ///
    /// `fined_days`の比較更新が行ロックを取るため、同じ貸出への同時請求は1件しか通らない。
    async fn add_fine(
        &self,
        borrowing_id: BorrowingId,
        fine: NewFine<'_>,
    ) -> Result<FineRecording> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE borrowings
            SET fined_days = $3
            WHERE id = $1
              AND fined_days = $2
              AND NOT EXISTS (
                  SELECT 1 FROM payments
                  WHERE borrowing_id = $1
                    AND payment_type = 'FINE'
                    AND status = 'PENDING'
              )
            "#,
        )
        .bind(borrowing_id.value())
        .bind(days_column(fine.fined_days_before)?)
        .bind(days_column(fine.fined_days_after)?)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            let pending: bool = sqlx::query_scalar(
                r#"
                SELECT EXISTS (
                    SELECT 1 FROM payments
                    WHERE borrowing_id = $1
                      AND payment_type = 'FINE'
                      AND status = 'PENDING'
                )
                "#,
            )
            .bind(borrowing_id.value())
            .fetch_one(&mut *tx)
            .await?;
            tx.rollback().await?;

            return Ok(if pending {
                FineRecording::PendingFineExists
            } else {
                FineRecording::FinesChanged
            });
        }

        insert_payment(&mut tx, fine.payment).await?;

        tx.commit().await?;
        Ok(FineRecording::Recorded)
    }

    async fn get_by_id(&self, borrowing_id: BorrowingId) -> Result<Option<Borrowing>> {
        let row = sqlx::query(
            r#"
            SELECT
                id,
                book_id,
                user_id,
                borrow_date,
                expected_return_date,
                actual_return_date,
                is_paid,
                fined_days
            FROM borrowings
            WHERE id = $1
            "#,
        )
        .bind(borrowing_id.value())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_row_to_borrowing).transpose()
    }

    async fn find_by_user(
        &self,
        user_id: UserId,
        active: Option<bool>,
    ) -> Result<Vec<BorrowingSummary>> {
        let rows = sqlx::query(&format!(
            r#"{}
            WHERE b.user_id = $1
              AND ($2::BOOLEAN IS NULL OR (b.actual_return_date IS NULL) = $2)
            ORDER BY b.borrow_date DESC, b.id
            "#,
            SUMMARY_QUERY
        ))
        .bind(user_id.value())
        .bind(active)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row_to_summary).collect()
    }

    async fn find_all(&self, active: Option<bool>) -> Result<Vec<BorrowingSummary>> {
        let rows = sqlx::query(&format!(
            r#"{}
            WHERE ($1::BOOLEAN IS NULL OR (b.actual_return_date IS NULL) = $1)
            ORDER BY b.borrow_date DESC, b.id
            "#,
            SUMMARY_QUERY
        ))
        .bind(active)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row_to_summary).collect()
    }

    async fn find_due_on(&self, due_on: NaiveDate) -> Result<Vec<ReminderCandidate>> {
        let rows = sqlx::query(&format!(
            "{} AND b.expected_return_date = $1 ORDER BY b.id",
            REMINDER_QUERY
        ))
        .bind(due_on)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(map_row_to_candidate).collect())
    }

    async fn find_overdue_as_of(&self, today: NaiveDate) -> Result<Vec<ReminderCandidate>> {
        let rows = sqlx::query(&format!(
            "{} AND b.expected_return_date < $1 ORDER BY b.expected_return_date, b.id",
            REMINDER_QUERY
        ))
        .bind(today)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(map_row_to_candidate).collect())
    }
}
