use crate::domain::{BorrowingId, Payment, PaymentId, PaymentStatus, PaymentType};
use crate::ports::{PaymentRepository as PaymentRepositoryTrait, Result, Settlement};
use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use std::str::FromStr;

use super::invalid_data;

pub(super) const PAYMENT_COLUMNS: &str =
    "id, borrowing_id, status, payment_type, session_url, session_id, money_to_pay, created_at";

/// PostgreSQLの行データをPaymentに変換する
pub(super) fn map_row_to_payment(row: &PgRow) -> Result<Payment> {
    let status_str: &str = row.get("status");
    let status = PaymentStatus::from_str(status_str).map_err(invalid_data)?;

    let type_str: &str = row.get("payment_type");
    let payment_type = PaymentType::from_str(type_str).map_err(invalid_data)?;

    Ok(Payment {
        payment_id: PaymentId::from_uuid(row.get("id")),
        borrowing_id: BorrowingId::from_uuid(row.get("borrowing_id")),
        status,
        payment_type,
        session_url: row.get("session_url"),
        session_id: row.get("session_id"),
        money_to_pay: row.get("money_to_pay"),
        created_at: row.get("created_at"),
    })
}

/// 支払いを保存する（貸出作成・返却・延滞料金請求のトランザクションから使う）
pub(super) async fn insert_payment(conn: &mut PgConnection, payment: &Payment) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO payments (
            id,
            borrowing_id,
            status,
            payment_type,
            session_url,
            session_id,
            money_to_pay,
            created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(payment.payment_id.value())
    .bind(payment.borrowing_id.value())
    .bind(payment.status.as_str())
    .bind(payment.payment_type.as_str())
    .bind(&payment.session_url)
    .bind(&payment.session_id)
    .bind(payment.money_to_pay)
    .bind(payment.created_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// PaymentRepositoryのPostgreSQL実装
pub struct PaymentRepository {
    pool: PgPool,
}

impl PaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentRepositoryTrait for PaymentRepository {
    async fn find_by_borrowing(&self, borrowing_id: BorrowingId) -> Result<Vec<Payment>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM payments WHERE borrowing_id = $1 ORDER BY created_at, id",
            PAYMENT_COLUMNS
        ))
        .bind(borrowing_id.value())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row_to_payment).collect()
    }

    async fn find_by_session_id(&self, session_id: &str) -> Result<Option<Payment>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM payments WHERE session_id = $1",
            PAYMENT_COLUMNS
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_row_to_payment).transpose()
    }

    /// 支払いを確定する
    ///
    /// `status = 'PENDING'`を条件にしたUPDATEは行ロックを取るため、
    /// 同じセッションへの同時確定は1つしか成功しない。
    /// 同じトランザクションで、貸出が未払いなら支払い済みにする。
    async fn settle(&self, session_id: &str) -> Result<Settlement> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            r#"
            UPDATE payments
            SET status = 'PAID'
            WHERE session_id = $1 AND status = 'PENDING'
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(session_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM payments WHERE session_id = $1)")
                    .bind(session_id)
                    .fetch_one(&mut *tx)
                    .await?;
            tx.rollback().await?;

            return Ok(if exists {
                Settlement::AlreadyPaid
            } else {
                Settlement::UnknownSession
            });
        };
        let payment = map_row_to_payment(&row)?;

        let borrowing_newly_paid = sqlx::query(
            r#"
            UPDATE borrowings
            SET is_paid = TRUE
            WHERE id = $1 AND is_paid = FALSE
            "#,
        )
        .bind(payment.borrowing_id.value())
        .execute(&mut *tx)
        .await?
        .rows_affected()
            == 1;

        tx.commit().await?;

        Ok(Settlement::Settled {
            payment,
            borrowing_newly_paid,
        })
    }
}
