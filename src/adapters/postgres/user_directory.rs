use crate::domain::{User, UserId};
use crate::ports::{Result, UserDirectory as UserDirectoryTrait};
use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};

fn map_row_to_user(row: &PgRow) -> User {
    User {
        user_id: UserId::from_uuid(row.get("id")),
        email: row.get("email"),
        chat_id: row.get("chat_id"),
        is_staff: row.get("is_staff"),
        is_superuser: row.get("is_superuser"),
    }
}

/// UserDirectoryのPostgreSQL実装（usersテーブルの読み取りのみ）
pub struct UserDirectory {
    pool: PgPool,
}

impl UserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectoryTrait for UserDirectory {
    async fn get_by_id(&self, user_id: UserId) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, email, chat_id, is_staff, is_superuser FROM users WHERE id = $1",
        )
        .bind(user_id.value())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(map_row_to_user))
    }

    async fn find_with_delivery_address(&self) -> Result<Vec<User>> {
        let rows = sqlx::query(
            r#"
            SELECT id, email, chat_id, is_staff, is_superuser
            FROM users
            WHERE chat_id IS NOT NULL
            ORDER BY email
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(map_row_to_user).collect())
    }
}
