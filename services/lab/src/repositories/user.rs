//! User repository for database operations

use async_trait::async_trait;
use common::error::{DatabaseError, DatabaseResult};
use sqlx::PgPool;
use tracing::info;

use super::UserStore;
use crate::models::{AccessUpdate, NewUser, User};

const USER_COLUMNS: &str = r#"
    user_id AS id, username, password_hash, is_approved,
    admin AS is_admin, deleted AS is_deleted, group_name, created_at
"#;

/// User repository
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for UserRepository {
    async fn find_by_username(&self, username: &str) -> DatabaseResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_active(&self, id: i64) -> DatabaseResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE user_id = $1 AND deleted = false"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn create(&self, new_user: &NewUser) -> DatabaseResult<User> {
        info!("Creating new user: {}", new_user.username);

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, password_hash, is_approved)
            VALUES ($1, $2, false)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&new_user.username)
        .bind(&new_user.password_hash)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn list_active(&self) -> DatabaseResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE deleted = false ORDER BY username"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn update_password_hash(&self, id: i64, password_hash: &str) -> DatabaseResult<bool> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $1 WHERE user_id = $2 AND deleted = false",
        )
        .bind(password_hash)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_admin(&self, id: i64, is_admin: bool) -> DatabaseResult<bool> {
        let result =
            sqlx::query("UPDATE users SET admin = $1 WHERE user_id = $2 AND deleted = false")
                .bind(is_admin)
                .bind(id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn soft_delete(&self, id: i64) -> DatabaseResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET deleted = true, is_approved = false
            WHERE user_id = $1 AND deleted = false
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_access(&self, id: i64, update: &AccessUpdate) -> DatabaseResult<bool> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::Connection)?;

        let updated = sqlx::query(
            "UPDATE users SET is_approved = $1, group_name = $2 WHERE user_id = $3 AND deleted = false",
        )
        .bind(update.approved)
        .bind(update.normalized_group())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("DELETE FROM user_equipment_permissions WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        for equipment_id in &update.equipment {
            sqlx::query(
                r#"
                INSERT INTO user_equipment_permissions (user_id, equipment_id)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(id)
            .bind(equipment_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }
}
