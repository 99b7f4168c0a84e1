//! Group repository for database operations

use async_trait::async_trait;
use common::error::{DatabaseError, DatabaseResult};
use sqlx::PgPool;

use super::GroupStore;
use crate::models::Group;

/// Group repository
#[derive(Clone)]
pub struct GroupRepository {
    pool: PgPool,
}

impl GroupRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GroupStore for GroupRepository {
    async fn list(&self) -> DatabaseResult<Vec<Group>> {
        let groups = sqlx::query_as::<_, Group>(
            "SELECT group_id AS id, name, created_at FROM groups ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(groups)
    }

    async fn create(&self, name: &str) -> DatabaseResult<Group> {
        let group = sqlx::query_as::<_, Group>(
            "INSERT INTO groups (name) VALUES ($1) RETURNING group_id AS id, name, created_at",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        Ok(group)
    }

    async fn delete(&self, id: i64) -> DatabaseResult<bool> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::Connection)?;

        let name: Option<String> =
            sqlx::query_scalar("SELECT name FROM groups WHERE group_id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(name) = name else {
            tx.rollback().await?;
            return Ok(false);
        };

        sqlx::query("UPDATE users SET group_name = NULL WHERE group_name = $1")
            .bind(&name)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM groups WHERE group_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }
}
