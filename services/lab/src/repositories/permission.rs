//! Equipment permission repository

use async_trait::async_trait;
use common::error::DatabaseResult;
use sqlx::PgPool;

use super::PermissionStore;

/// Grant repository over `user_equipment_permissions`
#[derive(Clone)]
pub struct PermissionRepository {
    pool: PgPool,
}

impl PermissionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PermissionStore for PermissionRepository {
    async fn has_grant(&self, user_id: i64, equipment_id: i64) -> DatabaseResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM user_equipment_permissions
                WHERE user_id = $1 AND equipment_id = $2
            )
            "#,
        )
        .bind(user_id)
        .bind(equipment_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn grant(&self, user_id: i64, equipment_id: i64) -> DatabaseResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_equipment_permissions (user_id, equipment_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(equipment_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn revoke(&self, user_id: i64, equipment_id: i64) -> DatabaseResult<bool> {
        let result = sqlx::query(
            "DELETE FROM user_equipment_permissions WHERE user_id = $1 AND equipment_id = $2",
        )
        .bind(user_id)
        .bind(equipment_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn granted_equipment(&self, user_id: i64) -> DatabaseResult<Vec<i64>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT equipment_id FROM user_equipment_permissions WHERE user_id = $1 ORDER BY equipment_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}
