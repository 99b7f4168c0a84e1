//! Equipment repository for database operations

use async_trait::async_trait;
use common::error::DatabaseResult;
use sqlx::PgPool;
use tracing::info;

use super::EquipmentStore;
use crate::models::{Equipment, NewEquipment};

/// Equipment repository
#[derive(Clone)]
pub struct EquipmentRepository {
    pool: PgPool,
}

impl EquipmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EquipmentStore for EquipmentRepository {
    async fn list(&self) -> DatabaseResult<Vec<Equipment>> {
        let equipment = sqlx::query_as::<_, Equipment>(
            r#"
            SELECT equipment_id AS id, name, description, location
            FROM equipment
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(equipment)
    }

    async fn create(&self, new_equipment: &NewEquipment) -> DatabaseResult<Equipment> {
        info!("Adding equipment: {}", new_equipment.name);

        let equipment = sqlx::query_as::<_, Equipment>(
            r#"
            INSERT INTO equipment (name, description, location)
            VALUES ($1, $2, $3)
            RETURNING equipment_id AS id, name, description, location
            "#,
        )
        .bind(&new_equipment.name)
        .bind(&new_equipment.description)
        .bind(&new_equipment.location)
        .fetch_one(&self.pool)
        .await?;

        Ok(equipment)
    }

    async fn delete(&self, id: i64) -> DatabaseResult<bool> {
        // Grants and bookings go with it through ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM equipment WHERE equipment_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
