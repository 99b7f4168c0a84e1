//! Idempotent schema bootstrap run at startup

use common::error::{DatabaseError, DatabaseResult};
use sqlx::PgPool;
use tracing::info;

const STATEMENTS: &[&str] = &[
    "CREATE EXTENSION IF NOT EXISTS btree_gist",
    r#"
    CREATE TABLE IF NOT EXISTS users (
        user_id BIGSERIAL PRIMARY KEY,
        username TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        is_approved BOOLEAN NOT NULL DEFAULT false,
        admin BOOLEAN NOT NULL DEFAULT false,
        deleted BOOLEAN NOT NULL DEFAULT false,
        group_name TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS groups (
        group_id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS equipment (
        equipment_id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        description TEXT,
        location TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_equipment_permissions (
        user_id BIGINT NOT NULL REFERENCES users (user_id) ON DELETE CASCADE,
        equipment_id BIGINT NOT NULL REFERENCES equipment (equipment_id) ON DELETE CASCADE,
        PRIMARY KEY (user_id, equipment_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS bookings (
        booking_id BIGSERIAL PRIMARY KEY,
        equipment_id BIGINT NOT NULL REFERENCES equipment (equipment_id) ON DELETE CASCADE,
        user_id BIGINT NOT NULL REFERENCES users (user_id),
        start_time TIMESTAMPTZ NOT NULL,
        end_time TIMESTAMPTZ NOT NULL,
        purpose TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        CONSTRAINT bookings_valid_range CHECK (end_time > start_time),
        CONSTRAINT bookings_no_overlap EXCLUDE USING gist (
            equipment_id WITH =,
            tstzrange(start_time, end_time, '[)') WITH &&
        )
    )
    "#,
    "CREATE INDEX IF NOT EXISTS bookings_user_end_idx ON bookings (user_id, end_time)",
];

/// Create every table the service needs if it does not exist yet
pub async fn ensure(pool: &PgPool) -> DatabaseResult<()> {
    info!("Ensuring database schema");

    for statement in STATEMENTS {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))?;
    }

    info!("Database schema is up to date");
    Ok(())
}
