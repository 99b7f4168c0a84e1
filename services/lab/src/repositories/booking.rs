//! Booking repository for database operations
//!
//! The `bookings` table carries an exclusion constraint on
//! `(equipment_id, tstzrange(start_time, end_time, '[)'))`, so two racing
//! inserts for overlapping slots cannot both commit even across processes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::error::DatabaseResult;
use sqlx::PgPool;

use super::BookingStore;
use crate::models::{Booking, BookingEntry, NewBooking};

const BOOKING_COLUMNS: &str = r#"
    b.booking_id AS id, b.equipment_id, b.user_id, b.start_time, b.end_time,
    b.purpose, b.created_at
"#;

/// Booking repository
#[derive(Clone)]
pub struct BookingRepository {
    pool: PgPool,
}

impl BookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookingStore for BookingRepository {
    async fn has_overlap(
        &self,
        equipment_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DatabaseResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM bookings
                WHERE equipment_id = $1
                  AND start_time < $3
                  AND $2 < end_time
            )
            "#,
        )
        .bind(equipment_id)
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn insert(&self, new_booking: &NewBooking) -> DatabaseResult<Booking> {
        let booking = sqlx::query_as::<_, Booking>(
            r#"
            INSERT INTO bookings (equipment_id, user_id, start_time, end_time, purpose)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING booking_id AS id, equipment_id, user_id, start_time, end_time,
                      purpose, created_at
            "#,
        )
        .bind(new_booking.equipment_id)
        .bind(new_booking.user_id)
        .bind(new_booking.start_time)
        .bind(new_booking.end_time)
        .bind(&new_booking.purpose)
        .fetch_one(&self.pool)
        .await?;

        Ok(booking)
    }

    async fn find(&self, id: i64) -> DatabaseResult<Option<Booking>> {
        let booking = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings b WHERE b.booking_id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(booking)
    }

    async fn delete(&self, id: i64) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM bookings WHERE booking_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_in_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DatabaseResult<Vec<BookingEntry>> {
        let entries = sqlx::query_as::<_, BookingEntry>(&format!(
            r#"
            SELECT {BOOKING_COLUMNS}, u.username
            FROM bookings b
            JOIN users u ON b.user_id = u.user_id
            WHERE b.start_time < $2 AND $1 < b.end_time
            ORDER BY b.start_time
            "#
        ))
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn list_upcoming_for_user(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> DatabaseResult<Vec<Booking>> {
        let bookings = sqlx::query_as::<_, Booking>(&format!(
            r#"
            SELECT {BOOKING_COLUMNS}
            FROM bookings b
            WHERE b.user_id = $1 AND b.end_time >= $2
            ORDER BY b.start_time
            "#
        ))
        .bind(user_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(bookings)
    }
}
