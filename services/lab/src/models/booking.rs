//! Booking model and related functionality

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Reservation of one piece of equipment over `[start_time, end_time)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Booking {
    pub id: i64,
    pub equipment_id: i64,
    pub user_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub purpose: String,
    pub created_at: DateTime<Utc>,
}

/// Booking joined with the booker's username, as listed on the calendar
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BookingEntry {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub booking: Booking,
    pub username: String,
}

/// New booking creation payload
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub equipment_id: i64,
    pub user_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub purpose: String,
}
