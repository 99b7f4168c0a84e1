//! Booking conflict engine
//!
//! Check-then-insert runs under a per-equipment lock inside this process. The
//! `bookings_no_overlap` exclusion constraint covers writers in other
//! processes; a rejected insert surfaces as [`BookingError::SlotTaken`] either
//! way.

use chrono::{DateTime, Utc};
use common::error::DatabaseError;
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::{
    models::{Booking, BookingEntry, NewBooking},
    permissions::PermissionResolver,
    repositories::BookingStore,
};

#[derive(Error, Debug)]
pub enum BookingError {
    #[error("End time must be after start time")]
    InvalidRange,

    #[error("This time slot is already booked, please choose another one")]
    SlotTaken,

    #[error("Not allowed")]
    Forbidden,

    #[error("{0}")]
    Validation(String),

    #[error("Booking not found")]
    NotFound,

    #[error("Storage error: {0}")]
    Storage(#[from] DatabaseError),
}

/// Creates, deletes and lists bookings while keeping slots disjoint
#[derive(Clone)]
pub struct BookingEngine {
    bookings: Arc<dyn BookingStore>,
    permissions: PermissionResolver,
    locks: Arc<Mutex<HashMap<i64, Arc<Mutex<()>>>>>,
}

impl BookingEngine {
    pub fn new(bookings: Arc<dyn BookingStore>, permissions: PermissionResolver) -> Self {
        Self {
            bookings,
            permissions,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn equipment_lock(&self, equipment_id: i64) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .await
            .entry(equipment_id)
            .or_default()
            .clone()
    }

    /// Drop the equipment's lock entry once no caller holds or awaits it
    ///
    /// Handles are only cloned under the map lock, so a strong count of one
    /// seen here means the map owns the last handle.
    async fn release_equipment_lock(&self, equipment_id: i64) {
        let mut locks = self.locks.lock().await;
        if locks
            .get(&equipment_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&equipment_id);
        }
    }

    /// Whether `[start, end)` overlaps an existing booking of the equipment
    pub async fn has_conflict(
        &self,
        equipment_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<bool, BookingError> {
        Ok(self.bookings.has_overlap(equipment_id, start, end).await?)
    }

    /// Reserve `[start, end)` on a piece of equipment
    pub async fn create_booking(
        &self,
        equipment_id: i64,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        purpose: &str,
    ) -> Result<Booking, BookingError> {
        if end <= start {
            return Err(BookingError::InvalidRange);
        }

        let lock = self.equipment_lock(equipment_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.create_locked(equipment_id, user_id, start, end, purpose)
                .await
        };
        drop(lock);
        self.release_equipment_lock(equipment_id).await;

        result
    }

    async fn create_locked(
        &self,
        equipment_id: i64,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        purpose: &str,
    ) -> Result<Booking, BookingError> {
        if self.has_conflict(equipment_id, start, end).await? {
            info!(
                "Booking rejected for user {} on equipment {}: slot taken",
                user_id, equipment_id
            );
            return Err(BookingError::SlotTaken);
        }

        if !self.permissions.can_book(user_id, equipment_id).await? {
            warn!(
                "Booking rejected for user {} on equipment {}: no permission",
                user_id, equipment_id
            );
            return Err(BookingError::Forbidden);
        }

        let purpose = purpose.trim();
        if purpose.is_empty() {
            return Err(BookingError::Validation("Purpose is required".to_string()));
        }

        let new_booking = NewBooking {
            equipment_id,
            user_id,
            start_time: start,
            end_time: end,
            purpose: purpose.to_string(),
        };

        match self.bookings.insert(&new_booking).await {
            Ok(booking) => {
                info!(
                    "Booking {} created by user {} on equipment {} from {} to {}",
                    booking.id, user_id, equipment_id, start, end
                );
                Ok(booking)
            }
            Err(DatabaseError::ExclusionViolation(_)) => {
                info!(
                    "Booking rejected for user {} on equipment {}: slot taken concurrently",
                    user_id, equipment_id
                );
                Err(BookingError::SlotTaken)
            }
            Err(DatabaseError::ForeignKeyViolation(_)) => Err(BookingError::NotFound),
            Err(e) => {
                error!("Failed to insert booking: {}", e);
                Err(e.into())
            }
        }
    }

    /// Delete a booking; only its owner may do so
    pub async fn delete_booking(
        &self,
        booking_id: i64,
        requesting_user_id: i64,
    ) -> Result<(), BookingError> {
        let booking = self
            .bookings
            .find(booking_id)
            .await?
            .ok_or(BookingError::NotFound)?;

        if booking.user_id != requesting_user_id {
            warn!(
                "User {} tried to delete booking {} owned by user {}",
                requesting_user_id, booking_id, booking.user_id
            );
            return Err(BookingError::Forbidden);
        }

        if !self.bookings.delete(booking_id).await? {
            return Err(BookingError::NotFound);
        }

        info!("Booking {} deleted by user {}", booking_id, requesting_user_id);
        Ok(())
    }

    /// Bookings overlapping `[start, end)`, with the booker's username
    pub async fn bookings_in_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<BookingEntry>, BookingError> {
        if end <= start {
            return Err(BookingError::InvalidRange);
        }
        Ok(self.bookings.list_in_window(start, end).await?)
    }

    /// The user's bookings that have not ended yet
    pub async fn upcoming_bookings(&self, user_id: i64) -> Result<Vec<Booking>, BookingError> {
        Ok(self
            .bookings
            .list_upcoming_for_user(user_id, Utc::now())
            .await?)
    }
}
