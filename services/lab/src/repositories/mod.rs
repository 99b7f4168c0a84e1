//! Repositories for database operations
//!
//! Every table is reached through a trait so the core services can be driven
//! by PostgreSQL in production and by in-memory stores in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::error::DatabaseResult;
use sqlx::PgPool;
use std::sync::Arc;

use crate::models::{
    AccessUpdate, Booking, BookingEntry, Equipment, Group, NewBooking, NewEquipment, NewUser,
    User,
};

pub mod booking;
pub mod equipment;
pub mod group;
#[cfg(test)]
pub mod memory;
pub mod permission;
pub mod user;

pub use booking::BookingRepository;
pub use equipment::EquipmentRepository;
pub use group::GroupRepository;
pub use permission::PermissionRepository;
pub use user::UserRepository;

/// User accounts
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Find a user by username, soft-deleted accounts included
    async fn find_by_username(&self, username: &str) -> DatabaseResult<Option<User>>;

    /// Find a user that has not been soft-deleted
    async fn find_active(&self, id: i64) -> DatabaseResult<Option<User>>;

    /// Insert a new, unapproved, non-admin user
    async fn create(&self, new_user: &NewUser) -> DatabaseResult<User>;

    /// All users that have not been soft-deleted, ordered by username
    async fn list_active(&self) -> DatabaseResult<Vec<User>>;

    /// Replace the stored password hash of an active user
    async fn update_password_hash(&self, id: i64, password_hash: &str) -> DatabaseResult<bool>;

    /// Set the admin flag of an active user
    async fn set_admin(&self, id: i64, is_admin: bool) -> DatabaseResult<bool>;

    /// Mark an active user deleted and unapproved
    async fn soft_delete(&self, id: i64) -> DatabaseResult<bool>;

    /// Set approval and group, and replace the equipment grant set, atomically
    async fn update_access(&self, id: i64, update: &AccessUpdate) -> DatabaseResult<bool>;
}

/// Per-user, per-equipment booking grants
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Whether a grant row exists for the pair
    async fn has_grant(&self, user_id: i64, equipment_id: i64) -> DatabaseResult<bool>;

    /// Insert a grant; inserting an existing grant is a no-op
    async fn grant(&self, user_id: i64, equipment_id: i64) -> DatabaseResult<()>;

    /// Remove a grant; returns whether one existed
    async fn revoke(&self, user_id: i64, equipment_id: i64) -> DatabaseResult<bool>;

    /// Equipment ids the user holds grants for
    async fn granted_equipment(&self, user_id: i64) -> DatabaseResult<Vec<i64>>;
}

/// Equipment catalogue
#[async_trait]
pub trait EquipmentStore: Send + Sync {
    /// All equipment ordered by name
    async fn list(&self) -> DatabaseResult<Vec<Equipment>>;

    /// Insert equipment; a duplicate name is a unique violation
    async fn create(&self, new_equipment: &NewEquipment) -> DatabaseResult<Equipment>;

    /// Delete equipment together with its grants and bookings
    async fn delete(&self, id: i64) -> DatabaseResult<bool>;
}

/// User groups
#[async_trait]
pub trait GroupStore: Send + Sync {
    /// All groups ordered by name
    async fn list(&self) -> DatabaseResult<Vec<Group>>;

    /// Insert a group; a duplicate name is a unique violation
    async fn create(&self, name: &str) -> DatabaseResult<Group>;

    /// Unlink users from the group, then delete it
    async fn delete(&self, id: i64) -> DatabaseResult<bool>;
}

/// Equipment bookings
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Whether any booking of the equipment overlaps `[start, end)`
    async fn has_overlap(
        &self,
        equipment_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DatabaseResult<bool>;

    /// Persist a booking
    ///
    /// Stores backed by an exclusion constraint report an overlapping insert
    /// as `DatabaseError::ExclusionViolation`.
    async fn insert(&self, new_booking: &NewBooking) -> DatabaseResult<Booking>;

    /// Find a booking by id
    async fn find(&self, id: i64) -> DatabaseResult<Option<Booking>>;

    /// Delete a booking by id
    async fn delete(&self, id: i64) -> DatabaseResult<bool>;

    /// Bookings overlapping `[start, end)`, ordered by start time
    async fn list_in_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DatabaseResult<Vec<BookingEntry>>;

    /// Bookings of a user ending at or after `now`, ordered by start time
    async fn list_upcoming_for_user(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> DatabaseResult<Vec<Booking>>;
}

/// Storage reachability probe
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn is_healthy(&self) -> DatabaseResult<bool>;
}

#[async_trait]
impl HealthProbe for PgPool {
    async fn is_healthy(&self) -> DatabaseResult<bool> {
        common::database::health_check(self).await
    }
}

/// The full set of stores the service runs on
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub permissions: Arc<dyn PermissionStore>,
    pub equipment: Arc<dyn EquipmentStore>,
    pub groups: Arc<dyn GroupStore>,
    pub bookings: Arc<dyn BookingStore>,
    pub health: Arc<dyn HealthProbe>,
}

impl Stores {
    /// PostgreSQL-backed stores sharing one pool
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            users: Arc::new(UserRepository::new(pool.clone())),
            permissions: Arc::new(PermissionRepository::new(pool.clone())),
            equipment: Arc::new(EquipmentRepository::new(pool.clone())),
            groups: Arc::new(GroupRepository::new(pool.clone())),
            bookings: Arc::new(BookingRepository::new(pool.clone())),
            health: Arc::new(pool),
        }
    }
}
