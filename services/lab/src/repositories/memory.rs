//! In-memory stores used by unit and router tests
//!
//! Unique names and foreign keys are emulated. Booking overlap is NOT enforced
//! here, so tests exercise the booking engine's own serialization.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::error::{DatabaseError, DatabaseResult};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{
    BookingStore, EquipmentStore, GroupStore, HealthProbe, PermissionStore, Stores, UserStore,
};
use crate::models::{
    AccessUpdate, Booking, BookingEntry, Equipment, Group, NewBooking, NewEquipment, NewUser,
    User,
};

#[derive(Default)]
struct State {
    next_id: i64,
    users: BTreeMap<i64, User>,
    grants: BTreeSet<(i64, i64)>,
    equipment: BTreeMap<i64, Equipment>,
    groups: BTreeMap<i64, Group>,
    bookings: BTreeMap<i64, Booking>,
    unhealthy: bool,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Every store trait over one shared in-memory state
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert a user directly, bypassing registration
    pub fn seed_user(&self, username: &str, password_hash: &str, approved: bool, admin: bool) -> User {
        let mut state = self.state();
        let id = state.next_id();
        let user = User {
            id,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            is_approved: approved,
            is_admin: admin,
            is_deleted: false,
            group_name: None,
            created_at: Utc::now(),
        };
        state.users.insert(id, user.clone());
        user
    }

    /// Insert equipment directly
    pub fn seed_equipment(&self, name: &str) -> Equipment {
        let mut state = self.state();
        let id = state.next_id();
        let equipment = Equipment {
            id,
            name: name.to_string(),
            description: None,
            location: None,
        };
        state.equipment.insert(id, equipment.clone());
        equipment
    }

    /// Current stored row for a user, deleted or not
    pub fn user(&self, id: i64) -> Option<User> {
        self.state().users.get(&id).cloned()
    }

    pub fn booking_count(&self) -> usize {
        self.state().bookings.len()
    }

    pub fn set_unhealthy(&self, unhealthy: bool) {
        self.state().unhealthy = unhealthy;
    }

    /// Wrap the store as the full set of service stores
    pub fn stores(self: &Arc<Self>) -> Stores {
        Stores {
            users: self.clone(),
            permissions: self.clone(),
            equipment: self.clone(),
            groups: self.clone(),
            bookings: self.clone(),
            health: self.clone(),
        }
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_username(&self, username: &str) -> DatabaseResult<Option<User>> {
        Ok(self
            .state()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_active(&self, id: i64) -> DatabaseResult<Option<User>> {
        Ok(self.state().users.get(&id).filter(|u| !u.is_deleted).cloned())
    }

    async fn create(&self, new_user: &NewUser) -> DatabaseResult<User> {
        let mut state = self.state();
        if state.users.values().any(|u| u.username == new_user.username) {
            return Err(DatabaseError::UniqueViolation("users_username_key".into()));
        }
        let id = state.next_id();
        let user = User {
            id,
            username: new_user.username.clone(),
            password_hash: new_user.password_hash.clone(),
            is_approved: false,
            is_admin: false,
            is_deleted: false,
            group_name: None,
            created_at: Utc::now(),
        };
        state.users.insert(id, user.clone());
        Ok(user)
    }

    async fn list_active(&self) -> DatabaseResult<Vec<User>> {
        let mut users: Vec<User> = self
            .state()
            .users
            .values()
            .filter(|u| !u.is_deleted)
            .cloned()
            .collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    async fn update_password_hash(&self, id: i64, password_hash: &str) -> DatabaseResult<bool> {
        let mut state = self.state();
        match state.users.get_mut(&id).filter(|u| !u.is_deleted) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_admin(&self, id: i64, is_admin: bool) -> DatabaseResult<bool> {
        let mut state = self.state();
        match state.users.get_mut(&id).filter(|u| !u.is_deleted) {
            Some(user) => {
                user.is_admin = is_admin;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn soft_delete(&self, id: i64) -> DatabaseResult<bool> {
        let mut state = self.state();
        match state.users.get_mut(&id).filter(|u| !u.is_deleted) {
            Some(user) => {
                user.is_deleted = true;
                user.is_approved = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_access(&self, id: i64, update: &AccessUpdate) -> DatabaseResult<bool> {
        let mut state = self.state();
        if !state.users.get(&id).is_some_and(|u| !u.is_deleted) {
            return Ok(false);
        }
        if let Some(missing) = update
            .equipment
            .iter()
            .find(|eq| !state.equipment.contains_key(*eq))
        {
            return Err(DatabaseError::ForeignKeyViolation(format!(
                "user_equipment_permissions_equipment_id_fkey ({missing})"
            )));
        }

        if let Some(user) = state.users.get_mut(&id) {
            user.is_approved = update.approved;
            user.group_name = update.normalized_group();
        }
        state.grants.retain(|(user_id, _)| *user_id != id);
        for equipment_id in &update.equipment {
            state.grants.insert((id, *equipment_id));
        }
        Ok(true)
    }
}

#[async_trait]
impl PermissionStore for MemoryStore {
    async fn has_grant(&self, user_id: i64, equipment_id: i64) -> DatabaseResult<bool> {
        Ok(self.state().grants.contains(&(user_id, equipment_id)))
    }

    async fn grant(&self, user_id: i64, equipment_id: i64) -> DatabaseResult<()> {
        let mut state = self.state();
        if !state.users.contains_key(&user_id) || !state.equipment.contains_key(&equipment_id) {
            return Err(DatabaseError::ForeignKeyViolation(
                "user_equipment_permissions".into(),
            ));
        }
        state.grants.insert((user_id, equipment_id));
        Ok(())
    }

    async fn revoke(&self, user_id: i64, equipment_id: i64) -> DatabaseResult<bool> {
        Ok(self.state().grants.remove(&(user_id, equipment_id)))
    }

    async fn granted_equipment(&self, user_id: i64) -> DatabaseResult<Vec<i64>> {
        Ok(self
            .state()
            .grants
            .iter()
            .filter(|(uid, _)| *uid == user_id)
            .map(|(_, eq)| *eq)
            .collect())
    }
}

#[async_trait]
impl EquipmentStore for MemoryStore {
    async fn list(&self) -> DatabaseResult<Vec<Equipment>> {
        let mut equipment: Vec<Equipment> = self.state().equipment.values().cloned().collect();
        equipment.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(equipment)
    }

    async fn create(&self, new_equipment: &NewEquipment) -> DatabaseResult<Equipment> {
        let mut state = self.state();
        if state.equipment.values().any(|e| e.name == new_equipment.name) {
            return Err(DatabaseError::UniqueViolation("equipment_name_key".into()));
        }
        let id = state.next_id();
        let equipment = Equipment {
            id,
            name: new_equipment.name.clone(),
            description: new_equipment.description.clone(),
            location: new_equipment.location.clone(),
        };
        state.equipment.insert(id, equipment.clone());
        Ok(equipment)
    }

    async fn delete(&self, id: i64) -> DatabaseResult<bool> {
        let mut state = self.state();
        if state.equipment.remove(&id).is_none() {
            return Ok(false);
        }
        state.grants.retain(|(_, eq)| *eq != id);
        state.bookings.retain(|_, b| b.equipment_id != id);
        Ok(true)
    }
}

#[async_trait]
impl GroupStore for MemoryStore {
    async fn list(&self) -> DatabaseResult<Vec<Group>> {
        let mut groups: Vec<Group> = self.state().groups.values().cloned().collect();
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(groups)
    }

    async fn create(&self, name: &str) -> DatabaseResult<Group> {
        let mut state = self.state();
        if state.groups.values().any(|g| g.name == name) {
            return Err(DatabaseError::UniqueViolation("groups_name_key".into()));
        }
        let id = state.next_id();
        let group = Group {
            id,
            name: name.to_string(),
            created_at: Utc::now(),
        };
        state.groups.insert(id, group.clone());
        Ok(group)
    }

    async fn delete(&self, id: i64) -> DatabaseResult<bool> {
        let mut state = self.state();
        let Some(group) = state.groups.remove(&id) else {
            return Ok(false);
        };
        for user in state.users.values_mut() {
            if user.group_name.as_deref() == Some(group.name.as_str()) {
                user.group_name = None;
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn has_overlap(
        &self,
        equipment_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DatabaseResult<bool> {
        let overlap = self
            .state()
            .bookings
            .values()
            .any(|b| b.equipment_id == equipment_id && overlaps(b, start, end));
        // Give racing callers a chance to interleave between check and insert.
        tokio::task::yield_now().await;
        Ok(overlap)
    }

    async fn insert(&self, new_booking: &NewBooking) -> DatabaseResult<Booking> {
        tokio::task::yield_now().await;
        let mut state = self.state();
        if !state.equipment.contains_key(&new_booking.equipment_id) {
            return Err(DatabaseError::ForeignKeyViolation(
                "bookings_equipment_id_fkey".into(),
            ));
        }
        if !state.users.contains_key(&new_booking.user_id) {
            return Err(DatabaseError::ForeignKeyViolation("bookings_user_id_fkey".into()));
        }
        let id = state.next_id();
        let booking = Booking {
            id,
            equipment_id: new_booking.equipment_id,
            user_id: new_booking.user_id,
            start_time: new_booking.start_time,
            end_time: new_booking.end_time,
            purpose: new_booking.purpose.clone(),
            created_at: Utc::now(),
        };
        state.bookings.insert(id, booking.clone());
        Ok(booking)
    }

    async fn find(&self, id: i64) -> DatabaseResult<Option<Booking>> {
        Ok(self.state().bookings.get(&id).cloned())
    }

    async fn delete(&self, id: i64) -> DatabaseResult<bool> {
        Ok(self.state().bookings.remove(&id).is_some())
    }

    async fn list_in_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DatabaseResult<Vec<BookingEntry>> {
        let state = self.state();
        let mut entries: Vec<BookingEntry> = state
            .bookings
            .values()
            .filter(|b| overlaps(b, start, end))
            .filter_map(|b| {
                state.users.get(&b.user_id).map(|u| BookingEntry {
                    booking: b.clone(),
                    username: u.username.clone(),
                })
            })
            .collect();
        entries.sort_by_key(|e| e.booking.start_time);
        Ok(entries)
    }

    async fn list_upcoming_for_user(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> DatabaseResult<Vec<Booking>> {
        let mut bookings: Vec<Booking> = self
            .state()
            .bookings
            .values()
            .filter(|b| b.user_id == user_id && b.end_time >= now)
            .cloned()
            .collect();
        bookings.sort_by_key(|b| b.start_time);
        Ok(bookings)
    }
}

#[async_trait]
impl HealthProbe for MemoryStore {
    async fn is_healthy(&self) -> DatabaseResult<bool> {
        Ok(!self.state().unhealthy)
    }
}

/// Half-open intervals overlap iff each starts before the other ends, so
/// touching intervals do not
fn overlaps(booking: &Booking, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    booking.start_time < end && start < booking.end_time
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 6, hour, minute, 0).unwrap()
    }

    fn booking(start: DateTime<Utc>, end: DateTime<Utc>) -> Booking {
        Booking {
            id: 1,
            equipment_id: 1,
            user_id: 1,
            start_time: start,
            end_time: end,
            purpose: "Imaging".to_string(),
            created_at: start,
        }
    }

    #[test]
    fn test_partial_overlap() {
        assert!(overlaps(&booking(at(10, 0), at(11, 0)), at(10, 30), at(11, 30)));
        assert!(overlaps(&booking(at(10, 30), at(11, 30)), at(10, 0), at(11, 0)));
    }

    #[test]
    fn test_touching_intervals_do_not_overlap() {
        assert!(!overlaps(&booking(at(10, 0), at(11, 0)), at(11, 0), at(12, 0)));
        assert!(!overlaps(&booking(at(10, 0), at(11, 0)), at(9, 0), at(10, 0)));
    }

    #[test]
    fn test_containment_overlaps() {
        assert!(overlaps(&booking(at(9, 0), at(12, 0)), at(10, 0), at(11, 0)));
        assert!(overlaps(&booking(at(10, 0), at(11, 0)), at(10, 0), at(11, 0)));
    }
}
