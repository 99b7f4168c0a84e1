//! Per-user, per-equipment booking permissions

use common::error::DatabaseResult;
use std::{collections::BTreeMap, sync::Arc};

use crate::repositories::{EquipmentStore, PermissionStore, UserStore};

/// Answers "may this user book this equipment?"
#[derive(Clone)]
pub struct PermissionResolver {
    grants: Arc<dyn PermissionStore>,
    users: Arc<dyn UserStore>,
    equipment: Arc<dyn EquipmentStore>,
}

impl PermissionResolver {
    pub fn new(
        grants: Arc<dyn PermissionStore>,
        users: Arc<dyn UserStore>,
        equipment: Arc<dyn EquipmentStore>,
    ) -> Self {
        Self {
            grants,
            users,
            equipment,
        }
    }

    /// Whether an explicit grant exists for the pair
    pub async fn has_permission(&self, user_id: i64, equipment_id: i64) -> DatabaseResult<bool> {
        self.grants.has_grant(user_id, equipment_id).await
    }

    /// Current admin flag; absent or deleted users are not admins
    pub async fn is_admin(&self, user_id: i64) -> DatabaseResult<bool> {
        Ok(self
            .users
            .find_active(user_id)
            .await?
            .is_some_and(|user| user.is_admin))
    }

    /// Admins may book anything; everyone else needs a grant
    pub async fn can_book(&self, user_id: i64, equipment_id: i64) -> DatabaseResult<bool> {
        if self.is_admin(user_id).await? {
            return Ok(true);
        }
        self.has_permission(user_id, equipment_id).await
    }

    /// Booking permission for every piece of equipment, keyed by equipment id
    pub async fn permission_map(&self, user_id: i64) -> DatabaseResult<BTreeMap<i64, bool>> {
        let equipment = self.equipment.list().await?;

        if self.is_admin(user_id).await? {
            return Ok(equipment.into_iter().map(|e| (e.id, true)).collect());
        }

        let granted = self.grants.granted_equipment(user_id).await?;
        Ok(equipment
            .into_iter()
            .map(|e| (e.id, granted.contains(&e.id)))
            .collect())
    }
}
