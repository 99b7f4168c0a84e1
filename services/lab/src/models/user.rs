//! User model and related functionality

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// User entity
///
/// Accounts are created unapproved and are soft-deleted, never removed.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_approved: bool,
    pub is_admin: bool,
    pub is_deleted: bool,
    pub group_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Whether this account may hold a session
    pub fn can_sign_in(&self) -> bool {
        self.is_approved && !self.is_deleted
    }
}

/// New user creation payload
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
}

/// Admin update of a user's approval, group and equipment grants
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessUpdate {
    pub approved: bool,
    pub group_name: Option<String>,
    #[serde(default)]
    pub equipment: Vec<i64>,
}

impl AccessUpdate {
    /// Group label with surrounding whitespace removed, `None` when blank
    pub fn normalized_group(&self) -> Option<String> {
        self.group_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
    }
}
