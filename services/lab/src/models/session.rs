//! Session model and related functionality

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// The caller a valid session token resolves to
///
/// Admin status is deliberately absent: it is re-read from storage on every
/// admin-guarded request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub user_id: i64,
    pub username: String,
}

/// Session entity held by the session manager
#[derive(Clone)]
pub struct Session {
    pub token: String,
    pub user_id: i64,
    pub username: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Identity bound to this session
    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.user_id,
            username: self.username.clone(),
        }
    }

    /// Whether the session is still valid at `now`
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now <= self.expires_at
    }

    /// Short token prefix that is safe to log
    pub fn token_hint(&self) -> &str {
        token_hint(&self.token)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &format_args!("{}…", self.token_hint()))
            .field("user_id", &self.user_id)
            .field("username", &self.username)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// First eight characters of a token
pub fn token_hint(token: &str) -> &str {
    token.get(..8).unwrap_or(token)
}
