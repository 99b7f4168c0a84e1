//! Account flows spanning credentials and sessions: login, logout and the
//! admin actions that change who may hold a session.

use common::error::DatabaseError;
use rand::{Rng, distributions::Alphanumeric, rngs::OsRng};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
    credentials::{AuthError, CredentialStore},
    models::{AccessUpdate, Session},
    repositories::UserStore,
    session::SessionManager,
};

/// Length of generated temporary passwords
const TEMPORARY_PASSWORD_LENGTH: usize = 12;

/// Failures of admin account actions
#[derive(Error, Debug)]
pub enum AccountError {
    #[error("{0}")]
    Validation(String),

    #[error("User not found")]
    NotFound,

    #[error("Storage error: {0}")]
    Storage(#[from] DatabaseError),
}

#[derive(Clone)]
pub struct AccountService {
    credentials: CredentialStore,
    sessions: SessionManager,
    users: Arc<dyn UserStore>,
}

impl AccountService {
    pub fn new(
        credentials: CredentialStore,
        sessions: SessionManager,
        users: Arc<dyn UserStore>,
    ) -> Self {
        Self {
            credentials,
            sessions,
            users,
        }
    }

    /// Verify credentials and issue a session
    ///
    /// The account is checked again after the session exists, so a
    /// soft-delete racing with this login cannot leave a live session behind.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, AuthError> {
        let user = self.credentials.authenticate(username, password).await?;
        let session = self.sessions.create_session(user.id, &user.username).await?;

        match self.credentials.signable_user(user.id).await {
            Ok(Some(_)) => {
                info!("User {} logged in", user.username);
                Ok(session)
            }
            Ok(None) => {
                self.sessions.revoke_session(&session.token).await;
                warn!("User {} lost sign-in rights during login", user.username);
                Err(AuthError::AccountDisabled)
            }
            Err(e) => {
                self.sessions.revoke_session(&session.token).await;
                error!("Failed to re-check user {} after login: {}", user.id, e);
                Err(e.into())
            }
        }
    }

    /// End a session; unknown tokens are ignored
    pub async fn logout(&self, token: &str) {
        self.sessions.revoke_session(token).await;
    }

    /// Soft-delete a user and revoke every session they hold
    pub async fn soft_delete_user(&self, actor_id: i64, target_id: i64) -> Result<usize, AccountError> {
        if actor_id == target_id {
            return Err(AccountError::Validation(
                "You cannot delete your own account".to_string(),
            ));
        }

        if !self.users.soft_delete(target_id).await? {
            return Err(AccountError::NotFound);
        }

        let revoked = self.sessions.revoke_all_sessions_for_user(target_id).await;
        info!(
            "User {} soft-deleted by admin {}, {} session(s) revoked",
            target_id, actor_id, revoked
        );
        Ok(revoked)
    }

    /// Grant or withdraw admin rights; effective on the target's next request
    pub async fn set_admin(&self, actor_id: i64, target_id: i64, is_admin: bool) -> Result<(), AccountError> {
        if !self.users.set_admin(target_id, is_admin).await? {
            return Err(AccountError::NotFound);
        }

        info!(
            "Admin flag of user {} set to {} by admin {}",
            target_id, is_admin, actor_id
        );
        Ok(())
    }

    /// Reset another user's password and end their sessions
    ///
    /// Without an explicit password a temporary one is generated. The
    /// password that was set is returned so the admin can hand it over.
    pub async fn reset_password(
        &self,
        actor_id: i64,
        target_id: i64,
        new_password: Option<String>,
    ) -> Result<String, AuthError> {
        let password = new_password.unwrap_or_else(temporary_password);
        self.credentials.reset_password(target_id, &password).await?;

        let revoked = self.sessions.revoke_all_sessions_for_user(target_id).await;
        info!(
            "Password of user {} reset by admin {}, {} session(s) revoked",
            target_id, actor_id, revoked
        );
        Ok(password)
    }

    /// Set approval and group, and replace the equipment grant set
    pub async fn update_access(
        &self,
        actor_id: i64,
        target_id: i64,
        update: &AccessUpdate,
    ) -> Result<(), AccountError> {
        match self.users.update_access(target_id, update).await {
            Ok(true) => {}
            Ok(false) => return Err(AccountError::NotFound),
            Err(DatabaseError::ForeignKeyViolation(_)) => {
                return Err(AccountError::Validation("Unknown equipment".to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        // Withdrawing approval must end any session the user still holds.
        if !update.approved {
            self.sessions.revoke_all_sessions_for_user(target_id).await;
        }

        info!(
            "Access of user {} updated by admin {}: approved={}, {} grant(s)",
            target_id,
            actor_id,
            update.approved,
            update.equipment.len()
        );
        Ok(())
    }
}

fn temporary_password() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(TEMPORARY_PASSWORD_LENGTH)
        .map(char::from)
        .collect()
}
