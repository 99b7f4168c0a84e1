//! Credential store: password hashing and account state checks

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use common::error::DatabaseError;
use rand::rngs::OsRng;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
    models::{AccessUpdate, NewUser, User},
    repositories::UserStore,
    session::SessionError,
    validation::{validate_password, validate_username},
};

/// Failures of login, registration and password change
#[derive(Error, Debug)]
pub enum AuthError {
    /// Unknown user or wrong password; the two are never told apart
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Account is pending approval")]
    PendingApproval,

    #[error("Account is disabled")]
    AccountDisabled,

    #[error("All fields are required")]
    MissingFields,

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Username is already taken")]
    UsernameTaken,

    #[error("Current password is incorrect")]
    IncorrectCurrentPassword,

    #[error("User not found")]
    UserNotFound,

    #[error("{0}")]
    Validation(String),

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Storage error: {0}")]
    Storage(#[from] DatabaseError),
}

/// Password hashing and user account checks over a [`UserStore`]
#[derive(Clone)]
pub struct CredentialStore {
    users: Arc<dyn UserStore>,
    hasher: Argon2<'static>,
    /// Verified against when the username is unknown, so both failure paths cost the same
    dummy_hash: String,
}

impl CredentialStore {
    /// Credential store using Argon2id with default parameters
    pub fn new(users: Arc<dyn UserStore>) -> Result<Self, AuthError> {
        Self::with_hasher(users, Argon2::default())
    }

    /// Credential store with explicit hasher parameters
    pub fn with_hasher(users: Arc<dyn UserStore>, hasher: Argon2<'static>) -> Result<Self, AuthError> {
        let dummy_hash = hash_with(&hasher, "lab-dummy-password")?;
        Ok(Self {
            users,
            hasher,
            dummy_hash,
        })
    }

    /// Hash a password with a fresh random salt
    pub async fn hash_password(&self, plaintext: &str) -> Result<String, AuthError> {
        let hasher = self.hasher.clone();
        let plaintext = plaintext.to_owned();

        tokio::task::spawn_blocking(move || hash_with(&hasher, &plaintext))
            .await
            .map_err(|e| AuthError::Hashing(e.to_string()))?
    }

    /// Check a candidate password against a stored hash
    ///
    /// Fails closed: an unparsable hash or a hashing task failure is a mismatch.
    pub async fn verify_password(&self, hash: &str, candidate: &str) -> bool {
        let hasher = self.hasher.clone();
        let hash = hash.to_owned();
        let candidate = candidate.to_owned();

        let outcome = tokio::task::spawn_blocking(move || {
            PasswordHash::new(&hash)
                .map(|parsed| hasher.verify_password(candidate.as_bytes(), &parsed).is_ok())
                .unwrap_or(false)
        })
        .await;

        match outcome {
            Ok(matches) => matches,
            Err(e) => {
                error!("Password verification task failed: {}", e);
                false
            }
        }
    }

    /// Resolve a username and password to a user allowed to sign in
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let Some(user) = self.users.find_by_username(username).await? else {
            self.verify_password(&self.dummy_hash, password).await;
            warn!("Login failed for user: {}", username);
            return Err(AuthError::InvalidCredentials);
        };

        if !self.verify_password(&user.password_hash, password).await {
            warn!("Login failed for user: {}", username);
            return Err(AuthError::InvalidCredentials);
        }

        if user.is_deleted {
            warn!("Login refused for deleted user: {}", username);
            return Err(AuthError::AccountDisabled);
        }

        if !user.is_approved {
            info!("Login refused for unapproved user: {}", username);
            return Err(AuthError::PendingApproval);
        }

        Ok(user)
    }

    /// Create a new, unapproved account
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        confirm: &str,
    ) -> Result<User, AuthError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() || confirm.is_empty() {
            return Err(AuthError::MissingFields);
        }

        if password != confirm {
            return Err(AuthError::PasswordMismatch);
        }

        validate_username(username).map_err(AuthError::Validation)?;
        validate_password(password).map_err(AuthError::Validation)?;

        let password_hash = self.hash_password(password).await?;
        let new_user = NewUser {
            username: username.to_string(),
            password_hash,
        };

        match self.users.create(&new_user).await {
            Ok(user) => {
                info!("Registered user {} pending approval", user.username);
                Ok(user)
            }
            Err(DatabaseError::UniqueViolation(_)) => Err(AuthError::UsernameTaken),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace a user's password after checking the current one
    pub async fn change_password(
        &self,
        user_id: i64,
        current: &str,
        new: &str,
        confirm: &str,
    ) -> Result<(), AuthError> {
        if current.is_empty() || new.is_empty() || confirm.is_empty() {
            return Err(AuthError::MissingFields);
        }

        validate_password(new).map_err(AuthError::Validation)?;

        if new != confirm {
            return Err(AuthError::PasswordMismatch);
        }

        let user = self
            .users
            .find_active(user_id)
            .await?
            .ok_or(AuthError::AccountDisabled)?;

        if !self.verify_password(&user.password_hash, current).await {
            warn!("Password change rejected for user {}: wrong current password", user_id);
            return Err(AuthError::IncorrectCurrentPassword);
        }

        if new == current {
            return Err(AuthError::Validation(
                "New password must be different from the current password".to_string(),
            ));
        }

        let password_hash = self.hash_password(new).await?;
        if !self.users.update_password_hash(user_id, &password_hash).await? {
            return Err(AuthError::AccountDisabled);
        }

        info!("Password changed for user {}", user_id);
        Ok(())
    }

    /// Set a new password for another user, without knowing the current one
    pub async fn reset_password(&self, user_id: i64, new: &str) -> Result<(), AuthError> {
        validate_password(new).map_err(AuthError::Validation)?;

        if self.users.find_active(user_id).await?.is_none() {
            return Err(AuthError::UserNotFound);
        }

        let password_hash = self.hash_password(new).await?;
        if !self.users.update_password_hash(user_id, &password_hash).await? {
            return Err(AuthError::UserNotFound);
        }

        info!("Password reset for user {}", user_id);
        Ok(())
    }

    /// Create an approved admin account unless the username is already in use
    ///
    /// Returns whether an account was created.
    pub async fn bootstrap_admin(&self, username: &str, password: &str) -> Result<bool, AuthError> {
        let username = username.trim();
        validate_username(username).map_err(AuthError::Validation)?;
        validate_password(password).map_err(AuthError::Validation)?;

        if self.users.find_by_username(username).await?.is_some() {
            info!("Bootstrap admin {} already exists", username);
            return Ok(false);
        }

        let password_hash = self.hash_password(password).await?;
        let new_user = NewUser {
            username: username.to_string(),
            password_hash,
        };
        let user = match self.users.create(&new_user).await {
            Ok(user) => user,
            Err(DatabaseError::UniqueViolation(_)) => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        let approval = AccessUpdate {
            approved: true,
            ..AccessUpdate::default()
        };
        self.users.update_access(user.id, &approval).await?;
        self.users.set_admin(user.id, true).await?;

        info!("Created bootstrap admin {}", username);
        Ok(true)
    }

    /// Current admin flag of an active user, `None` when absent or deleted
    pub async fn admin_flag(&self, user_id: i64) -> Result<Option<bool>, DatabaseError> {
        Ok(self.users.find_active(user_id).await?.map(|u| u.is_admin))
    }

    /// Active user allowed to hold a session, `None` otherwise
    pub async fn signable_user(&self, user_id: i64) -> Result<Option<User>, DatabaseError> {
        Ok(self
            .users
            .find_active(user_id)
            .await?
            .filter(User::can_sign_in))
    }
}

fn hash_with(hasher: &Argon2<'_>, plaintext: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    hasher
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

/// Cheap Argon2 parameters so tests do not spend seconds hashing
#[cfg(test)]
pub fn test_hasher() -> Argon2<'static> {
    use argon2::{Algorithm, Params, Version};

    let params = Params::new(8, 1, 1, None).expect("valid argon2 params");
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::memory::MemoryStore;

    fn credentials(store: &Arc<MemoryStore>) -> CredentialStore {
        CredentialStore::with_hasher(store.clone(), test_hasher()).unwrap()
    }

    #[tokio::test]
    async fn test_hash_password_salts_every_call() {
        let store = MemoryStore::new();
        let credentials = credentials(&store);

        let first = credentials.hash_password("correct horse").await.unwrap();
        let second = credentials.hash_password("correct horse").await.unwrap();

        assert_ne!(first, second);
        assert!(credentials.verify_password(&first, "correct horse").await);
        assert!(credentials.verify_password(&second, "correct horse").await);
        assert!(!credentials.verify_password(&first, "wrong horse").await);
    }

    #[tokio::test]
    async fn test_verify_password_fails_closed_on_garbage_hash() {
        let store = MemoryStore::new();
        let credentials = credentials(&store);

        assert!(!credentials.verify_password("not-a-hash", "anything").await);
    }

    #[tokio::test]
    async fn test_unknown_user_and_wrong_password_look_the_same() {
        let store = MemoryStore::new();
        let credentials = credentials(&store);
        let hash = credentials.hash_password("password123").await.unwrap();
        store.seed_user("alice", &hash, true, false);

        let unknown = credentials.authenticate("nobody", "password123").await.unwrap_err();
        let wrong = credentials.authenticate("alice", "password124").await.unwrap_err();

        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn test_authenticate_reports_account_state() {
        let store = MemoryStore::new();
        let credentials = credentials(&store);
        let hash = credentials.hash_password("password123").await.unwrap();
        store.seed_user("pending", &hash, false, false);
        let gone = store.seed_user("gone", &hash, true, false);
        store.seed_user("ok", &hash, true, false);
        UserStore::soft_delete(store.as_ref(), gone.id).await.unwrap();

        assert!(matches!(
            credentials.authenticate("pending", "password123").await,
            Err(AuthError::PendingApproval)
        ));
        assert!(matches!(
            credentials.authenticate("gone", "password123").await,
            Err(AuthError::AccountDisabled)
        ));
        assert_eq!(
            credentials.authenticate("ok", "password123").await.unwrap().username,
            "ok"
        );
    }

    #[tokio::test]
    async fn test_register_creates_unapproved_user() {
        let store = MemoryStore::new();
        let credentials = credentials(&store);

        let user = credentials
            .register("newbie", "password123", "password123")
            .await
            .unwrap();

        assert!(!user.is_approved);
        assert!(!user.is_admin);
        assert!(matches!(
            credentials.authenticate("newbie", "password123").await,
            Err(AuthError::PendingApproval)
        ));
    }

    #[tokio::test]
    async fn test_register_rejections() {
        let store = MemoryStore::new();
        let credentials = credentials(&store);
        credentials
            .register("taken", "password123", "password123")
            .await
            .unwrap();

        assert!(matches!(
            credentials.register("", "password123", "password123").await,
            Err(AuthError::MissingFields)
        ));
        assert!(matches!(
            credentials.register("someone", "password123", "password321").await,
            Err(AuthError::PasswordMismatch)
        ));
        assert!(matches!(
            credentials.register("taken", "password123", "password123").await,
            Err(AuthError::UsernameTaken)
        ));
        assert!(matches!(
            credentials.register("someone", "short", "short").await,
            Err(AuthError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_change_password_policy() {
        let store = MemoryStore::new();
        let credentials = credentials(&store);
        let hash = credentials.hash_password("password123").await.unwrap();
        let user = store.seed_user("alice", &hash, true, false);

        assert!(matches!(
            credentials.change_password(user.id, "password123", "", "").await,
            Err(AuthError::MissingFields)
        ));
        assert!(matches!(
            credentials.change_password(user.id, "password123", "short", "short").await,
            Err(AuthError::Validation(_))
        ));
        assert!(matches!(
            credentials
                .change_password(user.id, "password123", "newpassword1", "newpassword2")
                .await,
            Err(AuthError::PasswordMismatch)
        ));
        assert!(matches!(
            credentials
                .change_password(user.id, "wrongpass1", "newpassword1", "newpassword1")
                .await,
            Err(AuthError::IncorrectCurrentPassword)
        ));
        assert!(matches!(
            credentials
                .change_password(user.id, "password123", "password123", "password123")
                .await,
            Err(AuthError::Validation(_))
        ));

        credentials
            .change_password(user.id, "password123", "newpassword1", "newpassword1")
            .await
            .unwrap();

        assert!(credentials.authenticate("alice", "newpassword1").await.is_ok());
        assert!(matches!(
            credentials.authenticate("alice", "password123").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_reset_password() {
        let store = MemoryStore::new();
        let credentials = credentials(&store);
        let hash = credentials.hash_password("password123").await.unwrap();
        let user = store.seed_user("alice", &hash, true, false);

        assert!(matches!(
            credentials.reset_password(user.id, "short").await,
            Err(AuthError::Validation(_))
        ));
        assert!(matches!(
            credentials.reset_password(9_999, "temporary1").await,
            Err(AuthError::UserNotFound)
        ));

        credentials.reset_password(user.id, "temporary1").await.unwrap();
        assert!(credentials.authenticate("alice", "temporary1").await.is_ok());

        UserStore::soft_delete(store.as_ref(), user.id).await.unwrap();
        assert!(matches!(
            credentials.reset_password(user.id, "temporary2").await,
            Err(AuthError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn test_bootstrap_admin_is_idempotent() {
        let store = MemoryStore::new();
        let credentials = credentials(&store);

        assert!(credentials.bootstrap_admin("root", "password123").await.unwrap());
        let root = credentials.authenticate("root", "password123").await.unwrap();
        assert!(root.is_admin);
        assert!(root.is_approved);

        assert!(!credentials.bootstrap_admin("root", "otherpass99").await.unwrap());
        assert!(credentials.authenticate("root", "password123").await.is_ok());
        assert!(matches!(
            credentials.authenticate("root", "otherpass99").await,
            Err(AuthError::InvalidCredentials)
        ));

        assert!(matches!(
            credentials.bootstrap_admin("root admin", "password123").await,
            Err(AuthError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_admin_flag_reads_current_state() {
        let store = MemoryStore::new();
        let credentials = credentials(&store);
        let user = store.seed_user("alice", "x", true, false);

        assert_eq!(credentials.admin_flag(user.id).await.unwrap(), Some(false));
        UserStore::set_admin(store.as_ref(), user.id, true).await.unwrap();
        assert_eq!(credentials.admin_flag(user.id).await.unwrap(), Some(true));
        UserStore::soft_delete(store.as_ref(), user.id).await.unwrap();
        assert_eq!(credentials.admin_flag(user.id).await.unwrap(), None);
    }
}
