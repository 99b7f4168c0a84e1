//! In-memory session table
//!
//! Sessions live only in this process; a restart signs everyone out. Expired
//! entries are purged lazily on lookup, with an optional scheduled sweep on
//! top.

use chrono::{DateTime, Duration, Utc};
use rand::{RngCore, rngs::OsRng};
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info};

use crate::models::{Identity, Session, session::token_hint};

/// Random bytes per token; hex encoding doubles the length
const TOKEN_BYTES: usize = 32;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to generate session token: {0}")]
    TokenGeneration(#[from] rand::Error),
}

/// Owner of every live session
///
/// Revoking all sessions of a user removes the sessions that exist when the
/// call takes the write lock. A session created after that point survives;
/// the login flow re-checks the account after creating a session to close
/// that gap.
#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    ttl: Duration,
}

impl SessionManager {
    /// Create a session manager issuing sessions valid for `ttl`
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Issue a new session for an already authenticated user
    pub async fn create_session(
        &self,
        user_id: i64,
        username: &str,
    ) -> Result<Session, SessionError> {
        let mut sessions = self.sessions.write().await;

        let token = loop {
            let token = generate_token()?;
            if !sessions.contains_key(&token) {
                break token;
            }
        };

        let session = Session {
            token: token.clone(),
            user_id,
            username: username.to_string(),
            expires_at: Utc::now() + self.ttl,
        };
        sessions.insert(token, session.clone());

        info!(
            "Created session {}… for user {} expiring at {}",
            session.token_hint(),
            user_id,
            session.expires_at
        );
        Ok(session)
    }

    /// Resolve a token to the identity it was issued for
    pub async fn resolve_session(&self, token: &str) -> Option<Identity> {
        self.resolve_session_at(token, Utc::now()).await
    }

    /// Resolve a token as of `now`, purging it when expired
    pub async fn resolve_session_at(&self, token: &str, now: DateTime<Utc>) -> Option<Identity> {
        {
            let sessions = self.sessions.read().await;
            match sessions.get(token) {
                None => return None,
                Some(session) if session.is_valid_at(now) => return Some(session.identity()),
                Some(_) => {}
            }
        }

        // Re-check under the write lock; another caller may have purged it already.
        let mut sessions = self.sessions.write().await;
        match sessions.get(token) {
            Some(session) if session.is_valid_at(now) => Some(session.identity()),
            Some(_) => {
                sessions.remove(token);
                debug!("Purged expired session {}…", token_hint(token));
                None
            }
            None => None,
        }
    }

    /// Remove a session; unknown tokens are ignored
    pub async fn revoke_session(&self, token: &str) -> bool {
        let removed = self.sessions.write().await.remove(token).is_some();
        if removed {
            info!("Revoked session {}…", token_hint(token));
        }
        removed
    }

    /// Remove every session bound to a user, returning how many were removed
    pub async fn revoke_all_sessions_for_user(&self, user_id: i64) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.user_id != user_id);
        let removed = before - sessions.len();

        info!("Revoked {} session(s) for user {}", removed, user_id);
        removed
    }

    /// Drop every session expired as of now
    pub async fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now()).await
    }

    pub async fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.is_valid_at(now));
        before - sessions.len()
    }

    /// Number of sessions currently held, expired ones included
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Run [`purge_expired`](Self::purge_expired) on a cron schedule
    pub async fn start_sweeper(&self, schedule: &str) -> anyhow::Result<JobScheduler> {
        let manager = self.clone();

        let job = Job::new_async(schedule, move |_, _| {
            let manager = manager.clone();
            Box::pin(async move {
                let purged = manager.purge_expired().await;
                if purged > 0 {
                    info!(
                        "Session sweep purged {} expired session(s), {} remain",
                        purged,
                        manager.session_count().await
                    );
                }
            })
        })
        .inspect_err(|e| error!("Invalid session sweep schedule {}: {}", schedule, e))?;

        let scheduler = JobScheduler::new().await?;
        scheduler.add(job).await?;
        scheduler.start().await?;

        info!("Started session sweep with schedule: {}", schedule);
        Ok(scheduler)
    }
}

fn generate_token() -> Result<String, SessionError> {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(hex::encode(bytes))
}
