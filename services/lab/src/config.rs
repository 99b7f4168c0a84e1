//! Service configuration
//!
//! Values come from `LAB_`-prefixed environment variables layered over
//! built-in defaults. Database settings live in `common::database`.

use anyhow::{Context, Result, bail};
use config::{Config, Environment};
use serde::Deserialize;

/// Runtime settings of the lab service
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Socket address the HTTP server binds to
    pub addr: String,
    /// Fixed validity window of a session, from issuance
    pub session_ttl_seconds: i64,
    /// Whether the session cookie carries the `Secure` attribute
    pub cookie_secure: bool,
    /// Cron expression for the expired-session sweep; lazy purge only when unset
    #[serde(default)]
    pub session_sweep_schedule: Option<String>,
    /// Username of an approved admin created at startup when missing
    #[serde(default)]
    pub bootstrap_admin_username: Option<String>,
    /// Password for the bootstrap admin; required with the username
    #[serde(default)]
    pub bootstrap_admin_password: Option<String>,
}

impl AppConfig {
    /// Load configuration from the environment
    ///
    /// # Environment Variables
    /// - `LAB_ADDR`: bind address (default: 0.0.0.0:8010)
    /// - `LAB_SESSION_TTL_SECONDS`: session lifetime (default: 86400)
    /// - `LAB_COOKIE_SECURE`: mark the session cookie `Secure` (default: false)
    /// - `LAB_SESSION_SWEEP_SCHEDULE`: optional cron schedule, e.g. `0 */10 * * * *`
    /// - `LAB_BOOTSTRAP_ADMIN_USERNAME`, `LAB_BOOTSTRAP_ADMIN_PASSWORD`: optional
    ///   admin account created at startup if no user has that name
    pub fn from_env() -> Result<Self> {
        let settings = Config::builder()
            .set_default("addr", "0.0.0.0:8010")?
            .set_default("session_ttl_seconds", 86_400)?
            .set_default("cookie_secure", false)?
            .add_source(Environment::with_prefix("LAB").try_parsing(true))
            .build()
            .context("Failed to read configuration")?;

        let config: AppConfig = settings
            .try_deserialize()
            .context("Invalid configuration")?;
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.session_ttl_seconds <= 0 {
            bail!(
                "LAB_SESSION_TTL_SECONDS must be positive, got {}",
                self.session_ttl_seconds
            );
        }

        if self
            .session_sweep_schedule
            .as_deref()
            .is_some_and(|s| s.trim().is_empty())
        {
            bail!("LAB_SESSION_SWEEP_SCHEDULE must not be blank when set");
        }

        if self.bootstrap_admin_username.is_some() != self.bootstrap_admin_password.is_some() {
            bail!(
                "LAB_BOOTSTRAP_ADMIN_USERNAME and LAB_BOOTSTRAP_ADMIN_PASSWORD must be set together"
            );
        }

        Ok(())
    }

    /// Bootstrap admin credentials, when configured
    pub fn bootstrap_admin(&self) -> Option<(&str, &str)> {
        self.bootstrap_admin_username
            .as_deref()
            .zip(self.bootstrap_admin_password.as_deref())
    }

    /// Session lifetime as a duration
    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.session_ttl_seconds)
    }
}
