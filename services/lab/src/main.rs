use anyhow::Result;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod account;
mod booking;
mod config;
mod credentials;
mod error;
mod middleware;
mod models;
mod permissions;
mod repositories;
mod routes;
mod schema;
mod session;
mod state;
mod validation;

use crate::{
    config::AppConfig, credentials::CredentialStore, repositories::Stores,
    session::SessionManager, state::AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting lab service");

    let app_config = AppConfig::from_env()?;

    // Initialize database connection pool
    let db_config = common::database::DatabaseConfig::from_env()?;
    let pool = common::database::init_pool(&db_config).await?;

    // Check database connectivity
    if common::database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    schema::ensure(&pool).await?;

    let stores = Stores::postgres(pool);
    let credentials = CredentialStore::new(stores.users.clone())?;
    if let Some((username, password)) = app_config.bootstrap_admin() {
        credentials.bootstrap_admin(username, password).await?;
    }
    let sessions = SessionManager::new(app_config.session_ttl());

    let mut sweeper = match app_config.session_sweep_schedule.as_deref() {
        Some(schedule) => Some(sessions.start_sweeper(schedule).await?),
        None => None,
    };

    let app_state = AppState::new(stores, credentials, sessions, app_config.cookie_secure);
    let app = routes::create_router(app_state);

    let listener = TcpListener::bind(&app_config.addr).await?;
    info!("Lab service listening on {}", app_config.addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    if let Some(scheduler) = sweeper.as_mut() {
        scheduler.shutdown().await?;
    }

    info!("Shutting down lab service");
    Ok(())
}
