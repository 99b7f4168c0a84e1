//! Lab service routes

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use serde_json::json;
use tracing::error;

use crate::{
    middleware::{require_admin, require_authenticated, security_headers},
    state::AppState,
};

pub mod admin;
pub mod auth;
pub mod booking;

/// Create the router for the lab service
pub fn create_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health_check))
        .route("/login", post(auth::login))
        .route("/register", post(auth::register))
        .route("/logout", post(auth::logout));

    let authenticated = Router::new()
        .route("/account/password", post(auth::change_password))
        .route("/equipment", get(booking::list_equipment))
        .route(
            "/api/bookings",
            get(booking::list_bookings).post(booking::create_booking),
        )
        .route("/api/bookings/mine", get(booking::my_bookings))
        .route("/api/bookings/:id", delete(booking::delete_booking))
        .route("/api/permissions", get(booking::permissions))
        .route_layer(from_fn_with_state(state.clone(), require_authenticated));

    // Layers run outermost-last: the session gate runs before the admin gate.
    let admin = Router::new()
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/:id", delete(admin::delete_user))
        .route("/admin/users/:id/access", post(admin::update_access))
        .route("/admin/users/:id/admin", post(admin::set_admin))
        .route("/admin/users/:id/password", post(admin::reset_password))
        .route(
            "/admin/users/:id/equipment/:equipment_id",
            put(admin::grant_equipment).delete(admin::revoke_equipment),
        )
        .route("/admin/equipment", post(admin::add_equipment))
        .route("/admin/equipment/:id", delete(admin::delete_equipment))
        .route(
            "/admin/groups",
            get(admin::list_groups).post(admin::add_group),
        )
        .route("/admin/groups/:id", delete(admin::delete_group))
        .route_layer(from_fn_with_state(state.clone(), require_admin))
        .route_layer(from_fn_with_state(state.clone(), require_authenticated));

    Router::new()
        .merge(public)
        .merge(authenticated)
        .merge(admin)
        .layer(from_fn_with_state(state.clone(), security_headers))
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = match state.stores.health.is_healthy().await {
        Ok(healthy) => healthy,
        Err(e) => {
            error!("Health probe failed: {}", e);
            false
        }
    };

    let status = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if database { "ok" } else { "degraded" },
            "service": "lab-service",
            "database": database,
        })),
    )
}
