//! Equipment calendar and booking endpoints

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::{
    error::ApiResult,
    middleware::CurrentUser,
    models::{Booking, BookingEntry, Equipment},
    state::AppState,
};

/// Calendar window query, `[start, end)`
#[derive(Deserialize)]
pub struct WindowQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Request for booking creation
#[derive(Deserialize)]
pub struct CreateBookingRequest {
    pub equipment_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub purpose: String,
}

pub async fn list_equipment(State(state): State<AppState>) -> ApiResult<Json<Vec<Equipment>>> {
    Ok(Json(state.stores.equipment.list().await?))
}

pub async fn list_bookings(
    State(state): State<AppState>,
    Query(window): Query<WindowQuery>,
) -> ApiResult<Json<Vec<BookingEntry>>> {
    let entries = state
        .bookings
        .bookings_in_window(window.start, window.end)
        .await?;
    Ok(Json(entries))
}

pub async fn my_bookings(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
) -> ApiResult<Json<Vec<Booking>>> {
    Ok(Json(state.bookings.upcoming_bookings(identity.user_id).await?))
}

pub async fn permissions(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
) -> ApiResult<Json<BTreeMap<i64, bool>>> {
    Ok(Json(state.permissions.permission_map(identity.user_id).await?))
}

pub async fn create_booking(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Json(payload): Json<CreateBookingRequest>,
) -> ApiResult<impl IntoResponse> {
    let booking = state
        .bookings
        .create_booking(
            payload.equipment_id,
            identity.user_id,
            payload.start_time,
            payload.end_time,
            &payload.purpose,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(booking)))
}

pub async fn delete_booking(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Path(booking_id): Path<i64>,
) -> ApiResult<StatusCode> {
    state
        .bookings
        .delete_booking(booking_id, identity.user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
