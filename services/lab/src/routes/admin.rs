//! Admin console endpoints: users, equipment and groups

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use common::error::DatabaseError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::{
    error::{ApiError, ApiResult},
    middleware::CurrentUser,
    models::{AccessUpdate, Equipment, Group, NewEquipment, User},
    state::AppState,
    validation::validate_name,
};

/// User row as shown on the admin console, with the user's equipment grants
#[derive(Serialize)]
pub struct UserAccess {
    #[serde(flatten)]
    pub user: User,
    pub equipment: Vec<i64>,
}

#[derive(Deserialize)]
pub struct SetAdminRequest {
    pub admin: bool,
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct ResetPasswordRequest {
    pub new_password: Option<String>,
}

#[derive(Deserialize)]
pub struct NewGroupRequest {
    pub name: String,
}

pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<Vec<UserAccess>>> {
    let users = state.stores.users.list_active().await?;

    let mut rows = Vec::with_capacity(users.len());
    for user in users {
        let equipment = state.stores.permissions.granted_equipment(user.id).await?;
        rows.push(UserAccess { user, equipment });
    }

    Ok(Json(rows))
}

pub async fn update_access(
    State(state): State<AppState>,
    CurrentUser(admin): CurrentUser,
    Path(user_id): Path<i64>,
    Json(update): Json<AccessUpdate>,
) -> ApiResult<impl IntoResponse> {
    state
        .accounts
        .update_access(admin.user_id, user_id, &update)
        .await?;
    Ok(Json(json!({ "message": "Access updated" })))
}

pub async fn set_admin(
    State(state): State<AppState>,
    CurrentUser(admin): CurrentUser,
    Path(user_id): Path<i64>,
    Json(payload): Json<SetAdminRequest>,
) -> ApiResult<impl IntoResponse> {
    state
        .accounts
        .set_admin(admin.user_id, user_id, payload.admin)
        .await?;
    Ok(Json(json!({ "message": "Admin status updated" })))
}

pub async fn reset_password(
    State(state): State<AppState>,
    CurrentUser(admin): CurrentUser,
    Path(user_id): Path<i64>,
    Json(payload): Json<ResetPasswordRequest>,
) -> ApiResult<impl IntoResponse> {
    let password = state
        .accounts
        .reset_password(admin.user_id, user_id, payload.new_password)
        .await?;
    Ok(Json(json!({ "message": "Password reset", "password": password })))
}

pub async fn delete_user(
    State(state): State<AppState>,
    CurrentUser(admin): CurrentUser,
    Path(user_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let revoked = state
        .accounts
        .soft_delete_user(admin.user_id, user_id)
        .await?;
    Ok(Json(json!({
        "message": "User deleted",
        "revoked_sessions": revoked,
    })))
}

pub async fn grant_equipment(
    State(state): State<AppState>,
    Path((user_id, equipment_id)): Path<(i64, i64)>,
) -> ApiResult<StatusCode> {
    match state.stores.permissions.grant(user_id, equipment_id).await {
        Ok(()) => {
            info!("Granted equipment {} to user {}", equipment_id, user_id);
            Ok(StatusCode::NO_CONTENT)
        }
        Err(DatabaseError::ForeignKeyViolation(_)) => Err(ApiError::NotFound(
            "User or equipment not found".to_string(),
        )),
        Err(e) => Err(e.into()),
    }
}

pub async fn revoke_equipment(
    State(state): State<AppState>,
    Path((user_id, equipment_id)): Path<(i64, i64)>,
) -> ApiResult<StatusCode> {
    if !state.stores.permissions.revoke(user_id, equipment_id).await? {
        return Err(ApiError::NotFound("Grant not found".to_string()));
    }
    info!("Revoked equipment {} from user {}", equipment_id, user_id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_equipment(
    State(state): State<AppState>,
    Json(payload): Json<NewEquipment>,
) -> ApiResult<(StatusCode, Json<Equipment>)> {
    let name = validate_name("Equipment", &payload.name).map_err(ApiError::BadRequest)?;
    let new_equipment = NewEquipment {
        name: name.to_string(),
        description: trimmed(payload.description),
        location: trimmed(payload.location),
    };

    match state.stores.equipment.create(&new_equipment).await {
        Ok(equipment) => Ok((StatusCode::CREATED, Json(equipment))),
        Err(DatabaseError::UniqueViolation(_)) => Err(ApiError::Conflict(
            "Equipment with this name already exists".to_string(),
        )),
        Err(e) => Err(e.into()),
    }
}

pub async fn delete_equipment(
    State(state): State<AppState>,
    Path(equipment_id): Path<i64>,
) -> ApiResult<StatusCode> {
    if !state.stores.equipment.delete(equipment_id).await? {
        return Err(ApiError::NotFound("Equipment not found".to_string()));
    }
    info!("Deleted equipment {}", equipment_id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_groups(State(state): State<AppState>) -> ApiResult<Json<Vec<Group>>> {
    Ok(Json(state.stores.groups.list().await?))
}

pub async fn add_group(
    State(state): State<AppState>,
    Json(payload): Json<NewGroupRequest>,
) -> ApiResult<(StatusCode, Json<Group>)> {
    let name = validate_name("Group", &payload.name).map_err(ApiError::BadRequest)?;

    match state.stores.groups.create(name).await {
        Ok(group) => Ok((StatusCode::CREATED, Json(group))),
        Err(DatabaseError::UniqueViolation(_)) => Err(ApiError::Conflict(
            "Group with this name already exists".to_string(),
        )),
        Err(e) => Err(e.into()),
    }
}

pub async fn delete_group(
    State(state): State<AppState>,
    Path(group_id): Path<i64>,
) -> ApiResult<StatusCode> {
    if !state.stores.groups.delete(group_id).await? {
        return Err(ApiError::NotFound("Group not found".to_string()));
    }
    info!("Deleted group {}", group_id);
    Ok(StatusCode::NO_CONTENT)
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
