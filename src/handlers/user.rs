//! User handlers
//!
//! Implements user CRUD operations

use axum::{
    extract::{Path, State},
    response::Json,
    Extension,
};

use crate::entity::user;
use crate::error::AppResult;
use crate::middleware::auth::CurrentUser;
use crate::permission::Permission;
use crate::routes::ApiResponse;
use crate::service::user::{CreateUser, UpdateUser};
use crate::state::AppState;

/// POST /api/users
pub async fn create_user(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(req): Json<CreateUser>,
) -> AppResult<Json<ApiResponse<user::Model>>> {
    current_user.require(Permission::UserCreate)?;
    let created = state.users().create(&current_user.actor(), req).await?;
    Ok(Json(ApiResponse::success(created)))
}

/// GET /api/users
pub async fn list_users(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<Vec<user::Model>>>> {
    current_user.require(Permission::UserRead)?;
    let users = state.users().list(&current_user.actor()).await?;
    Ok(Json(ApiResponse::success(users)))
}

/// GET /api/users/:id
pub async fn get_user(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<user::Model>>> {
    current_user.require(Permission::UserRead)?;
    let found = state.users().get(&current_user.actor(), id).await?;
    Ok(Json(ApiResponse::success(found)))
}

/// PUT /api/users/:id
pub async fn update_user(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateUser>,
) -> AppResult<Json<ApiResponse<user::Model>>> {
    current_user.require(Permission::UserUpdate)?;
    let updated = state.users().update(&current_user.actor(), id, req).await?;
    Ok(Json(ApiResponse::success(updated)))
}

/// DELETE /api/users/:id
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<()>>> {
    current_user.require(Permission::UserDelete)?;
    state.users().delete(&current_user.actor(), id).await?;
    Ok(Json(ApiResponse::success_msg("user deleted")))
}
