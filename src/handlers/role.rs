//! Role handlers
//!
//! Roles are plain permission sets; administrators bypass them.

use axum::{
    extract::{Path, State},
    response::Json,
    Extension,
};
use serde::Serialize;

use crate::entity::role;
use crate::error::AppResult;
use crate::middleware::auth::CurrentUser;
use crate::permission::Permission;
use crate::routes::ApiResponse;
use crate::service::role::{catalogue, CreateRole, PermissionInfo, UpdateRole};
use crate::state::AppState;

/// Role with its parsed permission list
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleResponse {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub permissions: Vec<Permission>,
    pub description: Option<String>,
    pub created_by: i64,
    pub created_at: i64,
}

impl From<role::Model> for RoleResponse {
    fn from(m: role::Model) -> Self {
        Self {
            permissions: m.permission_set(),
            id: m.id,
            name: m.name,
            code: m.code,
            description: m.description,
            created_by: m.created_by,
            created_at: m.created_at,
        }
    }
}

/// POST /api/roles
pub async fn create_role(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<CreateRole>,
) -> AppResult<Json<ApiResponse<RoleResponse>>> {
    user.require(Permission::RoleCreate)?;
    let created = state.roles().create(&user.actor(), req).await?;
    Ok(Json(ApiResponse::success(created.into())))
}

/// GET /api/roles
pub async fn list_roles(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<Vec<RoleResponse>>>> {
    user.require(Permission::RoleRead)?;
    let roles = state.roles().list().await?;
    Ok(Json(ApiResponse::success(
        roles.into_iter().map(RoleResponse::from).collect(),
    )))
}

/// GET /api/roles/permissions
pub async fn list_permissions(
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<Vec<PermissionInfo>>>> {
    user.require(Permission::RoleRead)?;
    Ok(Json(ApiResponse::success(catalogue())))
}

/// GET /api/roles/:id
pub async fn get_role(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<RoleResponse>>> {
    user.require(Permission::RoleRead)?;
    let found = state.roles().get(id).await?;
    Ok(Json(ApiResponse::success(found.into())))
}

/// PUT /api/roles/:id
pub async fn update_role(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateRole>,
) -> AppResult<Json<ApiResponse<RoleResponse>>> {
    user.require(Permission::RoleUpdate)?;
    let updated = state.roles().update(id, req).await?;
    Ok(Json(ApiResponse::success(updated.into())))
}

/// DELETE /api/roles/:id
pub async fn delete_role(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<()>>> {
    user.require(Permission::RoleDelete)?;
    let detached = state.roles().delete(id).await?;
    Ok(Json(ApiResponse::success_msg(format!(
        "role deleted, {} users detached",
        detached
    ))))
}
