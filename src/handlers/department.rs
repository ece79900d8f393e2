//! Department handlers
//!
//! Implements department CRUD operations

use axum::{
    extract::{Path, Query, State},
    response::Json,
    Extension,
};
use serde::Deserialize;

use crate::entity::department::{self, DepartmentTree};
use crate::entity::user;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::CurrentUser;
use crate::permission::Permission;
use crate::routes::ApiResponse;
use crate::service::department::{CreateDepartment, DeleteReport, UpdateDepartment};
use crate::state::AppState;

/// Query parameters for delete
#[derive(Debug, Default, Deserialize)]
pub struct DeleteQuery {
    /// Also remove descendants instead of refusing
    #[serde(default)]
    pub cascade: bool,
}

/// POST /api/departments
pub async fn create_department(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<CreateDepartment>,
) -> AppResult<Json<ApiResponse<department::Model>>> {
    user.require(Permission::DepartmentCreate)?;
    let departments = state.departments();
    if let Some(parent_id) = req.parent_id {
        departments.get_visible(&user.actor(), parent_id).await?;
    } else if !user.is_admin {
        return Err(AppError::forbidden(
            "only administrators may create top-level departments",
        ));
    }
    let created = departments.create(req).await?;
    Ok(Json(ApiResponse::success(created)))
}

/// GET /api/departments
pub async fn list_departments(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<Vec<department::Model>>>> {
    user.require(Permission::DepartmentRead)?;
    let departments = state.departments().list(&user.actor()).await?;
    Ok(Json(ApiResponse::success(departments)))
}

/// GET /api/departments/tree
pub async fn department_tree(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<Vec<DepartmentTree>>>> {
    user.require(Permission::DepartmentRead)?;
    let tree = state.departments().tree(&user.actor()).await?;
    Ok(Json(ApiResponse::success(tree)))
}

/// GET /api/departments/:id
pub async fn get_department(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<department::Model>>> {
    user.require(Permission::DepartmentRead)?;
    let dept = state.departments().get_visible(&user.actor(), id).await?;
    Ok(Json(ApiResponse::success(dept)))
}

/// PUT /api/departments/:id
pub async fn update_department(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateDepartment>,
) -> AppResult<Json<ApiResponse<department::Model>>> {
    user.require(Permission::DepartmentUpdate)?;
    let departments = state.departments();
    let actor = user.actor();
    departments.get_visible(&actor, id).await?;
    match req.parent_id {
        Some(Some(parent_id)) => {
            departments.get_visible(&actor, parent_id).await?;
        }
        Some(None) if !user.is_admin => {
            return Err(AppError::forbidden(
                "only administrators may move departments to the top level",
            ));
        }
        _ => {}
    }
    let updated = departments.update(id, req).await?;
    Ok(Json(ApiResponse::success(updated)))
}

/// DELETE /api/departments/:id?cascade=true
pub async fn delete_department(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Query(query): Query<DeleteQuery>,
) -> AppResult<Json<ApiResponse<DeleteReport>>> {
    user.require(Permission::DepartmentDelete)?;
    let departments = state.departments();
    departments.get_visible(&user.actor(), id).await?;
    let report = departments.delete(id, query.cascade).await?;
    Ok(Json(ApiResponse::success(report).with_message("department deleted")))
}

/// GET /api/departments/:id/users
pub async fn department_users(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<Vec<user::Model>>>> {
    user.require(Permission::DepartmentRead)?;
    let members = state.departments().members(&user.actor(), id).await?;
    Ok(Json(ApiResponse::success(members)))
}
