//! Authentication handlers
//!
//! Implements login, logout, and current user endpoints

use axum::{extract::State, Extension, Json};
use serde::Deserialize;
use tower_sessions::Session;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::{CurrentUser, SESSION_USER_KEY};
use crate::routes::ApiResponse;
use crate::state::AppState;

/// Login request body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub login_account: String,
    pub password: String,
}

/// POST /api/login
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<CurrentUser>>> {
    if req.login_account.trim().is_empty() || req.password.is_empty() {
        return Err(AppError::validation("login account and password are required"));
    }

    let users = state.users();
    let found = users.authenticate(&req.login_account, &req.password).await?;
    let permissions = users.permissions_of(&found).await?;

    session.cycle_id().await.map_err(|e| {
        tracing::error!("Failed to rotate session id: {}", e);
        AppError::Internal("session error".to_string())
    })?;
    session.insert(SESSION_USER_KEY, found.id).await.map_err(|e| {
        tracing::error!("Failed to save session: {}", e);
        AppError::Internal("session error".to_string())
    })?;

    tracing::info!("User logged in: {}", found.login_account);
    let current = CurrentUser {
        id: found.id,
        display_name: found.display_name,
        login_account: found.login_account,
        department_path: found.department_path,
        is_admin: found.is_admin,
        role_id: found.role_id,
        permissions,
    };
    Ok(Json(ApiResponse::success(current).with_message("login success")))
}

/// POST /api/logout
pub async fn logout(session: Session) -> AppResult<Json<ApiResponse<()>>> {
    session.flush().await.map_err(|e| {
        tracing::error!("Failed to flush session: {}", e);
        AppError::Internal("session error".to_string())
    })?;
    Ok(Json(ApiResponse::success_msg("logout success")))
}

/// GET /api/users/current
pub async fn current_user(
    Extension(user): Extension<CurrentUser>,
) -> Json<ApiResponse<CurrentUser>> {
    Json(ApiResponse::success(user))
}
