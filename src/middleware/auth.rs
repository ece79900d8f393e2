//! Authentication middleware
//!
//! Provides session-based authentication for API routes

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tower_sessions::Session;

use crate::error::{AppError, AppResult};
use crate::permission::Permission;
use crate::service::access::Actor;
use crate::state::AppState;

/// Session key for storing the user id
pub const SESSION_USER_KEY: &str = "user_id";

/// Extension to store current user in request
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub id: i64,
    pub display_name: String,
    pub login_account: String,
    pub department_path: String,
    pub is_admin: bool,
    pub role_id: Option<i64>,
    pub permissions: Vec<Permission>,
}

impl CurrentUser {
    pub fn has_permission(&self, perm: Permission) -> bool {
        self.is_admin || self.permissions.contains(&perm)
    }

    /// Fail with Forbidden unless the user holds `perm`
    pub fn require(&self, perm: Permission) -> AppResult<()> {
        if self.has_permission(perm) {
            Ok(())
        } else {
            Err(AppError::forbidden(format!("missing permission {}", perm)))
        }
    }

    pub fn actor(&self) -> Actor {
        Actor {
            id: self.id,
            is_admin: self.is_admin,
            department_path: self.department_path.clone(),
        }
    }
}

/// Paths that don't require authentication
fn is_public_path(path: &str) -> bool {
    if !path.starts_with("/api") {
        return true;
    }
    matches!(path, "/api/login" | "/api/logout" | "/api/health")
}

async fn load_current_user(state: &AppState, user_id: i64) -> AppResult<CurrentUser> {
    let users = state.users();
    let Some(found) = users.find(user_id).await? else {
        tracing::warn!("Session refers to missing user {}", user_id);
        return Err(AppError::Unauthorized);
    };
    if !found.is_active {
        tracing::warn!("Session of disabled user {}", found.login_account);
        return Err(AppError::Unauthorized);
    }
    let permissions = users.permissions_of(&found).await?;

    Ok(CurrentUser {
        id: found.id,
        display_name: found.display_name,
        login_account: found.login_account,
        department_path: found.department_path,
        is_admin: found.is_admin,
        role_id: found.role_id,
        permissions,
    })
}

/// Authentication middleware
pub async fn auth_layer(
    State(state): State<AppState>,
    session: Session,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if is_public_path(request.uri().path()) {
        return next.run(request).await;
    }

    let user_id: Option<i64> = session.get(SESSION_USER_KEY).await.unwrap_or(None);
    let Some(user_id) = user_id else {
        return AppError::Unauthorized.into_response();
    };

    match load_current_user(&state, user_id).await {
        Ok(current_user) => {
            request.extensions_mut().insert(current_user);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clerk(permissions: Vec<Permission>) -> CurrentUser {
        CurrentUser {
            id: 7,
            display_name: "Clerk".to_string(),
            login_account: "clerk".to_string(),
            department_path: "Sales->East".to_string(),
            is_admin: false,
            role_id: Some(1),
            permissions,
        }
    }

    #[test]
    fn test_public_paths() {
        assert!(is_public_path("/api/login"));
        assert!(is_public_path("/api/health"));
        assert!(is_public_path("/index.html"));
        assert!(!is_public_path("/api/finance"));
    }

    #[test]
    fn test_require_permission() {
        let user = clerk(vec![Permission::FinanceCreate]);
        assert!(user.require(Permission::FinanceCreate).is_ok());
        assert!(matches!(
            user.require(Permission::FinanceApprove),
            Err(AppError::Forbidden(_))
        ));

        let admin = CurrentUser {
            is_admin: true,
            ..clerk(Vec::new())
        };
        assert!(admin.require(Permission::FinanceApprove).is_ok());
    }

    #[test]
    fn test_actor() {
        let actor = clerk(Vec::new()).actor();
        assert_eq!(actor.id, 7);
        assert_eq!(actor.department_path, "Sales->East");
        assert!(!actor.is_admin);
    }
}
