use axum::{
    http::StatusCode,
    middleware,
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tower_sessions::{MemoryStore, SessionManagerLayer};

use crate::handlers;
use crate::middleware::auth_layer;
use crate::service::Page;
use crate::state::AppState;

pub mod health;

/// Paging metadata of list responses
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u64,
    pub page_size: u64,
    pub total: u64,
}

/// API response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            pagination: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
            pagination: None,
        }
    }
}

impl<T: Serialize> ApiResponse<Vec<T>> {
    /// List response carrying paging metadata
    pub fn paged(page: Page<T>) -> Self {
        Self {
            success: true,
            data: Some(page.items),
            message: None,
            pagination: Some(Pagination {
                page: page.page,
                page_size: page.page_size,
                total: page.total,
            }),
        }
    }
}

impl ApiResponse<()> {
    pub fn success_msg(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
            pagination: None,
        }
    }
}

/// Create the main router
pub fn create_router(state: AppState) -> Router {
    // Session store (in-memory for now)
    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(false) // Set to true in production with HTTPS
        .with_http_only(true);

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API routes
    let api_routes = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Auth routes
        .route("/login", post(handlers::auth::login))
        .route("/logout", post(handlers::auth::logout))
        .route("/users/current", get(handlers::auth::current_user))
        // Department routes
        .route(
            "/departments",
            post(handlers::department::create_department).get(handlers::department::list_departments),
        )
        .route("/departments/tree", get(handlers::department::department_tree))
        .route(
            "/departments/:id",
            get(handlers::department::get_department)
                .put(handlers::department::update_department)
                .delete(handlers::department::delete_department),
        )
        .route("/departments/:id/users", get(handlers::department::department_users))
        // User routes
        .route(
            "/users",
            post(handlers::user::create_user).get(handlers::user::list_users),
        )
        .route(
            "/users/:id",
            get(handlers::user::get_user)
                .put(handlers::user::update_user)
                .delete(handlers::user::delete_user),
        )
        // Role routes
        .route(
            "/roles",
            post(handlers::role::create_role).get(handlers::role::list_roles),
        )
        .route("/roles/permissions", get(handlers::role::list_permissions))
        .route(
            "/roles/:id",
            get(handlers::role::get_role)
                .put(handlers::role::update_role)
                .delete(handlers::role::delete_role),
        )
        // Team account routes
        .route(
            "/team-accounts",
            post(handlers::team_account::create_account).get(handlers::team_account::list_accounts),
        )
        .route(
            "/team-accounts/:id",
            get(handlers::team_account::get_account)
                .put(handlers::team_account::update_account)
                .delete(handlers::team_account::delete_account),
        )
        .route("/team-accounts/:id/recharge", post(handlers::team_account::recharge))
        .route("/team-accounts/:id/records", get(handlers::team_account::list_records))
        .route("/team-accounts/:id/verify", get(handlers::team_account::verify))
        // Finance routes
        .route(
            "/finance",
            post(handlers::finance::create_finance).get(handlers::finance::list_finance),
        )
        .route(
            "/finance/:id",
            get(handlers::finance::get_finance)
                .put(handlers::finance::update_finance)
                .delete(handlers::finance::delete_finance),
        )
        .route("/finance/:id/approve", put(handlers::finance::approve_finance));

    Router::new()
        .nest("/api", api_routes)
        .fallback(fallback)
        .layer(middleware::from_fn_with_state(state.clone(), auth_layer))
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Fallback handler for 404
pub async fn fallback() -> (StatusCode, Json<ApiResponse<()>>) {
    (StatusCode::NOT_FOUND, Json(ApiResponse::error("Not Found")))
}
