//! Finance handlers
//!
//! Income and expense entries with their approval flow

use axum::{
    extract::{Path, Query, State},
    response::Json,
    Extension,
};

use crate::entity::finance;
use crate::error::AppResult;
use crate::middleware::auth::CurrentUser;
use crate::permission::Permission;
use crate::routes::ApiResponse;
use crate::service::finance::{CreateFinance, Decision, FinanceQuery, UpdateFinance};
use crate::state::AppState;

/// POST /api/finance
pub async fn create_finance(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<CreateFinance>,
) -> AppResult<Json<ApiResponse<finance::Model>>> {
    user.require(Permission::FinanceCreate)?;
    let entry = state.finance().submit(&user.actor(), req).await?;
    Ok(Json(ApiResponse::success(entry)))
}

/// GET /api/finance?teamId=&status=&type=&page=&pageSize=
pub async fn list_finance(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<FinanceQuery>,
) -> AppResult<Json<ApiResponse<Vec<finance::Model>>>> {
    user.require(Permission::FinanceRead)?;
    let page = state.finance().list(&user.actor(), query).await?;
    Ok(Json(ApiResponse::paged(page)))
}

/// GET /api/finance/:id
pub async fn get_finance(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<finance::Model>>> {
    user.require(Permission::FinanceRead)?;
    let entry = state.finance().get(&user.actor(), id).await?;
    Ok(Json(ApiResponse::success(entry)))
}

/// PUT /api/finance/:id
pub async fn update_finance(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateFinance>,
) -> AppResult<Json<ApiResponse<finance::Model>>> {
    user.require(Permission::FinanceUpdate)?;
    let entry = state.finance().update(&user.actor(), id, req).await?;
    Ok(Json(ApiResponse::success(entry)))
}

/// DELETE /api/finance/:id
pub async fn delete_finance(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<()>>> {
    user.require(Permission::FinanceDelete)?;
    state.finance().delete(&user.actor(), id).await?;
    Ok(Json(ApiResponse::success_msg("finance record deleted")))
}

/// PUT /api/finance/:id/approve
pub async fn approve_finance(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(req): Json<Decision>,
) -> AppResult<Json<ApiResponse<finance::Model>>> {
    user.require(Permission::FinanceApprove)?;
    let entry = state.finance().decide(&user.actor(), id, req).await?;
    let message = format!("finance record {}", entry.approval_status.as_str());
    Ok(Json(ApiResponse::success(entry).with_message(message)))
}
