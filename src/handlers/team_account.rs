//! Team account handlers
//!
//! Balances are read-only here; they move through recharge and approved
//! finance records only.

use axum::{
    extract::{Path, Query, State},
    response::Json,
    Extension,
};

use crate::entity::{account_record, team_account};
use crate::error::AppResult;
use crate::middleware::auth::CurrentUser;
use crate::permission::Permission;
use crate::routes::ApiResponse;
use crate::service::ledger::{
    CreateTeamAccount, LedgerCheck, Posted, Recharge, RecordQuery, UpdateTeamAccount,
};
use crate::state::AppState;

/// POST /api/team-accounts
pub async fn create_account(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<CreateTeamAccount>,
) -> AppResult<Json<ApiResponse<team_account::Model>>> {
    user.require(Permission::TeamAccountCreate)?;
    let account = state.ledger().create_account(&user.actor(), req).await?;
    Ok(Json(ApiResponse::success(account)))
}

/// GET /api/team-accounts
pub async fn list_accounts(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<Vec<team_account::Model>>>> {
    user.require(Permission::TeamAccountRead)?;
    let accounts = state.ledger().list_accounts(&user.actor()).await?;
    Ok(Json(ApiResponse::success(accounts)))
}

/// GET /api/team-accounts/:id
pub async fn get_account(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<team_account::Model>>> {
    user.require(Permission::TeamAccountRead)?;
    let account = state.ledger().get_account(&user.actor(), id).await?;
    Ok(Json(ApiResponse::success(account)))
}

/// PUT /api/team-accounts/:id
pub async fn update_account(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateTeamAccount>,
) -> AppResult<Json<ApiResponse<team_account::Model>>> {
    user.require(Permission::TeamAccountUpdate)?;
    let account = state.ledger().update_account(&user.actor(), id, req).await?;
    Ok(Json(ApiResponse::success(account)))
}

/// DELETE /api/team-accounts/:id
pub async fn delete_account(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<()>>> {
    user.require(Permission::TeamAccountDelete)?;
    state.ledger().delete_account(&user.actor(), id).await?;
    Ok(Json(ApiResponse::success_msg("team account deleted")))
}

/// POST /api/team-accounts/:id/recharge
pub async fn recharge(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(req): Json<Recharge>,
) -> AppResult<Json<ApiResponse<Posted>>> {
    user.require(Permission::TeamAccountRecharge)?;
    let posted = state.ledger().recharge(&user.actor(), id, req).await?;
    Ok(Json(ApiResponse::success(posted)))
}

/// GET /api/team-accounts/:id/records
pub async fn list_records(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Query(query): Query<RecordQuery>,
) -> AppResult<Json<ApiResponse<Vec<account_record::Model>>>> {
    user.require(Permission::AccountRecordRead)?;
    let page = state.ledger().list_records(&user.actor(), id, query).await?;
    Ok(Json(ApiResponse::paged(page)))
}

/// GET /api/team-accounts/:id/verify
pub async fn verify(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<LedgerCheck>>> {
    user.require(Permission::AccountRecordRead)?;
    let check = state.ledger().verify(&user.actor(), id).await?;
    Ok(Json(ApiResponse::success(check)))
}
