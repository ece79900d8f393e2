//! Finance entries and their approval life cycle
//!
//! `pending -> approved | rejected`. Only approval touches the ledger;
//! deleting an approved entry reverses its posting.

use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use tracing::info;

use super::access::{self, Actor};
use super::ledger::{self, AccountLocks};
use super::{Page, PageQuery};
use crate::entity::finance::{self, ApprovalStatus, FinanceType};
use crate::entity::{now_ts, team_account, user};
use crate::error::{AppError, AppResult, OptionExt};
use crate::money;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFinance {
    pub team_id: i64,
    #[serde(rename = "type")]
    pub kind: FinanceType,
    pub amount: Decimal,
    pub occurred_at: Option<i64>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFinance {
    pub team_id: Option<i64>,
    #[serde(rename = "type")]
    pub kind: Option<FinanceType>,
    pub amount: Option<Decimal>,
    pub occurred_at: Option<i64>,
    pub description: Option<String>,
}

/// Body of `PUT /api/finance/:id/approve`
#[derive(Debug, Clone, Deserialize)]
pub struct Decision {
    pub status: ApprovalStatus,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinanceQuery {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub team_id: Option<i64>,
    pub status: Option<ApprovalStatus>,
    #[serde(rename = "type")]
    pub kind: Option<FinanceType>,
}

/// Validate a decision against the current state
pub fn transition(current: ApprovalStatus, target: ApprovalStatus) -> AppResult<ApprovalStatus> {
    if target == ApprovalStatus::Pending {
        return Err(AppError::validation("status must be 'approved' or 'rejected'"));
    }
    if current != ApprovalStatus::Pending {
        return Err(AppError::invalid_state(format!(
            "finance record is already {}",
            current.as_str()
        )));
    }
    Ok(target)
}

fn validate_amount(amount: Decimal) -> AppResult<Decimal> {
    let amount = money::round(amount);
    if amount < Decimal::ZERO {
        return Err(AppError::validation("amount must not be negative"));
    }
    Ok(amount)
}

/// Record the decision; only a row still pending is touched
async fn mark_decided<C: ConnectionTrait>(
    db: &C,
    entry: finance::Model,
    status: ApprovalStatus,
    actor_id: i64,
    reason: Option<String>,
) -> AppResult<finance::Model> {
    let now = now_ts();
    let result = finance::Entity::update_many()
        .col_expr(finance::Column::ApprovalStatus, Expr::value(status.as_str()))
        .col_expr(finance::Column::ApprovedBy, Expr::value(Some(actor_id)))
        .col_expr(finance::Column::ApprovedAt, Expr::value(Some(now)))
        .col_expr(finance::Column::RejectReason, Expr::value(reason.clone()))
        .col_expr(finance::Column::UpdatedAt, Expr::value(now))
        .filter(finance::Column::Id.eq(entry.id))
        .filter(finance::Column::ApprovalStatus.eq(ApprovalStatus::Pending))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::invalid_state(format!(
            "finance record {} is no longer pending",
            entry.id
        )));
    }

    Ok(finance::Model {
        approval_status: status,
        approved_by: Some(actor_id),
        approved_at: Some(now),
        reject_reason: reason,
        updated_at: now,
        ..entry
    })
}

#[derive(Clone)]
pub struct FinanceService {
    db: DatabaseConnection,
    locks: AccountLocks,
}

impl FinanceService {
    pub fn new(db: DatabaseConnection, locks: AccountLocks) -> Self {
        Self { db, locks }
    }

    async fn find<C: ConnectionTrait>(db: &C, id: i64) -> AppResult<finance::Model> {
        finance::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_not_found(format!("finance record {} not found", id))
    }

    /// Load an entry the actor may see, together with its creator
    async fn find_accessible(
        &self,
        actor: &Actor,
        id: i64,
    ) -> AppResult<(finance::Model, Option<user::Model>)> {
        let entry = Self::find(&self.db, id).await?;
        let creator = access::load_creator(&self.db, entry.created_by).await?;
        if !access::has_access_to_record(actor, creator.as_ref()) {
            return Err(AppError::forbidden("no access to this finance record"));
        }
        Ok((entry, creator))
    }

    /// Re-read an entry inside the transaction and make sure its account did not move
    async fn reload<C: ConnectionTrait>(
        db: &C,
        seen: &finance::Model,
    ) -> AppResult<finance::Model> {
        let entry = Self::find(db, seen.id).await?;
        if entry.team_id != seen.team_id {
            return Err(AppError::conflict(format!(
                "finance record {} was modified concurrently",
                seen.id
            )));
        }
        Ok(entry)
    }

    async fn usable_account<C: ConnectionTrait>(
        db: &C,
        actor: &Actor,
        team_id: i64,
    ) -> AppResult<team_account::Model> {
        let account = team_account::Entity::find_by_id(team_id)
            .one(db)
            .await?
            .ok_or_not_found(format!("team account {} not found", team_id))?;
        ledger::ensure_account_visible(db, actor, &account).await?;
        if !account.is_active {
            return Err(AppError::invalid_state(format!(
                "team account '{}' is disabled",
                account.name
            )));
        }
        Ok(account)
    }

    /// Create an entry awaiting approval
    pub async fn submit(&self, actor: &Actor, input: CreateFinance) -> AppResult<finance::Model> {
        let amount = validate_amount(input.amount)?;
        let account = Self::usable_account(&self.db, actor, input.team_id).await?;
        if input.kind == FinanceType::Expense && account.balance_amount() < amount {
            return Err(AppError::invalid_state(format!(
                "insufficient balance: {} available, {} requested",
                account.balance_amount(),
                amount
            )));
        }

        let now = now_ts();
        let entry = finance::ActiveModel {
            team_id: Set(account.id),
            kind: Set(input.kind),
            amount: Set(money::to_cents(amount)?),
            occurred_at: Set(input.occurred_at.unwrap_or(now)),
            description: Set(input.description),
            approval_status: Set(ApprovalStatus::Pending),
            approved_by: Set(None),
            approved_at: Set(None),
            reject_reason: Set(None),
            created_by: Set(actor.id),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        info!("Finance {} submitted by user {} on account {}", entry.id, actor.id, entry.team_id);
        Ok(entry)
    }

    /// Apply an approve/reject decision
    pub async fn decide(&self, actor: &Actor, id: i64, decision: Decision) -> AppResult<finance::Model> {
        match decision.status {
            ApprovalStatus::Approved => self.approve(actor, id).await,
            ApprovalStatus::Rejected => self.reject(actor, id, decision.reason).await,
            ApprovalStatus::Pending => Err(AppError::validation(
                "status must be 'approved' or 'rejected'",
            )),
        }
    }

    /// Approve a pending entry and post it to the ledger
    pub async fn approve(&self, actor: &Actor, id: i64) -> AppResult<finance::Model> {
        let (seen, _) = self.find_accessible(actor, id).await?;
        transition(seen.approval_status, ApprovalStatus::Approved)?;

        let _guard = self.locks.acquire(seen.team_id).await;
        let txn = self.db.begin().await?;

        let entry = Self::reload(&txn, &seen).await?;
        transition(entry.approval_status, ApprovalStatus::Approved)?;
        let posted = ledger::apply_approved_finance(&txn, &entry, actor.id).await?;
        let entry = mark_decided(&txn, entry, ApprovalStatus::Approved, actor.id, None).await?;

        txn.commit().await?;
        info!(
            "Finance {} approved by user {}, record {}",
            entry.id, actor.id, posted.record.id
        );
        Ok(entry)
    }

    /// Reject a pending entry; the ledger is untouched
    pub async fn reject(
        &self,
        actor: &Actor,
        id: i64,
        reason: Option<String>,
    ) -> AppResult<finance::Model> {
        let (entry, _) = self.find_accessible(actor, id).await?;
        transition(entry.approval_status, ApprovalStatus::Rejected)?;
        let entry = mark_decided(&self.db, entry, ApprovalStatus::Rejected, actor.id, reason).await?;
        info!("Finance {} rejected by user {}", entry.id, actor.id);
        Ok(entry)
    }

    pub async fn get(&self, actor: &Actor, id: i64) -> AppResult<finance::Model> {
        Ok(self.find_accessible(actor, id).await?.0)
    }

    /// Entries created by users within the actor's scope
    pub async fn list(&self, actor: &Actor, query: FinanceQuery) -> AppResult<Page<finance::Model>> {
        let scope = access::build_accessible_user_query(&self.db, actor).await?;
        let mut select = finance::Entity::find()
            .filter(scope.condition(finance::Column::CreatedBy))
            .order_by_desc(finance::Column::Id);
        if let Some(team_id) = query.team_id {
            select = select.filter(finance::Column::TeamId.eq(team_id));
        }
        if let Some(status) = query.status {
            select = select.filter(finance::Column::ApprovalStatus.eq(status));
        }
        if let Some(kind) = query.kind {
            select = select.filter(finance::Column::Kind.eq(kind));
        }

        let paging = PageQuery::new(query.page, query.page_size);
        let paginator = select.paginate(&self.db, paging.size());
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(paging.index()).await?;
        Ok(Page {
            items,
            total,
            page: paging.index() + 1,
            page_size: paging.size(),
        })
    }

    /// Edit an entry
    ///
    /// Pending and rejected entries may be edited by their creator, a
    /// superior or an administrator. Approved entries only by a superior or
    /// an administrator; changes to amount, type or account correct the
    /// posted record.
    pub async fn update(
        &self,
        actor: &Actor,
        id: i64,
        input: UpdateFinance,
    ) -> AppResult<finance::Model> {
        let (seen, creator) = self.find_accessible(actor, id).await?;
        let superior = creator
            .as_ref()
            .map_or(actor.is_admin, |c| access::is_superior_to(actor, c));
        if seen.is_posted() {
            if !superior {
                return Err(AppError::forbidden(
                    "only a superior or an administrator may edit an approved record",
                ));
            }
        } else if !(superior || seen.created_by == actor.id) {
            return Err(AppError::forbidden(
                "only the creator, a superior or an administrator may edit this record",
            ));
        }

        let team_id = input.team_id.unwrap_or(seen.team_id);
        let kind = input.kind.unwrap_or(seen.kind);
        let amount = match input.amount {
            Some(amount) => money::to_cents(validate_amount(amount)?)?,
            None => seen.amount,
        };

        let _guards = self.locks.acquire_many(&[seen.team_id, team_id]).await;
        let txn = self.db.begin().await?;

        let entry = Self::reload(&txn, &seen).await?;
        if team_id != entry.team_id {
            Self::usable_account(&txn, actor, team_id).await?;
        }
        let ledger_changed = team_id != entry.team_id || kind != entry.kind || amount != entry.amount;
        if entry.is_posted() && ledger_changed {
            ledger::correct_posted_record(&txn, &entry, team_id, kind, amount).await?;
        }

        let mut active: finance::ActiveModel = entry.into();
        active.team_id = Set(team_id);
        active.kind = Set(kind);
        active.amount = Set(amount);
        if let Some(occurred_at) = input.occurred_at {
            active.occurred_at = Set(occurred_at);
        }
        if let Some(description) = input.description {
            active.description = Set(Some(description));
        }
        active.updated_at = Set(now_ts());
        let entry = active.update(&txn).await?;

        txn.commit().await?;
        Ok(entry)
    }

    /// Delete an entry, reversing its posting if it was approved
    ///
    /// Administrators and superiors of the creator may always delete; the
    /// creator only while the entry is not approved.
    pub async fn delete(&self, actor: &Actor, id: i64) -> AppResult<()> {
        let (seen, creator) = self.find_accessible(actor, id).await?;
        let superior = creator
            .as_ref()
            .map_or(actor.is_admin, |c| access::is_superior_to(actor, c));
        let own_unposted = seen.created_by == actor.id && !seen.is_posted();
        if !(superior || own_unposted) {
            return Err(AppError::forbidden(
                "only a superior or an administrator may delete this record",
            ));
        }

        let _guard = self.locks.acquire(seen.team_id).await;
        let txn = self.db.begin().await?;

        let entry = Self::reload(&txn, &seen).await?;
        if entry.is_posted() {
            if !superior {
                return Err(AppError::forbidden(
                    "only a superior or an administrator may delete an approved record",
                ));
            }
            ledger::reverse_finance(&txn, &entry, actor.id).await?;
        }
        finance::Entity::delete_by_id(entry.id).exec(&txn).await?;

        txn.commit().await?;
        info!("Finance {} deleted by user {}", id, actor.id);
        Ok(())
    }
}
