//! Roles: named sets of permissions assigned to users

use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::access::Actor;
use super::{random_token, CODE_ATTEMPTS};
use crate::entity::{now_ts, role, user};
use crate::error::{AppError, AppResult, OptionExt};
use crate::permission::{join_permissions, parse_permission_list, Permission};

const ROLE_CODE_LEN: usize = 8;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRole {
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateRole {
    pub name: Option<String>,
    pub permissions: Option<Vec<String>>,
    pub description: Option<String>,
}

/// Entry of the permission catalogue
#[derive(Debug, Clone, Serialize)]
pub struct PermissionInfo {
    pub key: Permission,
    pub module: &'static str,
    pub label: &'static str,
}

/// Every permission the system knows about
pub fn catalogue() -> Vec<PermissionInfo> {
    Permission::ALL
        .iter()
        .map(|&p| PermissionInfo {
            key: p,
            module: p.module(),
            label: p.label(),
        })
        .collect()
}

fn validate_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::validation("role name must not be empty"));
    }
    Ok(name.to_string())
}

#[derive(Clone)]
pub struct RoleService {
    db: DatabaseConnection,
}

impl RoleService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn find_by_name(&self, name: &str) -> AppResult<Option<role::Model>> {
        Ok(role::Entity::find()
            .filter(role::Column::Name.eq(name))
            .one(&self.db)
            .await?)
    }

    async fn generate_code(&self) -> AppResult<String> {
        for _ in 0..CODE_ATTEMPTS {
            let code = random_token(ROLE_CODE_LEN);
            let taken = role::Entity::find()
                .filter(role::Column::Code.eq(code.as_str()))
                .one(&self.db)
                .await?;
            if taken.is_none() {
                return Ok(code);
            }
        }
        Err(AppError::Internal("could not generate a unique role code".to_string()))
    }

    pub async fn create(&self, actor: &Actor, input: CreateRole) -> AppResult<role::Model> {
        let name = validate_name(&input.name)?;
        let permissions = parse_permission_list(&input.permissions)?;
        if self.find_by_name(&name).await?.is_some() {
            return Err(AppError::conflict(format!("role '{}' already exists", name)));
        }

        let created = role::ActiveModel {
            name: Set(name),
            code: Set(self.generate_code().await?),
            permissions: Set(join_permissions(&permissions)),
            description: Set(input.description),
            created_by: Set(actor.id),
            created_at: Set(now_ts()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        info!("Created role {} ({}) with {} permissions", created.name, created.code, permissions.len());
        Ok(created)
    }

    pub async fn list(&self) -> AppResult<Vec<role::Model>> {
        Ok(role::Entity::find()
            .order_by_asc(role::Column::Id)
            .all(&self.db)
            .await?)
    }

    pub async fn get(&self, id: i64) -> AppResult<role::Model> {
        role::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_not_found(format!("role {} not found", id))
    }

    pub async fn update(&self, id: i64, input: UpdateRole) -> AppResult<role::Model> {
        let existing = self.get(id).await?;
        let mut active: role::ActiveModel = existing.into();

        if let Some(name) = input.name {
            let name = validate_name(&name)?;
            if let Some(other) = self.find_by_name(&name).await? {
                if other.id != id {
                    return Err(AppError::conflict(format!("role '{}' already exists", name)));
                }
            }
            active.name = Set(name);
        }
        if let Some(permissions) = input.permissions {
            active.permissions = Set(join_permissions(&parse_permission_list(&permissions)?));
        }
        if let Some(description) = input.description {
            active.description = Set(Some(description));
        }

        Ok(active.update(&self.db).await?)
    }

    /// Delete a role, detaching the users that hold it
    pub async fn delete(&self, id: i64) -> AppResult<u64> {
        let existing = self.get(id).await?;
        let txn = self.db.begin().await?;

        let detached = user::Entity::update_many()
            .col_expr(user::Column::RoleId, Expr::value(Option::<i64>::None))
            .filter(user::Column::RoleId.eq(id))
            .exec(&txn)
            .await?
            .rows_affected;
        role::Entity::delete_by_id(id).exec(&txn).await?;

        txn.commit().await?;
        info!("Deleted role {}, detached {} users", existing.name, detached);
        Ok(detached)
    }
}
