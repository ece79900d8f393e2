//! Department hierarchy store
//!
//! Owns the department tree and keeps every denormalized copy of a
//! department path (descendants and user `department_path`) in step with it.

use std::collections::{HashMap, HashSet};

use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::access::{self, Actor};
use crate::entity::department::{self, DepartmentTree};
use crate::entity::{now_ts, team_account, user};
use crate::error::{AppError, AppResult, OptionExt};
use crate::hierarchy::{self, MAX_LEVEL, SEPARATOR};

const MAX_NAME_CHARS: usize = 32;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDepartment {
    pub name: String,
    pub parent_id: Option<i64>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDepartment {
    pub name: Option<String>,
    /// Absent keeps the parent, `null` moves to the root
    #[serde(default, deserialize_with = "super::double_option")]
    pub parent_id: Option<Option<i64>>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

/// Rows touched by a cascading delete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteReport {
    pub departments_removed: u64,
    pub users_detached: u64,
}

#[derive(Clone)]
pub struct DepartmentService {
    db: DatabaseConnection,
}

/// Trimmed, non-empty name without the path separator
fn validate_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::validation("department name must not be empty"));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(AppError::validation(format!(
            "department name must not exceed {} characters",
            MAX_NAME_CHARS
        )));
    }
    if name.contains(SEPARATOR) {
        return Err(AppError::validation(format!(
            "department name must not contain '{}'",
            SEPARATOR
        )));
    }
    Ok(name.to_string())
}

impl DepartmentService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a department under `parent_id`, or at the root
    pub async fn create(&self, input: CreateDepartment) -> AppResult<department::Model> {
        let name = validate_name(&input.name)?;

        let (path, level) = match input.parent_id {
            Some(parent_id) => {
                let parent = department::Entity::find_by_id(parent_id)
                    .one(&self.db)
                    .await?
                    .ok_or_not_found(format!("parent department {} not found", parent_id))?;
                if !parent.is_active {
                    return Err(AppError::invalid_state(format!(
                        "parent department '{}' is disabled",
                        parent.path
                    )));
                }
                (hierarchy::child_path(Some(&parent.path), &name), parent.level + 1)
            }
            None => (name.clone(), 1),
        };
        if level > MAX_LEVEL {
            return Err(AppError::invalid_state(format!(
                "department depth may not exceed {}",
                MAX_LEVEL
            )));
        }

        if self.find_by_path(&path).await?.is_some() {
            return Err(AppError::conflict(format!("department '{}' already exists", path)));
        }

        let code = self.generate_code().await?;
        let now = now_ts();
        let created = department::ActiveModel {
            name: Set(name),
            code: Set(code),
            description: Set(input.description),
            parent_id: Set(input.parent_id),
            path: Set(path),
            level: Set(level),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        info!("Created department {} ({})", created.path, created.code);
        Ok(created)
    }

    /// Rename and/or move a department, rewriting every copy of its path
    pub async fn update(&self, id: i64, input: UpdateDepartment) -> AppResult<department::Model> {
        let txn = self.db.begin().await?;

        let current = department::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_not_found(format!("department {} not found", id))?;

        let name = match &input.name {
            Some(name) => validate_name(name)?,
            None => current.name.clone(),
        };
        let parent_id = input.parent_id.unwrap_or(current.parent_id);

        let parent = match parent_id {
            Some(parent_id) => {
                if parent_id == id {
                    return Err(AppError::invalid_state("a department cannot be its own parent"));
                }
                let parent = department::Entity::find_by_id(parent_id)
                    .one(&txn)
                    .await?
                    .ok_or_not_found(format!("parent department {} not found", parent_id))?;
                if hierarchy::is_same_or_descendant(&current.path, &parent.path) {
                    return Err(AppError::invalid_state(
                        "a department cannot be moved under its own descendant",
                    ));
                }
                if !parent.is_active && Some(parent_id) != current.parent_id {
                    return Err(AppError::invalid_state(format!(
                        "parent department '{}' is disabled",
                        parent.path
                    )));
                }
                Some(parent)
            }
            None => None,
        };

        let new_path = hierarchy::child_path(parent.as_ref().map(|p| p.path.as_str()), &name);
        let new_level = parent.as_ref().map_or(1, |p| p.level + 1);

        let descendants: Vec<department::Model> =
            access::departments_under_path(&txn, &current.path)
                .await?
                .into_iter()
                .filter(|d| d.id != id)
                .collect();

        let shift = new_level - current.level;
        let deepest = descendants.iter().map(|d| d.level).max().unwrap_or(current.level);
        if new_level > MAX_LEVEL || deepest + shift > MAX_LEVEL {
            return Err(AppError::invalid_state(format!(
                "department depth may not exceed {}",
                MAX_LEVEL
            )));
        }

        let path_changed = new_path != current.path;
        if path_changed {
            let clash = department::Entity::find()
                .filter(department::Column::Path.eq(new_path.as_str()))
                .filter(department::Column::Id.ne(id))
                .one(&txn)
                .await?;
            if clash.is_some() {
                return Err(AppError::conflict(format!(
                    "department '{}' already exists",
                    new_path
                )));
            }
        }

        let old_path = current.path.clone();
        let mut active: department::ActiveModel = current.into();
        active.name = Set(name);
        active.parent_id = Set(parent_id);
        active.path = Set(new_path.clone());
        active.level = Set(new_level);
        if let Some(description) = input.description {
            active.description = Set(Some(description));
        }
        if let Some(is_active) = input.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(now_ts());
        let updated = active.update(&txn).await?;

        if path_changed {
            let now = now_ts();
            for descendant in &descendants {
                let Some(path) = hierarchy::rebase(&descendant.path, &old_path, &new_path) else {
                    continue;
                };
                let mut active: department::ActiveModel = descendant.clone().into();
                active.level = Set(hierarchy::level_of(&path));
                active.path = Set(path);
                active.updated_at = Set(now);
                active.update(&txn).await?;
            }

            let members = access::users_under_path(&txn, &old_path).await?;
            for member in &members {
                let Some(path) = hierarchy::rebase(&member.department_path, &old_path, &new_path)
                else {
                    continue;
                };
                let mut active: user::ActiveModel = member.clone().into();
                active.department_path = Set(path);
                active.update(&txn).await?;
            }

            info!(
                "Department path {} -> {}: rewrote {} descendants, {} users",
                old_path,
                new_path,
                descendants.len(),
                members.len()
            );
        }

        txn.commit().await?;
        Ok(updated)
    }

    /// Delete a department
    ///
    /// With `cascade`, every descendant goes too and affected users are left
    /// without a department; without it, a department with children is refused.
    pub async fn delete(&self, id: i64, cascade: bool) -> AppResult<DeleteReport> {
        let txn = self.db.begin().await?;

        let current = department::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_not_found(format!("department {} not found", id))?;

        if !cascade {
            let child = department::Entity::find()
                .filter(department::Column::ParentId.eq(id))
                .one(&txn)
                .await?;
            if child.is_some() {
                return Err(AppError::conflict(format!(
                    "department '{}' still has sub-departments",
                    current.path
                )));
            }
        }

        let collected = access::departments_under_path(&txn, &current.path).await?;
        let ids: Vec<i64> = collected.iter().map(|d| d.id).collect();
        let paths: Vec<String> = collected.iter().map(|d| d.path.clone()).collect();

        let funded = team_account::Entity::find()
            .filter(team_account::Column::DepartmentId.is_in(ids.clone()))
            .one(&txn)
            .await?;
        if let Some(account) = funded {
            return Err(AppError::conflict(format!(
                "department {} still owns team account '{}'",
                account.department_id, account.name
            )));
        }

        let detached = user::Entity::update_many()
            .col_expr(user::Column::DepartmentPath, Expr::value(""))
            .filter(user::Column::DepartmentPath.is_in(paths))
            .exec(&txn)
            .await?;

        let removed = department::Entity::delete_many()
            .filter(department::Column::Id.is_in(ids))
            .exec(&txn)
            .await?;

        txn.commit().await?;

        info!(
            "Deleted department {}: {} departments removed, {} users detached",
            current.path, removed.rows_affected, detached.rows_affected
        );
        Ok(DeleteReport {
            departments_removed: removed.rows_affected,
            users_detached: detached.rows_affected,
        })
    }

    pub async fn get(&self, id: i64) -> AppResult<department::Model> {
        department::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_not_found(format!("department {} not found", id))
    }

    /// Department visible to `actor`
    pub async fn get_visible(&self, actor: &Actor, id: i64) -> AppResult<department::Model> {
        let dept = self.get(id).await?;
        if !actor.covers_path(&dept.path) {
            return Err(AppError::forbidden("department is outside your scope"));
        }
        Ok(dept)
    }

    /// Departments visible to `actor`, ordered by path
    pub async fn list(&self, actor: &Actor) -> AppResult<Vec<department::Model>> {
        let mut departments = if actor.is_admin {
            department::Entity::find()
                .order_by_asc(department::Column::Path)
                .all(&self.db)
                .await?
        } else {
            access::departments_under_path(&self.db, &actor.department_path).await?
        };
        departments.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(departments)
    }

    /// Visible departments as a nested tree
    pub async fn tree(&self, actor: &Actor) -> AppResult<Vec<DepartmentTree>> {
        Ok(build_tree(self.list(actor).await?))
    }

    /// Users in a department or any of its descendants
    pub async fn members(&self, actor: &Actor, id: i64) -> AppResult<Vec<user::Model>> {
        let dept = self.get_visible(actor, id).await?;
        let mut members = access::users_under_path(&self.db, &dept.path).await?;
        members.sort_by_key(|u| u.id);
        Ok(members)
    }

    async fn find_by_path(&self, path: &str) -> AppResult<Option<department::Model>> {
        Ok(department::Entity::find()
            .filter(department::Column::Path.eq(path))
            .one(&self.db)
            .await?)
    }

    async fn generate_code(&self) -> AppResult<String> {
        for _ in 0..super::CODE_ATTEMPTS {
            let code = format!("D{}", super::random_token(7));
            let taken = department::Entity::find()
                .filter(department::Column::Code.eq(code.as_str()))
                .one(&self.db)
                .await?;
            if taken.is_none() {
                return Ok(code);
            }
        }
        Err(AppError::Internal("could not generate a unique department code".to_string()))
    }
}

/// Nest departments by `parent_id`; nodes whose parent is not in the list become roots
pub fn build_tree(departments: Vec<department::Model>) -> Vec<DepartmentTree> {
    let ids: HashSet<i64> = departments.iter().map(|d| d.id).collect();
    let mut by_parent: HashMap<Option<i64>, Vec<department::Model>> = HashMap::new();
    for dept in departments {
        let key = dept.parent_id.filter(|p| ids.contains(p));
        by_parent.entry(key).or_default().push(dept);
    }

    fn attach(
        dept: department::Model,
        by_parent: &mut HashMap<Option<i64>, Vec<department::Model>>,
    ) -> DepartmentTree {
        let mut node = DepartmentTree::from(dept);
        if let Some(children) = by_parent.remove(&Some(node.id)) {
            node.children = children.into_iter().map(|c| attach(c, by_parent)).collect();
        }
        node
    }

    let roots = by_parent.remove(&None).unwrap_or_default();
    roots.into_iter().map(|r| attach(r, &mut by_parent)).collect()
}
