//! Department-scoped record access
//!
//! Scope is decided purely by comparing materialized department paths:
//! a user sees records created in their own department and below it, never
//! above it. Administrators see everything.

use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
};

use crate::entity::{department, user};
use crate::hierarchy;

/// The acting user, as far as scoping is concerned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: i64,
    pub is_admin: bool,
    pub department_path: String,
}

impl Actor {
    pub fn has_department(&self) -> bool {
        !self.department_path.is_empty()
    }

    /// Department at `path` is this actor's own or one below it
    pub fn covers_path(&self, path: &str) -> bool {
        self.is_admin || hierarchy::is_same_or_descendant(&self.department_path, path)
    }
}

impl From<&user::Model> for Actor {
    fn from(user: &user::Model) -> Self {
        Self {
            id: user.id,
            is_admin: user.is_admin,
            department_path: user.department_path.clone(),
        }
    }
}

/// May `actor` read or write a record created by `creator`?
pub fn has_access_to_record(actor: &Actor, creator: Option<&user::Model>) -> bool {
    if actor.is_admin {
        return true;
    }
    let Some(creator) = creator else {
        return false;
    };
    if creator.id == actor.id {
        return true;
    }
    hierarchy::is_same_or_descendant(&actor.department_path, &creator.department_path)
}

/// Is `actor` a department ancestor of `creator` (or an administrator)?
pub fn is_superior_to(actor: &Actor, creator: &user::Model) -> bool {
    actor.is_admin || hierarchy::is_descendant(&actor.department_path, &creator.department_path)
}

/// Row filter produced for list queries
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessScope {
    /// No restriction
    All,
    /// Only rows created by these users
    Users(Vec<i64>),
}

impl AccessScope {
    /// Condition restricting `column` (a creator id column) to this scope
    pub fn condition<C: ColumnTrait>(&self, column: C) -> Condition {
        match self {
            AccessScope::All => Condition::all(),
            AccessScope::Users(ids) => Condition::all().add(column.is_in(ids.clone())),
        }
    }

    pub fn allows(&self, user_id: i64) -> bool {
        match self {
            AccessScope::All => true,
            AccessScope::Users(ids) => ids.contains(&user_id),
        }
    }
}

/// Users whose department path equals `path` or lies below it
pub async fn users_under_path<C: ConnectionTrait>(
    db: &C,
    path: &str,
) -> Result<Vec<user::Model>, DbErr> {
    if path.is_empty() {
        return Ok(Vec::new());
    }
    let users = user::Entity::find()
        .filter(
            Condition::any()
                .add(user::Column::DepartmentPath.eq(path))
                .add(
                    Expr::col(user::Column::DepartmentPath)
                        .like(hierarchy::descendant_pattern(path)),
                ),
        )
        .order_by_asc(user::Column::Id)
        .all(db)
        .await?;

    Ok(users
        .into_iter()
        .filter(|u| hierarchy::is_same_or_descendant(path, &u.department_path))
        .collect())
}

/// Departments whose path equals `path` or lies below it
pub async fn departments_under_path<C: ConnectionTrait>(
    db: &C,
    path: &str,
) -> Result<Vec<department::Model>, DbErr> {
    if path.is_empty() {
        return Ok(Vec::new());
    }
    let departments = department::Entity::find()
        .filter(
            Condition::any()
                .add(department::Column::Path.eq(path))
                .add(Expr::col(department::Column::Path).like(hierarchy::descendant_pattern(path))),
        )
        .order_by_asc(department::Column::Id)
        .all(db)
        .await?;

    Ok(departments
        .into_iter()
        .filter(|d| hierarchy::is_same_or_descendant(path, &d.path))
        .collect())
}

/// Ids of every user whose records `actor` may see
pub async fn accessible_user_ids<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
) -> Result<Vec<i64>, DbErr> {
    if actor.is_admin {
        let users = user::Entity::find().all(db).await?;
        return Ok(users.into_iter().map(|u| u.id).collect());
    }

    let mut ids: Vec<i64> = users_under_path(db, &actor.department_path)
        .await?
        .into_iter()
        .map(|u| u.id)
        .collect();
    if !ids.contains(&actor.id) {
        ids.push(actor.id);
    }
    ids.sort_unstable();
    Ok(ids)
}

/// Ids of every department `actor` may see
pub async fn accessible_department_ids<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
) -> Result<Vec<i64>, DbErr> {
    let departments = if actor.is_admin {
        department::Entity::find().all(db).await?
    } else {
        departments_under_path(db, &actor.department_path).await?
    };
    let mut ids: Vec<i64> = departments.into_iter().map(|d| d.id).collect();
    ids.sort_unstable();
    Ok(ids)
}

/// List filter for records carrying a creator id
pub async fn build_accessible_user_query<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
) -> Result<AccessScope, DbErr> {
    if actor.is_admin {
        return Ok(AccessScope::All);
    }
    Ok(AccessScope::Users(accessible_user_ids(db, actor).await?))
}

/// Load the creator of a record; `None` when the user no longer exists
pub async fn load_creator<C: ConnectionTrait>(
    db: &C,
    creator_id: i64,
) -> Result<Option<user::Model>, DbErr> {
    user::Entity::find_by_id(creator_id).one(db).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64, path: &str) -> user::Model {
        user::Model {
            id,
            display_name: format!("user{}", id),
            login_account: format!("user{}", id),
            password_hash: String::new(),
            department_path: path.to_string(),
            is_admin: false,
            is_active: true,
            role_id: None,
            created_at: 0,
        }
    }

    fn actor(id: i64, path: &str) -> Actor {
        Actor::from(&user(id, path))
    }

    #[test]
    fn test_admin_sees_everything() {
        let admin = Actor {
            id: 1,
            is_admin: true,
            department_path: String::new(),
        };
        assert!(has_access_to_record(&admin, Some(&user(2, "Sales"))));
        assert!(has_access_to_record(&admin, None));
        assert!(is_superior_to(&admin, &user(2, "")));
    }

    #[test]
    fn test_missing_creator_denied() {
        assert!(!has_access_to_record(&actor(1, "Sales"), None));
    }

    #[test]
    fn test_same_and_descendant_department() {
        let manager = actor(1, "Sales");
        assert!(has_access_to_record(&manager, Some(&user(2, "Sales"))));
        assert!(has_access_to_record(&manager, Some(&user(3, "Sales->East"))));
        assert!(!has_access_to_record(&manager, Some(&user(4, "Sales-Global"))));
        assert!(!has_access_to_record(&manager, Some(&user(5, "Marketing"))));
    }

    #[test]
    fn test_superior_records_hidden_from_subordinate() {
        let clerk = actor(1, "Sales->East");
        assert!(!has_access_to_record(&clerk, Some(&user(2, "Sales"))));
    }

    #[test]
    fn test_no_department_sees_only_own() {
        let loner = actor(1, "");
        assert!(has_access_to_record(&loner, Some(&user(1, ""))));
        assert!(!has_access_to_record(&loner, Some(&user(2, ""))));
    }

    #[test]
    fn test_superior_is_strict_ancestor() {
        let manager = actor(1, "Sales");
        assert!(is_superior_to(&manager, &user(2, "Sales->East")));
        assert!(!is_superior_to(&manager, &user(3, "Sales")));
        assert!(!is_superior_to(&actor(4, "Sales->East"), &user(5, "Sales")));
    }

    #[test]
    fn test_scope_allows() {
        assert!(AccessScope::All.allows(99));
        let scope = AccessScope::Users(vec![1, 2]);
        assert!(scope.allows(2));
        assert!(!scope.allows(3));
    }
}
