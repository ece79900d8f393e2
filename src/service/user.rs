//! User accounts, credentials and bootstrap

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Deserialize;
use tracing::{info, warn};

use super::access::{self, Actor};
use crate::config::BootstrapConfig;
use crate::entity::{department, now_ts, role, user};
use crate::error::{AppError, AppResult, OptionExt};
use crate::permission::Permission;

const MAX_ACCOUNT_CHARS: usize = 32;
const MIN_PASSWORD_CHARS: usize = 6;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUser {
    pub display_name: String,
    pub login_account: String,
    pub password: String,
    pub department_id: Option<i64>,
    #[serde(default)]
    pub is_admin: bool,
    pub role_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUser {
    pub display_name: Option<String>,
    /// `null` detaches the user from any department
    #[serde(default, deserialize_with = "super::double_option")]
    pub department_id: Option<Option<i64>>,
    pub is_admin: Option<bool>,
    pub is_active: Option<bool>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub role_id: Option<Option<i64>>,
    pub password: Option<String>,
}

fn validate_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(AppError::validation(format!(
            "password must have at least {} characters",
            MIN_PASSWORD_CHARS
        )));
    }
    Ok(())
}

fn validate_account(login_account: &str) -> AppResult<String> {
    let account = login_account.trim();
    if account.is_empty() || account.chars().count() > MAX_ACCOUNT_CHARS {
        return Err(AppError::validation(format!(
            "login account must have 1 to {} characters",
            MAX_ACCOUNT_CHARS
        )));
    }
    Ok(account.to_string())
}

fn validate_display_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::validation("display name must not be empty"));
    }
    Ok(name.to_string())
}

#[derive(Clone)]
pub struct UserService {
    db: DatabaseConnection,
    bcrypt_cost: u32,
}

impl UserService {
    pub fn new(db: DatabaseConnection, bcrypt_cost: u32) -> Self {
        Self { db, bcrypt_cost }
    }

    fn hash_password(&self, password: &str) -> AppResult<String> {
        bcrypt::hash(password, self.bcrypt_cost).map_err(|e| {
            tracing::error!("Failed to hash password: {}", e);
            AppError::Internal("failed to hash password".to_string())
        })
    }

    /// Department path a user would be assigned, checked against the actor's scope
    async fn department_path_for(&self, actor: &Actor, department_id: Option<i64>) -> AppResult<String> {
        let Some(id) = department_id else {
            return Ok(String::new());
        };
        let dept = department::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_not_found(format!("department {} not found", id))?;
        if !actor.covers_path(&dept.path) {
            return Err(AppError::forbidden("department is outside your scope"));
        }
        Ok(dept.path)
    }

    /// A role exists and grants nothing the actor does not hold
    async fn ensure_assignable_role(&self, actor: &Actor, role_id: Option<i64>) -> AppResult<()> {
        let Some(id) = role_id else {
            return Ok(());
        };
        let role = role::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_not_found(format!("role {} not found", id))?;
        if actor.is_admin {
            return Ok(());
        }

        let held = match self.find(actor.id).await? {
            Some(me) => self.permissions_of(&me).await?,
            None => Vec::new(),
        };
        if let Some(missing) = role.permission_set().into_iter().find(|p| !held.contains(p)) {
            return Err(AppError::forbidden(format!(
                "role '{}' grants {} which you do not hold",
                role.name,
                missing.as_str()
            )));
        }
        Ok(())
    }

    /// Target of an update or delete; administrators are off limits to non-admins
    async fn get_managed(&self, actor: &Actor, id: i64) -> AppResult<user::Model> {
        let target = self.get(actor, id).await?;
        if target.is_admin && !actor.is_admin {
            return Err(AppError::forbidden("only administrators may manage administrators"));
        }
        Ok(target)
    }

    /// Check credentials; any failure is reported as Unauthorized
    pub async fn authenticate(&self, login_account: &str, password: &str) -> AppResult<user::Model> {
        let found = user::Entity::find()
            .filter(user::Column::LoginAccount.eq(login_account.trim()))
            .one(&self.db)
            .await?;

        let Some(found) = found else {
            warn!("Login attempt for unknown account {}", login_account);
            return Err(AppError::Unauthorized);
        };
        if !found.is_active {
            warn!("Login attempt for disabled account {}", login_account);
            return Err(AppError::Unauthorized);
        }
        if !bcrypt::verify(password, &found.password_hash).unwrap_or(false) {
            warn!("Wrong password for account {}", login_account);
            return Err(AppError::Unauthorized);
        }
        Ok(found)
    }

    /// Effective permissions: everything for administrators, else the role's
    pub async fn permissions_of(&self, target: &user::Model) -> AppResult<Vec<Permission>> {
        if target.is_admin {
            return Ok(Permission::ALL.to_vec());
        }
        let Some(role_id) = target.role_id else {
            return Ok(Vec::new());
        };
        let role = role::Entity::find_by_id(role_id).one(&self.db).await?;
        Ok(role.map(|r| r.permission_set()).unwrap_or_default())
    }

    pub async fn find(&self, id: i64) -> AppResult<Option<user::Model>> {
        Ok(user::Entity::find_by_id(id).one(&self.db).await?)
    }

    pub async fn create(&self, actor: &Actor, input: CreateUser) -> AppResult<user::Model> {
        let login_account = validate_account(&input.login_account)?;
        let display_name = validate_display_name(&input.display_name)?;
        validate_password(&input.password)?;
        if input.is_admin && !actor.is_admin {
            return Err(AppError::forbidden("only administrators may create administrators"));
        }

        let existing = user::Entity::find()
            .filter(user::Column::LoginAccount.eq(login_account.as_str()))
            .one(&self.db)
            .await?;
        if existing.is_some() {
            return Err(AppError::conflict(format!(
                "login account '{}' already exists",
                login_account
            )));
        }

        let department_path = self.department_path_for(actor, input.department_id).await?;
        self.ensure_assignable_role(actor, input.role_id).await?;
        let password_hash = self.hash_password(&input.password)?;

        let created = user::ActiveModel {
            display_name: Set(display_name),
            login_account: Set(login_account),
            password_hash: Set(password_hash),
            department_path: Set(department_path),
            is_admin: Set(input.is_admin),
            is_active: Set(true),
            role_id: Set(input.role_id),
            created_at: Set(now_ts()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        info!("Created user {} ({})", created.login_account, created.id);
        Ok(created)
    }

    /// Users in the actor's department subtree, plus the actor
    pub async fn list(&self, actor: &Actor) -> AppResult<Vec<user::Model>> {
        let mut query = user::Entity::find().order_by_asc(user::Column::Id);
        if !actor.is_admin {
            let ids = access::accessible_user_ids(&self.db, actor).await?;
            query = query.filter(user::Column::Id.is_in(ids));
        }
        Ok(query.all(&self.db).await?)
    }

    pub async fn get(&self, actor: &Actor, id: i64) -> AppResult<user::Model> {
        let found = self
            .find(id)
            .await?
            .ok_or_not_found(format!("user {} not found", id))?;
        if !access::has_access_to_record(actor, Some(&found)) {
            return Err(AppError::forbidden("user is outside your department scope"));
        }
        Ok(found)
    }

    pub async fn update(&self, actor: &Actor, id: i64, input: UpdateUser) -> AppResult<user::Model> {
        let existing = self.get_managed(actor, id).await?;
        if input.is_admin.is_some() && !actor.is_admin {
            return Err(AppError::forbidden("only administrators may grant administrator rights"));
        }
        if input.role_id.is_some() && id == actor.id && !actor.is_admin {
            return Err(AppError::forbidden("you cannot change your own role"));
        }

        let mut active: user::ActiveModel = existing.into();
        if let Some(name) = input.display_name {
            active.display_name = Set(validate_display_name(&name)?);
        }
        if let Some(department_id) = input.department_id {
            active.department_path = Set(self.department_path_for(actor, department_id).await?);
        }
        if let Some(is_admin) = input.is_admin {
            active.is_admin = Set(is_admin);
        }
        if let Some(is_active) = input.is_active {
            if !is_active && id == actor.id {
                return Err(AppError::invalid_state("you cannot disable your own account"));
            }
            active.is_active = Set(is_active);
        }
        if let Some(role_id) = input.role_id {
            self.ensure_assignable_role(actor, role_id).await?;
            active.role_id = Set(role_id);
        }
        if let Some(password) = input.password {
            validate_password(&password)?;
            active.password_hash = Set(self.hash_password(&password)?);
        }

        Ok(active.update(&self.db).await?)
    }

    pub async fn delete(&self, actor: &Actor, id: i64) -> AppResult<()> {
        if id == actor.id {
            return Err(AppError::invalid_state("you cannot delete your own account"));
        }
        let existing = self.get_managed(actor, id).await?;
        user::Entity::delete_by_id(existing.id).exec(&self.db).await?;
        info!("Deleted user {} ({})", existing.login_account, existing.id);
        Ok(())
    }

    /// Create the configured administrator when no user exists yet
    pub async fn bootstrap_admin(&self, config: &BootstrapConfig) -> AppResult<Option<user::Model>> {
        let count = user::Entity::find().count(&self.db).await?;
        if count > 0 {
            return Ok(None);
        }

        let admin = user::ActiveModel {
            display_name: Set(config.admin_name.clone()),
            login_account: Set(validate_account(&config.admin_account)?),
            password_hash: Set(self.hash_password(&config.admin_password)?),
            department_path: Set(String::new()),
            is_admin: Set(true),
            is_active: Set(true),
            role_id: Set(None),
            created_at: Set(now_ts()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        warn!(
            "Created initial administrator '{}'; change its password",
            admin.login_account
        );
        Ok(Some(admin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_account() {
        assert_eq!(validate_account("  alice ").unwrap(), "alice");
        assert!(validate_account("   ").is_err());
        assert!(validate_account(&"a".repeat(33)).is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("12345").is_err());
        assert!(validate_password("123456").is_ok());
    }

    #[test]
    fn test_update_user_null_department() {
        let patch: UpdateUser = serde_json::from_str(r#"{"departmentId": null}"#).unwrap();
        assert_eq!(patch.department_id, Some(None));
        assert_eq!(patch.role_id, None);
    }
}
