//! Shared fixtures: an in-memory database with an administrator and helpers
//! to build departments, users and funded accounts.

#![allow(dead_code)]

use backoffice::config::DatabaseConfig;
use backoffice::entity::{department, team_account, user};
use backoffice::service::access::Actor;
use backoffice::service::department::CreateDepartment;
use backoffice::service::ledger::CreateTeamAccount;
use backoffice::service::user::CreateUser;
use backoffice::{db, AppState, Config};
use rust_decimal::Decimal;

pub const PASSWORD: &str = "secret123";

/// Fresh in-memory database, migrated, with the bootstrap administrator
pub async fn setup() -> (AppState, user::Model) {
    let mut config = Config::default();
    config.database = DatabaseConfig::sqlite_memory();
    config.auth.bcrypt_cost = 4;
    config.bootstrap.admin_password = PASSWORD.to_string();

    let db = db::init_database(&config.database).await.unwrap();
    let state = AppState::new(db, config.clone());
    let admin = state
        .users()
        .bootstrap_admin(&config.bootstrap)
        .await
        .unwrap()
        .unwrap();
    (state, admin)
}

pub fn actor(user: &user::Model) -> Actor {
    Actor::from(user)
}

pub async fn department(state: &AppState, name: &str, parent_id: Option<i64>) -> department::Model {
    state
        .departments()
        .create(CreateDepartment {
            name: name.to_string(),
            parent_id,
            description: None,
        })
        .await
        .unwrap()
}

pub async fn member(
    state: &AppState,
    admin: &user::Model,
    login: &str,
    department_id: Option<i64>,
) -> user::Model {
    state
        .users()
        .create(
            &actor(admin),
            CreateUser {
                display_name: login.to_string(),
                login_account: login.to_string(),
                password: PASSWORD.to_string(),
                department_id,
                is_admin: false,
                role_id: None,
            },
        )
        .await
        .unwrap()
}

pub async fn account(
    state: &AppState,
    admin: &user::Model,
    department_id: i64,
    initial: Decimal,
) -> team_account::Model {
    state
        .ledger()
        .create_account(
            &actor(admin),
            CreateTeamAccount {
                name: format!("Account {}", department_id),
                department_id,
                initial_balance: initial,
                description: None,
            },
        )
        .await
        .unwrap()
}
