use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::config::Config;
use crate::service::{
    department::DepartmentService, finance::FinanceService, ledger::AccountLocks,
    ledger::LedgerService, role::RoleService, user::UserService,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: DatabaseConnection,
    /// Application configuration
    pub config: Arc<Config>,
    /// Per-account write locks for balance-affecting operations
    pub account_locks: AccountLocks,
}

impl AppState {
    /// Create new application state
    pub fn new(db: DatabaseConnection, config: Config) -> Self {
        Self {
            db,
            config: Arc::new(config),
            account_locks: AccountLocks::default(),
        }
    }

    pub fn departments(&self) -> DepartmentService {
        DepartmentService::new(self.db.clone())
    }

    pub fn users(&self) -> UserService {
        UserService::new(self.db.clone(), self.config.auth.bcrypt_cost)
    }

    pub fn roles(&self) -> RoleService {
        RoleService::new(self.db.clone())
    }

    pub fn ledger(&self) -> LedgerService {
        LedgerService::new(
            self.db.clone(),
            self.account_locks.clone(),
            self.config.ledger.recharge_ceiling,
        )
    }

    pub fn finance(&self) -> FinanceService {
        FinanceService::new(self.db.clone(), self.account_locks.clone())
    }
}
