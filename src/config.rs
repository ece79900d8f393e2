use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Server address (e.g., "0.0.0.0:8080")
    #[serde(default = "default_addr")]
    pub addr: String,
    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Ledger limits
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Password hashing
    #[serde(default)]
    pub auth: AuthConfig,
    /// Initial administrator, created when the user table is empty
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database type (postgres or sqlite)
    #[serde(default = "default_db_type", rename = "type")]
    pub db_type: String,
    /// Database host
    #[serde(default = "default_db_host")]
    pub host: String,
    /// Database port
    #[serde(default = "default_db_port")]
    pub port: u16,
    /// Database name
    #[serde(default = "default_db_name", rename = "database")]
    pub name: String,
    /// Database user
    #[serde(default = "default_db_user", rename = "username")]
    pub user: String,
    /// Database password
    #[serde(default)]
    pub password: String,
    /// SQLite file path, or ":memory:"
    #[serde(default = "default_db_path")]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LedgerConfig {
    /// Largest amount accepted by a single recharge
    #[serde(default = "default_recharge_ceiling", with = "rust_decimal::serde::float")]
    pub recharge_ceiling: Decimal,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            recharge_ceiling: default_recharge_ceiling(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// bcrypt work factor (4..=31)
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            bcrypt_cost: default_bcrypt_cost(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BootstrapConfig {
    #[serde(default = "default_admin_account")]
    pub admin_account: String,
    #[serde(default = "default_admin_password")]
    pub admin_password: String,
    #[serde(default = "default_admin_name")]
    pub admin_name: String,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            admin_account: default_admin_account(),
            admin_password: default_admin_password(),
            admin_name: default_admin_name(),
        }
    }
}

// Default value functions
fn default_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_db_type() -> String {
    "postgres".to_string()
}

fn default_db_host() -> String {
    "localhost".to_string()
}

fn default_db_port() -> u16 {
    5432
}

fn default_db_name() -> String {
    "backoffice".to_string()
}

fn default_db_user() -> String {
    "postgres".to_string()
}

fn default_db_path() -> String {
    "./data/backoffice.db".to_string()
}

fn default_recharge_ceiling() -> Decimal {
    Decimal::new(1_000_000, 0)
}

fn default_bcrypt_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

fn default_admin_account() -> String {
    "admin".to_string()
}

fn default_admin_password() -> String {
    "admin123".to_string()
}

fn default_admin_name() -> String {
    "Administrator".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            log: LogConfig::default(),
            database: DatabaseConfig::default(),
            ledger: LedgerConfig::default(),
            auth: AuthConfig::default(),
            bootstrap: BootstrapConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            db_type: default_db_type(),
            host: default_db_host(),
            port: default_db_port(),
            name: default_db_name(),
            user: default_db_user(),
            password: String::new(),
            path: default_db_path(),
        }
    }
}

impl DatabaseConfig {
    /// In-memory SQLite, used by tests
    pub fn sqlite_memory() -> Self {
        Self {
            db_type: "sqlite".to_string(),
            path: ":memory:".to_string(),
            ..Self::default()
        }
    }

    pub fn is_sqlite(&self) -> bool {
        self.db_type.eq_ignore_ascii_case("sqlite")
    }

    /// Generate database connection URL
    pub fn connection_url(&self) -> String {
        if self.is_sqlite() {
            if self.path == ":memory:" {
                "sqlite::memory:".to_string()
            } else {
                format!("sqlite://{}?mode=rwc", self.path)
            }
        } else {
            format!(
                "postgres://{}:{}@{}:{}/{}",
                self.user, self.password, self.host, self.port, self.name
            )
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
