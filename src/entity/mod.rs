//! Entity module - SeaORM entity definitions
//!
//! One module per table. Relations are resolved with explicit queries in
//! the service layer, so `Relation` enums stay empty.

pub mod account_record;
pub mod department;
pub mod finance;
pub mod role;
pub mod team_account;
pub mod user;

/// Current unix timestamp in seconds
pub fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}
