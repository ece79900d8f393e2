//! Backoffice - department-scoped back office with team account ledgers
//!
//! This crate provides the department hierarchy, department-scoped record
//! access, team account ledgers and the finance approval flow, served over
//! an HTTP/JSON API.

pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod hierarchy;
pub mod middleware;
pub mod money;
pub mod permission;
pub mod routes;
pub mod service;
pub mod state;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, AppResult};
pub use state::AppState;
