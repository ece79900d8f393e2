//! Request handlers module

pub mod auth;
pub mod department;
pub mod finance;
pub mod role;
pub mod team_account;
pub mod user;
