//! TeamAccount entity - 团队账户表
//!
//! 表名: bo_team_account
//!
//! `balance` is stored in cents and only ever written by the ledger service.

use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::money;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[sea_orm(table_name = "bo_team_account")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    #[sea_orm(column_type = "String(Some(64))")]
    pub name: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    /// 余额 (分)
    #[serde(with = "money::cents")]
    pub balance: i64,

    /// 所属部门, 一个部门至多一个账户
    #[sea_orm(unique)]
    pub department_id: i64,

    pub is_active: bool,

    pub created_by: i64,

    /// 每次余额写入递增
    #[serde(skip_serializing, default)]
    pub version: i32,

    pub created_at: i64,

    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn balance_amount(&self) -> Decimal {
        money::from_cents(self.balance)
    }
}
