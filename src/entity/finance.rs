//! Finance entity - 收支记录表
//!
//! 表名: bo_finance

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "lowercase")]
pub enum FinanceType {
    #[sea_orm(string_value = "income")]
    Income,
    #[sea_orm(string_value = "expense")]
    Expense,
}

impl FinanceType {
    /// Balance effect of an amount of this type, in cents
    pub fn signed(self, amount: i64) -> i64 {
        match self {
            FinanceType::Income => amount,
            FinanceType::Expense => -amount,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[sea_orm(table_name = "bo_finance")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// 团队账户ID
    pub team_id: i64,

    #[sea_orm(column_name = "type")]
    #[serde(rename = "type")]
    pub kind: FinanceType,

    /// 金额 (分), 非负
    #[serde(with = "money::cents")]
    pub amount: i64,

    pub occurred_at: i64,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    pub approval_status: ApprovalStatus,

    #[sea_orm(nullable)]
    pub approved_by: Option<i64>,

    #[sea_orm(nullable)]
    pub approved_at: Option<i64>,

    #[sea_orm(column_type = "Text", nullable)]
    pub reject_reason: Option<String>,

    pub created_by: i64,

    pub created_at: i64,

    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl ApprovalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }
}

impl Model {
    pub fn is_posted(&self) -> bool {
        self.approval_status == ApprovalStatus::Approved
    }

    /// Signed balance effect once approved, in cents
    pub fn signed_amount(&self) -> i64 {
        self.kind.signed(self.amount)
    }
}
