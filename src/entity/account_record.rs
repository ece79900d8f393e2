//! AccountRecord entity - 账户流水表
//!
//! 表名: bo_account_record
//!
//! Append-only. A completed row may only ever change to `reversed`; a
//! reversal is a new row pointing back through `original_record_id`.

use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::entity::finance::FinanceType;
use crate::money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    #[sea_orm(string_value = "income")]
    Income,
    #[sea_orm(string_value = "expense")]
    Expense,
    #[sea_orm(string_value = "recharge")]
    Recharge,
}

impl From<FinanceType> for RecordType {
    fn from(kind: FinanceType) -> Self {
        match kind {
            FinanceType::Income => RecordType::Income,
            FinanceType::Expense => RecordType::Expense,
        }
    }
}

impl RecordType {
    /// Type matching the sign of a balance change with no finance entry behind it
    pub fn for_effect(amount: Decimal) -> Self {
        if amount < Decimal::ZERO {
            RecordType::Expense
        } else {
            RecordType::Income
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    #[sea_orm(string_value = "reversed")]
    Reversed,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[sea_orm(table_name = "bo_account_record")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub team_account_id: i64,

    #[sea_orm(nullable)]
    pub finance_id: Option<i64>,

    #[sea_orm(column_name = "type")]
    #[serde(rename = "type")]
    pub kind: RecordType,

    /// 金额 (分), 收入/充值为正, 支出为负
    #[serde(with = "money::cents")]
    pub amount: i64,

    #[serde(with = "money::cents")]
    pub balance_before: i64,

    #[serde(with = "money::cents")]
    pub balance_after: i64,

    pub status: RecordStatus,

    pub occurred_at: i64,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    pub is_reversed: bool,

    #[sea_orm(nullable)]
    pub original_record_id: Option<i64>,

    pub created_by: i64,

    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Amount sign agrees with the type: negative only for expenses
    pub fn sign_matches_type(&self) -> bool {
        match self.kind {
            RecordType::Expense => self.amount <= 0,
            RecordType::Income | RecordType::Recharge => self.amount >= 0,
        }
    }

    /// `balance_after == balance_before + amount`
    pub fn is_balanced(&self) -> bool {
        self.balance_before + self.amount == self.balance_after
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_type_for_effect() {
        assert_eq!(RecordType::for_effect(dec!(200)), RecordType::Income);
        assert_eq!(RecordType::for_effect(dec!(-0.01)), RecordType::Expense);
        assert_eq!(RecordType::for_effect(Decimal::ZERO), RecordType::Income);
    }
}
