//! Role entity - 角色表
//!
//! 表名: bo_role

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::permission::Permission;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[sea_orm(table_name = "bo_role")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    #[sea_orm(column_type = "String(Some(64))", unique)]
    pub name: String,

    /// 8位随机编码
    #[sea_orm(column_type = "String(Some(8))", unique)]
    pub code: String,

    /// 权限列表, 逗号分隔
    #[sea_orm(column_type = "Text")]
    pub permissions: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    pub created_by: i64,

    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Stored permissions; values no longer in the enumeration are dropped
    pub fn permission_set(&self) -> Vec<Permission> {
        self.permissions
            .split(',')
            .filter_map(|p| p.trim().parse().ok())
            .collect()
    }
}
