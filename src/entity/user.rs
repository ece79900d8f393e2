//! User entity - 用户表
//!
//! 表名: bo_user

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[sea_orm(table_name = "bo_user")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// 显示名称
    #[sea_orm(column_type = "String(Some(64))")]
    pub display_name: String,

    /// 登录账号 (唯一)
    #[sea_orm(column_type = "String(Some(32))", unique)]
    pub login_account: String,

    /// 密码 (bcrypt 哈希)
    #[sea_orm(column_type = "String(Some(128))")]
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    /// 部门路径副本, 空字符串表示无部门
    #[sea_orm(column_type = "Text")]
    pub department_path: String,

    pub is_admin: bool,

    pub is_active: bool,

    #[sea_orm(nullable)]
    pub role_id: Option<i64>,

    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn has_department(&self) -> bool {
        !self.department_path.is_empty()
    }
}
