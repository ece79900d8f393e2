//! Department entity - 部门表
//!
//! 表名: bo_department
//!
//! `path` is the materialized ancestry (`HQ->Sales->East`), `level` its depth.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[sea_orm(table_name = "bo_department")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// 部门名称
    #[sea_orm(column_type = "String(Some(64))")]
    pub name: String,

    /// 部门编码 (系统生成, 唯一)
    #[sea_orm(column_type = "String(Some(16))", unique)]
    pub code: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    /// 父部门ID (None 表示顶级部门)
    #[sea_orm(nullable)]
    pub parent_id: Option<i64>,

    /// 部门路径 (冗余字段)
    #[sea_orm(column_type = "Text", unique)]
    pub path: String,

    /// 部门级别, 1..=10
    pub level: i32,

    pub is_active: bool,

    pub created_at: i64,

    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// 部门树节点 (用于API响应)
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentTree {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub path: String,
    pub level: i32,
    pub parent_id: Option<i64>,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub children: Vec<DepartmentTree>,
}

impl From<Model> for DepartmentTree {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            code: model.code,
            path: model.path,
            level: model.level,
            parent_id: model.parent_id,
            is_active: model.is_active,
            children: Vec::new(),
        }
    }
}
