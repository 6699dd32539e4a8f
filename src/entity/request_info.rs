use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Saved request definition. Structured columns hold JSON text
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "request_info")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub timestamp: TimeDateTimeWithTimeZone,
    pub url: String,
    pub method: String,
    pub headers: Option<String>,
    pub body: Option<String>,
    pub query: Option<String>,
    pub auth: Option<String>,
    pub request_name: Option<String>,
    pub is_deleted: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::project_request_relation::Entity")]
    ProjectRequestRelations,
}

impl Related<super::project_request_relation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProjectRequestRelations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
