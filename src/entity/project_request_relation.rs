use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "project_request_relation")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub project_id: i64,
    pub request_info_id: i64,
    pub created_at: TimeDateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::request_info::Entity",
        from = "Column::RequestInfoId",
        to = "super::request_info::Column::Id"
    )]
    RequestInfo,
}

impl Related<super::request_info::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RequestInfo.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
