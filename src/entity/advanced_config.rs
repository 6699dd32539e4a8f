use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Pre-request config. `private_request_id` is set for custom configs only
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "advanced_config")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub project_id: i64,
    pub request_info_id: Option<i64>,
    pub is_global: bool,
    pub private_request_id: Option<i64>,
    pub body_info: Option<String>,
    pub query_info: Option<String>,
    pub host: Option<String>,
    pub request_name: Option<String>,
    pub created_at: TimeDateTimeWithTimeZone,
    pub updated_at: TimeDateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
