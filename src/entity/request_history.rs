use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One execution of a saved request, append-only
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "request_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub request_info_id: i64,
    pub timestamp: TimeDateTimeWithTimeZone,
    pub url: String,
    pub method: String,
    pub auth: Option<String>,
    pub request_name: Option<String>,
    pub request_headers: Option<String>,
    pub request_body: Option<String>,
    pub query: Option<String>,
    pub response_status: i32,
    pub response_headers: Option<String>,
    pub response_body: Option<String>,
    pub response_time: i64,
    pub execution_status: String,
    pub execution_message: Option<String>,
    pub execution_details: Option<String>,
    pub pre_request_results: Option<String>,
    pub username: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
