use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::AppResult;
use crate::middlewares::AuthUser;
use crate::models::{ExecutionDetails, ExecutionRecord, PreRequestResults, StringMap};
use crate::state::AppState;

// ============ Request/Response DTOs ============

/// One execution of a saved request
#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryEntryResponse {
    pub id: i64,
    pub request_info_id: i64,
    #[schema(value_type = String)]
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: time::OffsetDateTime,
    pub url: String,
    pub method: String,
    #[schema(value_type = Object)]
    pub auth: serde_json::Map<String, serde_json::Value>,
    pub request_name: Option<String>,
    #[schema(value_type = Object)]
    pub request_headers: StringMap,
    pub request_body: serde_json::Value,
    #[schema(value_type = Object)]
    pub query: StringMap,
    pub response_status: u16,
    #[schema(value_type = Object)]
    pub response_headers: StringMap,
    pub response_body: serde_json::Value,
    /// Milliseconds
    pub response_time: i64,
    /// 成功, 失败 or 异常
    pub execution_status: String,
    pub execution_message: String,
    #[schema(value_type = Option<Object>)]
    pub execution_details: Option<ExecutionDetails>,
    #[schema(value_type = Object)]
    pub pre_request_results: PreRequestResults,
    pub username: Option<String>,
}

impl From<ExecutionRecord> for HistoryEntryResponse {
    fn from(record: ExecutionRecord) -> Self {
        let request = record.request;
        let response = record.response;
        Self {
            id: record.id,
            request_info_id: record.request_info_id,
            timestamp: record.timestamp,
            url: request.url,
            method: request.method.to_string(),
            auth: request.auth,
            request_name: request.name,
            request_headers: request.headers,
            request_body: request.body,
            query: request.query,
            response_status: response.status,
            response_headers: response.headers,
            response_body: response.body,
            response_time: record.response_time_ms,
            execution_status: record.execution_status.as_str().to_string(),
            execution_message: record.execution_message,
            execution_details: record.execution_details,
            pre_request_results: record.pre_request_results,
            username: record.username,
        }
    }
}

// ============ Handlers ============

/// Execution history of a saved request, newest first
#[utoipa::path(
    get,
    path = "/api/history/{request_info_id}",
    params(
        ("request_info_id" = i64, Path, description = "Saved request ID")
    ),
    responses(
        (status = 200, description = "Execution history", body = Vec<HistoryEntryResponse>),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "History"
)]
pub async fn get_request_history(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(request_info_id): Path<i64>,
) -> AppResult<Json<Vec<HistoryEntryResponse>>> {
    let history = state.sender.recorder().history_of(request_info_id).await?;
    Ok(Json(history.into_iter().map(Into::into).collect()))
}
