use std::sync::Arc;

use time::OffsetDateTime;

use crate::error::{AppError, AppResult};
use crate::models::{
    parse_string_map, ExecutedRequest, ExecutionRecord, ExecutionStatus, HistoryRow,
    NewExecutionRecord, NewHistoryRow, RecordedResponse,
};
use crate::storage::Storage;

/// Persists execution records and reads them back
#[derive(Clone)]
pub struct HistoryRecorder {
    storage: Arc<dyn Storage>,
}

impl HistoryRecorder {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Append one record, returning its id
    pub async fn record(&self, record: NewExecutionRecord) -> AppResult<i64> {
        let request_info_id = record.request_info_id;
        let row = encode(record, OffsetDateTime::now_utc())?;
        let id = self.storage.append_history(row).await?;

        tracing::info!(history_id = id, request_info_id, "Execution recorded");
        Ok(id)
    }

    /// Records of a saved request, newest first
    pub async fn history_of(&self, request_info_id: i64) -> AppResult<Vec<ExecutionRecord>> {
        self.storage
            .list_history(request_info_id)
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Option<String>, serde_json::Error> {
    serde_json::to_string(value).map(Some)
}

fn encode(
    record: NewExecutionRecord,
    timestamp: OffsetDateTime,
) -> Result<NewHistoryRow, serde_json::Error> {
    let request = record.request;
    let response = record.response;

    Ok(NewHistoryRow {
        request_info_id: record.request_info_id,
        timestamp,
        url: request.url,
        method: request.method.to_string(),
        auth: to_json(&request.auth)?,
        request_name: request.name,
        request_headers: to_json(&request.headers)?,
        request_body: to_json(&request.body)?,
        query: to_json(&request.query)?,
        response_status: i32::from(response.status),
        response_headers: to_json(&response.headers)?,
        response_body: to_json(&response.body)?,
        response_time: record.response_time_ms,
        execution_status: record.execution_status.as_str().to_string(),
        execution_message: Some(record.execution_message),
        execution_details: to_json(&record.execution_details)?,
        pre_request_results: to_json(&record.pre_request_results)?,
        username: record.username,
    })
}

/// Body columns hold JSON text; anything else is kept as a plain string
fn parse_body(raw: Option<String>) -> serde_json::Value {
    match raw {
        None => serde_json::Value::String(String::new()),
        Some(text) => serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text)),
    }
}

fn parse_optional<T: serde::de::DeserializeOwned>(
    raw: Option<&str>,
) -> Result<Option<T>, serde_json::Error> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => serde_json::from_str::<Option<T>>(text),
    }
}

fn decode(row: HistoryRow) -> AppResult<ExecutionRecord> {
    let method = row.method.parse().map_err(AppError::Internal)?;
    let execution_status = ExecutionStatus::parse(&row.execution_status).ok_or_else(|| {
        AppError::Internal(format!(
            "Unknown execution status '{}' in history {}",
            row.execution_status, row.id
        ))
    })?;
    let response_status = u16::try_from(row.response_status).map_err(|_| {
        AppError::Internal(format!(
            "Invalid response status {} in history {}",
            row.response_status, row.id
        ))
    })?;

    Ok(ExecutionRecord {
        id: row.id,
        request_info_id: row.request_info_id,
        timestamp: row.timestamp,
        request: ExecutedRequest {
            url: row.url,
            method,
            headers: parse_string_map(row.request_headers.as_deref())?,
            body: parse_body(row.request_body),
            query: parse_string_map(row.query.as_deref())?,
            auth: parse_optional(row.auth.as_deref())?.unwrap_or_default(),
            name: row.request_name,
        },
        response: RecordedResponse {
            status: response_status,
            headers: parse_string_map(row.response_headers.as_deref())?,
            body: parse_body(row.response_body),
        },
        response_time_ms: row.response_time,
        execution_status,
        execution_message: row.execution_message.unwrap_or_default(),
        execution_details: parse_optional(row.execution_details.as_deref())?,
        pre_request_results: parse_optional(row.pre_request_results.as_deref())?
            .unwrap_or_default(),
        username: row.username,
    })
}
