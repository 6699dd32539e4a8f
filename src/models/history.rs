use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::models::{HttpMethod, PreRequestResults, StringMap};

/// Outcome label stored with every execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    #[serde(rename = "成功")]
    Success,
    #[serde(rename = "失败")]
    Failure,
    #[serde(rename = "异常")]
    Exception,
}

impl ExecutionStatus {
    /// Success below 400, failure otherwise
    pub fn from_status_code(status: u16) -> Self {
        if status < 400 {
            ExecutionStatus::Success
        } else {
            ExecutionStatus::Failure
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Success => "成功",
            ExecutionStatus::Failure => "失败",
            ExecutionStatus::Exception => "异常",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "成功" => Some(ExecutionStatus::Success),
            "失败" => Some(ExecutionStatus::Failure),
            "异常" => Some(ExecutionStatus::Exception),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExecutionDetails {
    #[serde(rename_all = "camelCase")]
    Response {
        content_type: Option<String>,
        content_length: Option<String>,
        status_code: u16,
    },
    Exception { exception: String },
}

/// The request as it was actually sent (after interpolation)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutedRequest {
    pub url: String,
    pub method: HttpMethod,
    pub headers: StringMap,
    pub body: serde_json::Value,
    pub query: StringMap,
    pub auth: serde_json::Map<String, serde_json::Value>,
    #[serde(rename = "request_name")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedResponse {
    pub status: u16,
    pub headers: StringMap,
    pub body: serde_json::Value,
}

/// One stored execution of a saved request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionRecord {
    pub id: i64,
    pub request_info_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub request: ExecutedRequest,
    pub response: RecordedResponse,
    pub response_time_ms: i64,
    pub execution_status: ExecutionStatus,
    pub execution_message: String,
    pub execution_details: Option<ExecutionDetails>,
    pub pre_request_results: PreRequestResults,
    pub username: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewExecutionRecord {
    pub request_info_id: i64,
    pub request: ExecutedRequest,
    pub response: RecordedResponse,
    pub response_time_ms: i64,
    pub execution_status: ExecutionStatus,
    pub execution_message: String,
    pub execution_details: ExecutionDetails,
    pub pre_request_results: PreRequestResults,
    pub username: Option<String>,
}

/// Storage form of an execution record: structured fields held as JSON text
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRow {
    pub id: i64,
    pub request_info_id: i64,
    pub timestamp: OffsetDateTime,
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

/// A history row before the store assigns its id
#[derive(Debug, Clone, PartialEq)]
pub struct NewHistoryRow {
    pub request_info_id: i64,
    pub timestamp: OffsetDateTime,
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

impl NewHistoryRow {
    pub fn with_id(self, id: i64) -> HistoryRow {
        HistoryRow {
            id,
            request_info_id: self.request_info_id,
            timestamp: self.timestamp,
            url: self.url,
            method: self.method,
            auth: self.auth,
            request_name: self.request_name,
            request_headers: self.request_headers,
            request_body: self.request_body,
            query: self.query,
            response_status: self.response_status,
            response_headers: self.response_headers,
            response_body: self.response_body,
            response_time: self.response_time,
            execution_status: self.execution_status,
            execution_message: self.execution_message,
            execution_details: self.execution_details,
            pre_request_results: self.pre_request_results,
            username: self.username,
        }
    }
}
