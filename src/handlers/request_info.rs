use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};
use crate::handlers::common::{require_id, MessageResponse};
use crate::middlewares::AuthUser;
use crate::models::{
    deserialize_string_map, empty_body, HttpMethod, RequestDefinition, RequestInfo, StringMap,
};
use crate::state::AppState;

// ============ Request/Response DTOs ============

#[derive(Debug, Deserialize, ToSchema)]
pub struct SaveRequestInfoRequest {
    /// Existing definition to update; a new one is created when absent
    pub request_info_id: Option<i64>,
    pub project_id: Option<i64>,
    pub url: String,
    #[schema(value_type = String, example = "POST")]
    pub method: HttpMethod,
    #[serde(default, deserialize_with = "deserialize_string_map")]
    #[schema(value_type = Object)]
    pub headers: StringMap,
    #[serde(default = "empty_body")]
    pub body: serde_json::Value,
    #[serde(default, deserialize_with = "deserialize_string_map")]
    #[schema(value_type = Object)]
    pub query: StringMap,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub auth: serde_json::Map<String, serde_json::Value>,
    pub request_name: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SaveRequestInfoResponse {
    pub success: bool,
    pub request_info_id: i64,
}

/// Identifies one saved request within a project
#[derive(Debug, Deserialize, ToSchema)]
pub struct ProjectRequestAction {
    pub request_id: Option<i64>,
    pub project_id: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CopyRequestInfoResponse {
    pub success: bool,
    pub msg: String,
    pub request_info_id: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RequestInfoResponse {
    pub id: i64,
    #[schema(value_type = String)]
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: time::OffsetDateTime,
    pub url: String,
    pub method: String,
    #[schema(value_type = Object)]
    pub headers: StringMap,
    pub body: serde_json::Value,
    #[schema(value_type = Object)]
    pub query: StringMap,
    #[schema(value_type = Object)]
    pub auth: serde_json::Map<String, serde_json::Value>,
    pub request_name: Option<String>,
}

impl From<RequestInfo> for RequestInfoResponse {
    fn from(info: RequestInfo) -> Self {
        let definition = info.definition;
        Self {
            id: info.id,
            timestamp: info.timestamp,
            url: definition.url,
            method: definition.method.to_string(),
            headers: definition.headers,
            body: definition.body,
            query: definition.query,
            auth: definition.auth,
            request_name: definition.request_name,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RequestInfoListResponse {
    pub success: bool,
    pub data: Vec<RequestInfoResponse>,
}

// ============ Handlers ============

/// Save a request definition and attach it to a project
#[utoipa::path(
    post,
    path = "/api/save-request-info",
    request_body = SaveRequestInfoRequest,
    responses(
        (status = 200, description = "Request saved", body = SaveRequestInfoResponse),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Request info not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Requests"
)]
pub async fn save_request_info(
    _user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<SaveRequestInfoRequest>,
) -> AppResult<Json<SaveRequestInfoResponse>> {
    let project_id = require_id(payload.project_id, "project_id")?;
    let request_name = payload
        .request_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| AppError::Validation("request_name must not be empty".to_string()))?
        .to_string();

    let definition = RequestDefinition {
        url: payload.url,
        method: payload.method,
        headers: payload.headers,
        body: payload.body,
        query: payload.query,
        auth: payload.auth,
        request_name: Some(request_name),
    };

    let request_info_id = state
        .storage
        .save_request_info(payload.request_info_id, &definition)
        .await?;

    // The definition is kept even when the association fails
    if let Err(e) = state
        .storage
        .add_project_relation(project_id, request_info_id)
        .await
    {
        tracing::warn!(
            request_info_id,
            project_id,
            error = ?e,
            "Failed to attach request to project"
        );
    }

    Ok(Json(SaveRequestInfoResponse {
        success: true,
        request_info_id,
    }))
}

/// Copy a saved request into a project under "<name>_copy"
#[utoipa::path(
    post,
    path = "/api/copy_request_info",
    request_body = ProjectRequestAction,
    responses(
        (status = 200, description = "Request copied", body = CopyRequestInfoResponse),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Request info not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Requests"
)]
pub async fn copy_request_info(
    _user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<ProjectRequestAction>,
) -> AppResult<Json<CopyRequestInfoResponse>> {
    let request_id = require_id(payload.request_id, "request_id")?;
    let project_id = require_id(payload.project_id, "project_id")?;

    let request_info_id = state
        .storage
        .copy_request_info(request_id, project_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Request info".to_string()))?;

    Ok(Json(CopyRequestInfoResponse {
        success: true,
        msg: "Request copied".to_string(),
        request_info_id,
    }))
}

/// Remove a saved request from a project; the definition is deleted once no project uses it
#[utoipa::path(
    post,
    path = "/api/delete_request_info",
    request_body = ProjectRequestAction,
    responses(
        (status = 200, description = "Request removed", body = MessageResponse),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Request info not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Requests"
)]
pub async fn delete_request_info(
    _user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<ProjectRequestAction>,
) -> AppResult<Json<MessageResponse>> {
    let request_id = require_id(payload.request_id, "request_id")?;
    let project_id = require_id(payload.project_id, "project_id")?;

    if !state
        .storage
        .delete_request_info(request_id, project_id)
        .await?
    {
        return Err(AppError::NotFound("Request info".to_string()));
    }

    Ok(Json(MessageResponse::ok("Request deleted")))
}

/// List the saved requests of a project
#[utoipa::path(
    get,
    path = "/api/projects/{project_id}/requests",
    params(
        ("project_id" = i64, Path, description = "Project ID")
    ),
    responses(
        (status = 200, description = "Saved requests of the project", body = RequestInfoListResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Requests"
)]
pub async fn list_project_requests(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
) -> AppResult<Json<RequestInfoListResponse>> {
    let requests = state.storage.list_project_requests(project_id).await?;

    Ok(Json(RequestInfoListResponse {
        success: true,
        data: requests.into_iter().map(Into::into).collect(),
    }))
}
