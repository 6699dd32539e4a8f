use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::{AppError, AppResult};
use crate::handlers::common::{deserialize_flag, require_id, MessageResponse, PaginationParams};
use crate::middlewares::AuthUser;
use crate::models::{ConfigScope, CreatePreRequestConfig, PreRequestConfig, PreRequestScope};
use crate::state::AppState;

// ============ Request/Response DTOs ============

#[derive(Debug, Deserialize, ToSchema)]
pub struct SaveAdvancedConfigRequest {
    pub project_id: Option<i64>,
    /// Saved request executed as the pre-request
    pub request_info_id: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub is_global: bool,
    /// Saved request this config runs for; required unless global
    pub private_request_id: Option<i64>,
    /// Body sent with the pre-request; non-string values are stored as JSON text
    pub body_info: Option<serde_json::Value>,
    /// Query map sent with the pre-request
    pub query_info: Option<serde_json::Value>,
    pub host: Option<String>,
    pub request_name: Option<String>,
}

impl SaveAdvancedConfigRequest {
    fn into_input(self) -> AppResult<CreatePreRequestConfig> {
        let project_id = require_id(self.project_id, "project_id")?;
        let scope = ConfigScope::from_parts(self.is_global, self.private_request_id)
            .ok_or_else(|| {
                AppError::Validation(
                    "private_request_id is required for non-global configs".to_string(),
                )
            })?;

        Ok(CreatePreRequestConfig {
            project_id,
            request_info_id: self.request_info_id,
            scope,
            body_info: stored_text(self.body_info),
            query_info: stored_text(self.query_info),
            host: self.host.filter(|host| !host.trim().is_empty()),
            request_name: self.request_name,
        })
    }
}

/// Empty values are not stored
fn stored_text(value: Option<serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::Null | serde_json::Value::Bool(false) => None,
        serde_json::Value::String(text) if text.is_empty() => None,
        serde_json::Value::Object(map) if map.is_empty() => None,
        serde_json::Value::Array(items) if items.is_empty() => None,
        serde_json::Value::String(text) => Some(text),
        other => Some(other.to_string()),
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AdvancedConfigFilter {
    pub project_id: Option<i64>,
    /// Only global (`true`) or only custom (`false`) configs
    pub is_global: Option<bool>,
    /// With `is_global=false`, only configs that run for this saved request
    pub private_request_id: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdvancedConfigResponse {
    pub id: i64,
    pub project_id: i64,
    pub request_info_id: Option<i64>,
    pub is_global: bool,
    pub private_request_id: Option<i64>,
    pub body_info: Option<String>,
    pub query_info: Option<String>,
    pub host: Option<String>,
    pub request_name: Option<String>,
    #[schema(value_type = String)]
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: time::OffsetDateTime,
    #[schema(value_type = String)]
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: time::OffsetDateTime,
}

impl From<PreRequestConfig> for AdvancedConfigResponse {
    fn from(c: PreRequestConfig) -> Self {
        Self {
            id: c.id,
            project_id: c.project_id,
            request_info_id: c.request_info_id,
            is_global: c.scope.is_global(),
            private_request_id: c.scope.private_request_id(),
            body_info: c.body_info,
            query_info: c.query_info,
            host: c.host,
            request_name: c.request_name,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdvancedConfigListResponse {
    pub configs: Vec<AdvancedConfigResponse>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

// ============ Handlers ============

/// Create a pre-request config
#[utoipa::path(
    post,
    path = "/api/advanced-config",
    request_body = SaveAdvancedConfigRequest,
    responses(
        (status = 200, description = "Config created", body = AdvancedConfigResponse),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Advanced Config"
)]
pub async fn create_advanced_config(
    _user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<SaveAdvancedConfigRequest>,
) -> AppResult<Json<AdvancedConfigResponse>> {
    let input = payload.into_input()?;
    let config = state.storage.create_pre_request_config(&input).await?;
    Ok(Json(config.into()))
}

/// List the pre-request configs of a project, newest first
#[utoipa::path(
    get,
    path = "/api/advanced-config/list",
    params(AdvancedConfigFilter, PaginationParams),
    responses(
        (status = 200, description = "Page of configs", body = AdvancedConfigListResponse),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Advanced Config"
)]
pub async fn list_advanced_configs(
    _user: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<AdvancedConfigFilter>,
    Query(pagination): Query<PaginationParams>,
) -> AppResult<Json<AdvancedConfigListResponse>> {
    let project_id = require_id(filter.project_id, "project_id")?;
    let scope = filter.is_global.map(|global| {
        if global {
            PreRequestScope::Global
        } else {
            PreRequestScope::Custom
        }
    });

    let (configs, total) = state
        .storage
        .list_pre_request_configs(
            project_id,
            scope,
            filter.private_request_id,
            pagination.limit(),
            pagination.offset(),
        )
        .await?;

    Ok(Json(AdvancedConfigListResponse {
        configs: configs.into_iter().map(Into::into).collect(),
        total,
        page: pagination.page(),
        limit: pagination.limit(),
        total_pages: pagination.total_pages(total),
    }))
}

/// Get a pre-request config by ID
#[utoipa::path(
    get,
    path = "/api/advanced-config/{id}",
    params(
        ("id" = i64, Path, description = "Config ID")
    ),
    responses(
        (status = 200, description = "Config details", body = AdvancedConfigResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Config not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Advanced Config"
)]
pub async fn get_advanced_config(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<AdvancedConfigResponse>> {
    let config = state.storage.get_pre_request_config(id).await?;
    Ok(Json(config.into()))
}

/// Replace a pre-request config
#[utoipa::path(
    put,
    path = "/api/advanced-config/{id}",
    params(
        ("id" = i64, Path, description = "Config ID")
    ),
    request_body = SaveAdvancedConfigRequest,
    responses(
        (status = 200, description = "Config updated", body = AdvancedConfigResponse),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Config not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Advanced Config"
)]
pub async fn update_advanced_config(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<SaveAdvancedConfigRequest>,
) -> AppResult<Json<AdvancedConfigResponse>> {
    let input = payload.into_input()?;
    let config = state.storage.update_pre_request_config(id, &input).await?;
    Ok(Json(config.into()))
}

/// Delete a pre-request config
#[utoipa::path(
    delete,
    path = "/api/advanced-config/{id}",
    params(
        ("id" = i64, Path, description = "Config ID")
    ),
    responses(
        (status = 200, description = "Config deleted", body = MessageResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Config not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Advanced Config"
)]
pub async fn delete_advanced_config(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<MessageResponse>> {
    state.storage.delete_pre_request_config(id).await?;
    Ok(Json(MessageResponse::ok("Config deleted")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(body: serde_json::Value) -> SaveAdvancedConfigRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_custom_config_requires_target() {
        let err = request(json!({"project_id": 1, "is_global": 0}))
            .into_input()
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let input = request(json!({"project_id": 1, "is_global": 0, "private_request_id": 7}))
            .into_input()
            .unwrap();
        assert_eq!(
            input.scope,
            ConfigScope::Custom {
                private_request_id: 7
            }
        );
    }

    #[test]
    fn test_project_id_must_be_positive() {
        let err = request(json!({"project_id": 0, "is_global": true}))
            .into_input()
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_structured_fields_are_stored_as_text() {
        let input = request(json!({
            "project_id": 1,
            "is_global": true,
            "body_info": {"user": "u"},
            "query_info": "{\"page\":\"1\"}",
            "host": " "
        }))
        .into_input()
        .unwrap();

        assert_eq!(input.body_info.as_deref(), Some(r#"{"user":"u"}"#));
        assert_eq!(input.query_info.as_deref(), Some(r#"{"page":"1"}"#));
        assert_eq!(input.host, None);

        let empty = request(json!({
            "project_id": 1,
            "is_global": true,
            "body_info": {},
            "query_info": ""
        }))
        .into_input()
        .unwrap();
        assert_eq!(empty.body_info, None);
        assert_eq!(empty.query_info, None);
    }
}
