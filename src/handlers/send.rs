use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::middlewares::{AuthUser, ClientIp};
use crate::models::{deserialize_string_map, empty_body, HttpMethod, RequestDefinition, StringMap};
use crate::services::{SendOutcome, SendRequest, StreamedSend};
use crate::state::AppState;

// ============ Request/Response DTOs ============

/// A request to execute, optionally bound to a saved request and project
#[derive(Debug, Deserialize, ToSchema)]
pub struct SendRequestBody {
    pub url: String,
    #[schema(value_type = String, example = "GET")]
    pub method: HttpMethod,
    #[serde(default, deserialize_with = "deserialize_string_map")]
    #[schema(value_type = Object)]
    pub headers: StringMap,
    /// JSON document, or a string sent verbatim
    #[serde(default = "empty_body")]
    pub body: serde_json::Value,
    #[serde(default, deserialize_with = "deserialize_string_map")]
    #[schema(value_type = Object)]
    pub query: StringMap,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub auth: serde_json::Map<String, serde_json::Value>,
    pub request_name: Option<String>,
    /// Project whose pre-requests fill placeholders
    pub project_id: Option<i64>,
    /// Saved request being sent; enables custom pre-requests and history
    pub request_info_id: Option<i64>,
    /// Forward the upstream body as it arrives
    #[serde(default)]
    pub stream: bool,
}

impl SendRequestBody {
    fn into_send(self, username: String, client_ip: Option<String>) -> SendRequest {
        SendRequest {
            definition: RequestDefinition {
                url: self.url,
                method: self.method,
                headers: self.headers,
                body: self.body,
                query: self.query,
                auth: self.auth,
                request_name: self.request_name,
            },
            project_id: self.project_id,
            request_info_id: self.request_info_id,
            stream: self.stream,
            username: Some(username),
            client_ip,
        }
    }
}

/// Hop-by-hop headers are not forwarded on streamed responses
fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(name.as_str(), "transfer-encoding" | "connection" | "keep-alive")
}

// ============ Handlers ============

/// Execute an HTTP request, filling placeholders from the project's pre-requests
#[utoipa::path(
    post,
    path = "/api/send-request",
    request_body = SendRequestBody,
    responses(
        (status = 200, description = "Upstream response with timing, labels and pre-request results", body = serde_json::Value),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Request could not be sent; carries error and pre_request_results", body = serde_json::Value)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Requests"
)]
pub async fn send_request(
    user: AuthUser,
    ClientIp(client_ip): ClientIp,
    State(state): State<AppState>,
    Json(payload): Json<SendRequestBody>,
) -> Response {
    let request = payload.into_send(user.username, client_ip);

    match state.sender.send(request).await {
        Ok(SendOutcome::Completed(result)) => Json(*result).into_response(),
        Ok(SendOutcome::Streamed(streamed)) => stream_response(streamed),
        Err(failure) => (StatusCode::INTERNAL_SERVER_ERROR, Json(failure)).into_response(),
    }
}

fn stream_response(streamed: StreamedSend) -> Response {
    let mut response = Response::new(Body::from_stream(streamed.body));
    *response.status_mut() =
        StatusCode::from_u16(streamed.status).unwrap_or(StatusCode::BAD_GATEWAY);

    let headers = response.headers_mut();
    for (name, value) in &streamed.headers {
        if !is_hop_by_hop(name) {
            headers.append(name.clone(), value.clone());
        }
    }

    response
}
