use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use futures::stream::BoxStream;
use reqwest::header::HeaderMap;
use serde::{Serialize, Serializer};
use tracing::Instrument;
use uuid::Uuid;

use crate::models::{
    ExecutedRequest, ExecutionDetails, ExecutionStatus, NewExecutionRecord, PreRequestResults,
    RecordedResponse, RequestDefinition, StringMap,
};
use crate::services::executor::{build_outbound_request, ExecutionError, HttpExecutor};
use crate::services::history::HistoryRecorder;
use crate::services::interpolator::{
    contains_placeholder, interpolate, interpolate_map, map_contains_placeholder,
};
use crate::services::pre_request::PreRequestResolver;
use crate::storage::Storage;

const LOOPBACK_HOST: &str = "127.0.0.1";

/// One send as received from a caller
#[derive(Debug, Clone)]
pub struct SendRequest {
    pub definition: RequestDefinition,
    pub project_id: Option<i64>,
    /// Saved request being sent; history is only kept when set
    pub request_info_id: Option<i64>,
    pub stream: bool,
    pub username: Option<String>,
    /// Caller address, used to rewrite loopback targets
    pub client_ip: Option<String>,
}

/// Stages a send moves through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendPhase {
    Idle,
    DetectingPlaceholders,
    ResolvingPreRequests,
    Interpolating,
    Dispatching,
    Recording,
    Responded,
}

impl fmt::Display for SendPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SendPhase::Idle => "idle",
            SendPhase::DetectingPlaceholders => "detecting_placeholders",
            SendPhase::ResolvingPreRequests => "resolving_pre_requests",
            SendPhase::Interpolating => "interpolating",
            SendPhase::Dispatching => "dispatching",
            SendPhase::Recording => "recording",
            SendPhase::Responded => "responded",
        };
        f.write_str(name)
    }
}

/// Buffered outcome of a send
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub status: u16,
    pub headers: StringMap,
    /// The request as sent, with the URL as the caller wrote it
    pub request_info: ExecutedRequest,
    pub response_time_ms: i64,
    pub execution_status: ExecutionStatus,
    pub execution_message: String,
    pub execution_details: ExecutionDetails,
    pub body: serde_json::Value,
    pub pre_request_results: PreRequestResults,
}

impl Serialize for ExecutionResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Wire<'a> {
            status: u16,
            headers: &'a StringMap,
            request_info: &'a ExecutedRequest,
            response_time: i64,
            execution_status: ExecutionStatus,
            execution_message: &'a str,
            execution_details: &'a ExecutionDetails,
            body: &'a serde_json::Value,
            #[serde(rename = "responseTime")]
            response_time_camel: i64,
            pre_request_results: &'a PreRequestResults,
        }

        Wire {
            status: self.status,
            headers: &self.headers,
            request_info: &self.request_info,
            response_time: self.response_time_ms,
            execution_status: self.execution_status,
            execution_message: &self.execution_message,
            execution_details: &self.execution_details,
            body: &self.body,
            response_time_camel: self.response_time_ms,
            pre_request_results: &self.pre_request_results,
        }
        .serialize(serializer)
    }
}

/// Upstream response forwarded as it arrives
pub struct StreamedSend {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: BoxStream<'static, Result<Bytes, reqwest::Error>>,
}

pub enum SendOutcome {
    Completed(Box<ExecutionResult>),
    Streamed(StreamedSend),
}

/// A send that produced no response, with whatever pre-request results were gathered
#[derive(Debug, Clone, Serialize)]
pub struct SendFailure {
    pub error: String,
    pub pre_request_results: PreRequestResults,
}

/// Per-send state carried between phases
struct SendContext {
    phase: SendPhase,
    request_info_id: Option<i64>,
    username: Option<String>,
    pre_request_results: PreRequestResults,
}

impl SendContext {
    fn enter(&mut self, next: SendPhase) {
        tracing::debug!(from = %self.phase, to = %next, "Send phase");
        self.phase = next;
    }
}

/// Drives a send end to end: placeholders, pre-requests, dispatch, history
#[derive(Clone)]
pub struct SendService {
    resolver: PreRequestResolver,
    executor: HttpExecutor,
    recorder: HistoryRecorder,
    rewrite_loopback_host: bool,
}

impl SendService {
    pub fn new(
        storage: Arc<dyn Storage>,
        executor: HttpExecutor,
        rewrite_loopback_host: bool,
    ) -> Self {
        Self {
            resolver: PreRequestResolver::new(storage.clone(), executor.clone()),
            executor,
            recorder: HistoryRecorder::new(storage),
            rewrite_loopback_host,
        }
    }

    pub fn recorder(&self) -> &HistoryRecorder {
        &self.recorder
    }

    pub async fn send(&self, request: SendRequest) -> Result<SendOutcome, SendFailure> {
        let span = tracing::info_span!(
            "send",
            send_id = %Uuid::new_v4(),
            method = %request.definition.method,
            project_id = ?request.project_id,
            request_info_id = ?request.request_info_id,
        );
        self.run(request).instrument(span).await
    }

    async fn run(&self, request: SendRequest) -> Result<SendOutcome, SendFailure> {
        let SendRequest {
            definition,
            project_id,
            request_info_id,
            stream,
            username,
            client_ip,
        } = request;
        let RequestDefinition {
            url: original_url,
            method,
            mut headers,
            mut body,
            mut query,
            auth,
            request_name,
        } = definition;

        let mut ctx = SendContext {
            phase: SendPhase::Idle,
            request_info_id,
            username,
            pre_request_results: PreRequestResults::default(),
        };

        let url = match client_ip.as_deref() {
            Some(ip) if self.rewrite_loopback_host => rewrite_loopback(&original_url, ip),
            _ => original_url.clone(),
        };
        if url != original_url {
            tracing::info!(url = %url, "Loopback host replaced with client address");
        }

        ctx.enter(SendPhase::DetectingPlaceholders);
        let has_placeholders = contains_placeholder(&body)
            || map_contains_placeholder(&query)
            || map_contains_placeholder(&headers);

        match project_id {
            Some(project_id) if has_placeholders => {
                ctx.enter(SendPhase::ResolvingPreRequests);
                ctx.pre_request_results = self
                    .resolver
                    .resolve(project_id, request_info_id)
                    .await
                    .map_err(|e| {
                        tracing::error!(error = ?e.error, "Pre-request resolution failed");
                        SendFailure {
                            error: e.error.to_string(),
                            pre_request_results: e.partial,
                        }
                    })?;

                ctx.enter(SendPhase::Interpolating);
                body = interpolate(&body, &ctx.pre_request_results);
                query = interpolate_map(&query, &ctx.pre_request_results);
                headers = interpolate_map(&headers, &ctx.pre_request_results);
            }
            Some(_) => tracing::debug!("No placeholders, skipping pre-requests"),
            None if has_placeholders => {
                tracing::warn!("Placeholders present but no project given, sending as written")
            }
            None => {}
        }

        ctx.enter(SendPhase::Dispatching);
        let wants_stream = stream || accepts_event_stream(&headers);
        let mut executed = ExecutedRequest {
            url,
            method,
            headers,
            body,
            query,
            auth,
            name: request_name,
        };

        let started = Instant::now();
        let (final_url, outbound_body) =
            build_outbound_request(&executed.url, &executed.body, &executed.query);
        let dispatched = self
            .executor
            .dispatch(method, &final_url, &executed.headers, outbound_body)
            .await;
        let response_time_ms = elapsed_ms(started);

        let response = match dispatched {
            Ok(dispatched) => {
                executed.headers = dispatched.sent_headers;
                dispatched.response
            }
            Err(e) => return Err(self.fail(ctx, executed, e, started).await),
        };

        if wants_stream {
            let streamed = match HttpExecutor::open_stream(response).await {
                Ok(streamed) => streamed,
                Err(e) => return Err(self.fail(ctx, executed, e, started).await),
            };

            let status = streamed.status;
            let details = ExecutionDetails::Response {
                content_type: streamed.content_type(),
                content_length: streamed.content_length(),
                status_code: status,
            };
            let recorded = RecordedResponse {
                status,
                headers: streamed.header_strings(),
                body: serde_json::Value::String(streamed.preview.clone()),
            };
            self.complete(&mut ctx, executed, recorded, response_time_ms, details)
                .await;

            return Ok(SendOutcome::Streamed(StreamedSend {
                status,
                headers: streamed.headers,
                body: streamed.body,
            }));
        }

        let buffered = match HttpExecutor::read_buffered(response).await {
            Ok(buffered) => buffered,
            Err(e) => return Err(self.fail(ctx, executed, e, started).await),
        };
        tracing::info!(
            status = buffered.status,
            response_time_ms,
            "Response received"
        );

        let details = ExecutionDetails::Response {
            content_type: buffered.content_type,
            content_length: buffered.content_length,
            status_code: buffered.status,
        };
        let recorded = RecordedResponse {
            status: buffered.status,
            headers: buffered.headers,
            body: buffered.body,
        };

        let mut request_info = executed.clone();
        request_info.url = original_url;
        let (execution_status, execution_message) = self
            .complete(&mut ctx, executed, recorded.clone(), response_time_ms, details.clone())
            .await;

        Ok(SendOutcome::Completed(Box::new(ExecutionResult {
            status: recorded.status,
            headers: recorded.headers,
            request_info,
            response_time_ms,
            execution_status,
            execution_message,
            execution_details: details,
            body: recorded.body,
            pre_request_results: ctx.pre_request_results,
        })))
    }

    /// Label the response and record it when a saved request is bound
    async fn complete(
        &self,
        ctx: &mut SendContext,
        request: ExecutedRequest,
        response: RecordedResponse,
        response_time_ms: i64,
        details: ExecutionDetails,
    ) -> (ExecutionStatus, String) {
        let execution_status = ExecutionStatus::from_status_code(response.status);
        let execution_message = format!("HTTP {} - {}ms", response.status, response_time_ms);

        if let Some(request_info_id) = ctx.request_info_id {
            ctx.enter(SendPhase::Recording);
            self.record(NewExecutionRecord {
                request_info_id,
                request,
                response,
                response_time_ms,
                execution_status,
                execution_message: execution_message.clone(),
                execution_details: details,
                pre_request_results: ctx.pre_request_results.clone(),
                username: ctx.username.clone(),
            })
            .await;
        }

        ctx.enter(SendPhase::Responded);
        (execution_status, execution_message)
    }

    /// Record the failed exchange and build the caller's error payload
    async fn fail(
        &self,
        mut ctx: SendContext,
        request: ExecutedRequest,
        error: ExecutionError,
        started: Instant,
    ) -> SendFailure {
        let message = error.message().to_string();
        tracing::warn!(error = %message, "Request failed");

        if let Some(request_info_id) = ctx.request_info_id {
            ctx.enter(SendPhase::Recording);
            self.record(NewExecutionRecord {
                request_info_id,
                request,
                response: RecordedResponse {
                    status: 500,
                    headers: StringMap::new(),
                    body: serde_json::json!({ "error": message }),
                },
                response_time_ms: elapsed_ms(started),
                execution_status: ExecutionStatus::Exception,
                execution_message: message.clone(),
                execution_details: ExecutionDetails::Exception {
                    exception: message.clone(),
                },
                pre_request_results: ctx.pre_request_results.clone(),
                username: ctx.username.clone(),
            })
            .await;
        }

        ctx.enter(SendPhase::Responded);
        SendFailure {
            error: message,
            pre_request_results: ctx.pre_request_results,
        }
    }

    /// History failures are logged and never change the send outcome
    async fn record(&self, record: NewExecutionRecord) {
        let request_info_id = record.request_info_id;
        if let Err(e) = self.recorder.record(record).await {
            tracing::error!(request_info_id, error = ?e, "Failed to save execution history");
        }
    }
}

/// Replace `127.0.0.1` in a URL with the caller's address
pub fn rewrite_loopback(url: &str, client_ip: &str) -> String {
    let client_ip = client_ip.trim();
    if client_ip.is_empty() || !url.contains(LOOPBACK_HOST) {
        return url.to_string();
    }
    if client_ip.contains(':') && !client_ip.starts_with('[') {
        return url.replace(LOOPBACK_HOST, &format!("[{}]", client_ip));
    }
    url.replace(LOOPBACK_HOST, client_ip)
}

fn accepts_event_stream(headers: &StringMap) -> bool {
    headers
        .iter()
        .any(|(name, value)| name.eq_ignore_ascii_case("accept") && value == "text/event-stream")
}

fn elapsed_ms(started: Instant) -> i64 {
    i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX)
}
