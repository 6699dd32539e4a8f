use std::time::Duration;

use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::header::{HeaderMap, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, Method, Response};

use crate::models::{HttpMethod, StringMap};

/// Upper bound on bytes inspected while looking for the first line of a stream
const PREVIEW_SCAN_LIMIT: usize = 64 * 1024;

/// Configuration for outbound HTTP calls
#[derive(Debug, Clone, Default)]
pub struct ExecutorConfig {
    /// Whole-call timeout; transport defaults apply when unset
    pub timeout: Option<Duration>,
}

/// An outbound call failed before a usable response was read
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ExecutionError {
    message: String,
}

impl ExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<reqwest::Error> for ExecutionError {
    fn from(err: reqwest::Error) -> Self {
        // reqwest's own message hides the cause (refused, dns, timeout), so keep the chain
        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        Self { message }
    }
}

/// Request body ready for the transport
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundBody {
    /// Raw text, sent as UTF-8 bytes
    Text(String),
    /// Structured document, serialized as JSON by the client
    Json(serde_json::Value),
}

/// Fully buffered response, body parsed as JSON when possible
#[derive(Debug, Clone)]
pub struct BufferedResponse {
    pub status: u16,
    pub headers: StringMap,
    pub body: serde_json::Value,
    pub content_type: Option<String>,
    pub content_length: Option<String>,
}

/// Response whose body is forwarded as it arrives
pub struct StreamedResponse {
    pub status: u16,
    pub headers: HeaderMap,
    /// First line of the body, for history
    pub preview: String,
    pub body: BoxStream<'static, Result<Bytes, reqwest::Error>>,
}

impl StreamedResponse {
    pub fn header_strings(&self) -> StringMap {
        header_strings(&self.headers)
    }

    pub fn content_type(&self) -> Option<String> {
        header_value(&self.headers, CONTENT_TYPE.as_str())
    }

    pub fn content_length(&self) -> Option<String> {
        header_value(&self.headers, CONTENT_LENGTH.as_str())
    }
}

/// A response whose headers have arrived, along with the headers that were sent
pub struct Dispatched {
    pub response: Response,
    pub sent_headers: StringMap,
}

/// Append non-empty query values (percent-encoded) to the URL and encode the body.
///
/// Text bodies go out verbatim; `null`, `""`, `{}` and `[]` mean "no body".
pub fn build_outbound_request(
    url: &str,
    body: &serde_json::Value,
    query: &StringMap,
) -> (String, Option<OutboundBody>) {
    let pairs: Vec<String> = query
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
        .collect();

    let final_url = if pairs.is_empty() {
        url.to_string()
    } else {
        let separator = if url.contains('?') { '&' } else { '?' };
        format!("{}{}{}", url, separator, pairs.join("&"))
    };

    let body = match body {
        serde_json::Value::Null => None,
        serde_json::Value::String(text) if text.is_empty() => None,
        serde_json::Value::Object(map) if map.is_empty() => None,
        serde_json::Value::Array(items) if items.is_empty() => None,
        serde_json::Value::String(text) => Some(OutboundBody::Text(text.clone())),
        other => Some(OutboundBody::Json(other.clone())),
    };

    (final_url, body)
}

/// Headers as they will be sent: body-carrying methods default to JSON when no
/// Content-Type was given.
pub fn prepare_headers(method: HttpMethod, headers: &StringMap, has_body: bool) -> StringMap {
    let mut headers = headers.clone();
    let has_content_type = headers
        .keys()
        .any(|name| name.eq_ignore_ascii_case(CONTENT_TYPE.as_str()));

    if method.carries_body() && has_body && !has_content_type {
        tracing::warn!(
            %method,
            "Content-Type not set, defaulting to application/json (servers may answer 415 otherwise)"
        );
        headers.insert("Content-Type".to_string(), "application/json".to_string());
    }

    headers
}

/// Flatten a header map into name -> value strings; repeated names are joined with ", "
pub fn header_strings(headers: &HeaderMap) -> StringMap {
    let mut map = StringMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        map.entry(name.as_str().to_string())
            .and_modify(|existing: &mut String| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    map
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
}

/// Parse a body as JSON, falling back to text; blank bodies become ""
pub fn parse_body(bytes: &[u8]) -> serde_json::Value {
    let text = String::from_utf8_lossy(bytes);
    if text.trim().is_empty() {
        return serde_json::Value::String(String::new());
    }

    match serde_json::from_slice(bytes) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!("Response body is not JSON, keeping text: {}", e);
            serde_json::Value::String(text.into_owned())
        }
    }
}

/// Executes HTTP calls against arbitrary remote endpoints.
///
/// One attempt per call. Responses are always requested as streams; callers pick
/// [`HttpExecutor::read_buffered`] or [`HttpExecutor::open_stream`].
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    client: Client,
}

impl HttpExecutor {
    pub fn new(config: ExecutorConfig) -> Result<Self, ExecutionError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder.build()?;
        Ok(Self { client })
    }

    /// Send one request and wait for the response headers
    pub async fn dispatch(
        &self,
        method: HttpMethod,
        url: &str,
        headers: &StringMap,
        body: Option<OutboundBody>,
    ) -> Result<Dispatched, ExecutionError> {
        let body = if method.carries_body() { body } else { None };
        let sent_headers = prepare_headers(method, headers, body.is_some());

        let mut request = self.client.request(to_reqwest_method(method), url);
        for (name, value) in &sent_headers {
            request = request.header(name.as_str(), value.as_str());
        }

        request = match body {
            Some(OutboundBody::Text(text)) => request.body(text.into_bytes()),
            Some(OutboundBody::Json(value)) => request.json(&value),
            None => request,
        };

        tracing::debug!(%method, url, "Dispatching request");
        let response = request.send().await?;

        Ok(Dispatched {
            response,
            sent_headers,
        })
    }

    /// Build, dispatch and buffer in one step
    pub async fn execute(
        &self,
        method: HttpMethod,
        url: &str,
        headers: &StringMap,
        body: &serde_json::Value,
        query: &StringMap,
    ) -> Result<BufferedResponse, ExecutionError> {
        let (final_url, outbound_body) = build_outbound_request(url, body, query);
        let dispatched = self
            .dispatch(method, &final_url, headers, outbound_body)
            .await?;
        Self::read_buffered(dispatched.response).await
    }

    /// Read the whole body
    pub async fn read_buffered(response: Response) -> Result<BufferedResponse, ExecutionError> {
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let bytes = response.bytes().await?;

        Ok(BufferedResponse {
            status,
            headers: header_strings(&headers),
            body: parse_body(&bytes),
            content_type: header_value(&headers, CONTENT_TYPE.as_str()),
            content_length: header_value(&headers, CONTENT_LENGTH.as_str()),
        })
    }

    /// Capture the first body line and hand back a stream that still yields every byte
    pub async fn open_stream(response: Response) -> Result<StreamedResponse, ExecutionError> {
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let mut upstream = Box::pin(response.bytes_stream());

        let mut head = Vec::new();
        let mut first_line = Vec::new();
        let mut scanned = 0;
        while scanned < PREVIEW_SCAN_LIMIT {
            let Some(chunk) = upstream.next().await else {
                break;
            };
            let chunk = chunk?;
            scanned += chunk.len();

            let newline = chunk.iter().position(|byte| *byte == b'\n');
            first_line.extend_from_slice(&chunk[..newline.unwrap_or(chunk.len())]);
            head.push(chunk);

            if newline.is_some() {
                break;
            }
        }

        if first_line.last() == Some(&b'\r') {
            first_line.pop();
        }

        let body = stream::iter(head.into_iter().map(Ok))
            .chain(upstream)
            .boxed();

        Ok(StreamedResponse {
            status,
            headers,
            preview: String::from_utf8_lossy(&first_line).into_owned(),
            body,
        })
    }
}

fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
        HttpMethod::Patch => Method::PATCH,
    }
}
