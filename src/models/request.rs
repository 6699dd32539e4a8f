use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;

/// Ordered string map used for headers and query parameters
pub type StringMap = IndexMap<String, String>;

/// HTTP methods a request definition may use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
        }
    }

    /// Whether the request body is sent for this method
    pub fn carries_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            "PATCH" => Ok(HttpMethod::Patch),
            _ => Err(format!("Unsupported HTTP method: {}", s)),
        }
    }
}

impl TryFrom<String> for HttpMethod {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HttpMethod> for String {
    fn from(method: HttpMethod) -> Self {
        method.as_str().to_string()
    }
}

/// An HTTP request as users define it: what to call and with what
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestDefinition {
    pub url: String,
    pub method: HttpMethod,
    #[serde(default, deserialize_with = "deserialize_string_map")]
    pub headers: StringMap,
    /// JSON document, or a raw string sent verbatim
    #[serde(default = "empty_body")]
    pub body: serde_json::Value,
    #[serde(default, deserialize_with = "deserialize_string_map")]
    pub query: StringMap,
    #[serde(default)]
    pub auth: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub request_name: Option<String>,
}

impl RequestDefinition {
    pub fn new(url: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            url: url.into(),
            method,
            headers: StringMap::new(),
            body: empty_body(),
            query: StringMap::new(),
            auth: serde_json::Map::new(),
            request_name: None,
        }
    }
}

/// A persisted request definition
#[derive(Debug, Clone, Serialize)]
pub struct RequestInfo {
    pub id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(flatten)]
    pub definition: RequestDefinition,
}

pub fn empty_body() -> serde_json::Value {
    serde_json::Value::String(String::new())
}

/// Accepts a JSON object whose values may be any scalar and turns it into a string map.
/// `null` (for the whole map or a value) becomes empty.
pub fn deserialize_string_map<'de, D>(deserializer: D) -> Result<StringMap, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<IndexMap<String, serde_json::Value>>::deserialize(deserializer)?;
    Ok(raw.map(stringify_values).unwrap_or_default())
}

/// Parse stored JSON text into a string map; empty text yields an empty map
pub fn parse_string_map(raw: Option<&str>) -> Result<StringMap, serde_json::Error> {
    match raw.map(str::trim) {
        None | Some("") => Ok(StringMap::new()),
        Some(text) => {
            let map = serde_json::from_str::<Option<IndexMap<String, serde_json::Value>>>(text)?;
            Ok(map.map(stringify_values).unwrap_or_default())
        }
    }
}

fn stringify_values(map: IndexMap<String, serde_json::Value>) -> StringMap {
    map.into_iter()
        .map(|(key, value)| {
            let value = match value {
                serde_json::Value::Null => String::new(),
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            (key, value)
        })
        .collect()
}
