use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::models::{parse_string_map, StringMap};

/// Which bucket a pre-request belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreRequestScope {
    Global,
    Custom,
}

impl PreRequestScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            PreRequestScope::Global => "global",
            PreRequestScope::Custom => "custom",
        }
    }
}

impl fmt::Display for PreRequestScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a pre-request config applies. A custom config is always tied to the
/// saved request it runs for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "lowercase")]
pub enum ConfigScope {
    Global,
    Custom { private_request_id: i64 },
}

impl ConfigScope {
    /// Build a scope from the stored flag pair, rejecting custom configs without a target
    pub fn from_parts(is_global: bool, private_request_id: Option<i64>) -> Option<Self> {
        match (is_global, private_request_id) {
            (true, _) => Some(ConfigScope::Global),
            (false, Some(private_request_id)) => Some(ConfigScope::Custom { private_request_id }),
            (false, None) => None,
        }
    }

    pub fn kind(&self) -> PreRequestScope {
        match self {
            ConfigScope::Global => PreRequestScope::Global,
            ConfigScope::Custom { .. } => PreRequestScope::Custom,
        }
    }

    pub fn is_global(&self) -> bool {
        matches!(self, ConfigScope::Global)
    }

    pub fn private_request_id(&self) -> Option<i64> {
        match self {
            ConfigScope::Global => None,
            ConfigScope::Custom { private_request_id } => Some(*private_request_id),
        }
    }
}

/// An upstream request configured to run before sends in a project
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreRequestConfig {
    pub id: i64,
    pub project_id: i64,
    /// The saved request to execute
    pub request_info_id: Option<i64>,
    #[serde(flatten)]
    pub scope: ConfigScope,
    /// Raw body text sent as-is
    pub body_info: Option<String>,
    /// JSON text of the query map
    pub query_info: Option<String>,
    /// Base URL prepended to relative request URLs
    pub host: Option<String>,
    pub request_name: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl PreRequestConfig {
    pub fn query_pairs(&self) -> Result<StringMap, serde_json::Error> {
        parse_string_map(self.query_info.as_deref())
    }

    /// Resolve the URL to call, prepending `host` when the stored URL is relative
    pub fn target_url(&self, url: &str) -> String {
        match self.host.as_deref() {
            Some(host) if !host.is_empty() && !url.starts_with("http") => {
                let host = host.strip_suffix('/').unwrap_or(host);
                let path = url.strip_prefix('/').unwrap_or(url);
                format!("{}/{}", host, path)
            }
            _ => url.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreatePreRequestConfig {
    pub project_id: i64,
    pub request_info_id: Option<i64>,
    pub scope: ConfigScope,
    pub body_info: Option<String>,
    pub query_info: Option<String>,
    pub host: Option<String>,
    pub request_name: Option<String>,
}

/// Response captured from one upstream call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreRequestOutcome {
    pub header: StringMap,
    pub body: serde_json::Value,
}

impl PreRequestOutcome {
    pub fn failed(error: impl fmt::Display) -> Self {
        Self {
            header: StringMap::new(),
            body: serde_json::Value::String(format!("请求失败: {}", error)),
        }
    }
}

pub type PreRequestBucket = IndexMap<i64, PreRequestOutcome>;

/// Pre-request results of one send, bucketed by scope then config id.
///
/// A bucket is `None` when that scope was not attempted, so the wire form only carries
/// the scopes that actually ran: `{"global": {"3": {"header": {..}, "body": ..}}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreRequestResults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global: Option<PreRequestBucket>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<PreRequestBucket>,
}

impl PreRequestResults {
    pub fn bucket(&self, scope: PreRequestScope) -> Option<&PreRequestBucket> {
        match scope {
            PreRequestScope::Global => self.global.as_ref(),
            PreRequestScope::Custom => self.custom.as_ref(),
        }
    }

    pub fn get(&self, scope: PreRequestScope, id: i64) -> Option<&PreRequestOutcome> {
        self.bucket(scope).and_then(|bucket| bucket.get(&id))
    }

    pub fn set_bucket(&mut self, scope: PreRequestScope, bucket: PreRequestBucket) {
        match scope {
            PreRequestScope::Global => self.global = Some(bucket),
            PreRequestScope::Custom => self.custom = Some(bucket),
        }
    }

    /// True when no scope was attempted
    pub fn is_empty(&self) -> bool {
        self.global.is_none() && self.custom.is_none()
    }
}
