use serde::{Deserialize, Deserializer, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::{AppError, AppResult};

#[derive(Debug, Deserialize, IntoParams)]
pub struct PaginationParams {
    #[param(default = 1, minimum = 1)]
    pub page: Option<u64>,
    #[param(default = 10, minimum = 1, maximum = 100)]
    pub limit: Option<u64>,
}

impl PaginationParams {
    pub fn page(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> u64 {
        self.limit.unwrap_or(10).clamp(1, 100)
    }

    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(self.limit())
    }

    pub fn offset(&self) -> u64 {
        (self.page() - 1).saturating_mul(self.limit())
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub success: bool,
    pub msg: String,
}

impl MessageResponse {
    pub fn ok(msg: impl Into<String>) -> Self {
        Self {
            success: true,
            msg: msg.into(),
        }
    }
}

/// Required positive id from an optional payload field
pub fn require_id(value: Option<i64>, field: &str) -> AppResult<i64> {
    match value {
        Some(id) if id > 0 => Ok(id),
        Some(_) => Err(AppError::Validation(format!("{} must be a positive integer", field))),
        None => Err(AppError::Validation(format!("{} is required", field))),
    }
}

/// Accepts `true`/`false`, `0`/`1` and their string forms
pub fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(false),
        Some(serde_json::Value::Bool(flag)) => Ok(flag),
        Some(serde_json::Value::Number(n)) => Ok(n.as_f64().is_some_and(|n| n != 0.0)),
        Some(serde_json::Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "" | "0" | "false" => Ok(false),
            "1" | "true" => Ok(true),
            other => Err(D::Error::custom(format!("invalid flag: {}", other))),
        },
        Some(other) => Err(D::Error::custom(format!("invalid flag: {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Flagged {
        #[serde(default, deserialize_with = "deserialize_flag")]
        flag: bool,
    }

    fn flag(json: serde_json::Value) -> bool {
        serde_json::from_value::<Flagged>(json).unwrap().flag
    }

    #[test]
    fn test_flag_forms() {
        assert!(flag(serde_json::json!({"flag": true})));
        assert!(flag(serde_json::json!({"flag": 1})));
        assert!(flag(serde_json::json!({"flag": "true"})));
        assert!(!flag(serde_json::json!({"flag": 0})));
        assert!(!flag(serde_json::json!({"flag": null})));
        assert!(!flag(serde_json::json!({})));
        assert!(serde_json::from_value::<Flagged>(serde_json::json!({"flag": "maybe"})).is_err());
    }

    #[test]
    fn test_pagination() {
        let params = PaginationParams {
            page: Some(2),
            limit: Some(2),
        };
        assert_eq!(params.offset(), 2);
        assert_eq!(params.total_pages(5), 3);

        let defaults = PaginationParams {
            page: Some(0),
            limit: None,
        };
        assert_eq!(defaults.page(), 1);
        assert_eq!(defaults.limit(), 10);
        assert_eq!(defaults.offset(), 0);
        assert_eq!(defaults.total_pages(0), 0);
    }

    #[test]
    fn test_require_id() {
        assert_eq!(require_id(Some(3), "project_id").unwrap(), 3);
        assert!(matches!(require_id(Some(0), "project_id"), Err(AppError::Validation(_))));
        assert!(matches!(require_id(None, "project_id"), Err(AppError::Validation(_))));
    }
}
