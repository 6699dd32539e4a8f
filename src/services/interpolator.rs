//! `$xapi` placeholder detection and substitution.
//!
//! A placeholder names a value captured from a pre-request:
//! `$xapi.<global|custom>.<config id>.<body|header>.<dotted.path>`.
//! Substitution is best-effort: anything that cannot be resolved is left as written.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

use crate::models::{PreRequestResults, PreRequestScope, StringMap};

static PLACEHOLDER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$xapi\.(custom|global)\.(\d+)\.(body|header)\.([\w.]+)")
        .expect("Failed to compile placeholder regex")
});

/// Part of a pre-request outcome a placeholder reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Body,
    Header,
}

#[derive(Debug)]
struct Placeholder<'t> {
    scope: PreRequestScope,
    id: i64,
    source: Source,
    path: &'t str,
}

impl<'t> Placeholder<'t> {
    fn from_captures(caps: &Captures<'t>) -> Option<Self> {
        let scope = match caps.get(1)?.as_str() {
            "global" => PreRequestScope::Global,
            _ => PreRequestScope::Custom,
        };
        let source = match caps.get(3)?.as_str() {
            "header" => Source::Header,
            _ => Source::Body,
        };

        // Results are keyed by the canonical id, so `03` never matches config 3
        let raw_id = caps.get(2)?.as_str();
        let id: i64 = raw_id.parse().ok()?;
        if id.to_string() != raw_id {
            tracing::warn!(
                id = raw_id,
                "Non-canonical pre-request id, keeping placeholder as written"
            );
            return None;
        }

        Some(Self {
            scope,
            id,
            source,
            path: caps.get(4)?.as_str(),
        })
    }

    fn resolve(&self, results: &PreRequestResults) -> Option<String> {
        let Some(outcome) = results.get(self.scope, self.id) else {
            tracing::warn!(
                scope = %self.scope,
                id = self.id,
                "No pre-request result for placeholder, keeping it as written"
            );
            return None;
        };

        let resolved = match self.source {
            Source::Body => walk(&outcome.body, self.path).map(render),
            Source::Header => header_value(&outcome.header, self.path),
        };

        if resolved.is_none() {
            tracing::warn!(
                scope = %self.scope,
                id = self.id,
                path = self.path,
                "Placeholder path not found, keeping it as written"
            );
        }

        resolved
    }
}

/// Follow a dotted path through nested objects
fn walk<'v>(root: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.')
        .try_fold(root, |current, key| current.as_object()?.get(key))
}

/// Headers are flat, so the path must be a single header name
fn header_value(headers: &StringMap, path: &str) -> Option<String> {
    if path.contains('.') {
        return None;
    }

    headers
        .get(path)
        .or_else(|| {
            headers
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(path))
                .map(|(_, value)| value)
        })
        .cloned()
}

/// Strings splice in raw; everything else as JSON text
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Whether a string holds at least one placeholder
pub fn contains_placeholder_str(text: &str) -> bool {
    PLACEHOLDER_REGEX.is_match(text)
}

/// Whether any string leaf of a JSON value holds a placeholder
pub fn contains_placeholder(value: &Value) -> bool {
    match value {
        Value::String(s) => contains_placeholder_str(s),
        Value::Array(items) => items.iter().any(contains_placeholder),
        Value::Object(map) => map.values().any(contains_placeholder),
        Value::Null | Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Whether any value of a string map holds a placeholder
pub fn map_contains_placeholder(map: &StringMap) -> bool {
    map.values().any(|value| contains_placeholder_str(value))
}

/// Replace every placeholder in `text` that resolves against `results`
pub fn interpolate_str(text: &str, results: &PreRequestResults) -> String {
    PLACEHOLDER_REGEX
        .replace_all(text, |caps: &Captures| {
            tracing::debug!(placeholder = &caps[0], "Resolving placeholder");
            Placeholder::from_captures(caps)
                .and_then(|placeholder| placeholder.resolve(results))
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Interpolate every string leaf of a JSON value; keys and non-string leaves are untouched
pub fn interpolate(value: &Value, results: &PreRequestResults) -> Value {
    match value {
        Value::String(s) => Value::String(interpolate_str(s, results)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| interpolate(item, results))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| (key.clone(), interpolate(item, results)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Interpolate the values of a string map, keeping keys and order
pub fn interpolate_map(map: &StringMap, results: &PreRequestResults) -> StringMap {
    map.iter()
        .map(|(key, value)| (key.clone(), interpolate_str(value, results)))
        .collect()
}
