//! Serde types for the service's JSON error envelope.
//!
//! Every non-2xx response body has the shape
//! `{"errors":[{"position":[...],"code":"...","description":"...","failures":[...]}]}`.
//! Position and field paths arrive as mixed string/integer segments; both
//! deserialize to `String` so callers compare against plain path vectors.

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Top-level error envelope of a failed request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub errors: Vec<QueryError>,
}

/// A single error reported by the service.
///
/// `position` identifies the failing node in the submitted query tree and may
/// be empty for request-level failures. `cause` is populated for function
/// call errors, which wrap the errors raised inside the called function.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryError {
    #[serde(default, deserialize_with = "path_segments")]
    pub position: Vec<String>,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<ValidationFailure>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cause: Vec<QueryError>,
}

/// A per-field failure inside a `validation failed` error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationFailure {
    #[serde(default, deserialize_with = "path_segments")]
    pub field: Vec<String>,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub description: String,
}

fn path_segments<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<Value> = Vec::deserialize(deserializer)?;
    raw.into_iter()
        .map(|segment| match segment {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(de::Error::custom(format!(
                "path segment must be a string or number, got {}",
                other
            ))),
        })
        .collect()
}
