//! Parsed streaming events.
//!
//! A streaming response body is a sequence of newline-delimited JSON
//! objects, each carrying a `type` discriminant and an opaque `event`
//! payload whose shape is defined by the service.

use crate::error::{FaunaError, FaunaResult};
use crate::wire::QueryError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The fixed set of event discriminants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamEventType {
    Start,
    Version,
    HistoryRewrite,
    Error,
}

/// One event received on a stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamEvent {
    #[serde(rename = "type")]
    pub event_type: StreamEventType,
    /// Transaction time of the event, when the service reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub txn: Option<u64>,
    /// Service-defined payload; the core does not interpret it.
    #[serde(default)]
    pub event: Value,
}

impl StreamEvent {
    /// Parse one non-empty line of a streaming body.
    ///
    /// An unknown `type` is a parse failure and terminates the stream.
    pub fn parse(line: &str) -> FaunaResult<Self> {
        serde_json::from_str(line)
            .map_err(|e| FaunaError::unknown(format!("invalid stream event: {}", e)))
    }

    /// The query error carried by an `error` event, if this is one.
    pub fn error_payload(&self) -> Option<QueryError> {
        if self.event_type != StreamEventType::Error {
            return None;
        }
        serde_json::from_value(self.event.clone()).ok()
    }
}
