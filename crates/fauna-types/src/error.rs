//! Driver error taxonomy and the HTTP/service-code mapping onto it.
//!
//! All failures surface as a single [`FaunaError`] value tagged with an
//! [`ErrorKind`] from a closed set. The shared payload (HTTP status and the
//! service's error list) is carried on every error; kind-specific detail such
//! as validation failures or nested call errors rides inside the
//! [`QueryError`] entries themselves.

use crate::wire::{ErrorResponse, QueryError, ValidationFailure};
use thiserror::Error;

/// Convenience alias used across the driver crates.
pub type FaunaResult<T> = Result<T, FaunaError>;

/// The closed set of error kinds a driver operation can fail with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // Transport class
    /// Connect failure, read timeout, 503, or an unparseable 5xx.
    Unavailable,
    /// HTTP 502.
    BadGateway,
    /// HTTP 504.
    ProcessingTimeLimitExceeded,
    /// The owning connection (or its shared transport) was closed.
    ClientClosed,

    // Authorization class
    /// HTTP 401.
    Unauthorized,
    /// HTTP 403 or the `permission denied` code.
    PermissionDenied,
    /// The `authentication failed` code.
    AuthenticationFailed,

    // Request-shape class
    /// HTTP 400 with no recognized service code.
    BadRequest,
    InvalidArgument,
    InvalidExpression,
    InvalidUrlParameter,
    InvalidReference,
    InvalidToken,
    InvalidWriteTime,
    MissingIdentity,
    StackOverflow,

    // Domain class
    /// HTTP 404 with no recognized service code.
    NotFound,
    InstanceNotFound,
    InstanceAlreadyExists,
    InstanceNotUnique,
    ValueNotFound,
    /// Carries the per-field failure list.
    ValidationFailed,
    TransactionAborted,
    /// HTTP 409.
    TransactionContention,
    /// HTTP 429.
    TooManyRequests,
    FeatureNotAvailable,
    /// Carries the nested errors raised inside the called function.
    FunctionCall,

    // Catch-all
    /// HTTP 500.
    Internal,
    Unknown,
    /// A terminal error event delivered on a stream.
    Streaming,
}

/// An error raised by the driver core.
///
/// The `Display` form concatenates the service's `code: description` entries
/// joined by commas; the structured error list and the HTTP status remain
/// accessible through [`errors`](FaunaError::errors) and
/// [`status`](FaunaError::status).
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct FaunaError {
    kind: ErrorKind,
    http_status: Option<u16>,
    errors: Vec<QueryError>,
    message: String,
}

impl FaunaError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            http_status: None,
            errors: Vec::new(),
            message: message.into(),
        }
    }

    /// The request was issued against a closed connection or transport.
    pub fn client_closed() -> Self {
        Self::new(ErrorKind::ClientClosed, "client is closed")
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unavailable, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }

    /// A terminal error event received on a stream.
    pub fn streaming(error: QueryError) -> Self {
        let message = render_errors(std::slice::from_ref(&error));
        Self {
            kind: ErrorKind::Streaming,
            http_status: None,
            errors: vec![error],
            message,
        }
    }

    /// Map a non-2xx response onto the taxonomy.
    ///
    /// When the body parses as an [`ErrorResponse`] with at least one entry,
    /// the first entry's code refines the kind; a code outside the
    /// refinement table leaves the HTTP-status mapping in charge. Without a
    /// parseable body the HTTP status governs alone, and a 503 in that state
    /// reports the body as unparseable.
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        match serde_json::from_slice::<ErrorResponse>(body) {
            Ok(parsed) if !parsed.errors.is_empty() => {
                let kind = match kind_for_code(&parsed.errors[0].code) {
                    ErrorKind::Unknown => kind_for_status(status),
                    refined => refined,
                };
                let message = render_errors(&parsed.errors);
                Self {
                    kind,
                    http_status: Some(status),
                    errors: parsed.errors,
                    message,
                }
            }
            _ => {
                let (kind, message) = match kind_for_status(status) {
                    ErrorKind::Unavailable => (ErrorKind::Unavailable, "unparseable response".to_string()),
                    kind => (kind, format!("HTTP error {}", status)),
                };
                Self {
                    kind,
                    http_status: Some(status),
                    errors: Vec::new(),
                    message,
                }
            }
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn status(&self) -> Option<u16> {
        self.http_status
    }

    /// The service's structured error list; empty for local failures.
    pub fn errors(&self) -> &[QueryError] {
        &self.errors
    }

    /// Path to the failing node of the first reported error.
    pub fn position(&self) -> &[String] {
        self.errors.first().map(|e| e.position.as_slice()).unwrap_or(&[])
    }

    /// Per-field failures of the first reported error (`ValidationFailed`).
    pub fn failures(&self) -> &[ValidationFailure] {
        self.errors.first().map(|e| e.failures.as_slice()).unwrap_or(&[])
    }

    /// Whether the failure happened before the service evaluated anything.
    pub fn is_transport(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Unavailable
                | ErrorKind::BadGateway
                | ErrorKind::ProcessingTimeLimitExceeded
                | ErrorKind::ClientClosed
        )
    }

    /// Whether retrying the same request can reasonably succeed. The core
    /// never retries; this classification is for callers.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Unavailable
                | ErrorKind::BadGateway
                | ErrorKind::TooManyRequests
                | ErrorKind::TransactionContention
        )
    }
}

fn render_errors(errors: &[QueryError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.code, e.description))
        .collect::<Vec<_>>()
        .join(", ")
}

fn kind_for_status(status: u16) -> ErrorKind {
    match status {
        400 => ErrorKind::BadRequest,
        401 => ErrorKind::Unauthorized,
        403 => ErrorKind::PermissionDenied,
        404 => ErrorKind::NotFound,
        409 => ErrorKind::TransactionContention,
        429 => ErrorKind::TooManyRequests,
        500 => ErrorKind::Internal,
        502 => ErrorKind::BadGateway,
        503 => ErrorKind::Unavailable,
        504 => ErrorKind::ProcessingTimeLimitExceeded,
        _ => ErrorKind::Unknown,
    }
}

fn kind_for_code(code: &str) -> ErrorKind {
    match code {
        "invalid argument" => ErrorKind::InvalidArgument,
        "call error" => ErrorKind::FunctionCall,
        "permission denied" => ErrorKind::PermissionDenied,
        "invalid expression" => ErrorKind::InvalidExpression,
        "invalid url parameter" => ErrorKind::InvalidUrlParameter,
        "transaction aborted" => ErrorKind::TransactionAborted,
        "invalid write time" => ErrorKind::InvalidWriteTime,
        "invalid ref" => ErrorKind::InvalidReference,
        "missing identity" => ErrorKind::MissingIdentity,
        "invalid token" => ErrorKind::InvalidToken,
        "stack overflow" => ErrorKind::StackOverflow,
        "authentication failed" => ErrorKind::AuthenticationFailed,
        "value not found" => ErrorKind::ValueNotFound,
        "instance not found" => ErrorKind::InstanceNotFound,
        "instance already exists" => ErrorKind::InstanceAlreadyExists,
        "validation failed" => ErrorKind::ValidationFailed,
        "instance not unique" => ErrorKind::InstanceNotUnique,
        "feature not available" => ErrorKind::FeatureNotAvailable,
        _ => ErrorKind::Unknown,
    }
}
