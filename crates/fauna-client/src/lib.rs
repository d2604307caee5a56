//! Async client driver core for Fauna.
//!
//! This crate is the transport and query-dispatch layer of the driver:
//!
//! - **Connection**: typed HTTP verbs over a shared, reference-counted
//!   transport, with a monotone transaction-time watermark and session
//!   derivation
//! - **Client**: single and batched query entry points over a connection,
//!   decoding the `{"resource": ...}` envelope and taxonomizing failures
//! - **Streaming**: single-subscriber, credit-driven event streams over a
//!   long-lived JSON-lines response
//!
//! The query expression DSL and the typed value projection layer live
//! outside this crate; expressions arrive here as opaque JSON trees and
//! results leave as parsed JSON.
//!
//! ```no_run
//! use fauna_client::{Client, ConnectionConfig, Dialect};
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), fauna_client::FaunaError> {
//! let client = Client::connect(ConnectionConfig::new("my-secret", Dialect::Rust))?;
//! let value = client.query(json!({"get": {"@ref": "classes/spells/1234"}})).await?;
//! client.close();
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod connection;
pub mod stream;
pub mod txn;

mod version;

pub use client::Client;
pub use connection::{Connection, ConnectionConfig, HttpResponse};
pub use stream::{EventSource, EventStream};
pub use txn::TxnWatermark;

// The shared surface callers need alongside the client.
pub use fauna_transport::{
    AuthHeader, Dialect, MetricsSink, NoopMetricsSink, Transport, TransportConfig, REQUEST_TIMER,
};
pub use fauna_types::{
    ErrorKind, ErrorResponse, FaunaError, FaunaResult, QueryError, RequestParameters, Secret,
    StreamEvent, StreamEventType, ValidationFailure,
};
