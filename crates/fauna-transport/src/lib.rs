//! HTTP transport layer for the Fauna Rust driver.
//!
//! This crate owns everything between the connection and the socket:
//!
//! - **Auth header**: the Basic authorization value, computed once from the
//!   secret at connection construction
//! - **Request envelope**: method, path joined against the root URL, the
//!   fixed and conditional driver headers, and the JSON body
//! - **Transport handle**: a reference-counted wrapper over an async
//!   `reqwest::Client`, shared by a root connection and all of its sessions
//! - **Metrics sink**: a minimal pluggable timer/counter port with a no-op
//!   default

pub mod auth;
pub mod envelope;
pub mod metrics;
pub mod transport;

pub use auth::AuthHeader;
pub use envelope::{Dialect, RequestEnvelope};
pub use metrics::{MetricsSink, NoopMetricsSink, REQUEST_TIMER};
pub use transport::{Transport, TransportConfig};
