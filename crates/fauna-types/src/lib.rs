//! Shared types for the Fauna Rust driver.
//!
//! This crate holds everything the transport and client layers agree on:
//!
//! - **Wire model**: the service's error envelope (`ErrorResponse`,
//!   `QueryError`, `ValidationFailure`) and streaming events (`StreamEvent`)
//! - **Error taxonomy**: the closed set of driver error kinds and the
//!   mapping from HTTP status / service error codes onto it
//! - **Request parameters**: validated per-request timeout, trace id, and
//!   bounded tag map
//! - **Secrets**: a string wrapper that never leaks through `Debug`

pub mod error;
pub mod events;
pub mod params;
pub mod secrets;
pub mod wire;

pub use error::{ErrorKind, FaunaError, FaunaResult};
pub use events::{StreamEvent, StreamEventType};
pub use params::RequestParameters;
pub use secrets::Secret;
pub use wire::{ErrorResponse, QueryError, ValidationFailure};
