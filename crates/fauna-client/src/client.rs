//! Query client: expression in, value out.
//!
//! The client treats query expressions as opaque JSON trees authored by the
//! expression DSL. It serializes the tree, posts it, decodes the
//! `{"resource": ...}` envelope, and taxonomizes every failure.

use crate::connection::{Connection, ConnectionConfig, HttpResponse};
use crate::stream::EventSource;
use fauna_types::{FaunaError, FaunaResult, RequestParameters, Secret};
use http::Method;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Path the streaming endpoint lives under.
const STREAM_PATH: &str = "stream";

/// Async query client over one [`Connection`].
pub struct Client {
    connection: Connection,
}

impl Client {
    /// Build a client from connection options.
    pub fn connect(config: ConnectionConfig) -> FaunaResult<Self> {
        Ok(Self {
            connection: Connection::connect(config)?,
        })
    }

    /// Wrap an existing connection.
    pub fn from_connection(connection: Connection) -> Self {
        Self { connection }
    }

    /// Evaluate one query expression.
    pub async fn query(&self, expression: impl Serialize) -> FaunaResult<Value> {
        self.query_with_params(expression, &RequestParameters::default())
            .await
    }

    /// Evaluate one query expression with a per-request timeout.
    pub async fn query_with_timeout(
        &self,
        expression: impl Serialize,
        timeout: Duration,
    ) -> FaunaResult<Value> {
        self.query_with_params(expression, &RequestParameters::from_timeout(Some(timeout)))
            .await
    }

    /// Evaluate one query expression with full request parameters.
    pub async fn query_with_params(
        &self,
        expression: impl Serialize,
        params: &RequestParameters,
    ) -> FaunaResult<Value> {
        let body = serialize_expression(expression)?;
        debug!(body = %body, "sending query");

        let response = self.connection.post("", &[], &body, params).await?;
        decode_resource(response)
    }

    /// Evaluate several expressions in one request.
    ///
    /// The wire form is a single JSON array; the result is an equal-length
    /// sequence of values in the same order.
    pub async fn query_batch(&self, expressions: &[Value]) -> FaunaResult<Vec<Value>> {
        self.query_batch_with_params(expressions, &RequestParameters::default())
            .await
    }

    pub async fn query_batch_with_params(
        &self,
        expressions: &[Value],
        params: &RequestParameters,
    ) -> FaunaResult<Vec<Value>> {
        let body = Value::Array(expressions.to_vec());
        debug!(count = expressions.len(), "sending batched query");

        let response = self.connection.post("", &[], &body, params).await?;
        match decode_resource(response)? {
            Value::Array(values) => Ok(values),
            _ => Err(FaunaError::unknown("invalid JSON")),
        }
    }

    /// Open a stream of events for the document the expression points at.
    pub async fn stream(&self, expression: impl Serialize) -> FaunaResult<EventSource> {
        let body = serialize_expression(expression)?;
        self.connection
            .stream_request(Method::POST, STREAM_PATH, &body, &[])
            .await
    }

    /// Derive a session client with its own secret over the shared transport.
    pub fn session(&self, secret: impl Into<Secret>) -> FaunaResult<Client> {
        Ok(Client {
            connection: self.connection.new_session(secret)?,
        })
    }

    pub fn last_txn_time(&self) -> u64 {
        self.connection.last_txn_time()
    }

    pub fn sync_last_txn_time(&self, candidate: u64) {
        self.connection.sync_last_txn_time(candidate)
    }

    pub fn close(&self) {
        self.connection.close()
    }

    pub fn is_closed(&self) -> bool {
        self.connection.is_closed()
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }
}

fn serialize_expression(expression: impl Serialize) -> FaunaResult<Value> {
    serde_json::to_value(expression)
        .map_err(|e| FaunaError::invalid_argument(format!("failed to serialize query: {}", e)))
}

fn decode_resource(response: HttpResponse) -> FaunaResult<Value> {
    if response.status >= 300 {
        return Err(FaunaError::from_response(response.status, &response.body));
    }

    let mut envelope: Value =
        serde_json::from_slice(&response.body).map_err(|_| FaunaError::unknown("invalid JSON"))?;

    match envelope.get_mut("resource") {
        Some(resource) => Ok(resource.take()),
        None => Err(FaunaError::unknown("invalid JSON")),
    }
}
