//! Connection: shared transport, auth state, and the txn-time watermark.
//!
//! A [`Connection`] owns one reference on a shared [`Transport`] and issues
//! typed HTTP verbs against the service's root URL. Session connections
//! derived with [`new_session`](Connection::new_session) share the transport
//! and metrics sink but carry their own secret-derived auth header, their own
//! closed flag, and an independently evolving watermark seeded from the
//! parent.

use crate::stream::EventSource;
use crate::txn::TxnWatermark;
use crate::version;
use bytes::Bytes;
use fauna_transport::envelope::{
    API_VERSION, API_VERSION_HEADER, DRIVER_HEADER, LAST_SEEN_TXN_HEADER, QUERY_TIMEOUT_HEADER,
    TAGS_HEADER, TRACEPARENT_HEADER, TXN_TIME_HEADER,
};
use fauna_transport::{
    AuthHeader, Dialect, MetricsSink, NoopMetricsSink, RequestEnvelope, Transport,
    TransportConfig, REQUEST_TIMER,
};
use fauna_types::{FaunaError, FaunaResult, RequestParameters, Secret};
use http::header::AUTHORIZATION;
use http::{HeaderMap, Method};
use once_cell::sync::Lazy;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

static DEFAULT_ENDPOINT: Lazy<Url> =
    Lazy::new(|| Url::parse("https://db.fauna.com").expect("default endpoint is well-formed"));

/// Options for building a [`Connection`].
///
/// Unset fields take the documented defaults; the struct is consumed by
/// [`Connection::connect`] and immutable from then on.
pub struct ConnectionConfig {
    /// Base URL for relative request paths. Default `https://db.fauna.com`.
    pub endpoint: Url,
    /// Source secret for the auth header.
    pub secret: Secret,
    /// Value of the `X-Fauna-Driver` header.
    pub dialect: Dialect,
    /// Receives timer and counter updates. Default: no-op.
    pub metrics: Arc<dyn MetricsSink>,
    /// Initial transaction-time watermark in microseconds. Default 0.
    pub last_txn_time: u64,
    /// Default `X-Query-Timeout` applied to every request. Default unset.
    pub query_timeout: Option<Duration>,
    /// Pre-built transport to share; its initial reference transfers to this
    /// connection. Default: a fresh transport with a 10 s connect timeout.
    pub transport: Option<Arc<Transport>>,
    /// Run the once-per-process driver version check on build. Default true.
    pub check_latest_version: bool,
}

impl ConnectionConfig {
    pub fn new(secret: impl Into<Secret>, dialect: Dialect) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.clone(),
            secret: secret.into(),
            dialect,
            metrics: Arc::new(NoopMetricsSink),
            last_txn_time: 0,
            query_timeout: None,
            transport: None,
            check_latest_version: true,
        }
    }
}

/// A fully materialized unary response.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// One logical caller identity against the service.
pub struct Connection {
    root_url: Url,
    auth: AuthHeader,
    dialect: Dialect,
    transport: Arc<Transport>,
    metrics: Arc<dyn MetricsSink>,
    txn_time: TxnWatermark,
    default_timeout: Option<Duration>,
    closed: AtomicBool,
    shutdown: CancellationToken,
}

impl Connection {
    /// Build a connection from its options.
    ///
    /// When no transport is supplied, a fresh one is constructed with the
    /// default connect timeout. A supplied transport's initial reference is
    /// transferred to this connection; callers sharing one transport across
    /// several root connections retain it once per extra connection first.
    pub fn connect(config: ConnectionConfig) -> FaunaResult<Self> {
        let transport = match config.transport {
            Some(transport) => {
                if transport.is_released() {
                    return Err(FaunaError::client_closed());
                }
                transport
            }
            None => Transport::new(TransportConfig::default())?,
        };

        if config.check_latest_version {
            version::check_latest_once();
        }

        Ok(Self {
            root_url: config.endpoint,
            auth: AuthHeader::new(&config.secret),
            dialect: config.dialect,
            transport,
            metrics: config.metrics,
            txn_time: TxnWatermark::new(config.last_txn_time),
            default_timeout: config.query_timeout,
            closed: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        })
    }

    pub async fn get(
        &self,
        path: &str,
        query: &[(String, String)],
        params: &RequestParameters,
    ) -> FaunaResult<HttpResponse> {
        self.perform(Method::GET, path, query, None, params).await
    }

    pub async fn post(
        &self,
        path: &str,
        query: &[(String, String)],
        body: &Value,
        params: &RequestParameters,
    ) -> FaunaResult<HttpResponse> {
        self.perform(Method::POST, path, query, Some(body), params).await
    }

    pub async fn put(
        &self,
        path: &str,
        query: &[(String, String)],
        body: &Value,
        params: &RequestParameters,
    ) -> FaunaResult<HttpResponse> {
        self.perform(Method::PUT, path, query, Some(body), params).await
    }

    pub async fn patch(
        &self,
        path: &str,
        query: &[(String, String)],
        body: &Value,
        params: &RequestParameters,
    ) -> FaunaResult<HttpResponse> {
        self.perform(Method::PATCH, path, query, Some(body), params).await
    }

    /// Issue a streaming request and hand the live response body to an
    /// [`EventSource`].
    ///
    /// A non-2xx status is taxonomized and returned as an error before any
    /// publisher exists. Streams opened here terminate with `ClientClosed`
    /// when this connection closes.
    pub async fn stream_request(
        &self,
        method: Method,
        path: &str,
        body: &Value,
        extra_headers: &[(String, String)],
    ) -> FaunaResult<EventSource> {
        if self.closed.load(Ordering::Acquire) {
            return Err(FaunaError::client_closed());
        }

        let mut envelope = self.envelope(method, path, &[], Some(body), &RequestParameters::default())?;
        for (name, value) in extra_headers {
            envelope.insert_header(name, value)?;
        }

        let response = self.transport.execute(envelope).await?;
        let status = response.status().as_u16();
        self.observe_txn_time(response.headers());

        if status >= 300 {
            let body = response.bytes().await.unwrap_or_default();
            return Err(FaunaError::from_response(status, &body));
        }

        debug!(status, path, "stream opened");
        Ok(EventSource::new(response, self.shutdown.child_token()))
    }

    /// Derive a session connection over the same transport.
    ///
    /// Atomically takes one more transport reference (failing with
    /// `ClientClosed` if the transport is already released) and seeds the
    /// session's watermark with this connection's current value. From then
    /// on the two watermarks evolve independently.
    pub fn new_session(&self, secret: impl Into<Secret>) -> FaunaResult<Connection> {
        self.transport.retain()?;

        Ok(Connection {
            root_url: self.root_url.clone(),
            auth: AuthHeader::new(&secret.into()),
            dialect: self.dialect,
            transport: Arc::clone(&self.transport),
            metrics: Arc::clone(&self.metrics),
            txn_time: TxnWatermark::new(self.txn_time.get()),
            default_timeout: self.default_timeout,
            closed: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        })
    }

    /// Highest transaction time observed by this connection, in microseconds.
    pub fn last_txn_time(&self) -> u64 {
        self.txn_time.get()
    }

    /// Advance the watermark; values at or below the current one are ignored.
    ///
    /// Coordinating watermarks across clients is permitted but risky:
    /// advancing arbitrarily far into the future can stall transactions.
    pub fn sync_last_txn_time(&self, candidate: u64) {
        self.txn_time.advance_to(candidate);
    }

    /// Close this connection, releasing its transport reference.
    ///
    /// Idempotent: only the first call releases. Requests in flight complete
    /// as the transport allows; active streams opened by this connection
    /// terminate with `ClientClosed`; no new requests may start.
    pub fn close(&self) {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.shutdown.cancel();
            self.transport.release();
            debug!("connection closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    async fn perform(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&Value>,
        params: &RequestParameters,
    ) -> FaunaResult<HttpResponse> {
        if self.closed.load(Ordering::Acquire) {
            return Err(FaunaError::client_closed());
        }

        let envelope = self.envelope(method, path, query, body, params)?;
        let started = Instant::now();

        let result = self.execute(envelope).await;
        self.metrics.record_timer(REQUEST_TIMER, started.elapsed());
        result
    }

    async fn execute(&self, envelope: RequestEnvelope) -> FaunaResult<HttpResponse> {
        let response = self.transport.execute(envelope).await?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        self.observe_txn_time(&headers);

        let body = response
            .bytes()
            .await
            .map_err(|e| FaunaError::unavailable(format!("failed to read response body: {}", e)))?;

        debug!(status, body = %String::from_utf8_lossy(&body), "received response");

        Ok(HttpResponse { status, headers, body })
    }

    fn envelope(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&Value>,
        params: &RequestParameters,
    ) -> FaunaResult<RequestEnvelope> {
        let mut envelope = RequestEnvelope::new(method, &self.root_url, path, query)?;

        envelope.insert_header(AUTHORIZATION.as_str(), self.auth.value())?;
        envelope.insert_header(API_VERSION_HEADER, API_VERSION)?;
        envelope.insert_header(DRIVER_HEADER, self.dialect.as_str())?;

        // A per-request timeout replaces the connection default for this
        // request only.
        if let Some(timeout) = params.timeout().or(self.default_timeout) {
            envelope.insert_header(QUERY_TIMEOUT_HEADER, &timeout.as_millis().to_string())?;
        }

        let last_seen = self.txn_time.get();
        if last_seen > 0 {
            envelope.insert_header(LAST_SEEN_TXN_HEADER, &last_seen.to_string())?;
        }

        if let Some(trace_id) = params.trace_id() {
            envelope.insert_header(TRACEPARENT_HEADER, trace_id)?;
        }
        if let Some(tags) = params.tags_header_value() {
            envelope.insert_header(TAGS_HEADER, &tags)?;
        }

        match body {
            Some(value) => envelope.with_json_body(value),
            None => Ok(envelope),
        }
    }

    fn observe_txn_time(&self, headers: &HeaderMap) {
        let reported = headers
            .get(TXN_TIME_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok());

        if let Some(txn_time) = reported {
            self.txn_time.advance_to(txn_time);
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("root_url", &self.root_url.as_str())
            .field("dialect", &self.dialect)
            .field("last_txn_time", &self.txn_time.get())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ConnectionConfig {
        let mut config = ConnectionConfig::new("secret", Dialect::Rust);
        config.check_latest_version = false;
        config
    }

    #[test]
    fn defaults_match_the_documented_table() {
        let config = ConnectionConfig::new("secret", Dialect::Rust);
        assert_eq!(config.endpoint.as_str(), "https://db.fauna.com/");
        assert_eq!(config.last_txn_time, 0);
        assert!(config.query_timeout.is_none());
        assert!(config.transport.is_none());
        assert!(config.check_latest_version);
    }

    #[test]
    fn close_is_idempotent() {
        let connection = Connection::connect(config()).unwrap();
        assert!(!connection.is_closed());

        connection.close();
        assert!(connection.is_closed());
        let after_first = connection.transport.is_released();

        connection.close();
        assert!(connection.is_closed());
        assert_eq!(connection.transport.is_released(), after_first);
    }

    #[tokio::test]
    async fn closed_connection_fails_requests_without_panicking() {
        let connection = Connection::connect(config()).unwrap();
        connection.close();

        let err = connection
            .post("", &[], &serde_json::json!({}), &RequestParameters::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), fauna_types::ErrorKind::ClientClosed);
    }

    #[test]
    fn session_inherits_watermark_snapshot() {
        let connection = Connection::connect(config()).unwrap();
        connection.sync_last_txn_time(42_000);

        let session = connection.new_session("other-secret").unwrap();
        assert_eq!(session.last_txn_time(), 42_000);

        // Watermarks evolve independently after derivation.
        connection.sync_last_txn_time(99_000);
        assert_eq!(session.last_txn_time(), 42_000);
        session.sync_last_txn_time(50_000);
        assert_eq!(connection.last_txn_time(), 99_000);
    }

    #[test]
    fn session_survives_parent_close() {
        let connection = Connection::connect(config()).unwrap();
        let session = connection.new_session("other-secret").unwrap();

        connection.close();
        assert!(!session.is_closed());
        assert!(!session.transport.is_released());

        session.close();
        assert!(session.transport.is_released());
    }

    #[test]
    fn session_from_closed_transport_fails() {
        let connection = Connection::connect(config()).unwrap();
        connection.close();

        let err = connection.new_session("other").unwrap_err();
        assert_eq!(err.kind(), fauna_types::ErrorKind::ClientClosed);
    }

    #[test]
    fn sync_is_advance_only() {
        let connection = Connection::connect(config()).unwrap();
        connection.sync_last_txn_time(10);
        connection.sync_last_txn_time(5);
        assert_eq!(connection.last_txn_time(), 10);
    }
}
