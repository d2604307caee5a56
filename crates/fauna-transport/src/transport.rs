//! Reference-counted HTTP transport handle.
//!
//! One [`Transport`] is shared by a root connection and every session
//! derived from it. The handle carries an atomic reference count with two
//! transitions: `retain` increments only while the count is positive, and
//! `release` decrements, tearing the client down exactly once when the count
//! reaches zero. Any operation that observes a released transport fails with
//! `ClientClosed`.

use crate::envelope::RequestEnvelope;
use fauna_types::{FaunaError, FaunaResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::debug;

/// Construction-time transport settings.
///
/// The connect timeout is fixed for the lifetime of the transport; the
/// per-request `X-Query-Timeout` header governs service-side evaluation
/// separately. A read-idle timeout, when set, surfaces as `Unavailable`.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub connect_timeout: Duration,
    pub read_idle_timeout: Option<Duration>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            read_idle_timeout: None,
        }
    }
}

/// Shared wrapper over an async `reqwest::Client`.
///
/// The reference created by [`Transport::new`] belongs to the first
/// connection built over the handle. Sharing the transport across additional
/// root connections requires an explicit [`retain`](Transport::retain) per
/// extra holder, mirroring session derivation.
pub struct Transport {
    client: RwLock<Option<reqwest::Client>>,
    refs: AtomicUsize,
}

impl Transport {
    pub fn new(config: TransportConfig) -> FaunaResult<Arc<Self>> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("fauna-rust/", env!("CARGO_PKG_VERSION")))
            .gzip(true)
            .brotli(true)
            .connect_timeout(config.connect_timeout);

        if let Some(idle) = config.read_idle_timeout {
            builder = builder.read_timeout(idle);
        }

        let client = builder
            .build()
            .map_err(|e| FaunaError::unavailable(format!("failed to build HTTP client: {}", e)))?;

        Ok(Arc::new(Self {
            client: RwLock::new(Some(client)),
            refs: AtomicUsize::new(1),
        }))
    }

    /// Take an additional reference.
    ///
    /// Fails with `ClientClosed` once the count has reached zero; a released
    /// transport can never be revived.
    pub fn retain(&self) -> FaunaResult<()> {
        let mut current = self.refs.load(Ordering::Acquire);
        loop {
            if current == 0 {
                return Err(FaunaError::client_closed());
            }
            match self.refs.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }

    /// Drop one reference; on the transition to zero, tear down the client.
    ///
    /// Teardown runs at most once. In-flight requests hold their own clone
    /// of the underlying client and complete as the socket allows.
    pub fn release(&self) {
        let previous = self.refs.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        if previous == Ok(1) {
            if let Ok(mut slot) = self.client.write() {
                *slot = None;
            }
            debug!("transport released, connection pool dropped");
        }
    }

    pub fn is_released(&self) -> bool {
        self.refs.load(Ordering::Acquire) == 0
    }

    /// Send one request and resolve with the raw response.
    ///
    /// The response body is untouched: unary callers read it to completion,
    /// streaming callers consume it line by line. Connect failures and
    /// timeouts map to `Unavailable`; no retries happen at this layer.
    pub async fn execute(&self, envelope: RequestEnvelope) -> FaunaResult<reqwest::Response> {
        let client = self.current_client()?;

        debug!(method = %envelope.method, url = %envelope.url, "sending request");

        let mut request = client
            .request(envelope.method, envelope.url.clone())
            .headers(envelope.headers);
        if let Some(body) = envelope.body {
            request = request.body(body);
        }

        request.send().await.map_err(|e| {
            debug!(url = %envelope.url, error = %e, "request failed");
            map_send_error(e)
        })
    }

    fn current_client(&self) -> FaunaResult<reqwest::Client> {
        let slot = self
            .client
            .read()
            .map_err(|_| FaunaError::unavailable("transport lock poisoned"))?;
        slot.clone().ok_or_else(FaunaError::client_closed)
    }
}

fn map_send_error(error: reqwest::Error) -> FaunaError {
    // Connect failures, timeouts, and write errors are all service
    // unavailability from the caller's point of view.
    FaunaError::unavailable(error.to_string())
}
