//! Request envelope assembly.
//!
//! An envelope is the fully resolved form of one request: absolute URL,
//! method, headers, and serialized JSON body. The connection fills it in and
//! the transport executes it; nothing here touches the network.

use bytes::Bytes;
use fauna_types::{FaunaError, FaunaResult};
use http::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use http::Method;
use serde_json::Value;
use url::Url;

/// Protocol version sent on every request.
pub const API_VERSION: &str = "4";

pub const API_VERSION_HEADER: &str = "x-faunadb-api-version";
pub const DRIVER_HEADER: &str = "x-fauna-driver";
pub const QUERY_TIMEOUT_HEADER: &str = "x-query-timeout";
pub const LAST_SEEN_TXN_HEADER: &str = "x-last-seen-txn";
pub const TAGS_HEADER: &str = "x-fauna-tags";
pub const TRACEPARENT_HEADER: &str = "traceparent";

/// Response header carrying the transaction time of the request.
pub const TXN_TIME_HEADER: &str = "x-txn-time";

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Caller dialect reported in the `X-Fauna-Driver` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// The async driver surface.
    Rust,
    /// A synchronous wrapper embedding the async core.
    RustSync,
}

impl Dialect {
    pub fn as_str(self) -> &'static str {
        match self {
            Dialect::Rust => "rust",
            Dialect::RustSync => "rust-sync",
        }
    }
}

/// One fully assembled request, ready for the transport.
#[derive(Debug)]
pub struct RequestEnvelope {
    pub(crate) method: Method,
    pub(crate) url: Url,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Option<Bytes>,
}

impl RequestEnvelope {
    /// Resolve `path` against the root URL and attach query parameters.
    ///
    /// Query pairs keep their insertion order, including repeated keys. A
    /// path that does not join into a valid URL fails with
    /// `InvalidArgument`.
    pub fn new(
        method: Method,
        root: &Url,
        path: &str,
        query: &[(String, String)],
    ) -> FaunaResult<Self> {
        let mut url = root
            .join(path)
            .map_err(|e| FaunaError::invalid_argument(format!("invalid request path '{}': {}", path, e)))?;

        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query.iter().map(|(k, v)| (k, v)));
        }

        Ok(Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        })
    }

    /// Set a header, replacing any previous value under the same name.
    pub fn insert_header(&mut self, name: &str, value: &str) -> FaunaResult<()> {
        let name = HeaderName::try_from(name)
            .map_err(|e| FaunaError::invalid_argument(format!("invalid header name '{}': {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| FaunaError::invalid_argument(format!("invalid header value: {}", e)))?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Serialize `value` as the JSON request body.
    pub fn with_json_body(mut self, value: &Value) -> FaunaResult<Self> {
        let serialized = serde_json::to_vec(value)
            .map_err(|e| FaunaError::invalid_argument(format!("failed to serialize request body: {}", e)))?;
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        self.body = Some(Bytes::from(serialized));
        Ok(self)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }
}
