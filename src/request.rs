//! Incoming HTTP request type and its per-request identity context.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use http::Method;

use crate::middleware::RequestLogger;

/// An incoming HTTP request.
///
/// Cloning is cheap apart from the header list: the body is reference-counted
/// and every clone shares the same [`Context`], so identifiers assigned by a
/// later stage are visible through a clone taken earlier.
#[derive(Clone, Debug)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) url: String,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Bytes,
    pub(crate) params: HashMap<String, String>,
    pub(crate) remote_addr: Option<SocketAddr>,
    pub(crate) context: Arc<Context>,
}

impl Request {
    pub(crate) fn new(
        method: Method,
        url: String,
        headers: Vec<(String, String)>,
        body: Bytes,
        remote_addr: Option<SocketAddr>,
    ) -> Self {
        Self {
            method,
            url,
            headers,
            body,
            params: HashMap::new(),
            remote_addr,
            context: Arc::default(),
        }
    }

    /// Starts building a request by hand. Mostly useful in tests.
    ///
    /// ```rust
    /// use logsmith::{Method, Request};
    ///
    /// let req = Request::builder()
    ///     .method(Method::POST)
    ///     .url("/users?page=2")
    ///     .header("content-type", "application/json")
    ///     .build();
    ///
    /// assert_eq!(req.path(), "/users");
    /// assert_eq!(req.header("Content-Type"), Some("application/json"));
    /// ```
    pub fn builder() -> RequestBuilder {
        RequestBuilder {
            method: Method::GET,
            url: "/".to_owned(),
            headers: Vec::new(),
            body: Bytes::new(),
            remote_addr: None,
        }
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }
    pub fn remote_addr(&self) -> Option<SocketAddr> { self.remote_addr }

    /// Path and query, as received.
    pub fn url(&self) -> &str { &self.url }

    /// Path without the query string.
    pub fn path(&self) -> &str {
        self.url.split_once('?').map_or(self.url.as_str(), |(path, _)| path)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Correlation id assigned by [`request_id`](crate::middleware::request_id).
    pub fn correlation_id(&self) -> Option<&str> {
        self.context.correlation_id.get().map(String::as_str)
    }

    /// Trace id assigned by [`request_id`](crate::middleware::request_id).
    pub fn trace_id(&self) -> Option<&str> {
        self.context.trace_id.get().map(String::as_str)
    }

    /// Span id, present only when the caller sent one.
    pub fn span_id(&self) -> Option<&str> {
        self.context.span_id.get().map(String::as_str)
    }

    /// Request-scoped logger attached by
    /// [`request_logger`](crate::middleware::request_logger).
    pub fn logger(&self) -> Option<&RequestLogger> {
        self.context.logger.get()
    }

    pub(crate) fn context(&self) -> &Context {
        &self.context
    }
}

/// Identity state attached to one request.
///
/// Every field is write-once: the first stage to set a value wins and later
/// writes are ignored.
#[derive(Debug, Default)]
pub(crate) struct Context {
    correlation_id: OnceLock<String>,
    trace_id: OnceLock<String>,
    span_id: OnceLock<String>,
    logger: OnceLock<RequestLogger>,
}

impl Context {
    pub(crate) fn set_correlation_id(&self, id: String) -> bool {
        self.correlation_id.set(id).is_ok()
    }

    pub(crate) fn set_trace_id(&self, id: String) -> bool {
        self.trace_id.set(id).is_ok()
    }

    pub(crate) fn set_span_id(&self, id: String) -> bool {
        self.span_id.set(id).is_ok()
    }

    pub(crate) fn set_logger(&self, logger: RequestLogger) -> bool {
        self.logger.set(logger).is_ok()
    }
}

/// Builder returned by [`Request::builder`].
pub struct RequestBuilder {
    method: Method,
    url: String,
    headers: Vec<(String, String)>,
    body: Bytes,
    remote_addr: Option<SocketAddr>,
}

impl RequestBuilder {
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub fn build(self) -> Request {
        Request::new(self.method, self.url, self.headers, self.body, self.remote_addr)
    }
}
