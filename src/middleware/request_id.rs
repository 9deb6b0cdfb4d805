//! Correlation, trace and span identifiers.
//!
//! Three slots, resolved once per request:
//!
//! | Slot | Default header | When the header is missing |
//! |---|---|---|
//! | correlation | `X-Correlation-Id` | SHA-256 hex of a fresh v4 UUID |
//! | trace | `X-Request-Id` | fresh v4 UUID |
//! | span | `X-svc2svc-Id` | left unset |
//!
//! Generated correlation ids are 64 lowercase hex characters. Services that
//! expect 40-character SHA-1 ids should plug in their own generator through
//! [`SlotConfig::generator`].
//!
//! Inbound values are trusted verbatim; only an empty header counts as
//! missing. Resolved values are mirrored onto the response unless the slot
//! opts out with `set_header(false)` or the handler already set that header.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::handler::BoxFuture;
use crate::request::Request;

use super::{Middleware, Next};

pub const CORRELATION_HEADER: &str = "X-Correlation-Id";
pub const TRACE_HEADER: &str = "X-Request-Id";
pub const SPAN_HEADER: &str = "X-svc2svc-Id";

/// Produces an identifier when the inbound header is missing.
///
/// Returning `None` leaves the slot unset. Panics are not caught.
pub type Generator = Arc<dyn Fn(&Request) -> Option<String> + Send + Sync>;

/// Default trace generator: a lowercase hyphenated v4 UUID.
pub fn generate_uuid(_req: &Request) -> Option<String> {
    Some(Uuid::new_v4().to_string())
}

/// Default correlation generator: hex SHA-256 of a fresh v4 UUID.
///
/// Always 64 lowercase hex characters.
pub fn generate_hash(req: &Request) -> Option<String> {
    let seed = generate_uuid(req).unwrap_or_default();
    Some(hex::encode(Sha256::digest(seed.as_bytes())))
}

// ── Configuration ─────────────────────────────────────────────────────────────

/// Caller overrides for a correlation or trace slot.
///
/// Unset fields keep the slot's default; see [`IdSlot::merge`].
#[derive(Clone, Default)]
pub struct SlotConfig {
    header_name: Option<String>,
    set_header: Option<bool>,
    generator: Option<Generator>,
}

impl SlotConfig {
    pub fn new() -> Self { Self::default() }

    pub fn header_name(mut self, name: impl Into<String>) -> Self {
        self.header_name = Some(name.into());
        self
    }

    pub fn set_header(mut self, enabled: bool) -> Self {
        self.set_header = Some(enabled);
        self
    }

    pub fn generator<F>(mut self, generator: F) -> Self
    where
        F: Fn(&Request) -> Option<String> + Send + Sync + 'static,
    {
        self.generator = Some(Arc::new(generator));
        self
    }
}

/// A fully resolved correlation or trace slot.
#[derive(Clone)]
pub struct IdSlot {
    pub header_name: String,
    pub set_header: bool,
    pub generator: Generator,
}

impl IdSlot {
    pub fn correlation() -> Self {
        Self {
            header_name: CORRELATION_HEADER.to_owned(),
            set_header: true,
            generator: Arc::new(generate_hash),
        }
    }

    pub fn trace() -> Self {
        Self {
            header_name: TRACE_HEADER.to_owned(),
            set_header: true,
            generator: Arc::new(generate_uuid),
        }
    }

    /// Layers `overrides` on top of `self`, field by field.
    pub fn merge(self, overrides: SlotConfig) -> Self {
        Self {
            header_name: overrides.header_name.unwrap_or(self.header_name),
            set_header: overrides.set_header.unwrap_or(self.set_header),
            generator: overrides.generator.unwrap_or(self.generator),
        }
    }

    /// An empty header name means the slot is generator-only: nothing is read
    /// from the request and nothing is written to the response.
    fn resolve(&self, req: &Request) -> Option<String> {
        inbound(req, &self.header_name).or_else(|| (self.generator)(req))
    }

    fn echoes(&self) -> bool {
        self.set_header && !self.header_name.is_empty()
    }
}

/// Span slot configuration. Spans are pass-through only: there is no generator.
#[derive(Clone, Debug)]
pub struct SpanConfig {
    pub header_name: String,
    pub set_header: bool,
}

impl SpanConfig {
    pub fn header_name(mut self, name: impl Into<String>) -> Self {
        self.header_name = name.into();
        self
    }

    pub fn set_header(mut self, enabled: bool) -> Self {
        self.set_header = enabled;
        self
    }
}

impl Default for SpanConfig {
    fn default() -> Self {
        Self { header_name: SPAN_HEADER.to_owned(), set_header: true }
    }
}

/// Overrides for all three slots.
#[derive(Clone, Default)]
pub struct RequestIdConfig {
    correlation: SlotConfig,
    trace: SlotConfig,
    span: SpanConfig,
}

impl RequestIdConfig {
    pub fn correlation(mut self, overrides: SlotConfig) -> Self {
        self.correlation = overrides;
        self
    }

    pub fn trace(mut self, overrides: SlotConfig) -> Self {
        self.trace = overrides;
        self
    }

    pub fn span(mut self, span: SpanConfig) -> Self {
        self.span = span;
        self
    }
}

// ── Middleware ────────────────────────────────────────────────────────────────

/// Assigns the identifier triple to each request.
#[derive(Clone)]
pub struct RequestId {
    correlation: IdSlot,
    trace: IdSlot,
    span: SpanConfig,
}

/// [`RequestId`] with every default.
pub fn request_id() -> RequestId {
    RequestId::new(RequestIdConfig::default())
}

impl RequestId {
    pub fn new(config: RequestIdConfig) -> Self {
        Self {
            correlation: IdSlot::correlation().merge(config.correlation),
            trace: IdSlot::trace().merge(config.trace),
            span: config.span,
        }
    }

    /// Stores the identifiers on `req` and returns the headers to mirror.
    fn assign(&self, req: &Request) -> Vec<(String, String)> {
        let context = req.context();

        if let Some(id) = self.correlation.resolve(req) {
            context.set_correlation_id(id);
        }
        if let Some(id) = self.trace.resolve(req) {
            context.set_trace_id(id);
        }
        if let Some(id) = inbound(req, &self.span.header_name) {
            context.set_span_id(id);
        }

        let mut echo = Vec::with_capacity(3);
        if self.correlation.echoes() {
            if let Some(id) = req.correlation_id() {
                echo.push((self.correlation.header_name.clone(), id.to_owned()));
            }
        }
        if self.trace.echoes() {
            if let Some(id) = req.trace_id() {
                echo.push((self.trace.header_name.clone(), id.to_owned()));
            }
        }
        if self.span.set_header && !self.span.header_name.is_empty() {
            if let Some(id) = req.span_id() {
                echo.push((self.span.header_name.clone(), id.to_owned()));
            }
        }
        echo
    }
}

impl Middleware for RequestId {
    fn handle(&self, req: Request, next: Next) -> BoxFuture {
        let echo = self.assign(&req);
        Box::pin(async move {
            let mut res = next.run(req).await;
            for (name, id) in echo {
                if res.header(&name).is_none() {
                    res.set_header(&name, &id);
                }
            }
            res
        })
    }
}

fn inbound(req: &Request, header_name: &str) -> Option<String> {
    if header_name.is_empty() {
        return None;
    }
    req.header(header_name).filter(|v| !v.is_empty()).map(str::to_owned)
}
