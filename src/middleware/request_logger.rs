//! Request-scoped logger.
//!
//! [`request_logger`] captures the identifier triple when the stage runs and
//! attaches a [`RequestLogger`] to the request. Every call through it carries
//! `correlation_id`, `trace_id` and `span_id` in its metadata.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::handler::BoxFuture;
use crate::logger::{Level, Logger, Metadata};
use crate::request::Request;

use super::{Middleware, Next};

pub const UNKNOWN_CORRELATION_ID: &str = "unknown-correlation-id";
pub const UNKNOWN_TRACE_ID: &str = "unknown-trace-id";
pub const UNKNOWN_SPAN_ID: &str = "unknown-span-id";

#[derive(Debug)]
struct Triple {
    correlation_id: String,
    trace_id: String,
    span_id: String,
}

impl Triple {
    fn capture(req: &Request) -> Self {
        Self {
            correlation_id: req.correlation_id().unwrap_or(UNKNOWN_CORRELATION_ID).to_owned(),
            trace_id: req.trace_id().unwrap_or(UNKNOWN_TRACE_ID).to_owned(),
            span_id: req.span_id().unwrap_or(UNKNOWN_SPAN_ID).to_owned(),
        }
    }

    /// Identifier keys overwrite caller keys of the same name.
    fn stamp(&self, mut metadata: Metadata) -> Metadata {
        metadata.insert("correlation_id".into(), Value::String(self.correlation_id.clone()));
        metadata.insert("trace_id".into(), Value::String(self.trace_id.clone()));
        metadata.insert("span_id".into(), Value::String(self.span_id.clone()));
        metadata
    }
}

/// Logging facade bound to one request's identifiers.
#[derive(Clone)]
pub struct RequestLogger {
    base: Arc<dyn Logger>,
    ids: Arc<Triple>,
}

impl RequestLogger {
    pub fn debug(&self, message: &str, metadata: Metadata) {
        self.log(Level::Debug, message, metadata);
    }

    pub fn info(&self, message: &str, metadata: Metadata) {
        self.log(Level::Info, message, metadata);
    }

    pub fn warn(&self, message: &str, metadata: Metadata) {
        self.log(Level::Warn, message, metadata);
    }

    pub fn error(&self, message: &str, metadata: Metadata) {
        self.log(Level::Error, message, metadata);
    }

    pub fn log(&self, level: Level, message: &str, metadata: Metadata) {
        self.base.log(level, message, self.ids.stamp(metadata));
    }

    pub fn correlation_id(&self) -> &str { &self.ids.correlation_id }
    pub fn trace_id(&self) -> &str { &self.ids.trace_id }
    pub fn span_id(&self) -> &str { &self.ids.span_id }
}

impl fmt::Debug for RequestLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestLogger").field("ids", &self.ids).finish_non_exhaustive()
    }
}

/// Middleware that attaches a [`RequestLogger`] to every request.
#[derive(Clone)]
pub struct RequestLoggerLayer {
    base: Arc<dyn Logger>,
}

impl RequestLoggerLayer {
    pub fn new(base: Arc<dyn Logger>) -> Self {
        Self { base }
    }
}

pub fn request_logger(base: Arc<dyn Logger>) -> RequestLoggerLayer {
    RequestLoggerLayer::new(base)
}

impl Middleware for RequestLoggerLayer {
    fn handle(&self, req: Request, next: Next) -> BoxFuture {
        let logger = RequestLogger {
            base: Arc::clone(&self.base),
            ids: Arc::new(Triple::capture(&req)),
        };
        req.context().set_logger(logger);
        next.run(req)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::logger::MemoryLogger;
    use crate::middleware::{from_fn, request_id};
    use crate::{Response, Router};

    fn metadata(value: Value) -> Metadata {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    async fn log_from_handler(req: Request) -> Response {
        if let Some(log) = req.logger() {
            log.info("msg", metadata(json!({ "additional": "x" })));
        }
        Response::text("ok")
    }

    #[tokio::test]
    async fn info_is_enriched_with_the_triple() {
        let base = Arc::new(MemoryLogger::new());
        let seed = from_fn(|req: Request, next: Next| {
            req.context().set_correlation_id("1234".into());
            next.run(req)
        });
        let app = Router::new()
            .get("/", log_from_handler)
            .layer(seed)
            .layer(request_logger(base.clone()));

        app.call(Request::builder().build()).await;

        let entries = base.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, Level::Info);
        assert_eq!(entries[0].message, "msg");
        assert_eq!(
            Value::Object(entries[0].metadata.clone()),
            json!({
                "additional": "x",
                "correlation_id": "1234",
                "trace_id": "unknown-trace-id",
                "span_id": "unknown-span-id",
            })
        );
    }

    #[tokio::test]
    async fn identifier_keys_win_over_caller_keys() {
        let base = Arc::new(MemoryLogger::new());
        let app = Router::new()
            .get("/", |req: Request| async move {
                if let Some(log) = req.logger() {
                    log.error("boom", metadata(json!({ "trace_id": "spoofed", "code": 7 })));
                }
                Response::text("ok")
            })
            .layer(request_id())
            .layer(request_logger(base.clone()));

        let req = Request::builder().header("X-Request-Id", "real").build();
        app.call(req).await;

        let entry = &base.entries_at(Level::Error)[0];
        assert_eq!(entry.metadata["trace_id"], json!("real"));
        assert_eq!(entry.metadata["code"], json!(7));
        assert_eq!(entry.metadata["span_id"], json!(UNKNOWN_SPAN_ID));
    }

    #[tokio::test]
    async fn triple_is_frozen_at_bind_time() {
        let base = Arc::new(MemoryLogger::new());
        let late = from_fn(|req: Request, next: Next| {
            req.context().set_span_id("too-late".into());
            next.run(req)
        });
        let app = Router::new()
            .get("/", log_from_handler)
            .layer(request_logger(base.clone()))
            .layer(late);

        let req = Request::builder().build();
        let seen = req.clone();
        app.call(req).await;

        assert_eq!(seen.span_id(), Some("too-late"));
        assert_eq!(base.entries()[0].metadata["span_id"], json!(UNKNOWN_SPAN_ID));
    }

    #[tokio::test]
    async fn every_level_forwards_to_the_same_level() {
        let base = Arc::new(MemoryLogger::without_http());
        let app = Router::new()
            .get("/", |req: Request| async move {
                if let Some(log) = req.logger() {
                    log.debug("d", Metadata::new());
                    log.info("i", Metadata::new());
                    log.warn("w", Metadata::new());
                    log.error("e", Metadata::new());
                }
                Response::text("ok")
            })
            .layer(request_logger(base.clone()));

        app.call(Request::builder().build()).await;

        let levels: Vec<Level> = base.entries().iter().map(|e| e.level).collect();
        assert_eq!(levels, [Level::Debug, Level::Info, Level::Warn, Level::Error]);
        assert!(base.entries().iter().all(|e| e.metadata.len() == 3));
    }
}
