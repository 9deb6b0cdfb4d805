//! Middleware layer.
//!
//! Middleware wraps every request in registration order. Each stage receives
//! the [`Request`] and a [`Next`] continuation and returns the response future.
//! `Next::run` consumes the continuation, so a stage hands the request on at
//! most once; a stage that never calls it answers on its own.
//!
//! Built-in stages, in the order they are usually layered:
//!
//! 1. [`request_id`] — resolves the correlation, trace and span identifiers.
//! 2. [`HttpLog::incoming`] — access record as soon as the request arrives.
//! 3. [`request_logger`] — attaches a [`RequestLogger`] to the request.
//! 4. [`HttpLog::outgoing`] — access record once the response exists.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use logsmith::middleware::{HttpLog, request_id, request_logger};
//! use logsmith::{Logger, Request, Response, Router, TracingLogger};
//!
//! let logger: Arc<dyn Logger> = Arc::new(TracingLogger);
//! let http = HttpLog::new(Arc::clone(&logger));
//!
//! let app = Router::new()
//!     .get("/", hello)
//!     .layer(request_id())
//!     .layer(http.incoming)
//!     .layer(request_logger(logger))
//!     .layer(http.outgoing);
//!
//! async fn hello(req: Request) -> Response {
//!     if let Some(log) = req.logger() {
//!         log.info("saying hello", Default::default());
//!     }
//!     Response::text("hello")
//! }
//! ```

mod http_log;
mod request_id;
mod request_logger;

use std::future::Future;
use std::sync::Arc;

use crate::handler::{BoxFuture, BoxedHandler};
use crate::request::Request;
use crate::response::Response;

pub use http_log::{HttpLog, HttpLogBuilder, INCOMING_LABEL, OUTGOING_LABEL, default_skip};
pub use request_id::{
    CORRELATION_HEADER, Generator, IdSlot, RequestId, RequestIdConfig, SPAN_HEADER, SlotConfig,
    SpanConfig, TRACE_HEADER, generate_hash, generate_uuid, request_id,
};
pub use request_logger::{
    RequestLogger, RequestLoggerLayer, UNKNOWN_CORRELATION_ID, UNKNOWN_SPAN_ID, UNKNOWN_TRACE_ID,
    request_logger,
};

/// One stage of the request pipeline.
pub trait Middleware: Send + Sync + 'static {
    fn handle(&self, req: Request, next: Next) -> BoxFuture;
}

pub(crate) type BoxedMiddleware = Arc<dyn Middleware>;

/// The rest of the pipeline after the current stage.
pub struct Next {
    stack: Arc<Vec<BoxedMiddleware>>,
    position: usize,
    endpoint: BoxedHandler,
}

impl Next {
    pub(crate) fn new(stack: Arc<Vec<BoxedMiddleware>>, endpoint: BoxedHandler) -> Self {
        Self { stack, position: 0, endpoint }
    }

    /// Passes `req` to the next stage, or to the route handler once the stack
    /// is exhausted.
    pub fn run(mut self, req: Request) -> BoxFuture {
        match self.stack.get(self.position).cloned() {
            Some(stage) => {
                self.position += 1;
                stage.handle(req, self)
            }
            None => self.endpoint.call(req),
        }
    }
}

/// Turns an async function into a [`Middleware`].
///
/// ```rust
/// use logsmith::middleware::{Next, from_fn};
/// use logsmith::{Request, Response};
///
/// let stage = from_fn(|req: Request, next: Next| async move {
///     let mut res: Response = next.run(req).await;
///     res.set_header("x-powered-by", "logsmith");
///     res
/// });
/// ```
pub fn from_fn<F, Fut>(f: F) -> FromFn<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    FromFn(f)
}

/// Middleware built by [`from_fn`].
pub struct FromFn<F>(F);

impl<F, Fut> Middleware for FromFn<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn handle(&self, req: Request, next: Next) -> BoxFuture {
        Box::pin((self.0)(req, next))
    }
}
