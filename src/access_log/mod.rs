//! Token-based access-log engine.
//!
//! An [`AccessLog`] is a middleware that renders one line per request through
//! a format function over [`Tokens`] and writes it to a [`Stream`]. It runs in
//! one of two modes:
//!
//! - **immediate** — the line is written as soon as the request reaches the
//!   stage, before any handler runs. Response tokens are empty.
//! - **deferred** (default) — the line is written after the rest of the
//!   pipeline has produced the response.
//!
//! "After the response" means once the handler's future has resolved, not
//! once hyper has flushed the body to the socket. `response-time` therefore
//! covers the pipeline below this stage and excludes the network write.
//!
//! The skip predicate is checked at write time, so a deferred log sees
//! identifiers assigned by stages further down the pipeline.
//!
//! A stream that fails to take a line is reported with `tracing::error!` and
//! the response passes through unchanged: access logging is a side channel
//! and never turns a served request into a failed one.

mod tokens;

use std::sync::Arc;
use std::time::Instant;

use tracing::error;

use crate::error::Error;
use crate::handler::BoxFuture;
use crate::middleware::{Middleware, Next};
use crate::request::Request;
use crate::response::Response;

pub use tokens::{Exchange, TokenFn, Tokens};

/// Renders one log line.
pub type FormatFn = Arc<dyn Fn(&Tokens, &Exchange<'_>) -> String + Send + Sync>;

/// Returns `true` to suppress the line for this request.
pub type SkipFn = Arc<dyn Fn(&Request) -> bool + Send + Sync>;

/// Destination for rendered lines.
pub trait Stream: Send + Sync + 'static {
    fn write(&self, line: &str) -> Result<(), Error>;
}

/// Writes each line to stdout.
#[derive(Clone, Copy, Debug, Default)]
pub struct Stdout;

impl Stream for Stdout {
    fn write(&self, line: &str) -> Result<(), Error> {
        use std::io::Write;
        let mut out = std::io::stdout().lock();
        writeln!(out, "{line}")?;
        Ok(())
    }
}

/// Access-log middleware. Build with [`AccessLog::builder`].
#[derive(Clone)]
pub struct AccessLog {
    tokens: Arc<Tokens>,
    format: FormatFn,
    stream: Arc<dyn Stream>,
    skip: SkipFn,
    immediate: bool,
}

impl AccessLog {
    pub fn builder<F>(format: F) -> AccessLogBuilder
    where
        F: Fn(&Tokens, &Exchange<'_>) -> String + Send + Sync + 'static,
    {
        AccessLogBuilder {
            tokens: Arc::new(Tokens::new()),
            format: Arc::new(format),
            stream: Arc::new(Stdout),
            skip: Arc::new(|_: &Request| false),
            immediate: false,
        }
    }

    fn emit(&self, request: &Request, response: Option<&Response>, started: Instant) {
        if (self.skip)(request) {
            return;
        }
        let exchange = Exchange { request, response, elapsed: started.elapsed() };
        let line = (self.format)(&self.tokens, &exchange);
        if let Err(e) = self.stream.write(&line) {
            error!(error = %e, url = %request.url(), "access log write failed");
        }
    }
}

impl Middleware for AccessLog {
    fn handle(&self, req: Request, next: Next) -> BoxFuture {
        let started = Instant::now();

        if self.immediate {
            self.emit(&req, None, started);
            return next.run(req);
        }

        let log = self.clone();
        Box::pin(async move {
            let snapshot = req.clone();
            let res = next.run(req).await;
            log.emit(&snapshot, Some(&res), started);
            res
        })
    }
}

/// Builder returned by [`AccessLog::builder`].
pub struct AccessLogBuilder {
    tokens: Arc<Tokens>,
    format: FormatFn,
    stream: Arc<dyn Stream>,
    skip: SkipFn,
    immediate: bool,
}

impl AccessLogBuilder {
    /// Token table, shared with other logs built from the same `Arc`.
    pub fn tokens(mut self, tokens: Arc<Tokens>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn stream(mut self, stream: Arc<dyn Stream>) -> Self {
        self.stream = stream;
        self
    }

    pub fn skip(mut self, skip: SkipFn) -> Self {
        self.skip = skip;
        self
    }

    pub fn immediate(mut self, immediate: bool) -> Self {
        self.immediate = immediate;
        self
    }

    pub fn build(self) -> AccessLog {
        AccessLog {
            tokens: self.tokens,
            format: self.format,
            stream: self.stream,
            skip: self.skip,
            immediate: self.immediate,
        }
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::middleware::from_fn;
    use crate::{Router, StatusCode};

    #[derive(Default)]
    struct Lines(Mutex<Vec<String>>);

    impl Stream for Lines {
        fn write(&self, line: &str) -> Result<(), Error> {
            self.0.lock().push(line.to_owned());
            Ok(())
        }
    }

    struct Broken;

    impl Stream for Broken {
        fn write(&self, _line: &str) -> Result<(), Error> {
            Err(Error::Io(std::io::Error::other("disk full")))
        }
    }

    fn status_line(tokens: &Tokens, ex: &Exchange<'_>) -> String {
        format!(
            "{} {} {}",
            tokens.get("method", ex).unwrap_or_default(),
            tokens.get("url", ex).unwrap_or_default(),
            tokens.get("status", ex).unwrap_or_else(|| "-".into()),
        )
    }

    async fn created(_req: Request) -> Response {
        Response::status(StatusCode::CREATED)
    }

    #[tokio::test]
    async fn immediate_logs_before_the_handler() {
        let lines = Arc::new(Lines::default());
        let log = AccessLog::builder(status_line).stream(lines.clone()).immediate(true).build();

        let app = Router::new().get("/a", created).layer(log);
        app.call(Request::builder().url("/a").build()).await;

        assert_eq!(*lines.0.lock(), ["GET /a -"]);
    }

    #[tokio::test]
    async fn deferred_logs_the_response() {
        let lines = Arc::new(Lines::default());
        let log = AccessLog::builder(status_line).stream(lines.clone()).build();

        let app = Router::new().get("/a", created).layer(log);
        let res = app.call(Request::builder().url("/a").build()).await;

        assert_eq!(res.status_code(), StatusCode::CREATED);
        assert_eq!(*lines.0.lock(), ["GET /a 201"]);
    }

    #[tokio::test]
    async fn deferred_log_sees_later_identifiers() {
        let lines = Arc::new(Lines::default());
        let log = AccessLog::builder(|_t: &Tokens, ex: &Exchange<'_>| {
            ex.request.trace_id().unwrap_or("none").to_owned()
        })
        .stream(lines.clone())
        .build();
        let assign = from_fn(|req: Request, next: Next| {
            req.context().set_trace_id("t-9".into());
            next.run(req)
        });

        let app = Router::new().get("/", created).layer(log).layer(assign);
        app.call(Request::builder().build()).await;

        assert_eq!(*lines.0.lock(), ["t-9"]);
    }

    #[tokio::test]
    async fn skipped_requests_write_nothing() {
        let lines = Arc::new(Lines::default());
        let log = AccessLog::builder(status_line)
            .stream(lines.clone())
            .skip(Arc::new(|req: &Request| req.path() == "/quiet"))
            .build();

        let app = Router::new().get("/quiet", created).get("/loud", created).layer(log);
        app.call(Request::builder().url("/quiet").build()).await;
        app.call(Request::builder().url("/loud").build()).await;

        assert_eq!(*lines.0.lock(), ["GET /loud 201"]);
    }

    #[tokio::test]
    async fn stream_failure_leaves_the_response_alone() {
        let log = AccessLog::builder(status_line).stream(Arc::new(Broken)).build();
        let app = Router::new().get("/", created).layer(log);
        let res = app.call(Request::builder().build()).await;
        assert_eq!(res.status_code(), StatusCode::CREATED);
    }
}
