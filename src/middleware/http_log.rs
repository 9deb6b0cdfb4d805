//! Structured access records for inbound requests and outbound responses.
//!
//! [`HttpLog`] pairs two [`AccessLog`] stages over one token table:
//!
//! - `incoming` — immediate; records method, content type, user agent,
//!   referrer and URL under the label `"incoming request"`.
//! - `outgoing` — deferred; records status, content length and response time
//!   under the label `"outgoing response"`. It is written when the handler's
//!   response is ready, before hyper sends the body, so `response_time` is
//!   pipeline time in milliseconds.
//!
//! Both records carry `correlation_id`, `trace_id` and `span_id`. Records go to
//! [`Logger::http`] when the base logger has that level, otherwise to the
//! console as `"<label> <json>"` lines. A sink that fails (an unwritable
//! console, a line that is not a JSON object) is reported through `tracing`
//! and does not alter the response.

use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Value, json};

use crate::access_log::{AccessLog, Exchange, SkipFn, Stream, Tokens};
use crate::config::Environment;
use crate::error::Error;
use crate::logger::{Logger, Metadata};
use crate::request::Request;

pub const INCOMING_LABEL: &str = "incoming request";
pub const OUTGOING_LABEL: &str = "outgoing response";

/// Skips `/ping`, and everything while the process runs in `test` mode.
pub fn default_skip(req: &Request) -> bool {
    should_skip(req, &Environment::current())
}

pub(crate) fn should_skip(req: &Request, env: &Environment) -> bool {
    req.path() == "/ping" || env.is_test()
}

// ── Sink ──────────────────────────────────────────────────────────────────────

type ConsoleWriter = Arc<Mutex<Box<dyn Write + Send>>>;

fn console_writer(writer: impl Write + Send + 'static) -> ConsoleWriter {
    let writer: Box<dyn Write + Send> = Box::new(writer);
    Arc::new(Mutex::new(writer))
}

/// Where parsed records end up. Chosen once, when the pair is built.
enum Sink {
    Logger(Arc<dyn Logger>),
    Console(ConsoleWriter),
}

impl Sink {
    fn resolve(logger: Arc<dyn Logger>, console: ConsoleWriter) -> Self {
        if logger.supports_http() {
            Self::Logger(logger)
        } else {
            Self::Console(console)
        }
    }

    fn emit(&self, label: &str, record: Metadata) -> Result<(), Error> {
        match self {
            Self::Logger(logger) => logger.http(label, record),
            Self::Console(out) => {
                let mut out = out.lock();
                writeln!(out, "{label} {}", Value::Object(record))?;
                out.flush()?;
            }
        }
        Ok(())
    }
}

/// Parses each line back into a JSON object and hands it to the sink.
struct LabelledStream {
    label: &'static str,
    sink: Arc<Sink>,
}

impl Stream for LabelledStream {
    fn write(&self, line: &str) -> Result<(), Error> {
        let record: Metadata = serde_json::from_str(line.trim())?;
        self.sink.emit(self.label, record)
    }
}

// ── Record formats ────────────────────────────────────────────────────────────

fn text(value: Option<String>) -> Value {
    value.map_or(Value::Null, Value::String)
}

/// Token value as a number; empty or unparsable means `0.0`.
fn number(value: Option<String>) -> f64 {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(0.0)
}

fn identity(tokens: &Tokens, ex: &Exchange<'_>) -> Metadata {
    let mut record = Metadata::new();
    record.insert("correlation_id".into(), text(tokens.get("correlation-id", ex)));
    record.insert("trace_id".into(), text(tokens.get("trace-id", ex)));
    record.insert("span_id".into(), text(tokens.get("span-id", ex)));
    record
}

fn incoming_record(tokens: &Tokens, ex: &Exchange<'_>) -> String {
    let mut record = identity(tokens, ex);
    record.insert("http_method".into(), text(tokens.get("method", ex)));
    record.insert("http_content_type".into(), text(tokens.get_with("req", ex, Some("content-type"))));
    record.insert("http_user_agent".into(), text(tokens.get("user-agent", ex)));
    record.insert("http_referrer".into(), text(tokens.get("referrer", ex)));
    record.insert("uri_path".into(), text(tokens.get("url", ex)));
    Value::Object(record).to_string()
}

fn outgoing_record(tokens: &Tokens, ex: &Exchange<'_>) -> String {
    let mut record = identity(tokens, ex);
    record.insert("status".into(), json!(number(tokens.get("status", ex))));
    record.insert(
        "content_length".into(),
        json!(tokens.get_with("res", ex, Some("content-length")).unwrap_or_else(|| "-".into())),
    );
    record.insert("response_time".into(), json!(number(tokens.get("response-time", ex))));
    Value::Object(record).to_string()
}

fn identity_tokens() -> Tokens {
    let mut tokens = Tokens::new();
    tokens
        .define("correlation-id", |ex, _| ex.request.correlation_id().map(str::to_owned))
        .define("trace-id", |ex, _| ex.request.trace_id().map(str::to_owned))
        .define("span-id", |ex, _| ex.request.span_id().map(str::to_owned));
    tokens
}

// ── HttpLog ───────────────────────────────────────────────────────────────────

/// The incoming/outgoing access-log pair.
pub struct HttpLog {
    pub incoming: AccessLog,
    pub outgoing: AccessLog,
}

impl HttpLog {
    /// Pair with [`default_skip`] and stdout as the console fallback.
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self::builder(logger).build()
    }

    pub fn builder(logger: Arc<dyn Logger>) -> HttpLogBuilder {
        HttpLogBuilder {
            logger,
            skip: Arc::new(default_skip),
            console: console_writer(std::io::stdout()),
        }
    }
}

/// Builder returned by [`HttpLog::builder`].
pub struct HttpLogBuilder {
    logger: Arc<dyn Logger>,
    skip: SkipFn,
    console: ConsoleWriter,
}

impl HttpLogBuilder {
    /// Replaces [`default_skip`]. The predicate sees the request as-is.
    pub fn skip<F>(mut self, skip: F) -> Self
    where
        F: Fn(&Request) -> bool + Send + Sync + 'static,
    {
        self.skip = Arc::new(skip);
        self
    }

    /// Writer used when the base logger has no `http` level.
    pub fn console(mut self, writer: impl Write + Send + 'static) -> Self {
        self.console = console_writer(writer);
        self
    }

    pub fn build(self) -> HttpLog {
        let tokens = Arc::new(identity_tokens());
        let sink = Arc::new(Sink::resolve(self.logger, self.console));

        let incoming = AccessLog::builder(incoming_record)
            .tokens(Arc::clone(&tokens))
            .stream(Arc::new(LabelledStream { label: INCOMING_LABEL, sink: Arc::clone(&sink) }))
            .skip(Arc::clone(&self.skip))
            .immediate(true)
            .build();
        let outgoing = AccessLog::builder(outgoing_record)
            .tokens(tokens)
            .stream(Arc::new(LabelledStream { label: OUTGOING_LABEL, sink }))
            .skip(self.skip)
            .build();

        HttpLog { incoming, outgoing }
    }
}
