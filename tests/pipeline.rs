//! The full pipeline, as an application would layer it.

use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Value, json};

use logsmith::logger::MemoryLogger;
use logsmith::middleware::{
    HttpLog, INCOMING_LABEL, OUTGOING_LABEL, UNKNOWN_SPAN_ID, request_id, request_logger,
};
use logsmith::{Level, Logger, Metadata, Request, Response, Router, health};

async fn hello(req: Request) -> Response {
    if let Some(log) = req.logger() {
        let mut meta = Metadata::new();
        meta.insert("additional".into(), json!("x"));
        log.info("msg", meta);
    }
    Response::text("hello")
}

fn app(logger: Arc<dyn Logger>, http: HttpLog) -> Router {
    Router::new()
        .get("/", hello)
        .get("/ping", health::ping)
        .layer(request_id())
        .layer(http.incoming)
        .layer(request_logger(logger))
        .layer(http.outgoing)
}

#[tokio::test]
async fn identifiers_flow_into_every_record() {
    let logger = Arc::new(MemoryLogger::new());
    let http = HttpLog::builder(logger.clone()).skip(|_req: &Request| false).build();
    let app = app(logger.clone(), http);

    let req = Request::builder()
        .header("X-Request-Id", "foobar")
        .header("X-svc2svc-Id", "hello-world")
        .build();
    let res = app.call(req).await;

    assert_eq!(res.header("X-Request-Id"), Some("foobar"));
    assert_eq!(res.header("X-svc2svc-Id"), Some("hello-world"));
    let correlation = res.header("X-Correlation-Id").unwrap().to_owned();

    let entries = logger.entries();
    assert_eq!(entries.len(), 3);

    assert_eq!(entries[0].level, Level::Http);
    assert_eq!(entries[0].message, INCOMING_LABEL);
    assert_eq!(entries[1].level, Level::Info);
    assert_eq!(entries[2].level, Level::Http);
    assert_eq!(entries[2].message, OUTGOING_LABEL);

    for entry in &entries {
        assert_eq!(entry.metadata["correlation_id"], json!(correlation));
        assert_eq!(entry.metadata["trace_id"], json!("foobar"));
        assert_eq!(entry.metadata["span_id"], json!("hello-world"));
    }
    assert_eq!(entries[1].metadata["additional"], json!("x"));
    assert_eq!(entries[2].metadata["status"].as_f64(), Some(200.0));
    assert_eq!(entries[2].metadata["content_length"], json!("5"));
}

#[tokio::test]
async fn ping_is_never_access_logged() {
    let logger = Arc::new(MemoryLogger::new());
    let app = app(logger.clone(), HttpLog::new(logger.clone()));

    let res = app.call(Request::builder().url("/ping").build()).await;

    assert_eq!(res.body(), b"pong");
    assert!(logger.entries_at(Level::Http).is_empty());
}

#[tokio::test]
async fn logger_without_ids_uses_fallbacks() {
    let logger = Arc::new(MemoryLogger::new());
    let app = Router::new().get("/", hello).layer(request_logger(logger.clone()));

    app.call(Request::builder().build()).await;

    let entry = &logger.entries()[0];
    assert_eq!(
        Value::Object(entry.metadata.clone()),
        json!({
            "additional": "x",
            "correlation_id": "unknown-correlation-id",
            "trace_id": "unknown-trace-id",
            "span_id": UNKNOWN_SPAN_ID,
        })
    );
}

#[derive(Clone, Default)]
struct Console(Arc<Mutex<Vec<u8>>>);

impl Write for Console {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn console_receives_records_when_logger_has_no_http_level() {
    let logger = Arc::new(MemoryLogger::without_http());
    let console = Console::default();
    let http = HttpLog::builder(logger.clone())
        .skip(|_req: &Request| false)
        .console(console.clone())
        .build();
    let app = app(logger.clone(), http);

    app.call(Request::builder().header("X-Correlation-Id", "abc").build()).await;

    let output = String::from_utf8(console.0.lock().clone()).unwrap();
    let mut lines = output.lines();

    let incoming = lines.next().unwrap().strip_prefix("incoming request ").unwrap();
    let incoming: Value = serde_json::from_str(incoming).unwrap();
    assert_eq!(incoming["correlation_id"], json!("abc"));
    assert_eq!(incoming["http_method"], json!("GET"));

    let outgoing = lines.next().unwrap().strip_prefix("outgoing response ").unwrap();
    let outgoing: Value = serde_json::from_str(outgoing).unwrap();
    assert_eq!(outgoing["correlation_id"], json!("abc"));
    assert_eq!(outgoing["status"].as_f64(), Some(200.0));

    assert!(lines.next().is_none());
    // The handler's own call still reaches the base logger.
    assert_eq!(logger.entries_at(Level::Info).len(), 1);
}
