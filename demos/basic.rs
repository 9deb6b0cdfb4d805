//! Minimal logsmith service: identifiers, request logger, access records.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl -i http://localhost:3000/users/42
//!   curl -i -H 'X-Request-Id: foobar' -H 'X-svc2svc-Id: hello-world' \
//!        http://localhost:3000/users/42
//!   curl -i http://localhost:3000/ping        # not access-logged

use std::sync::Arc;

use logsmith::config::Settings;
use logsmith::middleware::{HttpLog, request_id, request_logger};
use logsmith::{Logger, Metadata, Request, Response, Router, Server, StatusCode, TracingLogger, health};

#[tokio::main]
async fn main() -> Result<(), logsmith::Error> {
    logsmith::logging::init(&Settings::from_env());

    let logger: Arc<dyn Logger> = Arc::new(TracingLogger);
    let http = HttpLog::new(Arc::clone(&logger));

    let app = Router::new()
        .get("/ping", health::ping)
        .get("/users/{id}", get_user)
        .post("/users", create_user)
        .layer(request_id())
        .layer(http.incoming)
        .layer(request_logger(logger))
        .layer(http.outgoing);

    Server::bind("0.0.0.0:3000").serve(app).await
}

// GET /users/{id}
async fn get_user(req: Request) -> Response {
    let id = req.param("id").unwrap_or("unknown").to_owned();
    if let Some(log) = req.logger() {
        let mut meta = Metadata::new();
        meta.insert("user_id".into(), id.clone().into());
        log.info("fetching user", meta);
    }
    Response::json(format!(r#"{{"id":"{id}","name":"alice"}}"#))
}

// POST /users
async fn create_user(req: Request) -> Response {
    if req.body().is_empty() {
        if let Some(log) = req.logger() {
            log.warn("empty body", Metadata::new());
        }
        return Response::status(StatusCode::BAD_REQUEST);
    }

    Response::builder()
        .status(StatusCode::CREATED)
        .header("location", "/users/99")
        .json(r#"{"id":"99","name":"new_user"}"#)
}
