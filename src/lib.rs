//! # logsmith
//!
//! Correlation ids, request-scoped loggers and structured access logs for HTTP
//! services.
//!
//! Every request gets three identifiers:
//!
//! - **correlation id** — follows one logical operation across services
//!   (`X-Correlation-Id`, generated as a SHA-256 hex digest when missing,
//!   so 64 hex characters rather than the 40 of a SHA-1 id);
//! - **trace id** — one request/response exchange (`X-Request-Id`, a fresh
//!   UUID when missing);
//! - **span id** — this hop inside a larger trace (`X-svc2svc-Id`, only ever
//!   taken from the caller).
//!
//! Handlers log through [`Request::logger`], which stamps the triple onto every
//! call, and [`middleware::HttpLog`] writes one JSON record when a request
//! arrives and one when its response is ready. The second record is written
//! before hyper sends the body, so its `response_time` is pipeline time.
//!
//! The crate carries its own small server and router so the pipeline has
//! somewhere to run: hyper underneath, a radix tree per method, an ordered
//! middleware stack.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use logsmith::middleware::{HttpLog, request_id, request_logger};
//! use logsmith::{Logger, Request, Response, Router, Server, TracingLogger, health};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), logsmith::Error> {
//!     logsmith::logging::init(&logsmith::config::Settings::from_env());
//!
//!     let logger: Arc<dyn Logger> = Arc::new(TracingLogger);
//!     let http = HttpLog::new(Arc::clone(&logger));
//!
//!     let app = Router::new()
//!         .get("/ping", health::ping)
//!         .get("/users/{id}", get_user)
//!         .layer(request_id())
//!         .layer(http.incoming)
//!         .layer(request_logger(logger))
//!         .layer(http.outgoing);
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await
//! }
//!
//! async fn get_user(req: Request) -> Response {
//!     let id = req.param("id").unwrap_or("unknown").to_owned();
//!     if let Some(log) = req.logger() {
//!         log.info("fetching user", Default::default());
//!     }
//!     Response::json(format!(r#"{{"id":"{id}"}}"#))
//! }
//! ```

mod error;
mod handler;
mod request;
mod response;
mod router;
mod server;

pub mod access_log;
pub mod config;
pub mod health;
pub mod logger;
pub mod logging;
pub mod middleware;

pub use error::Error;
pub use handler::{BoxFuture, Handler};
pub use http::{Method, StatusCode};
pub use logger::{Level, Logger, Metadata, TracingLogger};
pub use request::{Request, RequestBuilder};
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
