//! HTTP server and graceful shutdown.
//!
//! On SIGTERM or Ctrl-C the server stops accepting connections, lets every
//! in-flight connection finish, then returns from [`Server::serve`].

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::error::Error;
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;

/// The HTTP server.
pub struct Server {
    addr: String,
}

impl Server {
    /// Configures the server to bind to `addr` (`host:port`) when
    /// [`serve`](Server::serve) is called.
    pub fn bind(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    /// Starts accepting connections and dispatching them through `router`.
    ///
    /// Returns only after a full graceful shutdown, or with
    /// [`Error::Addr`] / [`Error::Io`] if the listener cannot be set up.
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        let addr: SocketAddr = self.addr.parse().map_err(|source| Error::Addr {
            addr: self.addr.clone(),
            source,
        })?;
        let listener = TcpListener::bind(addr).await?;
        let router = Arc::new(router);

        info!(%addr, "logsmith listening");

        let mut tasks = tokio::task::JoinSet::new();
        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Check shutdown first so a SIGTERM stops accepting immediately.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let router = Arc::clone(&router);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        let svc = service_fn(move |req| {
                            let router = Arc::clone(&router);
                            async move { dispatch(router, req, remote_addr).await }
                        });

                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("logsmith stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Buffers the body, builds a [`Request`] and runs the pipeline.
///
/// Failures become HTTP responses, so hyper never sees an error.
async fn dispatch(
    router: Arc<Router>,
    req: hyper::Request<hyper::body::Incoming>,
    remote_addr: SocketAddr,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();

    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            debug!(peer = %remote_addr, "failed to read request body: {e}");
            return Ok(Response::status(http::StatusCode::BAD_REQUEST).into_inner());
        }
    };

    let url = parts.uri.path_and_query().map_or("/", |pq| pq.as_str()).to_owned();
    let headers = convert_headers(&parts.headers);

    let request = Request::new(parts.method, url, headers, body, Some(remote_addr));
    Ok(router.call(request).await.into_inner())
}

/// Copies header pairs into owned strings.
///
/// Values that are not valid UTF-8 are dropped rather than rewritten, so an
/// identifier is either carried byte-for-byte or treated as absent.
fn convert_headers(headers: &http::HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|(name, value)| match std::str::from_utf8(value.as_bytes()) {
            Ok(text) => Some((name.as_str().to_owned(), text.to_owned())),
            Err(_) => {
                debug!(header = %name, "dropping header value that is not UTF-8");
                None
            }
        })
        .collect()
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on SIGTERM or SIGINT (Unix), or Ctrl-C elsewhere.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bad_address_is_reported() {
        let err = Server::bind("not-an-address").serve(Router::new()).await.unwrap_err();
        assert!(matches!(err, Error::Addr { ref addr, .. } if addr == "not-an-address"));
    }

    fn mixed_headers() -> http::HeaderMap {
        let mut headers = http::HeaderMap::new();
        headers.insert("x-request-id", http::HeaderValue::from_bytes(b"ab\xff").unwrap());
        headers.insert("x-correlation-id", http::HeaderValue::from_static("c-1"));
        headers
    }

    #[test]
    fn non_utf8_values_are_dropped_not_rewritten() {
        let headers = convert_headers(&mixed_headers());
        assert_eq!(headers, [("x-correlation-id".to_owned(), "c-1".to_owned())]);
    }

    #[tokio::test]
    async fn non_utf8_trace_header_gets_a_fresh_id() {
        let app = Router::new().get("/", |req: Request| async move {
            Response::text(req.trace_id().unwrap_or_default().to_owned())
        });
        let app = app.layer(crate::middleware::request_id());
        let req = Request::new(
            http::Method::GET,
            "/".into(),
            convert_headers(&mixed_headers()),
            Bytes::new(),
            None,
        );

        let res = app.call(req).await;

        let trace = std::str::from_utf8(res.body()).unwrap();
        assert_eq!(trace.len(), 36);
        assert_ne!(trace.as_bytes(), b"ab\xff");
        assert_eq!(res.header("x-request-id"), Some(trace));
    }
}
