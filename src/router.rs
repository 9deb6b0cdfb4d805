//! Radix-tree request router and middleware stack.
//!
//! One tree per HTTP method, O(path-length) lookup. Middleware registered with
//! [`Router::layer`] wraps every request in registration order, including
//! requests that match no route and end in a 404.

use std::collections::HashMap;
use std::sync::Arc;

use http::{Method, StatusCode};
use matchit::Router as MatchitRouter;

use crate::handler::{BoxFuture, BoxedHandler, Handler};
use crate::middleware::{BoxedMiddleware, Middleware, Next};
use crate::request::Request;
use crate::response::Response;

/// The application router.
///
/// Build it once at startup; pass it to [`Server::serve`](crate::Server::serve).
/// Every registration returns `self` so calls chain naturally.
pub struct Router {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
    stack: Arc<Vec<BoxedMiddleware>>,
    fallback: BoxedHandler,
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            stack: Arc::new(Vec::new()),
            fallback: not_found.into_boxed_handler(),
        }
    }

    /// Register a handler for a method + path pair.
    ///
    /// Path parameters use `{name}` syntax; `req.param("name")` retrieves them.
    ///
    /// # Panics
    ///
    /// Panics on a malformed or conflicting route. Routes are fixed at
    /// startup, so this is a programming error.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, handler.into_boxed_handler())
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::GET, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::POST, path, handler)
    }

    /// Appends `middleware` to the stack. The first layer registered sees the
    /// request first and the response last.
    pub fn layer(mut self, middleware: impl Middleware) -> Self {
        Arc::make_mut(&mut self.stack).push(Arc::new(middleware));
        self
    }

    /// Runs `req` through the middleware stack and the matching handler.
    pub fn call(&self, mut req: Request) -> BoxFuture {
        let endpoint = match self.lookup(req.method(), req.path()) {
            Some((handler, params)) => {
                req.params = params;
                handler
            }
            None => Arc::clone(&self.fallback),
        };
        Next::new(Arc::clone(&self.stack), endpoint).run(req)
    }

    fn lookup(&self, method: &Method, path: &str) -> Option<(BoxedHandler, HashMap<String, String>)> {
        let tree = self.routes.get(method)?;
        let matched = tree.at(path).ok()?;
        let handler = Arc::clone(matched.value);
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((handler, params))
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

async fn not_found(_req: Request) -> Response {
    Response::status(StatusCode::NOT_FOUND)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::from_fn;

    async fn user(req: Request) -> Response {
        Response::text(req.param("id").unwrap_or("none").to_owned())
    }

    #[tokio::test]
    async fn routes_by_method_and_path() {
        let app = Router::new().get("/users/{id}", user);

        let res = app.call(Request::builder().url("/users/42?full=1").build()).await;
        assert_eq!(res.body(), b"42");

        let res = app.call(Request::builder().method(Method::DELETE).url("/users/42").build()).await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn layers_run_in_registration_order() {
        fn tag(name: &'static str) -> impl Middleware {
            from_fn(move |req: Request, next: Next| async move {
                let mut res = next.run(req).await;
                let trail = res.header("x-trail").map(|t| format!("{t},{name}")).unwrap_or(name.to_owned());
                res.set_header("x-trail", &trail);
                res
            })
        }

        let app = Router::new().get("/", |_req: Request| async { "ok" }).layer(tag("outer")).layer(tag("inner"));
        let res = app.call(Request::builder().build()).await;

        // The innermost layer touches the response first.
        assert_eq!(res.header("x-trail"), Some("inner,outer"));
    }

    #[tokio::test]
    async fn layers_wrap_unmatched_requests() {
        let app = Router::new().layer(from_fn(|req: Request, next: Next| async move {
            let mut res = next.run(req).await;
            res.set_header("x-seen", "1");
            res
        }));
        let res = app.call(Request::builder().url("/missing").build()).await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(res.header("x-seen"), Some("1"));
    }
}
