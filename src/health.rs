//! Built-in liveness handler.
//!
//! Load balancers and orchestrators poll `/ping` constantly. The default
//! access-log skip predicate ignores that path, so probes never flood the
//! logs.
//!
//! ```rust,no_run
//! use logsmith::{Router, health};
//!
//! let app = Router::new().get("/ping", health::ping);
//! ```

use crate::{Request, Response};

/// Always answers `200 OK` with body `"pong"`.
pub async fn ping(_req: Request) -> Response {
    Response::text("pong")
}
