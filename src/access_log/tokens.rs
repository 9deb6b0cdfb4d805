//! Named value extractors over a request/response pair.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::request::Request;
use crate::response::Response;

/// What a token sees: the request, and the response once there is one.
pub struct Exchange<'a> {
    pub request: &'a Request,
    pub response: Option<&'a Response>,
    /// Time since the access-log stage first saw the request.
    pub elapsed: Duration,
}

/// A token: `(exchange, argument) -> value`. The argument is the bracketed
/// part of tokens such as `req[content-type]`.
pub type TokenFn = Arc<dyn Fn(&Exchange<'_>, Option<&str>) -> Option<String> + Send + Sync>;

/// The token table.
///
/// Built-ins:
///
/// | Token | Value |
/// |---|---|
/// | `method` | request method |
/// | `url` | path and query |
/// | `status` | response status, once there is a response |
/// | `response-time` | milliseconds with three decimals, once there is a response |
/// | `req` | request header named by the argument |
/// | `res` | response header named by the argument |
/// | `user-agent` | `User-Agent` header |
/// | `referrer` | `Referer` or `Referrer` header |
/// | `remote-addr` | peer IP address |
#[derive(Clone)]
pub struct Tokens {
    table: HashMap<String, TokenFn>,
}

impl Tokens {
    pub fn new() -> Self {
        let mut tokens = Self { table: HashMap::new() };
        tokens
            .define("method", |ex, _| Some(ex.request.method().as_str().to_owned()))
            .define("url", |ex, _| Some(ex.request.url().to_owned()))
            .define("status", |ex, _| ex.response.map(|r| r.status_code().as_u16().to_string()))
            .define("response-time", |ex, _| {
                ex.response?;
                Some(format!("{:.3}", ex.elapsed.as_secs_f64() * 1000.0))
            })
            .define("req", |ex, name| ex.request.header(name?).map(str::to_owned))
            .define("res", |ex, name| response_header(ex.response?, name?))
            .define("user-agent", |ex, _| ex.request.header("user-agent").map(str::to_owned))
            .define("referrer", |ex, _| {
                ex.request
                    .header("referer")
                    .or_else(|| ex.request.header("referrer"))
                    .map(str::to_owned)
            })
            .define("remote-addr", |ex, _| ex.request.remote_addr().map(|a| a.ip().to_string()));
        tokens
    }

    /// Registers or replaces the token `name`.
    pub fn define<F>(&mut self, name: impl Into<String>, token: F) -> &mut Self
    where
        F: Fn(&Exchange<'_>, Option<&str>) -> Option<String> + Send + Sync + 'static,
    {
        self.table.insert(name.into(), Arc::new(token));
        self
    }

    /// Value of a token without an argument. Unknown tokens yield `None`.
    pub fn get(&self, name: &str, exchange: &Exchange<'_>) -> Option<String> {
        self.get_with(name, exchange, None)
    }

    pub fn get_with(&self, name: &str, exchange: &Exchange<'_>, arg: Option<&str>) -> Option<String> {
        self.table.get(name).and_then(|token| token(exchange, arg))
    }
}

impl Default for Tokens {
    fn default() -> Self { Self::new() }
}

/// `content-length` falls back to the body size: the wire header is computed
/// by hyper after the pipeline has finished.
fn response_header(res: &Response, name: &str) -> Option<String> {
    if let Some(value) = res.header(name) {
        return Some(value.to_owned());
    }
    (name.eq_ignore_ascii_case("content-length") && !res.body().is_empty())
        .then(|| res.body().len().to_string())
}
