//! The base logger contract.
//!
//! logsmith does not own a logging backend. It talks to whatever the
//! application already uses through [`Logger`]: four severity methods, plus an
//! optional `http` level for access records. [`TracingLogger`] bridges the
//! trait onto `tracing`; [`MemoryLogger`] captures calls for tests.

use std::fmt;

use parking_lot::Mutex;
use serde_json::Value as Json;

/// Structured metadata attached to a log call.
pub type Metadata = serde_json::Map<String, Json>;

/// Severity of a log call made through a [`Logger`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Level {
    Debug,
    Info,
    Http,
    Warn,
    Error,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Http => "http",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A process-wide base logger.
///
/// `http` is optional. Loggers that have a dedicated level for access records
/// return `true` from [`supports_http`](Logger::supports_http); everyone else
/// keeps the defaults and access records go to the console instead.
pub trait Logger: Send + Sync + 'static {
    fn debug(&self, message: &str, metadata: Metadata);
    fn info(&self, message: &str, metadata: Metadata);
    fn warn(&self, message: &str, metadata: Metadata);
    fn error(&self, message: &str, metadata: Metadata);

    fn supports_http(&self) -> bool {
        false
    }

    fn http(&self, _label: &str, _record: Metadata) {}

    /// Dispatches to the method matching `level`.
    fn log(&self, level: Level, message: &str, metadata: Metadata) {
        match level {
            Level::Debug => self.debug(message, metadata),
            Level::Info => self.info(message, metadata),
            Level::Http => self.http(message, metadata),
            Level::Warn => self.warn(message, metadata),
            Level::Error => self.error(message, metadata),
        }
    }
}

// ── tracing adapter ───────────────────────────────────────────────────────────

/// Forwards every call to a `tracing` event, metadata rendered as JSON.
///
/// `http` records are emitted at INFO under the `http` target so they can be
/// filtered separately (`RUST_LOG=info,http=off`).
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn debug(&self, message: &str, metadata: Metadata) {
        tracing::debug!(metadata = %Json::Object(metadata), "{message}");
    }

    fn info(&self, message: &str, metadata: Metadata) {
        tracing::info!(metadata = %Json::Object(metadata), "{message}");
    }

    fn warn(&self, message: &str, metadata: Metadata) {
        tracing::warn!(metadata = %Json::Object(metadata), "{message}");
    }

    fn error(&self, message: &str, metadata: Metadata) {
        tracing::error!(metadata = %Json::Object(metadata), "{message}");
    }

    fn supports_http(&self) -> bool {
        true
    }

    fn http(&self, label: &str, record: Metadata) {
        tracing::info!(target: "http", record = %Json::Object(record), "{label}");
    }
}

// ── capturing logger ──────────────────────────────────────────────────────────

/// One captured call.
#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
    pub level: Level,
    pub message: String,
    pub metadata: Metadata,
}

/// Keeps every call in memory. Meant for tests.
#[derive(Debug)]
pub struct MemoryLogger {
    entries: Mutex<Vec<Entry>>,
    http: bool,
}

impl MemoryLogger {
    /// A logger with an `http` level.
    pub fn new() -> Self {
        Self { entries: Mutex::new(Vec::new()), http: true }
    }

    /// A logger with only the four base levels.
    pub fn without_http() -> Self {
        Self { entries: Mutex::new(Vec::new()), http: false }
    }

    pub fn entries(&self) -> Vec<Entry> {
        self.entries.lock().clone()
    }

    pub fn entries_at(&self, level: Level) -> Vec<Entry> {
        self.entries.lock().iter().filter(|e| e.level == level).cloned().collect()
    }

    fn push(&self, level: Level, message: &str, metadata: Metadata) {
        self.entries.lock().push(Entry { level, message: message.to_owned(), metadata });
    }
}

impl Default for MemoryLogger {
    fn default() -> Self { Self::new() }
}

impl Logger for MemoryLogger {
    fn debug(&self, message: &str, metadata: Metadata) {
        self.push(Level::Debug, message, metadata);
    }

    fn info(&self, message: &str, metadata: Metadata) {
        self.push(Level::Info, message, metadata);
    }

    fn warn(&self, message: &str, metadata: Metadata) {
        self.push(Level::Warn, message, metadata);
    }

    fn error(&self, message: &str, metadata: Metadata) {
        self.push(Level::Error, message, metadata);
    }

    fn supports_http(&self) -> bool {
        self.http
    }

    fn http(&self, label: &str, record: Metadata) {
        if self.http {
            self.push(Level::Http, label, record);
        }
    }
}
