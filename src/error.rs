//! Unified error type.

use std::net::AddrParseError;

/// The error type returned by logsmith's fallible operations.
///
/// Application-level failures (404, 422, etc.) are expressed as HTTP
/// [`Response`](crate::Response) values, not as `Error`s. This type surfaces
/// infrastructure failures: binding a port, accepting a connection, or an
/// access-log sink that could not take a record.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid socket address `{addr}`: {source}")]
    Addr {
        addr: String,
        #[source]
        source: AddrParseError,
    },

    /// The access-log format produced something that is not a JSON object.
    #[error("malformed access log record: {0}")]
    Record(#[from] serde_json::Error),
}
