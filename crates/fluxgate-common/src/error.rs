//! Error types for Fluxgate

use thiserror::Error;

/// Result type alias using Fluxgate Error
pub type Result<T> = std::result::Result<T, Error>;

/// Fluxgate error types
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or incomplete configuration. Fatal at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// Caller supplied a malformed tool argument. Recovered locally.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Referenced bucket, tool, or resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// InfluxDB is unreachable, rejected the query, or timed out.
    /// Carries the upstream message verbatim.
    #[error("influxdb error: {0}")]
    Upstream(String),
}

impl Error {
    /// Whether this error is a missing bucket/tool/resource
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Whether this error originated from the store
    pub fn is_upstream(&self) -> bool {
        matches!(self, Error::Upstream(_))
    }

    /// Stable machine-readable error kind, exposed to external callers
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "config",
            Error::InvalidParameter(_) => "invalid_parameter",
            Error::NotFound(_) => "not_found",
            Error::Upstream(_) => "upstream",
        }
    }
}
