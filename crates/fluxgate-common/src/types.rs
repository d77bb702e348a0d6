//! Core types for Fluxgate
//!
//! These types mirror the shapes returned by the InfluxDB v2 HTTP API.

use serde::{Deserialize, Serialize};

/// A decoded Flux result row: an ordered mapping from column name to a
/// JSON-safe scalar value. Column order follows the store's response.
pub type FluxRow = serde_json::Map<String, serde_json::Value>;

/// A bucket visible to the configured organization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bucket {
    /// Bucket name
    pub name: String,

    /// Store-assigned bucket ID
    pub id: String,
}

/// Gateway connectivity state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// The store answered the readiness probe
    Connected,
    /// The probe failed; details are in the accompanying message
    Error,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Error => write!(f, "error"),
        }
    }
}

/// Result of a connectivity probe against the store.
///
/// Probes never fail with an error: an unreachable store is reported as a
/// structured payload so callers can surface it without special-casing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionStatus {
    /// Probe outcome
    pub status: ConnectionState,

    /// Health status string reported by the store, when available
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<String>,

    /// Human-readable detail (upstream message on failure)
    pub message: String,

    /// Store URL the probe targeted
    pub url: String,

    /// Configured organization
    pub org: String,
}

/// Non-secret resolved connection parameters.
///
/// Never carries the API token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Configured organization
    pub organization: String,

    /// Store hostname
    pub host: String,

    /// Store port
    pub port: u16,

    /// Whether the connection uses HTTPS
    pub ssl_enabled: bool,
}
