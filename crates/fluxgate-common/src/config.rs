//! Configuration for Fluxgate services

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// InfluxDB configuration
    #[serde(default)]
    pub influxdb: InfluxConfig,

    /// MCP server configuration
    #[serde(default)]
    pub mcp: McpConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            influxdb: InfluxConfig::default(),
            mcp: McpConfig::default(),
        }
    }
}

/// InfluxDB connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfluxConfig {
    /// Hostname of the InfluxDB server
    #[serde(default = "default_influx_host")]
    pub host: String,

    /// Port of the InfluxDB server
    #[serde(default = "default_influx_port")]
    pub port: u16,

    /// API token (required, no default)
    #[serde(default = "default_token")]
    pub token: String,

    /// Organization name (required, no default)
    #[serde(default = "default_org")]
    pub org: String,

    /// Whether to connect over HTTPS
    #[serde(default = "default_use_ssl")]
    pub use_ssl: bool,

    /// Whether to verify the server certificate
    #[serde(default = "default_verify_ssl")]
    pub verify_ssl: bool,

    /// Request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Time window, in days, applied to schema discovery queries.
    /// Bounds the cost of `schema.measurements`-style scans over large buckets.
    #[serde(default = "default_measurement_window_days")]
    pub measurement_window_days: u32,
}

fn default_influx_host() -> String {
    std::env::var("INFLUXDB_HOST").unwrap_or_else(|_| "localhost".to_string())
}

fn default_influx_port() -> u16 {
    env_parse("INFLUXDB_PORT", 8086)
}

fn default_token() -> String {
    std::env::var("INFLUXDB_TOKEN").unwrap_or_default()
}

fn default_org() -> String {
    std::env::var("INFLUXDB_ORG").unwrap_or_default()
}

fn default_use_ssl() -> bool {
    env_flag("INFLUXDB_USE_SSL", false)
}

fn default_verify_ssl() -> bool {
    env_flag("INFLUXDB_VERIFY_SSL", true)
}

fn default_timeout_ms() -> u64 {
    env_parse("INFLUXDB_TIMEOUT", 10_000)
}

fn default_measurement_window_days() -> u32 {
    env_parse("INFLUXDB_MEASUREMENT_WINDOW_DAYS", 30)
}

/// Read an environment variable and parse it, falling back on absence or
/// parse failure.
fn env_parse<T: std::str::FromStr>(name: &str, fallback: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(fallback)
}

/// Read a boolean environment variable. Accepts 1/true/yes and 0/false/no.
fn env_flag(name: &str, fallback: bool) -> bool {
    match std::env::var(name) {
        Ok(v) => match v.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" => true,
            "0" | "false" | "no" => false,
            _ => fallback,
        },
        Err(_) => fallback,
    }
}

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            host: default_influx_host(),
            port: default_influx_port(),
            token: default_token(),
            org: default_org(),
            use_ssl: default_use_ssl(),
            verify_ssl: default_verify_ssl(),
            timeout_ms: default_timeout_ms(),
            measurement_window_days: default_measurement_window_days(),
        }
    }
}

impl InfluxConfig {
    /// Base URL of the InfluxDB server, derived from host, port, and SSL flag
    pub fn url(&self) -> String {
        let scheme = if self.use_ssl { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

/// MCP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    /// Host to bind to
    #[serde(default = "default_mcp_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_mcp_port")]
    pub port: u16,
}

fn default_mcp_host() -> String {
    std::env::var("MCP_LISTEN_HOST").unwrap_or_else(|_| "0.0.0.0".to_string())
}

fn default_mcp_port() -> u16 {
    env_parse("MCP_LISTEN_PORT", 8081)
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            host: default_mcp_host(),
            port: default_mcp_port(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::File::with_name("config.local").required(false))
            .add_source(config::Environment::with_prefix("FLUXGATE").separator("__"))
            .build()
            .map_err(|e| Error::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| Error::Config(e.to_string()))
    }

    /// Check that required fields are present and numeric fields are sane.
    ///
    /// A failure here is fatal at startup: the server must refuse to serve
    /// rather than run without credentials.
    pub fn validate(&self) -> Result<()> {
        if self.influxdb.token.trim().is_empty() {
            return Err(Error::Config(
                "missing token: INFLUXDB_TOKEN must be set".to_string(),
            ));
        }
        if self.influxdb.org.trim().is_empty() {
            return Err(Error::Config(
                "missing organization: INFLUXDB_ORG must be set".to_string(),
            ));
        }
        if self.influxdb.port == 0 {
            return Err(Error::Config(
                "INFLUXDB_PORT must be a positive integer".to_string(),
            ));
        }
        if self.influxdb.timeout_ms == 0 {
            return Err(Error::Config(
                "INFLUXDB_TIMEOUT must be a positive number of milliseconds".to_string(),
            ));
        }
        Ok(())
    }
}
