//! Tests for config module

use crate::config::{Config, InfluxConfig};

const ENV_VARS: [&str; 10] = [
    "INFLUXDB_HOST",
    "INFLUXDB_PORT",
    "INFLUXDB_TOKEN",
    "INFLUXDB_ORG",
    "INFLUXDB_USE_SSL",
    "INFLUXDB_VERIFY_SSL",
    "INFLUXDB_TIMEOUT",
    "INFLUXDB_MEASUREMENT_WINDOW_DAYS",
    "MCP_LISTEN_HOST",
    "MCP_LISTEN_PORT",
];

fn valid_influx_config() -> InfluxConfig {
    InfluxConfig {
        host: "localhost".to_string(),
        port: 8086,
        token: "secret-token".to_string(),
        org: "acme".to_string(),
        use_ssl: false,
        verify_ssl: true,
        timeout_ms: 10_000,
        measurement_window_days: 30,
    }
}

// All environment-driven resolution lives in one test: the default
// functions read the process environment, and tests run concurrently.
#[test]
fn test_env_resolution() {
    for name in ENV_VARS {
        std::env::remove_var(name);
    }

    let config = Config::default();
    assert_eq!(config.influxdb.host, "localhost");
    assert_eq!(config.influxdb.port, 8086);
    assert_eq!(config.influxdb.token, "");
    assert_eq!(config.influxdb.org, "");
    assert!(!config.influxdb.use_ssl);
    assert!(config.influxdb.verify_ssl);
    assert_eq!(config.influxdb.timeout_ms, 10_000);
    assert_eq!(config.influxdb.measurement_window_days, 30);
    assert_eq!(config.mcp.host, "0.0.0.0");
    assert_eq!(config.mcp.port, 8081);

    // Without token and org the config must not pass validation.
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("missing token"));

    std::env::set_var("INFLUXDB_HOST", "influx.internal");
    std::env::set_var("INFLUXDB_PORT", "8087");
    std::env::set_var("INFLUXDB_TOKEN", "secret-token");
    std::env::set_var("INFLUXDB_ORG", "acme");
    std::env::set_var("INFLUXDB_USE_SSL", "true");
    std::env::set_var("INFLUXDB_VERIFY_SSL", "false");
    std::env::set_var("INFLUXDB_TIMEOUT", "2500");
    std::env::set_var("INFLUXDB_MEASUREMENT_WINDOW_DAYS", "7");
    std::env::set_var("MCP_LISTEN_HOST", "127.0.0.1");
    std::env::set_var("MCP_LISTEN_PORT", "9090");

    let config = Config::default();
    assert_eq!(config.influxdb.host, "influx.internal");
    assert_eq!(config.influxdb.port, 8087);
    assert_eq!(config.influxdb.token, "secret-token");
    assert_eq!(config.influxdb.org, "acme");
    assert!(config.influxdb.use_ssl);
    assert!(!config.influxdb.verify_ssl);
    assert_eq!(config.influxdb.timeout_ms, 2500);
    assert_eq!(config.influxdb.measurement_window_days, 7);
    assert_eq!(config.mcp.host, "127.0.0.1");
    assert_eq!(config.mcp.port, 9090);
    assert_eq!(config.influxdb.url(), "https://influx.internal:8087");
    assert!(config.validate().is_ok());

    for name in ENV_VARS {
        std::env::remove_var(name);
    }
}

#[test]
fn test_validate_missing_token() {
    let config = Config {
        influxdb: InfluxConfig {
            token: "   ".to_string(),
            ..valid_influx_config()
        },
        ..Config::default()
    };
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("missing token"));
}

#[test]
fn test_validate_missing_organization() {
    let config = Config {
        influxdb: InfluxConfig {
            org: String::new(),
            ..valid_influx_config()
        },
        ..Config::default()
    };
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("missing organization"));
}

#[test]
fn test_validate_zero_port() {
    let config = Config {
        influxdb: InfluxConfig {
            port: 0,
            ..valid_influx_config()
        },
        ..Config::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_zero_timeout() {
    let config = Config {
        influxdb: InfluxConfig {
            timeout_ms: 0,
            ..valid_influx_config()
        },
        ..Config::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_accepts_complete_config() {
    let config = Config {
        influxdb: valid_influx_config(),
        ..Config::default()
    };
    assert!(config.validate().is_ok());
}

#[test]
fn test_url_scheme_follows_ssl_flag() {
    let mut influx = valid_influx_config();
    assert_eq!(influx.url(), "http://localhost:8086");

    influx.use_ssl = true;
    influx.host = "influx.example.com".to_string();
    influx.port = 443;
    assert_eq!(influx.url(), "https://influx.example.com:443");
}
