//! MCP Tool implementations

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use fluxgate_common::{
    influx::{InfluxClient, RangeQueryParams},
    Error, Result,
};

/// Names of every tool this server exposes, in catalog order
pub const TOOL_NAMES: [&str; 8] = [
    "test_connection",
    "list_buckets",
    "list_measurements",
    "execute_flux_query",
    "get_server_info",
    "get_measurement_schema",
    "get_recent_data",
    "query_data_range",
];

/// MCP Tool definition
#[derive(Debug, Clone, Serialize)]
pub struct McpTool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Registry of available tools
pub struct ToolRegistry {
    tools: HashMap<String, McpTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: McpTool) {
        self.tools.insert(tool.name.clone(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&McpTool> {
        self.tools.get(name)
    }

    pub fn list(&self) -> Vec<&McpTool> {
        self.tools.values().collect()
    }
}

/// Create the default tool registry with all available tools
pub fn create_tool_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(McpTool {
        name: "test_connection".to_string(),
        description: "Test the connection to InfluxDB and return status information."
            .to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {}
        }),
    });

    registry.register(McpTool {
        name: "list_buckets".to_string(),
        description: "List the buckets accessible to the configured organization.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {}
        }),
    });

    registry.register(McpTool {
        name: "list_measurements".to_string(),
        description: "List the measurements present in a bucket over the configured schema discovery window.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "required": ["bucket"],
            "properties": {
                "bucket": {
                    "type": "string",
                    "description": "Name of the bucket to inspect"
                }
            }
        }),
    });

    registry.register(McpTool {
        name: "execute_flux_query".to_string(),
        description: "Execute a read-only Flux query verbatim and return the decoded rows. The query is not rewritten or validated; InfluxDB reports syntax errors.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "required": ["query"],
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Flux query to execute"
                }
            }
        }),
    });

    registry.register(McpTool {
        name: "get_server_info".to_string(),
        description: "Get the server's resolved, non-secret InfluxDB connection parameters and capabilities.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {}
        }),
    });

    registry.register(McpTool {
        name: "get_measurement_schema".to_string(),
        description: "Get the schema (field keys, tag keys and tag values) of a measurement."
            .to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "required": ["bucket", "measurement"],
            "properties": {
                "bucket": {
                    "type": "string",
                    "description": "Name of the bucket containing the measurement"
                },
                "measurement": {
                    "type": "string",
                    "description": "Name of the measurement to describe"
                }
            }
        }),
    });

    registry.register(McpTool {
        name: "get_recent_data".to_string(),
        description: "Get the most recent rows of a measurement.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "required": ["bucket", "measurement"],
            "properties": {
                "bucket": {
                    "type": "string",
                    "description": "Name of the bucket containing the measurement"
                },
                "measurement": {
                    "type": "string",
                    "description": "Name of the measurement to read"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of rows to return (default: 100)",
                    "default": 100
                },
                "time_range": {
                    "type": "string",
                    "description": "How far back to look, as a Flux duration (default: \"-1h\")",
                    "default": "-1h"
                }
            }
        }),
    });

    registry.register(McpTool {
        name: "query_data_range".to_string(),
        description: "Query a measurement within a time range, with optional field, tag, and row-count filters.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "required": ["bucket", "measurement", "start_time"],
            "properties": {
                "bucket": {
                    "type": "string",
                    "description": "Name of the bucket to query"
                },
                "measurement": {
                    "type": "string",
                    "description": "Name of the measurement to query"
                },
                "start_time": {
                    "type": "string",
                    "description": "Range start: Flux duration (e.g. \"-1h\") or RFC3339 timestamp"
                },
                "end_time": {
                    "type": "string",
                    "description": "Range end (optional, same formats as start_time)"
                },
                "fields": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Restrict results to these field names"
                },
                "tags": {
                    "type": "object",
                    "additionalProperties": {"type": "string"},
                    "description": "Tag equality filters"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of rows to return"
                }
            }
        }),
    });

    registry
}

/// Execute a tool by name
pub async fn execute_tool(influx: &InfluxClient, tool_name: &str, params: Value) -> Result<Value> {
    match tool_name {
        "test_connection" => Ok(execute_test_connection(influx).await),
        "list_buckets" => execute_list_buckets(influx).await,
        "list_measurements" => execute_list_measurements(influx, params).await,
        "execute_flux_query" => execute_flux_query(influx, params).await,
        "get_server_info" => Ok(execute_get_server_info(influx)),
        "get_measurement_schema" => execute_get_measurement_schema(influx, params).await,
        "get_recent_data" => execute_get_recent_data(influx, params).await,
        "query_data_range" => execute_query_data_range(influx, params).await,
        _ => Err(Error::NotFound(format!("tool not found: {tool_name}"))),
    }
}

// ============================================================================
// Argument validation helpers
// ============================================================================

fn parse_params<T: serde::de::DeserializeOwned>(params: Value) -> Result<T> {
    serde_json::from_value(params).map_err(|e| Error::InvalidParameter(e.to_string()))
}

fn require_non_empty(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidParameter(format!(
            "{name} must be a non-empty string"
        )));
    }
    Ok(())
}

/// Accept Flux duration literals (`-1h`, `-30d`) and RFC3339 timestamps.
fn validate_time_expr(value: &str, name: &str) -> Result<()> {
    if is_duration_literal(value) || chrono::DateTime::parse_from_rfc3339(value).is_ok() {
        Ok(())
    } else {
        Err(Error::InvalidParameter(format!(
            "{name} must be a Flux duration (e.g. \"-1h\") or an RFC3339 timestamp"
        )))
    }
}

fn is_duration_literal(value: &str) -> bool {
    // Longer unit names first so "mo" and "ms" win over "m" and "s".
    const UNITS: [&str; 10] = ["mo", "ms", "ns", "us", "w", "d", "h", "m", "s", "y"];

    let mut rest = value.strip_prefix('-').unwrap_or(value);
    if rest.is_empty() {
        return false;
    }
    let mut matched = false;
    while !rest.is_empty() {
        let digits = rest.chars().take_while(char::is_ascii_digit).count();
        if digits == 0 {
            return false;
        }
        rest = &rest[digits..];
        match UNITS.iter().find(|unit| rest.starts_with(**unit)) {
            Some(unit) => {
                rest = &rest[unit.len()..];
                matched = true;
            }
            None => return false,
        }
    }
    matched
}

// ============================================================================
// Tool implementations
// ============================================================================

async fn execute_test_connection(influx: &InfluxClient) -> Value {
    let status = influx.test_connection().await;
    serde_json::json!({
        "status": status.status.to_string(),
        "health": status.health,
        "message": status.message,
        "url": status.url,
        "org": status.org,
    })
}

async fn execute_list_buckets(influx: &InfluxClient) -> Result<Value> {
    let buckets = influx.list_buckets().await?;

    let formatted: Vec<Value> = buckets
        .iter()
        .map(|b| {
            serde_json::json!({
                "name": b.name,
                "id": b.id,
            })
        })
        .collect();

    Ok(serde_json::json!({
        "count": formatted.len(),
        "buckets": formatted
    }))
}

#[derive(Debug, Deserialize)]
struct ListMeasurementsParams {
    bucket: String,
}

async fn execute_list_measurements(influx: &InfluxClient, params: Value) -> Result<Value> {
    let p: ListMeasurementsParams = parse_params(params)?;
    require_non_empty(&p.bucket, "bucket")?;

    let measurements = influx.list_measurements(&p.bucket).await?;

    Ok(serde_json::json!({
        "bucket": p.bucket,
        "count": measurements.len(),
        "measurements": measurements
    }))
}

#[derive(Debug, Deserialize)]
struct FluxQueryParams {
    query: String,
}

async fn execute_flux_query(influx: &InfluxClient, params: Value) -> Result<Value> {
    let p: FluxQueryParams = parse_params(params)?;
    require_non_empty(&p.query, "query")?;

    let records = influx.execute_query(&p.query).await?;

    Ok(serde_json::json!({
        "query": p.query,
        "record_count": records.len(),
        "records": records
    }))
}

fn execute_get_server_info(influx: &InfluxClient) -> Value {
    let info = influx.server_info();
    serde_json::json!({
        "server_name": "fluxgate-mcp",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Read-only MCP access to an InfluxDB v2 database",
        "influxdb": {
            "organization": info.organization,
            "host": info.host,
            "port": info.port,
            "ssl_enabled": info.ssl_enabled,
        },
        "capabilities": TOOL_NAMES,
    })
}

#[derive(Debug, Deserialize)]
struct MeasurementSchemaParams {
    bucket: String,
    measurement: String,
}

async fn execute_get_measurement_schema(influx: &InfluxClient, params: Value) -> Result<Value> {
    let p: MeasurementSchemaParams = parse_params(params)?;
    require_non_empty(&p.bucket, "bucket")?;
    require_non_empty(&p.measurement, "measurement")?;

    let fields = influx.list_fields(&p.bucket, &p.measurement).await?;
    let tags = influx.list_tags(&p.bucket, &p.measurement).await?;
    let field_count = fields.len();
    let tag_count = tags.len();

    Ok(serde_json::json!({
        "bucket": p.bucket,
        "measurement": p.measurement,
        "fields": fields,
        "tags": tags,
        "field_count": field_count,
        "tag_count": tag_count
    }))
}

#[derive(Debug, Deserialize)]
struct RecentDataParams {
    bucket: String,
    measurement: String,
    limit: Option<u32>,
    time_range: Option<String>,
}

async fn execute_get_recent_data(influx: &InfluxClient, params: Value) -> Result<Value> {
    let p: RecentDataParams = parse_params(params)?;
    require_non_empty(&p.bucket, "bucket")?;
    require_non_empty(&p.measurement, "measurement")?;

    let limit = p.limit.unwrap_or(100);
    if limit == 0 {
        return Err(Error::InvalidParameter(
            "limit must be a positive integer".to_string(),
        ));
    }
    let range = p.time_range.unwrap_or_else(|| "-1h".to_string());
    validate_time_expr(&range, "time_range")?;

    let records = influx
        .recent_data(&p.bucket, &p.measurement, limit, &range)
        .await?;

    Ok(serde_json::json!({
        "bucket": p.bucket,
        "measurement": p.measurement,
        "time_range": range,
        "limit": limit,
        "record_count": records.len(),
        "records": records
    }))
}

#[derive(Debug, Deserialize)]
struct QueryDataRangeParams {
    bucket: String,
    measurement: String,
    start_time: String,
    end_time: Option<String>,
    fields: Option<Vec<String>>,
    tags: Option<BTreeMap<String, String>>,
    limit: Option<u32>,
}

async fn execute_query_data_range(influx: &InfluxClient, params: Value) -> Result<Value> {
    let p: QueryDataRangeParams = parse_params(params)?;
    require_non_empty(&p.bucket, "bucket")?;
    require_non_empty(&p.measurement, "measurement")?;
    require_non_empty(&p.start_time, "start_time")?;
    validate_time_expr(&p.start_time, "start_time")?;
    if let Some(end) = &p.end_time {
        validate_time_expr(end, "end_time")?;
    }
    if let Some(fields) = &p.fields {
        for field in fields {
            require_non_empty(field, "fields entry")?;
        }
    }
    if let Some(tags) = &p.tags {
        for key in tags.keys() {
            require_non_empty(key, "tag key")?;
        }
    }
    if p.limit == Some(0) {
        return Err(Error::InvalidParameter(
            "limit must be a positive integer".to_string(),
        ));
    }

    let range_params = RangeQueryParams {
        bucket: p.bucket.clone(),
        measurement: p.measurement.clone(),
        start: p.start_time.clone(),
        stop: p.end_time.clone(),
        fields: p.fields.clone(),
        tags: p.tags.clone(),
        limit: p.limit,
    };

    let records = influx.query_data_range(&range_params).await?;

    Ok(serde_json::json!({
        "bucket": p.bucket,
        "measurement": p.measurement,
        "start_time": p.start_time,
        "end_time": p.end_time,
        "filters": {
            "fields": p.fields,
            "tags": p.tags,
            "limit": p.limit
        },
        "record_count": records.len(),
        "records": records
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluxgate_common::config::InfluxConfig;

    fn test_client() -> InfluxClient {
        let config = InfluxConfig {
            host: "localhost".to_string(),
            port: 8086,
            token: "super-secret-token".to_string(),
            org: "acme".to_string(),
            use_ssl: false,
            verify_ssl: true,
            timeout_ms: 10_000,
            measurement_window_days: 30,
        };
        InfluxClient::new(&config).unwrap()
    }

    #[test]
    fn test_tool_registry_new() {
        let registry = ToolRegistry::new();
        assert!(registry.list().is_empty());
    }

    #[test]
    fn test_tool_registry_register_and_get() {
        let mut registry = ToolRegistry::new();
        registry.register(McpTool {
            name: "test_tool".to_string(),
            description: "A test tool".to_string(),
            input_schema: serde_json::json!({}),
        });

        assert_eq!(registry.list().len(), 1);
        assert!(registry.get("test_tool").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn test_create_tool_registry() {
        let registry = create_tool_registry();
        assert_eq!(registry.list().len(), TOOL_NAMES.len());
        for name in TOOL_NAMES {
            assert!(registry.get(name).is_some(), "missing tool: {name}");
        }
    }

    #[test]
    fn test_unknown_tool_is_not_found() {
        let influx = test_client();
        let err = tokio_test::block_on(execute_tool(
            &influx,
            "drop_all_data",
            serde_json::json!({}),
        ))
        .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_empty_bucket_is_rejected_before_any_network_call() {
        let influx = test_client();
        let err = tokio_test::block_on(execute_tool(
            &influx,
            "list_measurements",
            serde_json::json!({"bucket": "  "}),
        ))
        .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
    }

    #[test]
    fn test_missing_query_param_is_invalid() {
        let influx = test_client();
        let err = tokio_test::block_on(execute_tool(
            &influx,
            "execute_flux_query",
            serde_json::json!({}),
        ))
        .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));

        let err = tokio_test::block_on(execute_tool(
            &influx,
            "execute_flux_query",
            serde_json::json!({"query": ""}),
        ))
        .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
    }

    #[test]
    fn test_recent_data_rejects_bad_arguments() {
        let influx = test_client();

        let err = tokio_test::block_on(execute_tool(
            &influx,
            "get_recent_data",
            serde_json::json!({"bucket": "metrics", "measurement": "cpu", "limit": 0}),
        ))
        .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));

        let err = tokio_test::block_on(execute_tool(
            &influx,
            "get_recent_data",
            serde_json::json!({"bucket": "metrics", "measurement": "cpu", "time_range": "yesterday"}),
        ))
        .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
    }

    #[test]
    fn test_query_data_range_rejects_bad_times() {
        let influx = test_client();
        let err = tokio_test::block_on(execute_tool(
            &influx,
            "query_data_range",
            serde_json::json!({
                "bucket": "metrics",
                "measurement": "cpu",
                "start_time": "not-a-time"
            }),
        ))
        .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
    }

    #[test]
    fn test_get_server_info_has_no_token() {
        let influx = test_client();
        let info = tokio_test::block_on(execute_tool(
            &influx,
            "get_server_info",
            serde_json::json!({}),
        ))
        .unwrap();

        let serialized = serde_json::to_string(&info).unwrap();
        assert!(!serialized.contains("super-secret-token"));
        assert_eq!(info["influxdb"]["organization"], "acme");
        assert_eq!(info["capabilities"].as_array().unwrap().len(), 8);
    }

    #[test]
    fn test_duration_literals() {
        assert!(is_duration_literal("-1h"));
        assert!(is_duration_literal("-30d"));
        assert!(is_duration_literal("-1h30m"));
        assert!(is_duration_literal("5m"));
        assert!(is_duration_literal("-1mo"));
        assert!(is_duration_literal("-500ms"));

        assert!(!is_duration_literal(""));
        assert!(!is_duration_literal("-"));
        assert!(!is_duration_literal("1"));
        assert!(!is_duration_literal("h"));
        assert!(!is_duration_literal("yesterday"));
        assert!(!is_duration_literal("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn test_time_expr_accepts_rfc3339() {
        assert!(validate_time_expr("2024-01-01T00:00:00Z", "start_time").is_ok());
        assert!(validate_time_expr("2024-01-01T00:00:00+02:00", "start_time").is_ok());
        assert!(validate_time_expr("-1h", "start_time").is_ok());
        assert!(validate_time_expr("january", "start_time").is_err());
    }
}
