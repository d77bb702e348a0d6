//! InfluxDB v2 client wrapper for Fluxgate
//!
//! Sole owner of the connection to the store. All access goes through
//! [`InfluxClient`]; Flux query text is passed through verbatim and results
//! are decoded from the annotated CSV wire format into JSON-safe rows.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::{
    config::InfluxConfig,
    error::{Error, Result},
    types::{Bucket, ConnectionState, ConnectionStatus, FluxRow, ServerInfo},
};

/// InfluxDB v2 client wrapper with a shared connection pool
#[derive(Clone)]
pub struct InfluxClient {
    http: reqwest::Client,
    base_url: String,
    config: InfluxConfig,
}

impl InfluxClient {
    /// Create a new InfluxDB client from configuration.
    ///
    /// Builds the underlying HTTP client once; clones share its pool. The
    /// configured timeout applies to every request. No network contact
    /// happens here.
    pub fn new(config: &InfluxConfig) -> Result<Self> {
        let mut builder =
            reqwest::Client::builder().timeout(Duration::from_millis(config.timeout_ms));

        if !config.verify_ssl {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let http = builder
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.url(),
            config: config.clone(),
        })
    }

    fn auth_header(&self) -> String {
        format!("Token {}", self.config.token)
    }

    fn transport_error(&self, err: &reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Upstream(format!(
                "request timed out after {}ms: {err}",
                self.config.timeout_ms
            ))
        } else {
            Error::Upstream(err.to_string())
        }
    }

    /// Probe store connectivity. Never fails: an unreachable store is
    /// reported as a structured error payload.
    #[instrument(skip(self))]
    pub async fn test_connection(&self) -> ConnectionStatus {
        match self.health().await {
            Ok(health) => ConnectionStatus {
                status: ConnectionState::Connected,
                health: Some(health.status),
                message: health
                    .message
                    .unwrap_or_else(|| "connection successful".to_string()),
                url: self.base_url.clone(),
                org: self.config.org.clone(),
            },
            Err(e) => ConnectionStatus {
                status: ConnectionState::Error,
                health: None,
                message: e.to_string(),
                url: self.base_url.clone(),
                org: self.config.org.clone(),
            },
        }
    }

    async fn health(&self) -> Result<HealthBody> {
        let resp = self
            .http
            .get(format!("{}/health", self.base_url))
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;

        if !resp.status().is_success() {
            return Err(Error::Upstream(upstream_message(resp).await));
        }

        resp.json::<HealthBody>()
            .await
            .map_err(|e| Error::Upstream(format!("malformed health response: {e}")))
    }

    /// List buckets accessible to the configured organization
    #[instrument(skip(self))]
    pub async fn list_buckets(&self) -> Result<Vec<Bucket>> {
        #[derive(Deserialize)]
        struct BucketsBody {
            buckets: Vec<BucketEntry>,
        }

        #[derive(Deserialize)]
        struct BucketEntry {
            id: String,
            name: String,
        }

        let resp = self
            .http
            .get(format!("{}/api/v2/buckets", self.base_url))
            .header("Authorization", self.auth_header())
            .query(&[("org", self.config.org.as_str()), ("limit", "100")])
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;

        if !resp.status().is_success() {
            return Err(Error::Upstream(format!(
                "bucket listing failed: {}",
                upstream_message(resp).await
            )));
        }

        let body: BucketsBody = resp
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("malformed bucket listing: {e}")))?;

        let buckets: Vec<Bucket> = body
            .buckets
            .into_iter()
            .map(|b| Bucket {
                name: b.name,
                id: b.id,
            })
            .collect();

        debug!(count = buckets.len(), "Listed buckets");
        Ok(buckets)
    }

    /// Execute a Flux query verbatim and decode the response into rows.
    ///
    /// The query is not parsed, rewritten, or validated here; the store is
    /// solely responsible for rejecting malformed Flux. Every failure mode
    /// (syntax error, timeout, permission denial, connectivity) surfaces as
    /// [`Error::Upstream`] with the store's message attached.
    #[instrument(skip(self, query))]
    pub async fn execute_query(&self, query: &str) -> Result<Vec<FluxRow>> {
        let body = serde_json::json!({
            "query": query,
            "type": "flux",
            "dialect": {
                "header": true,
                "delimiter": ",",
                "annotations": ["datatype", "group", "default"],
            },
        });

        let resp = self
            .http
            .post(format!("{}/api/v2/query", self.base_url))
            .header("Authorization", self.auth_header())
            .header("Accept", "application/csv")
            .query(&[("org", self.config.org.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;

        if !resp.status().is_success() {
            return Err(Error::Upstream(format!(
                "query failed: {}",
                upstream_message(resp).await
            )));
        }

        let text = resp.text().await.map_err(|e| self.transport_error(&e))?;

        let rows = decode_annotated_csv(&text);
        debug!(count = rows.len(), "Query returned rows");
        Ok(rows)
    }

    /// List measurements in a bucket over the configured discovery window
    #[instrument(skip(self))]
    pub async fn list_measurements(&self, bucket: &str) -> Result<Vec<String>> {
        let flux = measurements_query(bucket, self.config.measurement_window_days);
        let rows = self
            .execute_query(&flux)
            .await
            .map_err(|e| map_missing_bucket(bucket, e))?;
        Ok(collect_string_values(&rows))
    }

    /// List field keys of a measurement
    #[instrument(skip(self))]
    pub async fn list_fields(&self, bucket: &str, measurement: &str) -> Result<Vec<String>> {
        let flux = field_keys_query(bucket, measurement, self.config.measurement_window_days);
        let rows = self
            .execute_query(&flux)
            .await
            .map_err(|e| map_missing_bucket(bucket, e))?;
        Ok(collect_string_values(&rows))
    }

    /// List tag keys of a measurement together with their values.
    ///
    /// Internal columns (keys beginning with `_`) are excluded. A tag whose
    /// values cannot be fetched maps to an empty list instead of failing
    /// the whole call.
    #[instrument(skip(self))]
    pub async fn list_tags(
        &self,
        bucket: &str,
        measurement: &str,
    ) -> Result<BTreeMap<String, Vec<String>>> {
        let window = self.config.measurement_window_days;
        let flux = tag_keys_query(bucket, measurement, window);
        let rows = self
            .execute_query(&flux)
            .await
            .map_err(|e| map_missing_bucket(bucket, e))?;

        let keys: Vec<String> = collect_string_values(&rows)
            .into_iter()
            .filter(|k| !k.starts_with('_'))
            .collect();

        let mut tags = BTreeMap::new();
        for key in keys {
            let values_flux = tag_values_query(bucket, measurement, &key, window);
            let values = match self.execute_query(&values_flux).await {
                Ok(value_rows) => collect_string_values(&value_rows),
                Err(e) => {
                    warn!(tag = %key, error = %e, "Failed to fetch tag values");
                    Vec::new()
                }
            };
            tags.insert(key, values);
        }
        Ok(tags)
    }

    /// Fetch the most recent rows of a measurement
    #[instrument(skip(self))]
    pub async fn recent_data(
        &self,
        bucket: &str,
        measurement: &str,
        limit: u32,
        range: &str,
    ) -> Result<Vec<FluxRow>> {
        let flux = recent_data_query(bucket, measurement, limit, range);
        self.execute_query(&flux)
            .await
            .map_err(|e| map_missing_bucket(bucket, e))
    }

    /// Query a measurement within a time range with optional filters
    #[instrument(skip(self, params))]
    pub async fn query_data_range(&self, params: &RangeQueryParams) -> Result<Vec<FluxRow>> {
        let flux = range_query(params);
        self.execute_query(&flux)
            .await
            .map_err(|e| map_missing_bucket(&params.bucket, e))
    }

    /// Resolved non-secret connection parameters. Never includes the token.
    pub fn server_info(&self) -> ServerInfo {
        ServerInfo {
            organization: self.config.org.clone(),
            host: self.config.host.clone(),
            port: self.config.port,
            ssl_enabled: self.config.use_ssl,
        }
    }
}

#[derive(Deserialize)]
struct HealthBody {
    status: String,
    #[serde(default)]
    message: Option<String>,
}

/// Extract the upstream error message from a failed response, falling back
/// to the raw body when it is not the usual `{code, message}` JSON shape.
async fn upstream_message(resp: reqwest::Response) -> String {
    #[derive(Deserialize)]
    struct ApiError {
        message: String,
    }

    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiError>(&body)
        .map(|e| e.message)
        .unwrap_or(body);
    format!("HTTP {status}: {message}")
}

/// Translate the store's unknown-bucket failure signature into `NotFound`.
/// Every other failure stays `Upstream`.
fn map_missing_bucket(bucket: &str, err: Error) -> Error {
    match err {
        Error::Upstream(message) if is_unknown_bucket(&message) => {
            Error::NotFound(format!("bucket not found: {bucket}"))
        }
        other => other,
    }
}

pub(crate) fn is_unknown_bucket(message: &str) -> bool {
    let m = message.to_lowercase();
    m.contains("could not find bucket") || m.contains("bucket not found")
}

/// Parameters for a bounded range query
#[derive(Debug, Clone)]
pub struct RangeQueryParams {
    /// Bucket to query
    pub bucket: String,
    /// Measurement to filter on
    pub measurement: String,
    /// Range start: a Flux duration literal or RFC3339 timestamp
    pub start: String,
    /// Optional range stop
    pub stop: Option<String>,
    /// Optional field names; matched as a disjunction
    pub fields: Option<Vec<String>>,
    /// Optional tag equality filters
    pub tags: Option<BTreeMap<String, String>>,
    /// Optional row limit
    pub limit: Option<u32>,
}

// ============================================================================
// Flux query construction
// ============================================================================

/// Escape a string for interpolation into a double-quoted Flux literal
pub fn escape_flux_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Flux pipeline listing measurements in a bucket over a bounded window
pub fn measurements_query(bucket: &str, window_days: u32) -> String {
    format!(
        "import \"influxdata/influxdb/schema\"\n\nschema.measurements(bucket: \"{}\", start: -{window_days}d)",
        escape_flux_string(bucket)
    )
}

/// Flux pipeline listing field keys of a measurement
pub fn field_keys_query(bucket: &str, measurement: &str, window_days: u32) -> String {
    format!(
        "import \"influxdata/influxdb/schema\"\n\nschema.fieldKeys(bucket: \"{}\", predicate: (r) => r._measurement == \"{}\", start: -{window_days}d)",
        escape_flux_string(bucket),
        escape_flux_string(measurement)
    )
}

/// Flux pipeline listing tag keys of a measurement
pub fn tag_keys_query(bucket: &str, measurement: &str, window_days: u32) -> String {
    format!(
        "import \"influxdata/influxdb/schema\"\n\nschema.tagKeys(bucket: \"{}\", predicate: (r) => r._measurement == \"{}\", start: -{window_days}d)",
        escape_flux_string(bucket),
        escape_flux_string(measurement)
    )
}

/// Flux pipeline listing the values of one tag key
pub fn tag_values_query(bucket: &str, measurement: &str, tag: &str, window_days: u32) -> String {
    format!(
        "import \"influxdata/influxdb/schema\"\n\nschema.tagValues(bucket: \"{}\", tag: \"{}\", predicate: (r) => r._measurement == \"{}\", start: -{window_days}d)",
        escape_flux_string(bucket),
        escape_flux_string(tag),
        escape_flux_string(measurement)
    )
}

/// Flux pipeline fetching the newest rows of a measurement
pub fn recent_data_query(bucket: &str, measurement: &str, limit: u32, range: &str) -> String {
    format!(
        "from(bucket: \"{}\")\n    |> range(start: {range})\n    |> filter(fn: (r) => r._measurement == \"{}\")\n    |> sort(columns: [\"_time\"], desc: true)\n    |> limit(n: {limit})",
        escape_flux_string(bucket),
        escape_flux_string(measurement)
    )
}

/// Flux pipeline for a range query with optional field, tag, and limit clauses
pub fn range_query(params: &RangeQueryParams) -> String {
    let mut range = format!("range(start: {}", params.start);
    if let Some(stop) = &params.stop {
        range.push_str(&format!(", stop: {stop}"));
    }
    range.push(')');

    let mut filters = vec![format!(
        "r._measurement == \"{}\"",
        escape_flux_string(&params.measurement)
    )];

    if let Some(fields) = &params.fields {
        if !fields.is_empty() {
            let clauses: Vec<String> = fields
                .iter()
                .map(|f| format!("r._field == \"{}\"", escape_flux_string(f)))
                .collect();
            filters.push(format!("({})", clauses.join(" or ")));
        }
    }

    if let Some(tags) = &params.tags {
        for (key, value) in tags {
            filters.push(format!(
                "r[\"{}\"] == \"{}\"",
                escape_flux_string(key),
                escape_flux_string(value)
            ));
        }
    }

    let mut query = format!(
        "from(bucket: \"{}\")\n    |> {range}\n    |> filter(fn: (r) => {})\n    |> sort(columns: [\"_time\"], desc: true)",
        escape_flux_string(&params.bucket),
        filters.join(" and ")
    );

    if let Some(limit) = params.limit {
        query.push_str(&format!("\n    |> limit(n: {limit})"));
    }

    query
}

// ============================================================================
// Annotated CSV decoding
// ============================================================================

/// Decode an annotated CSV query response into ordered rows.
///
/// The leading annotation column and the `result`/`table` bookkeeping
/// columns are dropped. Cell values are typed according to the `#datatype`
/// annotation; doubles that are NaN or infinite become JSON null, since the
/// external transport cannot represent them.
pub fn decode_annotated_csv(body: &str) -> Vec<FluxRow> {
    let mut rows = Vec::new();
    let mut datatypes: Vec<String> = Vec::new();
    let mut header: Option<Vec<String>> = None;

    for record in split_csv_records(body) {
        if record.iter().all(String::is_empty) {
            // Table boundary: the next table carries its own annotations.
            datatypes.clear();
            header = None;
            continue;
        }

        let first = record.first().cloned().unwrap_or_default();
        if first == "#datatype" {
            datatypes = record;
            continue;
        }
        if first.starts_with('#') {
            continue;
        }

        if let Some(names) = &header {
            let mut row = FluxRow::new();
            for (i, name) in names.iter().enumerate() {
                if name.is_empty() || name == "result" || name == "table" {
                    continue;
                }
                let raw = record.get(i).map_or("", String::as_str);
                row.insert(name.clone(), typed_value(raw, datatypes.get(i).map(String::as_str)));
            }
            if !row.is_empty() {
                rows.push(row);
            }
        } else {
            header = Some(record);
        }
    }

    rows
}

fn typed_value(raw: &str, datatype: Option<&str>) -> Value {
    match datatype {
        Some("double") => {
            if raw.is_empty() {
                return Value::Null;
            }
            match raw.parse::<f64>() {
                Ok(v) => serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number),
                Err(_) => Value::String(raw.to_string()),
            }
        }
        Some("long") => {
            if raw.is_empty() {
                return Value::Null;
            }
            raw.parse::<i64>()
                .map_or_else(|_| Value::String(raw.to_string()), |v| Value::Number(v.into()))
        }
        Some("unsignedLong") => {
            if raw.is_empty() {
                return Value::Null;
            }
            raw.parse::<u64>()
                .map_or_else(|_| Value::String(raw.to_string()), |v| Value::Number(v.into()))
        }
        Some("boolean") => match raw {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            "" => Value::Null,
            other => Value::String(other.to_string()),
        },
        // Timestamps (dateTime:RFC3339) and everything else stay verbatim strings.
        _ => Value::String(raw.to_string()),
    }
}

/// Split a CSV body into records, honoring quoted fields.
///
/// Quoted fields may contain commas, escaped quotes (`""`), and newlines,
/// so splitting on line breaks alone is not safe.
fn split_csv_records(input: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
        } else {
            match c {
                '"' => in_quotes = true,
                ',' => record.push(std::mem::take(&mut field)),
                '\r' => {}
                '\n' => {
                    record.push(std::mem::take(&mut field));
                    records.push(std::mem::take(&mut record));
                }
                _ => field.push(c),
            }
        }
    }

    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }

    records
}

/// Collect the `_value` column of schema-discovery rows, sorted and deduplicated
pub fn collect_string_values(rows: &[FluxRow]) -> Vec<String> {
    let mut values: Vec<String> = rows
        .iter()
        .filter_map(|row| row.get("_value").and_then(Value::as_str))
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
        .collect();
    values.sort();
    values.dedup();
    values
}
