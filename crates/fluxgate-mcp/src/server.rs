//! MCP Server implementation

use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

use fluxgate_common::{influx::InfluxClient, types::ConnectionState};

use crate::resources::{self, ResourceCatalog};
use crate::tools::{self, McpTool, ToolRegistry};

/// MCP Server state
pub struct McpServer {
    influx: InfluxClient,
    tools: ToolRegistry,
    resources: ResourceCatalog,
}

impl McpServer {
    pub fn new(influx: InfluxClient) -> Self {
        Self {
            influx,
            tools: tools::create_tool_registry(),
            resources: resources::create_resource_catalog(),
        }
    }

    pub async fn run(self, addr: SocketAddr) -> anyhow::Result<()> {
        let state = Arc::new(AppState {
            influx: self.influx,
            tools: self.tools,
            resources: self.resources,
        });

        let app = Router::new()
            .route("/health", get(health_handler))
            .route("/ping", get(ping_handler))
            .route("/mcp", post(mcp_handler))
            .route("/tools", get(list_tools_handler))
            .route("/resources", get(list_resources_handler))
            .route("/resources/{slug}", get(read_resource_handler))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(state);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }
}

struct AppState {
    influx: InfluxClient,
    tools: ToolRegistry,
    resources: ResourceCatalog,
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");
    info!("Shutdown signal received");
}

// ============================================================================
// Handlers
// ============================================================================

/// Side-channel status probe for process supervisors. Plain HTTP GET, no
/// MCP framing.
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let probe = state.influx.test_connection().await;
    if probe.status == ConnectionState::Connected {
        (
            StatusCode::OK,
            Json(serde_json::json!({"status": "healthy", "influxdb_status": "connected"})),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"status": "unhealthy", "influxdb_status": "error"})),
        )
    }
}

async fn ping_handler() -> impl IntoResponse {
    Json(serde_json::json!({"pong": true}))
}

/// List available MCP tools
async fn list_tools_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let tools: Vec<&McpTool> = state.tools.list();
    Json(serde_json::json!({
        "tools": tools
    }))
}

/// List the static Flux query resources
async fn list_resources_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "resources": state.resources.list()
    }))
}

/// Read one static resource by slug or full URI
async fn read_resource_handler(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> impl IntoResponse {
    match state.resources.get(&slug) {
        Some(resource) => (StatusCode::OK, Json(serde_json::json!(resource))),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "error": format!("resource not found: {slug}"),
                "error_kind": "not_found"
            })),
        ),
    }
}

/// Main MCP endpoint for tool invocation
async fn mcp_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<McpRequest>,
) -> impl IntoResponse {
    info!(tool = %request.tool, "MCP tool invocation");

    match tools::execute_tool(&state.influx, &request.tool, request.params).await {
        Ok(result) => (
            StatusCode::OK,
            Json(McpResponse {
                success: true,
                data: Some(result),
                error: None,
                error_kind: None,
            }),
        ),
        Err(e) => {
            error!(tool = %request.tool, error = %e, "Tool execution failed");
            (
                StatusCode::OK,
                Json(McpResponse {
                    success: false,
                    data: None,
                    error: Some(e.to_string()),
                    error_kind: Some(e.kind()),
                }),
            )
        }
    }
}

#[derive(Debug, Deserialize)]
struct McpRequest {
    tool: String,
    #[serde(default)]
    params: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct McpResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_kind: Option<&'static str>,
}
