//! Fluxgate MCP Server
//!
//! Model Context Protocol server providing read-only access to an InfluxDB
//! v2 database for language-model agents.

mod resources;
mod server;
mod tools;

use std::net::SocketAddr;

use tracing::{error, info};

use fluxgate_common::{influx::InfluxClient, types::ConnectionState, Config};

use server::McpServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fluxgate_mcp=debug".parse().unwrap())
                .add_directive("tower_http=debug".parse().unwrap()),
        )
        .json()
        .init();

    info!("Starting Fluxgate MCP server");

    // Load configuration. A missing token or organization is fatal: the
    // process refuses to serve before binding any listener.
    let config = Config::load()?;
    config.validate()?;
    info!(
        influxdb_url = %config.influxdb.url(),
        org = %config.influxdb.org,
        mcp_port = config.mcp.port,
        "Configuration loaded"
    );

    // Create InfluxDB client
    let influx = InfluxClient::new(&config.influxdb)?;

    // Check connectivity. A failed probe is logged but not fatal;
    // individual operations report their own errors.
    let probe = influx.test_connection().await;
    if probe.status == ConnectionState::Connected {
        info!("InfluxDB connection established");
    } else {
        error!(message = %probe.message, "InfluxDB connection failed - continuing anyway");
    }

    // Create and run MCP server
    let server = McpServer::new(influx);

    let addr = SocketAddr::new(
        config.mcp.host.parse().unwrap_or([0, 0, 0, 0].into()),
        config.mcp.port,
    );

    info!(address = %addr, "Fluxgate MCP server listening");
    server.run(addr).await?;

    info!("Fluxgate MCP server stopped");
    Ok(())
}
