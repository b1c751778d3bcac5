//! smax - MCP server for SMAX
//!
//! This binary runs as an MCP server using stdio transport, exposing SMAX
//! entity queries and bulk operations as tools.
//!
//! # Configuration
//!
//! Set the following environment variables (or use a `.env` file):
//!
//! - `SMAX_BASE_URL`: Base URL of the SMAX instance
//! - `SMAX_TENANT_ID`: Tenant identifier
//! - `SMAX_USERNAME`: Login name
//! - `SMAX_PASSWORD`: Password
//!
//! # Usage
//!
//! ```bash
//! SMAX_BASE_URL=https://smax.example.com SMAX_TENANT_ID=100000002 \
//!   SMAX_USERNAME=bob SMAX_PASSWORD=secret ./smax
//! ```

use anyhow::{Context, Result};
use rmcp::{transport::stdio, ServiceExt};
use tracing_subscriber::{fmt, EnvFilter};

use smax::{config, server, smax_client};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (ignore errors if not found)
    dotenvy::dotenv().ok();

    // stdout is reserved for MCP JSON-RPC messages
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("smax=info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    tracing::info!("Starting SMAX MCP server v{}", env!("CARGO_PKG_VERSION"));

    let config = config::Config::from_env().context("Failed to load configuration")?;

    tracing::debug!(
        base_url = %config.base_url,
        tenant_id = %config.tenant_id,
        "Configuration loaded"
    );

    let smax_client =
        smax_client::SmaxClient::new(&config).context("Failed to create SMAX client")?;

    tracing::info!("Authenticating with SMAX...");
    if let Err(e) = smax_client.authenticate().await {
        let message = smax_client.sanitize(&e.to_string()).await;
        tracing::error!(error = %message, "Initial authentication failed");
        // Tools retry the login on their first call.
        tracing::warn!(
            "Server will start but may not be able to reach SMAX. \
             Check SMAX_BASE_URL, SMAX_TENANT_ID and credentials."
        );
    }

    let server = server::SmaxServer::new(smax_client);

    tracing::info!("Server initialized, starting stdio transport");

    let service = server
        .serve(stdio())
        .await
        .inspect_err(|e| {
            tracing::error!("serving error: {:?}", e);
        })
        .context("Failed to start server")?;

    tracing::info!("Server running, waiting for requests");

    service
        .waiting()
        .await
        .context("Server error during operation")?;

    tracing::info!("Server shutting down");

    Ok(())
}
