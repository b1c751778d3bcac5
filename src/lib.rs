//! # smax
//!
//! Client and MCP (Model Context Protocol) server for the SMAX service
//! management REST API.
//!
//! The library wraps token authentication, entity queries and bulk
//! mutations. The binary exposes the same operations as MCP tools so AI
//! assistants can work with SMAX records through natural language.
//!
//! ## Architecture
//!
//! - [`config`] - Configuration loading from environment variables
//! - [`error`] - Error types with secret redaction
//! - [`smax_client`] - HTTP client for the SMAX REST API
//! - [`models`] - Query parameters, bulk payloads and response types
//! - [`server`] - MCP server implementation with tool routing
//! - [`tools`] - Tool input parameter structs
//!
//! ## Configuration
//!
//! - `SMAX_BASE_URL`: Base URL of the SMAX instance
//! - `SMAX_TENANT_ID`: Tenant identifier
//! - `SMAX_USERNAME` / `SMAX_PASSWORD`: Login credentials
//!
//! Optional:
//! - `SMAX_ACCEPT_INVALID_CERTS`: `false` to enforce TLS certificate checks
//!   (they are skipped by default)
//! - `SMAX_TIMEOUT_SECS`: Per-request timeout (default 10)
//! - `RUST_LOG`: Log level (e.g., `smax=debug`)
//!
//! ## Error model
//!
//! Authentication problems, validation failures and a persistent 401 are
//! returned as [`SmaxError`](error::SmaxError). Other error statuses and
//! transport failures are logged and returned as data in
//! [`ApiResponse`](models::ApiResponse).
//!
//! ## Example
//!
//! ```ignore
//! use smax::config::Config;
//! use smax::models::{BulkOperation, QueryParams};
//! use smax::smax_client::SmaxClient;
//!
//! async fn example() -> Result<(), smax::error::SmaxError> {
//!     let config = Config::from_env()?;
//!     let client = SmaxClient::connect(&config).await?;
//!
//!     let params = QueryParams::new()
//!         .with_layout("Id,DisplayLabel")
//!         .with_filter("Priority = 'HighPriority'")
//!         .with_size(10);
//!
//!     if let Some(body) = client.query_entities("Request", params).await?.into_data() {
//!         println!("{}", body);
//!     }
//!
//!     client
//!         .bulk_operation(
//!             BulkOperation::Update,
//!             Some(vec![serde_json::json!({
//!                 "entity_type": "Request",
//!                 "properties": {"Id": "1001", "Priority": "LowPriority"}
//!             })]),
//!             None,
//!         )
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod error;
pub mod models;
pub mod server;
pub mod smax_client;
pub mod tools;
