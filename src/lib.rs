//! FHIR MCP Server - a Model Context Protocol server in front of a FHIR R4 API
//!
//! MCP clients (LLM hosts) connect over the streamable HTTP transport and call
//! tools that search and read clinical, administrative and insurance resources
//! on an upstream FHIR server. Additional tools download and extract text from
//! PDF documents referenced by `DocumentReference` resources and query a public
//! pharmacy catalogue.
//!
//! ## Architecture
//!
//! - `config/` - Configuration structures and environment loading
//! - `models/` - REST responses, the JSON-RPC envelope and MCP payloads
//! - `services/` - Resilient HTTP client, FHIR client, tools and sessions
//! - `handlers/` - MCP transport and REST endpoints, plus the app factory
//! - `middleware/` - Request IDs, metrics, and MCP header extraction
//! - `telemetry` - Tracing setup and log redaction
//!
//! ## Quick Start
//!
//! ```no_run
//! use actix_web::{HttpServer, web};
//! use fhir_mcp_server::{AppState, create_app};
//!
//! #[actix_web::main]
//! async fn main() -> std::io::Result<()> {
//!     let state = web::Data::new(AppState::from_env().map_err(std::io::Error::other)?);
//!     HttpServer::new(move || create_app(state.clone()))
//!         .bind(("0.0.0.0", 8080))?
//!         .run()
//!         .await
//! }
//! ```

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod state;
pub mod telemetry;

pub use config::{ConfigError, FhirConfig, MedicineSearchConfig, MetricsConfig, ServerConfig};
pub use handlers::{
    McpError, create_app, create_openapi_spec, get_metrics, health, mcp_delete, mcp_get, mcp_post,
    version,
};
pub use middleware::{McpMiddleware, MetricsMiddleware, RequestIdMiddleware, extract_mcp_context};
pub use models::{HealthResponse, VersionResponse};
pub use services::{
    AppMetrics, FhirClient, ResilientClient, ResilientClientConfig, ResilientClientError,
    ResilientClientMetrics, SessionStore, ToolError, ToolExecutor,
};
pub use state::AppState;
pub use telemetry::{TelemetryConfig, init_tracing};
