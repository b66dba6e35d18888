use actix_web::{HttpServer, web};
use fhir_mcp_server::{AppState, TelemetryConfig, create_app, init_tracing};
use std::io;

#[actix_web::main]
async fn main() -> io::Result<()> {
    let telemetry = TelemetryConfig::from_env();
    init_tracing(&telemetry).map_err(io::Error::other)?;

    let state = AppState::from_env().map_err(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        io::Error::other(e)
    })?;

    let (host, port) = state.server.bind_address();
    tracing::info!(
        host = %host,
        port,
        mcp_path = %state.server.mcp_path,
        stateless = state.server.stateless,
        fhir_base_url = %state.fhir.base_url(),
        "Starting FHIR MCP server"
    );

    let state = web::Data::new(state);
    HttpServer::new(move || create_app(state.clone()))
        .bind((host, port))?
        .run()
        .await
}
