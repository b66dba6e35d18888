//! OpenAPI specification generation and app factory.

use crate::{
    handlers::{get_metrics, health, mcp_delete, mcp_get, mcp_post, version},
    middleware::{McpMiddleware, MetricsMiddleware, RequestIdMiddleware},
    state::AppState,
};
use actix_web::App;
use paperclip::actix::{OpenApiExt, web};
use paperclip::v2::models::{DefaultApiRaw, Info};

/// Creates the OpenAPI specification for the REST side of the server
///
/// The MCP endpoint speaks JSON-RPC and is described here only in prose.
pub fn create_openapi_spec() -> DefaultApiRaw {
    DefaultApiRaw {
        info: Info {
            title: "FHIR MCP Server".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            description: Some(
                "Model Context Protocol server exposing a FHIR R4 REST API as tools for LLM clients.\n\n\
                ## MCP endpoint\n\
                JSON-RPC 2.0 messages are POSTed to the MCP path (default `/mcp`) using the \
                streamable HTTP transport in JSON response mode.\n\
                \n\
                **Headers:**\n\
                - `Mcp-Session-Id`: issued by `initialize`, required on every later request\n\
                - `MCP-Protocol-Version`: negotiated protocol revision\n\
                \n\
                `DELETE` on the MCP path terminates the session.\n\
                \n\
                ## Configuration\n\
                - `FHIR_BASE_URL`: upstream FHIR server\n\
                - `FHIR_AUTH_TOKEN`: optional bearer token sent upstream\n\
                - `PORT`: listening port (default 8080)".into(),
            ),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Creates the application with all routes and middleware
///
/// Used by `main` and by the integration tests so both exercise the same
/// wiring.
pub fn create_app(
    state: actix_web::web::Data<AppState>,
) -> App<
    impl actix_web::dev::ServiceFactory<
        actix_web::dev::ServiceRequest,
        Config = (),
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let mcp_path = state.server.mcp_path.clone();

    App::new()
        .wrap(RequestIdMiddleware)
        .wrap(MetricsMiddleware)
        .wrap(McpMiddleware)
        .app_data(state)
        .wrap_api_with_spec(create_openapi_spec())
        .service(web::resource("/api/health").route(web::get().to(health)))
        .service(web::resource("/api/version").route(web::get().to(version)))
        .service(web::resource("/api/metrics").route(web::get().to(get_metrics)))
        .with_json_spec_at("/api/spec/v2")
        .build()
        .service(
            actix_web::web::resource(mcp_path)
                .route(actix_web::web::post().to(mcp_post))
                .route(actix_web::web::get().to(mcp_get))
                .route(actix_web::web::delete().to(mcp_delete)),
        )
}
