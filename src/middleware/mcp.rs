//! Model Context Protocol (MCP) transport header middleware.
//!
//! Streamable HTTP clients identify their session and negotiated protocol
//! revision through headers. This middleware lifts them into an
//! [`McpRequestContext`] stored in the request extensions so handlers and log
//! lines can use them without re-parsing headers.

use crate::models::{McpRequestContext, PROTOCOL_VERSION_HEADER, SESSION_ID_HEADER};
use actix_web::{
    Error, HttpMessage,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::header::HeaderMap,
};
use std::{
    future::{Ready, ready},
    pin::Pin,
    rc::Rc,
};

/// MCP middleware factory
pub struct McpMiddleware;

impl<S, B> Transform<S, ServiceRequest> for McpMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = McpMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(McpMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct McpMiddlewareService<S> {
    service: Rc<S>,
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl<S, B> Service<ServiceRequest> for McpMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();

        Box::pin(async move {
            let headers = req.headers();
            let session_id = header_string(headers, SESSION_ID_HEADER);
            let protocol_version = header_string(headers, PROTOCOL_VERSION_HEADER);

            if session_id.is_some() || protocol_version.is_some() {
                tracing::debug!(
                    session_id = ?session_id,
                    protocol_version = ?protocol_version,
                    "MCP transport headers present"
                );
                req.extensions_mut()
                    .insert(McpRequestContext::from_headers(session_id, protocol_version));
            } else {
                tracing::trace!("Request without MCP transport headers");
            }

            service.call(req).await
        })
    }
}

/// Context stored by [`McpMiddleware`], if the request carried MCP headers
pub fn extract_mcp_context(req: &actix_web::HttpRequest) -> Option<McpRequestContext> {
    req.extensions().get::<McpRequestContext>().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, HttpRequest, HttpResponse, test, web};

    async fn echo_context(req: HttpRequest) -> HttpResponse {
        match extract_mcp_context(&req) {
            Some(ctx) => HttpResponse::Ok().json(serde_json::json!({
                "session_id": ctx.session_id,
                "protocol_version": ctx.protocol_version,
            })),
            None => HttpResponse::Ok().json(serde_json::json!({"context": null})),
        }
    }

    #[actix_web::test]
    async fn test_without_headers() {
        let app = test::init_service(
            App::new()
                .wrap(McpMiddleware)
                .route("/mcp", web::post().to(echo_context)),
        )
        .await;

        let req = test::TestRequest::post().uri("/mcp").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert!(body["context"].is_null());
    }

    #[actix_web::test]
    async fn test_extracts_session_and_protocol() {
        let app = test::init_service(
            App::new()
                .wrap(McpMiddleware)
                .route("/mcp", web::post().to(echo_context)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/mcp")
            .insert_header(("Mcp-Session-Id", "abc123"))
            .insert_header(("MCP-Protocol-Version", "2025-06-18"))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["session_id"], "abc123");
        assert_eq!(body["protocol_version"], "2025-06-18");
    }

    #[actix_web::test]
    async fn test_blank_header_ignored() {
        let app = test::init_service(
            App::new()
                .wrap(McpMiddleware)
                .route("/mcp", web::post().to(echo_context)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/mcp")
            .insert_header(("mcp-session-id", "  "))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert!(body["context"].is_null());
    }
}
