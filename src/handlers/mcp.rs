//! MCP streamable HTTP endpoint (JSON response mode).
//!
//! Every client message is a single JSON-RPC object POSTed to the MCP path;
//! responses are returned directly as `application/json`. Sessions are issued
//! on `initialize` and terminated with `DELETE`.

use crate::{
    middleware::extract_mcp_context,
    models::{
        CallToolParams, Implementation, InitializeParams, InitializeResult, JsonRpcError,
        JsonRpcMessage, JsonRpcResponse, ListToolsResult, McpRequestContext,
        PROTOCOL_VERSION_HEADER, RequestId, SESSION_ID_HEADER, ServerCapabilities,
        is_supported_protocol_version, jsonrpc::{JSONRPC_VERSION, codes},
        negotiate_protocol_version,
    },
    services::ToolError,
    state::{AppState, SERVER_INSTRUCTIONS},
};
use actix_web::{
    Error, HttpRequest, HttpResponse, ResponseError,
    http::{StatusCode, header},
    web,
};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

/// JSON-RPC error paired with the HTTP status it is sent with
#[derive(Debug, thiserror::Error)]
#[error("{} ({})", .error.message, .status)]
pub struct McpError {
    pub status: StatusCode,
    pub id: Option<RequestId>,
    pub error: JsonRpcError,
}

impl McpError {
    pub fn new(status: StatusCode, id: Option<RequestId>, error: JsonRpcError) -> Self {
        Self { status, id, error }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            None,
            JsonRpcError::invalid_request(message),
        )
    }
}

impl ResponseError for McpError {
    fn status_code(&self) -> StatusCode {
        self.status
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status)
            .json(JsonRpcResponse::failure(self.id.clone(), self.error.clone()))
    }
}

fn header_str<'a>(req: &'a HttpRequest, name: header::HeaderName) -> Option<&'a str> {
    req.headers().get(name).and_then(|v| v.to_str().ok())
}

fn request_context(req: &HttpRequest) -> McpRequestContext {
    extract_mcp_context(req).unwrap_or_else(|| {
        let get = |name: &str| {
            req.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        McpRequestContext::from_headers(get(SESSION_ID_HEADER), get(PROTOCOL_VERSION_HEADER))
    })
}

/// Reject bodies that are not JSON and clients that cannot accept JSON
fn check_media_types(req: &HttpRequest) -> Result<(), McpError> {
    let is_json = header_str(req, header::CONTENT_TYPE)
        .and_then(|ct| ct.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"));
    if !is_json {
        return Err(McpError::new(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            None,
            JsonRpcError::invalid_request("Unsupported Media Type: Content-Type must be application/json"),
        ));
    }

    if let Some(accept) = header_str(req, header::ACCEPT) {
        let accepts_json = accept.split(',').any(|range| {
            let mime = range.split(';').next().unwrap_or("").trim();
            mime.eq_ignore_ascii_case("application/json")
                || mime == "*/*"
                || mime.eq_ignore_ascii_case("application/*")
        });
        if !accepts_json {
            return Err(McpError::new(
                StatusCode::NOT_ACCEPTABLE,
                None,
                JsonRpcError::invalid_request("Not Acceptable: Client must accept application/json"),
            ));
        }
    }

    Ok(())
}

/// Decode a single JSON-RPC message; batches are not accepted
fn parse_message(body: &[u8]) -> Result<JsonRpcMessage, McpError> {
    let value: Value = serde_json::from_slice(body).map_err(|e| {
        McpError::new(StatusCode::BAD_REQUEST, None, JsonRpcError::parse_error(e))
    })?;

    if value.is_array() {
        return Err(McpError::bad_request("Batch requests are not supported"));
    }

    let message: JsonRpcMessage = serde_json::from_value(value)
        .map_err(|e| McpError::bad_request(format!("Invalid Request: {e}")))?;

    if message.jsonrpc != JSONRPC_VERSION {
        return Err(McpError::new(
            StatusCode::BAD_REQUEST,
            message.id.clone(),
            JsonRpcError::invalid_request("Invalid Request: jsonrpc must be \"2.0\""),
        ));
    }

    Ok(message)
}

/// Require a live session in stateful mode
fn validate_session(state: &AppState, context: &McpRequestContext) -> Result<(), McpError> {
    if state.server.stateless {
        return Ok(());
    }

    let Some(session_id) = context.session_id.as_deref() else {
        return Err(McpError::bad_request("Bad Request: Missing session ID"));
    };

    if !state.sessions.touch(session_id) {
        return Err(McpError::new(
            StatusCode::NOT_FOUND,
            None,
            JsonRpcError::new(codes::SESSION_NOT_FOUND, "Session not found"),
        ));
    }

    Ok(())
}

fn validate_protocol_header(context: &McpRequestContext) -> Result<(), McpError> {
    match context.protocol_version.as_deref() {
        Some(version) if !is_supported_protocol_version(version) => Err(McpError::bad_request(
            format!("Bad Request: Unsupported protocol version: {version}"),
        )),
        _ => Ok(()),
    }
}

/// `POST` handler for the MCP endpoint
pub async fn mcp_post(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    check_media_types(&req)?;
    let message = parse_message(&body)?;
    let context = request_context(&req);

    if message.is_request() && message.method.as_deref() == Some("initialize") {
        return Ok(initialize(&state, message));
    }

    validate_session(&state, &context)?;
    validate_protocol_header(&context)?;

    if !message.is_request() {
        debug!(
            method = ?message.method,
            session_id = ?context.session_id,
            "Accepted MCP notification or response"
        );
        return Ok(HttpResponse::Accepted().finish());
    }

    let id = message.id.clone();
    let method = message.method.clone().unwrap_or_default();
    debug!(method = %method, session_id = ?context.session_id, "MCP request");

    let response = match dispatch(&state, &method, message.params).await {
        Ok(result) => JsonRpcResponse::success(id, result),
        Err(error) => {
            debug!(method = %method, code = error.code, message = %error.message, "MCP request failed");
            JsonRpcResponse::failure(id, error)
        }
    };

    Ok(HttpResponse::Ok().json(response))
}

fn initialize(state: &AppState, message: JsonRpcMessage) -> HttpResponse {
    let params: InitializeParams =
        match serde_json::from_value(message.params.unwrap_or_else(|| json!({}))) {
            Ok(params) => params,
            Err(e) => {
                return HttpResponse::Ok().json(JsonRpcResponse::failure(
                    message.id,
                    JsonRpcError::invalid_params(format!("Invalid initialize params: {e}")),
                ));
            }
        };

    let protocol_version = negotiate_protocol_version(params.protocol_version.as_deref());
    let client = params.client_info.clone();
    let client_capabilities = params.capability_names().join(",");

    let result = InitializeResult {
        protocol_version: protocol_version.to_string(),
        capabilities: ServerCapabilities::default(),
        server_info: Implementation {
            name: state.server.server_name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
        instructions: Some(SERVER_INSTRUCTIONS.to_string()),
    };

    let body = match serde_json::to_value(&result) {
        Ok(value) => JsonRpcResponse::success(message.id, value),
        Err(e) => JsonRpcResponse::failure(
            message.id,
            JsonRpcError::new(codes::INTERNAL_ERROR, format!("Internal error: {e}")),
        ),
    };

    let mut response = HttpResponse::Ok();
    if !state.server.stateless {
        let session_id = state.sessions.create(protocol_version, params.client_info);
        state.metrics.set_active_sessions(state.sessions.len());
        info!(
            session_id = %session_id,
            protocol_version,
            client = ?client.as_ref().map(|c| c.name.as_str()),
            client_capabilities = %client_capabilities,
            "MCP session initialized"
        );
        response.insert_header((SESSION_ID_HEADER, session_id));
    } else {
        info!(
            protocol_version,
            client = ?client.as_ref().map(|c| c.name.as_str()),
            client_capabilities = %client_capabilities,
            "Stateless MCP initialize"
        );
    }

    response.json(body)
}

async fn dispatch(state: &AppState, method: &str, params: Option<Value>) -> Result<Value, JsonRpcError> {
    match method {
        "ping" => Ok(json!({})),
        "tools/list" => to_result(&ListToolsResult {
            tools: state.tools.definitions(),
        }),
        "tools/call" => {
            let params: CallToolParams = serde_json::from_value(params.unwrap_or(Value::Null))
                .map_err(|e| JsonRpcError::invalid_params(format!("Invalid params: {e}")))?;

            match state.tools.call(&params.name, params.arguments).await {
                Ok(result) => to_result(&result),
                Err(e @ ToolError::UnknownTool(_)) => {
                    warn!(tool = %params.name, "Call for unknown tool");
                    Err(JsonRpcError::invalid_params(e.to_string()))
                }
                Err(e) => Err(JsonRpcError::invalid_params(e.to_string())),
            }
        }
        "resources/list" => Ok(json!({ "resources": [] })),
        "resources/templates/list" => Ok(json!({ "resourceTemplates": [] })),
        "prompts/list" => Ok(json!({ "prompts": [] })),
        other => Err(JsonRpcError::method_not_found(other)),
    }
}

fn to_result<T: serde::Serialize>(value: &T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value)
        .map_err(|e| JsonRpcError::new(codes::INTERNAL_ERROR, format!("Internal error: {e}")))
}

/// `GET` would open a server-sent event stream, which this server does not offer
pub async fn mcp_get() -> HttpResponse {
    HttpResponse::MethodNotAllowed()
        .insert_header((header::ALLOW, "POST, DELETE"))
        .json(JsonRpcResponse::failure(
            None,
            JsonRpcError::new(-32000, "Method not allowed: server-sent event streams are not supported"),
        ))
}

/// `DELETE` terminates a session
pub async fn mcp_delete(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, Error> {
    if state.server.stateless {
        return Ok(HttpResponse::MethodNotAllowed()
            .insert_header((header::ALLOW, "POST"))
            .finish());
    }

    let context = request_context(&req);
    let Some(session_id) = context.session_id else {
        return Err(McpError::bad_request("Bad Request: Missing session ID").into());
    };

    if state.sessions.remove(&session_id) {
        state.metrics.set_active_sessions(state.sessions.len());
        info!(session_id = %session_id, "MCP session terminated");
        Ok(HttpResponse::Ok().finish())
    } else {
        warn!(session_id = %session_id, "Termination requested for unknown session");
        Err(McpError::new(
            StatusCode::NOT_FOUND,
            None,
            JsonRpcError::new(codes::SESSION_NOT_FOUND, "Session not found"),
        )
        .into())
    }
}
