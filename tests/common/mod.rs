//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use actix_web::{dev::ServiceResponse, test, web};
use fhir_mcp_server::services::resilient_client::{CircuitBreakerConfig, RetryConfig};
use fhir_mcp_server::{
    AppState, FhirConfig, MedicineSearchConfig, MetricsConfig, ResilientClientConfig, ServerConfig,
};
use serde_json::{Value, json};

pub const TEST_TOKEN: &str = "test-token";

pub struct TestOptions<'a> {
    pub fhir_base_url: &'a str,
    pub auth_token: Option<&'a str>,
    pub medicine_url: String,
    pub stateless: bool,
    pub metrics_enabled: bool,
    pub max_document_bytes: Option<usize>,
    pub max_sessions: usize,
}

impl<'a> TestOptions<'a> {
    pub fn new(fhir_base_url: &'a str) -> Self {
        Self {
            fhir_base_url,
            auth_token: Some(TEST_TOKEN),
            medicine_url: "http://127.0.0.1:9/ProductShapes".to_string(),
            stateless: false,
            metrics_enabled: true,
            max_document_bytes: None,
            max_sessions: ServerConfig::default().max_sessions,
        }
    }
}

/// Client config with short delays so retry paths stay fast
pub fn fast_client_config() -> ResilientClientConfig {
    ResilientClientConfig {
        timeout_seconds: 5,
        connect_timeout_seconds: 2,
        retry: RetryConfig {
            max_attempts: 1,
            initial_delay_ms: 2,
            max_delay_ms: 10,
            ..RetryConfig::default()
        },
        circuit_breaker: CircuitBreakerConfig {
            failure_threshold: 50,
            success_threshold: 1,
            timeout_seconds: 1,
        },
        enable_detailed_logging: false,
    }
}

pub fn build_state(options: TestOptions<'_>) -> web::Data<AppState> {
    let server = ServerConfig {
        stateless: options.stateless,
        max_sessions: options.max_sessions,
        ..ServerConfig::default()
    };
    let mut fhir = FhirConfig::new(options.fhir_base_url, options.auth_token.map(String::from));
    if let Some(limit) = options.max_document_bytes {
        fhir.max_document_bytes = limit;
    }
    let state = AppState::new(
        server,
        fhir,
        MedicineSearchConfig {
            endpoint: options.medicine_url,
        },
        fast_client_config(),
        MetricsConfig {
            enabled: options.metrics_enabled,
        },
    )
    .expect("test state");
    web::Data::new(state)
}

pub fn state_for(fhir_base_url: &str) -> web::Data<AppState> {
    build_state(TestOptions::new(fhir_base_url))
}

/// `POST /mcp` carrying one JSON-RPC message
pub fn rpc_request(session_id: Option<&str>, message: Value) -> test::TestRequest {
    let mut req = test::TestRequest::post()
        .uri("/mcp")
        .insert_header(("Accept", "application/json, text/event-stream"))
        .set_json(message);
    if let Some(id) = session_id {
        req = req.insert_header(("mcp-session-id", id));
    }
    req
}

pub fn initialize_message(protocol_version: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 0,
        "method": "initialize",
        "params": {
            "protocolVersion": protocol_version,
            "capabilities": {},
            "clientInfo": {"name": "integration-test", "version": "1.0.0"}
        }
    })
}

pub fn tool_call(id: i64, name: &str, arguments: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": {"name": name, "arguments": arguments}
    })
}

pub fn session_header(resp: &ServiceResponse) -> Option<String> {
    resp.headers()
        .get("mcp-session-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// First text block of a `tools/call` result
pub fn first_text(body: &Value) -> &str {
    body["result"]["content"][0]["text"].as_str().unwrap_or_default()
}
