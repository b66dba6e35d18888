//! End-to-end tests for the MCP endpoint against a mocked FHIR server.

mod common;

use actix_web::{http::StatusCode, test};
use common::*;
use fhir_mcp_server::create_app;
use serde_json::{Value, json};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn fhir_server() -> (MockServer, String) {
    let server = MockServer::start().await;
    let base = format!("{}/fhir", server.uri());
    (server, base)
}

fn patient(id: &str, given: &str, family: &str) -> Value {
    json!({
        "resourceType": "Patient",
        "id": id,
        "name": [{"given": [given], "family": family}],
        "birthDate": "1975-04-12",
        "gender": "male"
    })
}

#[actix_web::test]
async fn test_initialize_issues_session() {
    let (_server, base) = fhir_server().await;
    let app = test::init_service(create_app(state_for(&base))).await;

    let resp = test::call_service(
        &app,
        rpc_request(None, initialize_message("2025-03-26")).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let session = session_header(&resp).expect("session header");
    assert_eq!(session.len(), 32);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["jsonrpc"], "2.0");
    assert_eq!(body["id"], 0);
    assert_eq!(body["result"]["protocolVersion"], "2025-03-26");
    assert_eq!(body["result"]["serverInfo"]["name"], "FHIR Server");
    assert_eq!(body["result"]["capabilities"]["tools"]["listChanged"], false);
    assert!(body["result"]["instructions"].as_str().unwrap().contains("FHIR"));
}

#[actix_web::test]
async fn test_initialize_offers_latest_for_unknown_version() {
    let (_server, base) = fhir_server().await;
    let app = test::init_service(create_app(state_for(&base))).await;

    let body: Value = test::call_and_read_body_json(
        &app,
        rpc_request(None, initialize_message("1999-12-31")).to_request(),
    )
    .await;
    assert_eq!(body["result"]["protocolVersion"], "2025-06-18");
}

#[actix_web::test]
async fn test_requests_need_a_session() {
    let (_server, base) = fhir_server().await;
    let app = test::init_service(create_app(state_for(&base))).await;
    let ping = json!({"jsonrpc": "2.0", "id": 1, "method": "ping"});

    let resp = test::call_service(&app, rpc_request(None, ping.clone()).to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], -32600);
    assert_eq!(body["error"]["message"], "Bad Request: Missing session ID");

    let resp = test::call_service(&app, rpc_request(Some("nope"), ping).to_request()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], -32001);
}

#[actix_web::test]
async fn test_ping_list_and_unknown_method() {
    let (_server, base) = fhir_server().await;
    let app = test::init_service(create_app(state_for(&base))).await;

    let resp = test::call_service(&app, rpc_request(None, initialize_message("2025-06-18")).to_request()).await;
    let session = session_header(&resp).unwrap();

    let body: Value = test::call_and_read_body_json(
        &app,
        rpc_request(Some(&session), json!({"jsonrpc": "2.0", "id": "a", "method": "ping"})).to_request(),
    )
    .await;
    assert_eq!(body["id"], "a");
    assert_eq!(body["result"], json!({}));

    let body: Value = test::call_and_read_body_json(
        &app,
        rpc_request(Some(&session), json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"})).to_request(),
    )
    .await;
    let tools = body["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 29);
    let get_patient = tools.iter().find(|t| t["name"] == "get_patient").unwrap();
    assert_eq!(get_patient["inputSchema"]["required"], json!(["patient_id"]));

    let body: Value = test::call_and_read_body_json(
        &app,
        rpc_request(Some(&session), json!({"jsonrpc": "2.0", "id": 3, "method": "prompts/list"})).to_request(),
    )
    .await;
    assert_eq!(body["result"]["prompts"], json!([]));

    let body: Value = test::call_and_read_body_json(
        &app,
        rpc_request(Some(&session), json!({"jsonrpc": "2.0", "id": 4, "method": "sampling/unknown"})).to_request(),
    )
    .await;
    assert_eq!(body["error"]["code"], -32601);
}

#[actix_web::test]
async fn test_notifications_are_accepted() {
    let (_server, base) = fhir_server().await;
    let app = test::init_service(create_app(state_for(&base))).await;
    let resp = test::call_service(&app, rpc_request(None, initialize_message("2025-06-18")).to_request()).await;
    let session = session_header(&resp).unwrap();

    let resp = test::call_service(
        &app,
        rpc_request(
            Some(&session),
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
        )
        .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let body = test::read_body(resp).await;
    assert!(body.is_empty());
}

#[actix_web::test]
async fn test_malformed_bodies() {
    let (_server, base) = fhir_server().await;
    let app = test::init_service(create_app(state_for(&base))).await;

    let req = test::TestRequest::post()
        .uri("/mcp")
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{\"jsonrpc\": ")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], -32700);
    assert!(body["id"].is_null());

    let resp = test::call_service(
        &app,
        rpc_request(None, json!([{"jsonrpc": "2.0", "id": 1, "method": "ping"}])).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/mcp")
        .insert_header(("Content-Type", "text/plain"))
        .set_payload("{}")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let req = test::TestRequest::post()
        .uri("/mcp")
        .insert_header(("Accept", "text/html"))
        .set_json(initialize_message("2025-06-18"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_ACCEPTABLE);
}

#[actix_web::test]
async fn test_get_patient_summary() {
    let (server, base) = fhir_server().await;
    Mock::given(method("GET"))
        .and(path("/fhir/Patient/p1"))
        .and(header("authorization", "Bearer test-token"))
        .and(header("accept", "application/fhir+json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(patient("p1", "John", "Smith")))
        .expect(1)
        .mount(&server)
        .await;

    let app = test::init_service(create_app(state_for(&base))).await;
    let resp = test::call_service(&app, rpc_request(None, initialize_message("2025-06-18")).to_request()).await;
    let session = session_header(&resp).unwrap();

    let body: Value = test::call_and_read_body_json(
        &app,
        rpc_request(Some(&session), tool_call(5, "get_patient", json!({"patient_id": "p1"}))).to_request(),
    )
    .await;
    assert_eq!(first_text(&body), "🆔 p1 | John Smith | DOB 1975-04-12 | male");
    assert_eq!(body["result"]["isError"], false);
    assert_eq!(
        body["result"]["structuredContent"]["result"],
        "🆔 p1 | John Smith | DOB 1975-04-12 | male"
    );
}

#[actix_web::test]
async fn test_get_patient_not_found_returns_upstream_text() {
    let (server, base) = fhir_server().await;
    Mock::given(method("GET"))
        .and(path("/fhir/Patient/ghost"))
        .respond_with(ResponseTemplate::new(404).set_body_string("HAPI-2001: Resource Patient/ghost is not known"))
        .mount(&server)
        .await;

    let app = test::init_service(create_app(state_for(&base))).await;
    let resp = test::call_service(&app, rpc_request(None, initialize_message("2025-06-18")).to_request()).await;
    let session = session_header(&resp).unwrap();

    let body: Value = test::call_and_read_body_json(
        &app,
        rpc_request(Some(&session), tool_call(6, "get_patient", json!({"patient_id": "ghost"}))).to_request(),
    )
    .await;
    assert_eq!(first_text(&body), "HAPI-2001: Resource Patient/ghost is not known");
}

#[actix_web::test]
async fn test_search_patients_sends_count_and_filters() {
    let (server, base) = fhir_server().await;
    Mock::given(method("GET"))
        .and(path("/fhir/Patient"))
        .and(query_param("_count", "2"))
        .and(query_param("family", "Smith"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resourceType": "Bundle",
            "entry": [
                {"resource": patient("p1", "John", "Smith")},
                {"resource": {"resourceType": "Patient", "id": "p2"}}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let app = test::init_service(create_app(state_for(&base))).await;
    let resp = test::call_service(&app, rpc_request(None, initialize_message("2025-06-18")).to_request()).await;
    let session = session_header(&resp).unwrap();

    let body: Value = test::call_and_read_body_json(
        &app,
        rpc_request(
            Some(&session),
            tool_call(7, "search_patients", json!({"family": "Smith", "name": "", "count": 2})),
        )
        .to_request(),
    )
    .await;
    let content = body["result"]["content"].as_array().unwrap();
    assert_eq!(content.len(), 2);
    assert_eq!(content[1]["text"], "🆔 p2 | Unknown | DOB ? | ?");
    assert_eq!(body["result"]["structuredContent"]["result"].as_array().unwrap().len(), 2);
}

#[actix_web::test]
async fn test_search_conditions_returns_bundle_with_mapped_params() {
    let (server, base) = fhir_server().await;
    let bundle = json!({"resourceType": "Bundle", "type": "searchset", "total": 0});
    Mock::given(method("GET"))
        .and(path("/fhir/Condition"))
        .and(query_param("_count", "10"))
        .and(query_param("clinical-status", "active"))
        .respond_with(ResponseTemplate::new(200).set_body_json(bundle.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let app = test::init_service(create_app(state_for(&base))).await;
    let resp = test::call_service(&app, rpc_request(None, initialize_message("2025-06-18")).to_request()).await;
    let session = session_header(&resp).unwrap();

    let body: Value = test::call_and_read_body_json(
        &app,
        rpc_request(
            Some(&session),
            tool_call(8, "search_conditions", json!({"clinical_status": "active"})),
        )
        .to_request(),
    )
    .await;
    assert_eq!(body["result"]["structuredContent"], bundle);
}

#[actix_web::test]
async fn test_find_patients_with_conditions() {
    let (server, base) = fhir_server().await;
    Mock::given(method("GET"))
        .and(path("/fhir/Condition"))
        .and(query_param("_count", "100"))
        .and(query_param("code", "44054006"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resourceType": "Bundle",
            "entry": [
                {"resource": {"resourceType": "Condition", "subject": {"reference": "Patient/z9"}}},
                {"resource": {"resourceType": "Condition", "subject": {"reference": "Patient/a1"}}},
                {"resource": {"resourceType": "Condition", "subject": {"reference": "Patient/z9"}}}
            ]
        })))
        .mount(&server)
        .await;

    let app = test::init_service(create_app(state_for(&base))).await;
    let resp = test::call_service(&app, rpc_request(None, initialize_message("2025-06-18")).to_request()).await;
    let session = session_header(&resp).unwrap();

    let body: Value = test::call_and_read_body_json(
        &app,
        rpc_request(
            Some(&session),
            tool_call(9, "find_patients_with_conditions", json!({"code": "44054006"})),
        )
        .to_request(),
    )
    .await;
    assert_eq!(body["result"]["structuredContent"]["result"], json!(["a1", "z9"]));
}

#[actix_web::test]
async fn test_coverage_search_maps_patient_to_beneficiary() {
    let (server, base) = fhir_server().await;
    Mock::given(method("GET"))
        .and(path("/fhir/Coverage"))
        .and(query_param("beneficiary", "p1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resourceType": "Bundle",
            "entry": [{"resource": {"resourceType": "Coverage", "id": "c1"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let app = test::init_service(create_app(state_for(&base))).await;
    let resp = test::call_service(&app, rpc_request(None, initialize_message("2025-06-18")).to_request()).await;
    let session = session_header(&resp).unwrap();

    let body: Value = test::call_and_read_body_json(
        &app,
        rpc_request(Some(&session), tool_call(10, "search_coverages", json!({"patient": "p1"}))).to_request(),
    )
    .await;
    assert_eq!(
        body["result"]["structuredContent"]["result"],
        json!([{"resourceType": "Coverage", "id": "c1"}])
    );
}

#[actix_web::test]
async fn test_upstream_failure_becomes_operation_outcome() {
    let (server, base) = fhir_server().await;
    Mock::given(method("GET"))
        .and(path("/fhir/metadata"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let app = test::init_service(create_app(state_for(&base))).await;
    let resp = test::call_service(&app, rpc_request(None, initialize_message("2025-06-18")).to_request()).await;
    let session = session_header(&resp).unwrap();

    let body: Value = test::call_and_read_body_json(
        &app,
        rpc_request(Some(&session), tool_call(11, "get_capability_statement", json!({}))).to_request(),
    )
    .await;
    let outcome = &body["result"]["structuredContent"];
    assert_eq!(outcome["resourceType"], "OperationOutcome");
    assert_eq!(outcome["issue"][0]["code"], "exception");
    assert!(body["error"].is_null());
}

#[actix_web::test]
async fn test_tool_errors() {
    let (_server, base) = fhir_server().await;
    let app = test::init_service(create_app(state_for(&base))).await;
    let resp = test::call_service(&app, rpc_request(None, initialize_message("2025-06-18")).to_request()).await;
    let session = session_header(&resp).unwrap();

    let body: Value = test::call_and_read_body_json(
        &app,
        rpc_request(Some(&session), tool_call(12, "drop_tables", json!({}))).to_request(),
    )
    .await;
    assert_eq!(body["error"]["code"], -32602);
    assert_eq!(body["error"]["message"], "Unknown tool: drop_tables");

    let body: Value = test::call_and_read_body_json(
        &app,
        rpc_request(Some(&session), tool_call(13, "get_patient", json!({}))).to_request(),
    )
    .await;
    assert_eq!(body["result"]["isError"], true);
    assert!(first_text(&body).contains("patient_id"));

    let body: Value = test::call_and_read_body_json(
        &app,
        rpc_request(Some(&session), json!({"jsonrpc": "2.0", "id": 14, "method": "tools/call", "params": {}})).to_request(),
    )
    .await;
    assert_eq!(body["error"]["code"], -32602);
}

#[actix_web::test]
async fn test_delete_terminates_session() {
    let (_server, base) = fhir_server().await;
    let app = test::init_service(create_app(state_for(&base))).await;
    let resp = test::call_service(&app, rpc_request(None, initialize_message("2025-06-18")).to_request()).await;
    let session = session_header(&resp).unwrap();

    let req = test::TestRequest::delete()
        .uri("/mcp")
        .insert_header(("mcp-session-id", session.as_str()))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let resp = test::call_service(
        &app,
        rpc_request(Some(&session), json!({"jsonrpc": "2.0", "id": 1, "method": "ping"})).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::delete()
        .uri("/mcp")
        .insert_header(("mcp-session-id", session.as_str()))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::delete().uri("/mcp").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_session_store_is_bounded() {
    let (_server, base) = fhir_server().await;
    let mut options = TestOptions::new(&base);
    options.max_sessions = 2;
    let app = test::init_service(create_app(build_state(options))).await;

    let mut sessions = Vec::new();
    for _ in 0..3 {
        let resp = test::call_service(&app, rpc_request(None, initialize_message("2025-06-18")).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        sessions.push(session_header(&resp).unwrap());
        std::thread::sleep(std::time::Duration::from_millis(2));
    }

    let ping = |id: i64| json!({"jsonrpc": "2.0", "id": id, "method": "ping"});
    let resp = test::call_service(&app, rpc_request(Some(&sessions[0]), ping(1)).to_request()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    for session in &sessions[1..] {
        let resp = test::call_service(&app, rpc_request(Some(session), ping(2)).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}

#[actix_web::test]
async fn test_get_is_not_allowed() {
    let (_server, base) = fhir_server().await;
    let app = test::init_service(create_app(state_for(&base))).await;

    let req = test::TestRequest::get().uri("/mcp").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[actix_web::test]
async fn test_stateless_mode_skips_sessions() {
    let (_server, base) = fhir_server().await;
    let mut options = TestOptions::new(&base);
    options.stateless = true;
    let app = test::init_service(create_app(build_state(options))).await;

    let resp = test::call_service(&app, rpc_request(None, initialize_message("2025-06-18")).to_request()).await;
    assert!(session_header(&resp).is_none());

    let body: Value = test::call_and_read_body_json(
        &app,
        rpc_request(None, json!({"jsonrpc": "2.0", "id": 1, "method": "ping"})).to_request(),
    )
    .await;
    assert_eq!(body["result"], json!({}));
}

#[actix_web::test]
async fn test_unsupported_protocol_header_rejected() {
    let (_server, base) = fhir_server().await;
    let app = test::init_service(create_app(state_for(&base))).await;
    let resp = test::call_service(&app, rpc_request(None, initialize_message("2025-06-18")).to_request()).await;
    let session = session_header(&resp).unwrap();

    let req = rpc_request(Some(&session), json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}))
        .insert_header(("mcp-protocol-version", "2020-01-01"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
}
