//! Health check endpoint handler.

use crate::{models::HealthResponse, state::AppState};
use actix_web::{Error, HttpRequest, Result, web};
use paperclip::actix::api_v2_operation;

/// Health check endpoint
///
/// Reports liveness only; the upstream FHIR server is not contacted so a slow
/// upstream never fails container probes.
#[api_v2_operation(
    summary = "Health Check Endpoint",
    description = "Returns the current health status of the server in JSON format.",
    tags("Health"),
    responses(
        (status = 200, description = "Successful response", body = HealthResponse),
        (status = 503, description = "Application state unavailable")
    )
)]
pub async fn health(req: HttpRequest) -> Result<web::Json<HealthResponse>, Error> {
    let state = req
        .app_data::<web::Data<AppState>>()
        .ok_or_else(|| actix_web::error::ErrorServiceUnavailable("Application state unavailable"))?;

    let active_sessions = state.sessions.len();
    state.metrics.set_active_sessions(active_sessions);

    Ok(web::Json(HealthResponse {
        status: "healthy".to_string(),
        fhir_base_url: state.fhir.base_url().to_string(),
        active_sessions,
    }))
}
