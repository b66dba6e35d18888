//! Shared application state handed to every worker.

use crate::config::{
    ConfigError, FhirConfig, MedicineSearchConfig, MetricsConfig, ServerConfig,
};
use crate::services::fhir_client::FhirClient;
use crate::services::medicines::MedicineSearchService;
use crate::services::metrics::AppMetrics;
use crate::services::resilient_client::{
    ResilientClient, ResilientClientConfig, ResilientClientMetrics,
};
use crate::services::sessions::SessionStore;
use crate::services::tools::ToolExecutor;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Instructions returned to clients during initialization
pub const SERVER_INSTRUCTIONS: &str = "A comprehensive FHIR-compliant server that provides a robust set of \
tools for securely managing and accessing healthcare data. It supports a wide range of FHIR resources, \
enabling seamless interaction with patient information, clinical records, and administrative data.";

/// Everything a request handler needs, built once at startup
pub struct AppState {
    pub server: ServerConfig,
    pub metrics_config: MetricsConfig,
    pub metrics: AppMetrics,
    pub fhir: Arc<FhirClient>,
    pub tools: ToolExecutor,
    pub sessions: SessionStore,
}

impl AppState {
    /// Build state from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::new(
            ServerConfig::from_env(),
            FhirConfig::from_env(),
            MedicineSearchConfig::from_env(),
            ResilientClientConfig::from_env(),
            MetricsConfig::from_env(),
        )
    }

    pub fn new(
        server: ServerConfig,
        fhir_config: FhirConfig,
        medicine_config: MedicineSearchConfig,
        client_config: ResilientClientConfig,
        metrics_config: MetricsConfig,
    ) -> Result<Self, ConfigError> {
        fhir_config.validate()?;

        let metrics = AppMetrics::new()?;
        let client_metrics = ResilientClientMetrics::new(&metrics.registry)?;
        // Attachment URLs can name any host; only configured upstreams get their own breaker
        let known_hosts = [fhir_config.base_url.as_str(), medicine_config.endpoint.as_str()]
            .into_iter()
            .filter_map(|raw| url::Url::parse(raw).ok()?.host_str().map(str::to_string))
            .collect::<Vec<_>>();
        let http = Arc::new(
            ResilientClient::new(client_config, Some(client_metrics))?
                .with_known_destinations(known_hosts),
        );

        info!(
            fhir_base_url = %fhir_config.base_url,
            authenticated = fhir_config.auth_token.is_some(),
            "Initialising FHIR client"
        );

        let fhir = Arc::new(FhirClient::new(fhir_config, Arc::clone(&http)));
        let medicines = MedicineSearchService::new(medicine_config, http);
        let tools = ToolExecutor::new(Arc::clone(&fhir), medicines, metrics.clone());
        let sessions = SessionStore::new(
            Duration::from_secs(server.session_ttl_seconds),
            server.max_sessions,
        );

        Ok(Self {
            server,
            metrics_config,
            metrics,
            fhir,
            tools,
            sessions,
        })
    }
}
