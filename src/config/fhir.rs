//! Upstream FHIR server configuration.

use std::env;
use url::Url;

/// Default upstream used when `FHIR_BASE_URL` is unset
pub const DEFAULT_FHIR_BASE_URL: &str = "https://hapi-development.up.railway.app/fhir";

/// Default ceiling for downloaded document bodies (20 MiB)
pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 20 * 1024 * 1024;

/// Errors raised while validating configuration at startup
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("FHIR_BASE_URL is not a valid URL: {0}")]
    InvalidBaseUrl(String),

    #[error("FHIR_BASE_URL must use http or https, got {0}")]
    UnsupportedScheme(String),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Failed to register metrics: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Connection settings for the upstream FHIR server
#[derive(Clone)]
pub struct FhirConfig {
    /// Base URL without a trailing slash
    pub base_url: String,
    /// Bearer token; `None` when unset or empty
    pub auth_token: Option<String>,
    pub max_document_bytes: usize,
}

impl std::fmt::Debug for FhirConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FhirConfig")
            .field("base_url", &self.base_url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("max_document_bytes", &self.max_document_bytes)
            .finish()
    }
}

impl Default for FhirConfig {
    fn default() -> Self {
        Self::new(DEFAULT_FHIR_BASE_URL, None)
    }
}

impl FhirConfig {
    /// Build a configuration, normalising the base URL and dropping empty tokens
    pub fn new(base_url: &str, auth_token: Option<String>) -> Self {
        Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            auth_token: auth_token.filter(|t| !t.trim().is_empty()),
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
        }
    }

    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let base_url =
            env::var("FHIR_BASE_URL").unwrap_or_else(|_| DEFAULT_FHIR_BASE_URL.to_string());
        let auth_token = env::var("FHIR_AUTH_TOKEN").ok();

        let max_document_bytes = env::var("MAX_DOCUMENT_BYTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_DOCUMENT_BYTES);

        Self {
            max_document_bytes,
            ..Self::new(&base_url, auth_token)
        }
    }

    /// Reject base URLs the client could never reach
    pub fn validate(&self) -> Result<(), ConfigError> {
        let parsed =
            Url::parse(&self.base_url).map_err(|e| ConfigError::InvalidBaseUrl(e.to_string()))?;
        match parsed.scheme() {
            "http" | "https" => Ok(()),
            other => Err(ConfigError::UnsupportedScheme(other.to_string())),
        }
    }
}
