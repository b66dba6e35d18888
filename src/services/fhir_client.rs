//! Async client for the upstream FHIR REST API.
//!
//! Reads and searches never fail from the caller's point of view: any problem
//! is folded into a FHIR `OperationOutcome` so tools can hand it straight back
//! to the model, the same way the server would have reported it.

use crate::config::FhirConfig;
use crate::services::resilient_client::{RequestSpec, ResilientClient, ResilientClientError};
use crate::telemetry::{redact_sensitive_data, redact_url};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, warn};

pub const FHIR_JSON: &str = "application/fhir+json";

/// Statuses reported verbatim as `http-<status>` issues
const PASSTHROUGH_STATUSES: [u16; 3] = [401, 403, 404];

/// Build an `OperationOutcome` with a single error issue
pub fn operation_outcome(code: &str, text: impl Into<String>) -> Value {
    json!({
        "resourceType": "OperationOutcome",
        "issue": [{
            "severity": "error",
            "code": code,
            "details": {"text": text.into()}
        }]
    })
}

/// Ordered search parameters; `_count` first, empty filters dropped
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchParams(Vec<(String, String)>);

impl SearchParams {
    pub fn with_count(count: i64) -> Self {
        Self(vec![("_count".to_string(), count.to_string())])
    }

    /// Append `name=value` unless the value is missing or empty
    pub fn filter(mut self, name: &str, value: Option<&str>) -> Self {
        self.push(name, value);
        self
    }

    pub fn push(&mut self, name: &str, value: Option<&str>) {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            self.0.push((name.to_string(), value.to_string()));
        }
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }

    pub fn into_pairs(self) -> Vec<(String, String)> {
        self.0
    }
}

/// Downloaded attachment body
#[derive(Debug)]
pub struct BinaryContent {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Why an attachment could not be fetched
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error(transparent)]
    Upstream(#[from] ResilientClientError),

    #[error("HTTP status {0}")]
    Status(StatusCode),

    #[error("Failed to read response body: {0}")]
    Body(reqwest::Error),

    #[error("Document exceeds maximum size of {limit} bytes")]
    TooLarge { limit: usize },
}

/// FHIR client bound to one base URL and credential
pub struct FhirClient {
    config: FhirConfig,
    http: Arc<ResilientClient>,
}

impl FhirClient {
    pub fn new(config: FhirConfig, http: Arc<ResilientClient>) -> Self {
        Self { config, http }
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub fn max_document_bytes(&self) -> usize {
        self.config.max_document_bytes
    }

    /// Absolute URL for an endpoint relative to the base
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url,
            endpoint.trim_start_matches('/')
        )
    }

    /// Headers sent with every FHIR call
    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(FHIR_JSON));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(FHIR_JSON));
        if let Some(token) = &self.config.auth_token {
            match HeaderValue::from_str(&format!("Bearer {token}")) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => warn!("FHIR_AUTH_TOKEN contains characters not allowed in a header"),
            }
        }
        headers
    }

    /// `GET <type>/<id>`
    pub async fn read(&self, resource_type: &str, id: &str) -> Value {
        self.request(&format!("{resource_type}/{id}"), SearchParams::default())
            .await
    }

    /// `GET <type>?<params>`
    pub async fn search(&self, resource_type: &str, params: SearchParams) -> Value {
        self.request(resource_type, params).await
    }

    /// `GET metadata`
    pub async fn capabilities(&self) -> Value {
        self.request("metadata", SearchParams::default()).await
    }

    /// Issue a GET and return the JSON body or a synthesised `OperationOutcome`
    pub async fn request(&self, endpoint: &str, params: SearchParams) -> Value {
        let url = self.endpoint_url(endpoint);
        let spec = RequestSpec::get(url.as_str())
            .with_headers(self.headers())
            .with_query(params.into_pairs());

        debug!(url = %redact_url(&url), "FHIR request");

        let response = match self.http.execute(spec).await {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %redact_url(&url), error = %e, "FHIR request failed");
                return operation_outcome("exception", e.user_message());
            }
        };

        let status = response.status();
        if PASSTHROUGH_STATUSES.contains(&status.as_u16()) {
            let body = response.text().await.unwrap_or_default();
            debug!(url = %redact_url(&url), status = status.as_u16(), "FHIR request rejected");
            return operation_outcome(
                &format!("http-{}", status.as_u16()),
                redact_sensitive_data(&body),
            );
        }

        if !status.is_success() {
            warn!(url = %redact_url(&url), status = status.as_u16(), "FHIR server error");
            return operation_outcome(
                "exception",
                format!("FHIR server responded with status {status}"),
            );
        }

        match response.json::<Value>().await {
            Ok(body) => body,
            Err(e) => {
                let e = e.without_url();
                warn!(url = %redact_url(&url), error = %e, "FHIR response was not JSON");
                operation_outcome("exception", format!("Invalid JSON from FHIR server: {e}"))
            }
        }
    }

    /// Fetch an attachment body
    ///
    /// Absolute URLs are fetched without FHIR credentials. Relative URLs such as
    /// `Binary/123` are resolved against the base URL and sent with them.
    pub async fn fetch_binary(&self, url: &str) -> Result<BinaryContent, DownloadError> {
        let spec = if is_absolute_url(url) {
            RequestSpec::get(url)
        } else {
            let mut headers = self.headers();
            headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
            headers.remove(CONTENT_TYPE);
            RequestSpec::get(self.endpoint_url(url)).with_headers(headers)
        };

        let mut response = self.http.execute(spec).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status(status));
        }

        let limit = self.config.max_document_bytes;
        if response
            .content_length()
            .is_some_and(|len| len > limit as u64)
        {
            return Err(DownloadError::TooLarge { limit });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        // Chunked bodies carry no length, so the cap is enforced while reading
        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| DownloadError::Body(e.without_url()))?
        {
            if bytes.len() + chunk.len() > limit {
                warn!(url = %redact_url(url), limit, "Attachment exceeds size limit");
                return Err(DownloadError::TooLarge { limit });
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(BinaryContent {
            bytes,
            content_type,
        })
    }
}

fn is_absolute_url(url: &str) -> bool {
    url::Url::parse(url).is_ok()
}
