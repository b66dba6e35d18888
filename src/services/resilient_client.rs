//! Resilient HTTP client service with retries, timeouts, and circuit breakers.
//!
//! Every upstream call the server makes (FHIR reads and searches, document
//! downloads, the pharmacy catalogue) goes through [`ResilientClient`]:
//! - Exponential backoff with jitter on transient failures
//! - Per-destination circuit breakers so a dead upstream fails fast
//! - Request timeouts
//! - Prometheus metrics and structured logging with query strings stripped

use crate::telemetry::redact_url;
use chrono::{DateTime, Utc};
use prometheus::{CounterVec, GaugeVec, HistogramVec, Opts, Registry};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio_retry::RetryIf;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, error, info, warn};

/// Configuration for resilient HTTP client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilientClientConfig {
    /// Total time allowed for one attempt, body included (in seconds)
    pub timeout_seconds: u64,

    /// Connection timeout (in seconds)
    pub connect_timeout_seconds: u64,

    pub retry: RetryConfig,

    pub circuit_breaker: CircuitBreakerConfig,

    /// Log every attempt instead of only failures
    pub enable_detailed_logging: bool,
}

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_attempts: usize,

    /// Delay before the first retry in milliseconds; doubles afterwards
    pub initial_delay_ms: u64,

    /// Upper bound for a single delay in milliseconds
    pub max_delay_ms: u64,

    /// Retry on these HTTP status codes
    pub retry_on_status: Vec<u16>,
}

/// Simple circuit breaker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit
    pub failure_threshold: usize,

    /// Successes in half-open state that close the circuit
    pub success_threshold: usize,

    /// Time an open circuit waits before letting a probe through (in seconds)
    pub timeout_seconds: u64,
}

impl Default for ResilientClientConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            connect_timeout_seconds: 10,
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            enable_detailed_logging: false,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            initial_delay_ms: 200,
            max_delay_ms: 2000,
            retry_on_status: vec![408, 429, 500, 502, 503, 504],
        }
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout_seconds: 30,
        }
    }
}

/// Circuit breaker state
#[derive(Debug, Clone, PartialEq)]
pub enum CircuitBreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitBreakerState {
    fn gauge_value(&self) -> f64 {
        match self {
            CircuitBreakerState::Closed => 0.0,
            CircuitBreakerState::Open => 1.0,
            CircuitBreakerState::HalfOpen => 2.0,
        }
    }
}

/// Simple circuit breaker implementation
#[derive(Debug)]
pub struct SimpleCircuitBreaker {
    state: CircuitBreakerState,
    failure_count: usize,
    success_count: usize,
    config: CircuitBreakerConfig,
    last_failure_time: Option<Instant>,
}

impl SimpleCircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            state: CircuitBreakerState::Closed,
            failure_count: 0,
            success_count: 0,
            config,
            last_failure_time: None,
        }
    }

    pub fn call_allowed(&mut self) -> bool {
        match self.state {
            CircuitBreakerState::Closed | CircuitBreakerState::HalfOpen => true,
            CircuitBreakerState::Open => match self.last_failure_time {
                Some(last_failure)
                    if last_failure.elapsed()
                        >= Duration::from_secs(self.config.timeout_seconds) =>
                {
                    self.state = CircuitBreakerState::HalfOpen;
                    self.success_count = 0;
                    true
                }
                _ => false,
            },
        }
    }

    pub fn on_success(&mut self) {
        self.failure_count = 0;

        if self.state == CircuitBreakerState::HalfOpen {
            self.success_count += 1;
            if self.success_count >= self.config.success_threshold {
                self.state = CircuitBreakerState::Closed;
            }
        }
    }

    pub fn on_failure(&mut self) {
        self.failure_count += 1;
        self.last_failure_time = Some(Instant::now());

        // A failed probe reopens immediately
        if self.state == CircuitBreakerState::HalfOpen
            || self.failure_count >= self.config.failure_threshold
        {
            self.state = CircuitBreakerState::Open;
        }
    }

    pub fn state(&self) -> &CircuitBreakerState {
        &self.state
    }
}

/// Metrics for resilient HTTP client operations
#[derive(Clone)]
pub struct ResilientClientMetrics {
    /// HTTP requests by destination, method, and outcome
    pub http_requests_total: CounterVec,

    /// HTTP request duration by destination and method
    pub http_request_duration_seconds: HistogramVec,

    /// Retry attempts by destination and reason
    pub retry_attempts_total: CounterVec,

    /// Circuit breaker state by destination
    pub circuit_breaker_state: GaugeVec,

    /// Timeout occurrences by destination
    pub timeouts_total: CounterVec,
}

impl ResilientClientMetrics {
    /// Create the metric families and register them with `registry`
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let http_requests_total = CounterVec::new(
            Opts::new(
                "resilient_http_requests_total",
                "Total upstream HTTP requests by destination, method, and outcome",
            ),
            &["destination", "method", "outcome"],
        )?;

        let http_request_duration_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "resilient_http_request_duration_seconds",
                "Duration of upstream HTTP requests including retries",
            )
            .buckets(vec![
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
            ]),
            &["destination", "method"],
        )?;

        let retry_attempts_total = CounterVec::new(
            Opts::new(
                "resilient_http_retry_attempts_total",
                "Total retry attempts by destination and reason",
            ),
            &["destination", "reason"],
        )?;

        let circuit_breaker_state = GaugeVec::new(
            Opts::new(
                "resilient_http_circuit_breaker_state",
                "Circuit breaker state (0=closed, 1=open, 2=half-open)",
            ),
            &["destination"],
        )?;

        let timeouts_total = CounterVec::new(
            Opts::new(
                "resilient_http_timeouts_total",
                "Total upstream timeouts by destination",
            ),
            &["destination"],
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(retry_attempts_total.clone()))?;
        registry.register(Box::new(circuit_breaker_state.clone()))?;
        registry.register(Box::new(timeouts_total.clone()))?;

        Ok(Self {
            http_requests_total,
            http_request_duration_seconds,
            retry_attempts_total,
            circuit_breaker_state,
            timeouts_total,
        })
    }
}

/// Description of one outbound request
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
}

impl RequestSpec {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
        }
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Add a header; invalid names or values are skipped with a warning
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => warn!(header = %name, "Skipping invalid request header"),
        }
        self
    }
}

/// Request context for logging and metrics
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub destination: String,
    pub method: String,
    /// URL with query string and credentials removed
    pub display_url: String,
    pub start_time: DateTime<Utc>,
}

/// Resilient HTTP client with retries, timeouts, and circuit breakers
pub struct ResilientClient {
    client: Client,
    config: ResilientClientConfig,
    metrics: Option<ResilientClientMetrics>,
    circuit_breakers: Mutex<HashMap<String, SimpleCircuitBreaker>>,
    /// Hosts that get their own breaker and metric label; `None` tracks every host
    known_destinations: Option<HashSet<String>>,
}

/// Shared breaker and label for hosts outside the known set
pub const EXTERNAL_DESTINATION: &str = "external";

impl ResilientClient {
    /// Create a new resilient HTTP client
    pub fn new(
        config: ResilientClientConfig,
        metrics: Option<ResilientClientMetrics>,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .user_agent(concat!("fhir-mcp-server/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            config,
            metrics,
            circuit_breakers: Mutex::new(HashMap::new()),
            known_destinations: None,
        })
    }

    /// Restrict per-host breakers and metric labels to `hosts`
    ///
    /// Any other host, such as one named in an attachment URL, shares the
    /// `external` destination, which keeps breaker and label counts bounded.
    pub fn with_known_destinations<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_destinations = Some(hosts.into_iter().map(Into::into).collect());
        self
    }

    fn destination_for(&self, host: Option<&str>) -> String {
        let host = host.unwrap_or("unknown");
        match &self.known_destinations {
            Some(known) if !known.contains(host) => EXTERNAL_DESTINATION.to_string(),
            _ => host.to_string(),
        }
    }

    pub fn config(&self) -> &ResilientClientConfig {
        &self.config
    }

    /// Execute an HTTP GET request with resilience patterns
    pub async fn get(&self, url: &str) -> Result<reqwest::Response, ResilientClientError> {
        self.execute(RequestSpec::get(url)).await
    }

    /// Current breaker state for a destination host, if one has been created
    pub fn circuit_state(&self, destination: &str) -> Option<CircuitBreakerState> {
        self.circuit_breakers
            .lock()
            .ok()?
            .get(destination)
            .map(|cb| cb.state().clone())
    }

    /// Execute request with full resilience pattern implementation
    pub async fn execute(
        &self,
        spec: RequestSpec,
    ) -> Result<reqwest::Response, ResilientClientError> {
        let parsed = url::Url::parse(&spec.url)
            .map_err(|e| ResilientClientError::InvalidRequest(format!("{}: {e}", spec.url)))?;

        let context = RequestContext {
            destination: self.destination_for(parsed.host_str()),
            method: spec.method.to_string(),
            display_url: redact_url(&spec.url),
            start_time: Utc::now(),
        };
        let destination = context.destination.clone();

        if !self.admit(&destination) {
            warn!(
                destination = %destination,
                url = %context.display_url,
                "Circuit breaker is open, rejecting request"
            );
            self.record_request_metrics(&context, "circuit_open", Duration::ZERO);
            return Err(ResilientClientError::CircuitBreakerOpen);
        }

        let retry = &self.config.retry;
        let retry_strategy = ExponentialBackoff::from_millis(2)
            .factor((retry.initial_delay_ms / 2).max(1))
            .max_delay(Duration::from_millis(retry.max_delay_ms))
            .map(jitter)
            .take(retry.max_attempts);

        let attempts = AtomicUsize::new(0);
        let started = Instant::now();
        let timeout = Duration::from_secs(self.config.timeout_seconds);

        let result = RetryIf::spawn(
            retry_strategy,
            || {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                let request = self
                    .client
                    .request(spec.method.clone(), parsed.clone())
                    .headers(spec.headers.clone())
                    .query(&spec.query);
                let context = &context;

                async move {
                    if attempt > 1 {
                        debug!(
                            destination = %context.destination,
                            url = %context.display_url,
                            attempt,
                            "Retrying upstream request"
                        );
                    }
                    let attempt_start = Instant::now();
                    let outcome = tokio::time::timeout(timeout, request.send()).await;
                    self.classify(context, outcome, attempt_start.elapsed())
                }
            },
            |err: &ResilientClientError| {
                let retryable = err.is_retryable();
                if retryable {
                    self.record_retry_attempt(&destination, err.reason());
                }
                retryable
            },
        )
        .await;

        let elapsed = started.elapsed();
        let outcome = match &result {
            Ok(_) => "success",
            Err(ResilientClientError::RetryableStatus(_)) => "retry_exhausted",
            Err(ResilientClientError::Timeout) => "timeout",
            Err(ResilientClientError::NetworkError(_)) => "network_error",
            Err(_) => "error",
        };
        self.record_request_metrics(&context, outcome, elapsed);
        self.settle(&destination, result.is_ok());

        result
    }

    /// Map a single attempt to success or a (possibly retryable) error
    fn classify(
        &self,
        context: &RequestContext,
        outcome: Result<Result<reqwest::Response, reqwest::Error>, tokio::time::error::Elapsed>,
        duration: Duration,
    ) -> Result<reqwest::Response, ResilientClientError> {
        match outcome {
            Ok(Ok(response)) => {
                let status = response.status().as_u16();
                if self.config.retry.retry_on_status.contains(&status) {
                    warn!(
                        destination = %context.destination,
                        method = %context.method,
                        url = %context.display_url,
                        status,
                        duration_ms = duration.as_millis() as u64,
                        "Upstream returned retryable status"
                    );
                    Err(ResilientClientError::RetryableStatus(status))
                } else {
                    if self.config.enable_detailed_logging {
                        info!(
                            destination = %context.destination,
                            method = %context.method,
                            url = %context.display_url,
                            status,
                            duration_ms = duration.as_millis() as u64,
                            "Upstream request completed"
                        );
                    }
                    Ok(response)
                }
            }
            Ok(Err(e)) if e.is_timeout() => {
                self.record_timeout(&context.destination);
                warn!(
                    destination = %context.destination,
                    url = %context.display_url,
                    "Upstream request timed out"
                );
                Err(ResilientClientError::Timeout)
            }
            Ok(Err(e)) => {
                // The URL may carry search parameters with patient data
                let e = e.without_url();
                error!(
                    destination = %context.destination,
                    method = %context.method,
                    url = %context.display_url,
                    error = %e,
                    duration_ms = duration.as_millis() as u64,
                    "Upstream request failed with network error"
                );
                Err(ResilientClientError::NetworkError(e))
            }
            Err(_) => {
                self.record_timeout(&context.destination);
                warn!(
                    destination = %context.destination,
                    url = %context.display_url,
                    timeout_seconds = self.config.timeout_seconds,
                    "Upstream request timed out"
                );
                Err(ResilientClientError::Timeout)
            }
        }
    }

    /// Consult (and lazily create) the breaker for `destination`
    fn admit(&self, destination: &str) -> bool {
        let Ok(mut breakers) = self.circuit_breakers.lock() else {
            return true;
        };
        let breaker = breakers
            .entry(destination.to_string())
            .or_insert_with(|| SimpleCircuitBreaker::new(self.config.circuit_breaker.clone()));
        let allowed = breaker.call_allowed();
        self.record_circuit_breaker_state(destination, breaker.state());
        allowed
    }

    fn settle(&self, destination: &str, success: bool) {
        let Ok(mut breakers) = self.circuit_breakers.lock() else {
            return;
        };
        if let Some(breaker) = breakers.get_mut(destination) {
            if success {
                breaker.on_success();
            } else {
                breaker.on_failure();
            }
            self.record_circuit_breaker_state(destination, breaker.state());
        }
    }

    fn record_request_metrics(&self, context: &RequestContext, outcome: &str, duration: Duration) {
        if let Some(metrics) = &self.metrics {
            metrics
                .http_requests_total
                .with_label_values(&[
                    context.destination.as_str(),
                    context.method.as_str(),
                    outcome,
                ])
                .inc();

            metrics
                .http_request_duration_seconds
                .with_label_values(&[context.destination.as_str(), context.method.as_str()])
                .observe(duration.as_secs_f64());
        }
    }

    fn record_retry_attempt(&self, destination: &str, reason: &str) {
        if let Some(metrics) = &self.metrics {
            metrics
                .retry_attempts_total
                .with_label_values(&[destination, reason])
                .inc();
        }
    }

    fn record_timeout(&self, destination: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.timeouts_total.with_label_values(&[destination]).inc();
        }
    }

    fn record_circuit_breaker_state(&self, destination: &str, state: &CircuitBreakerState) {
        if let Some(metrics) = &self.metrics {
            metrics
                .circuit_breaker_state
                .with_label_values(&[destination])
                .set(state.gauge_value());
        }
    }
}

/// Errors that can occur with the resilient client
#[derive(Debug, thiserror::Error)]
pub enum ResilientClientError {
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Request timed out")]
    Timeout,

    #[error("Circuit breaker is open")]
    CircuitBreakerOpen,

    #[error("Upstream returned status {0}")]
    RetryableStatus(u16),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ResilientClientError {
    /// Whether another attempt could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            ResilientClientError::NetworkError(e) => !e.is_builder() && !e.is_redirect(),
            ResilientClientError::Timeout | ResilientClientError::RetryableStatus(_) => true,
            ResilientClientError::CircuitBreakerOpen | ResilientClientError::InvalidRequest(_) => {
                false
            }
        }
    }

    fn reason(&self) -> &'static str {
        match self {
            ResilientClientError::NetworkError(_) => "network_error",
            ResilientClientError::Timeout => "timeout",
            ResilientClientError::RetryableStatus(_) => "http_status",
            ResilientClientError::CircuitBreakerOpen => "circuit_open",
            ResilientClientError::InvalidRequest(_) => "invalid_request",
        }
    }

    /// Get a user-friendly error message for tool results
    pub fn user_message(&self) -> String {
        match self {
            ResilientClientError::NetworkError(e) => format!("Upstream unreachable: {e}"),
            ResilientClientError::Timeout => "Upstream request timed out".to_string(),
            ResilientClientError::CircuitBreakerOpen => {
                "Upstream temporarily unavailable, please try again later".to_string()
            }
            ResilientClientError::RetryableStatus(status) => {
                format!("Upstream returned error status {status}")
            }
            ResilientClientError::InvalidRequest(msg) => format!("Invalid request: {msg}"),
        }
    }
}
