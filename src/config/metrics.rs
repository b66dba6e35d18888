//! Metrics configuration.

use std::env;

/// Whether `/api/metrics` exposes the Prometheus registry
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl MetricsConfig {
    pub fn from_env() -> Self {
        let enabled = env::var("METRICS_ENABLED")
            .ok()
            .and_then(|v| v.to_lowercase().parse().ok())
            .unwrap_or(true);

        Self { enabled }
    }
}
