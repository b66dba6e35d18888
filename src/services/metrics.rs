//! Metrics collection and Prometheus integration service.

use prometheus::{
    CounterVec, Gauge, HistogramOpts, HistogramVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::time::{Duration, Instant};

/// Build metadata; absent when built outside a git checkout
pub const GIT_SHA: &str = match option_env!("VERGEN_GIT_SHA") {
    Some(sha) => sha,
    None => "unknown",
};

pub const BUILD_TIMESTAMP: &str = match option_env!("VERGEN_BUILD_TIMESTAMP") {
    Some(ts) => ts,
    None => "unknown",
};

/// Application metrics collector for Prometheus integration
#[derive(Clone)]
pub struct AppMetrics {
    pub registry: Registry,
    pub http_requests_total: CounterVec,
    pub http_request_duration_seconds: HistogramVec,
    pub app_uptime_seconds: Gauge,
    pub app_info: CounterVec,
    pub tool_calls_total: CounterVec,
    pub tool_call_duration_seconds: HistogramVec,
    pub active_sessions: IntGauge,
    pub start_time: Instant,
}

impl AppMetrics {
    /// Create a new metrics collector with its own registry
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        // HTTP request counter by method, status, and route
        let http_requests_total = CounterVec::new(
            Opts::new("http_requests_total", "Total number of HTTP requests"),
            &["method", "status", "route"],
        )?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(vec![
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
            &["method", "route"],
        )?;

        let app_uptime_seconds = Gauge::new("app_uptime_seconds", "Application uptime in seconds")?;

        let app_info = CounterVec::new(
            Opts::new("app_info", "Application information"),
            &["version", "commit", "build_time"],
        )?;

        // Outcome is one of success, error, invalid_arguments
        let tool_calls_total = CounterVec::new(
            Opts::new("mcp_tool_calls_total", "Total number of MCP tool invocations"),
            &["tool", "outcome"],
        )?;

        // Tool calls wait on upstream servers, hence the longer tail
        let tool_call_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "mcp_tool_call_duration_seconds",
                "MCP tool call duration in seconds",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
            &["tool"],
        )?;

        let active_sessions = IntGauge::new("mcp_active_sessions", "Number of live MCP sessions")?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(app_uptime_seconds.clone()))?;
        registry.register(Box::new(app_info.clone()))?;
        registry.register(Box::new(tool_calls_total.clone()))?;
        registry.register(Box::new(tool_call_duration_seconds.clone()))?;
        registry.register(Box::new(active_sessions.clone()))?;

        app_info
            .with_label_values(&[env!("CARGO_PKG_VERSION"), GIT_SHA, BUILD_TIMESTAMP])
            .inc();

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            app_uptime_seconds,
            app_info,
            tool_calls_total,
            tool_call_duration_seconds,
            active_sessions,
            start_time: Instant::now(),
        })
    }

    /// Record an HTTP request with method, route, status, and duration
    pub fn record_request(&self, method: &str, route: &str, status: u16, duration: Duration) {
        if route == "/api/metrics" {
            // Scrapes would otherwise dominate the series
            return;
        }

        self.http_requests_total
            .with_label_values(&[method, &status.to_string(), route])
            .inc();

        self.http_request_duration_seconds
            .with_label_values(&[method, route])
            .observe(duration.as_secs_f64());
    }

    pub fn record_tool_call(&self, tool: &str, outcome: &str, duration: Duration) {
        self.tool_calls_total
            .with_label_values(&[tool, outcome])
            .inc();
        self.tool_call_duration_seconds
            .with_label_values(&[tool])
            .observe(duration.as_secs_f64());
    }

    pub fn set_active_sessions(&self, count: usize) {
        self.active_sessions.set(count as i64);
    }

    /// Update the application uptime gauge
    pub fn update_uptime(&self) {
        let uptime = self.start_time.elapsed().as_secs_f64();
        self.app_uptime_seconds.set(uptime);
    }

    /// Render metrics in Prometheus text format
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder.encode_to_string(&metric_families)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_endpoint_is_not_recorded() {
        let metrics = AppMetrics::new().unwrap();
        metrics.record_request("GET", "/api/metrics", 200, Duration::from_millis(1));
        metrics.record_request("POST", "/mcp", 200, Duration::from_millis(5));

        let rendered = metrics.render().unwrap();
        assert!(rendered.contains("route=\"/mcp\""));
        assert!(!rendered.contains("route=\"/api/metrics\""));
    }

    #[test]
    fn test_tool_and_session_metrics() {
        let metrics = AppMetrics::new().unwrap();
        metrics.record_tool_call("get_patient", "success", Duration::from_millis(20));
        metrics.set_active_sessions(3);

        let rendered = metrics.render().unwrap();
        assert!(rendered.contains("mcp_tool_calls_total{outcome=\"success\",tool=\"get_patient\"} 1"));
        assert!(rendered.contains("mcp_active_sessions 3"));
        assert!(rendered.contains("app_info"));
    }
}
