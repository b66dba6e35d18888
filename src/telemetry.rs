//! Tracing setup, request log fields and redaction of sensitive values.

use actix_web::HttpRequest;
use regex::Regex;
use std::env;
use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub format: LogFormat,
    /// `EnvFilter` directives used when `RUST_LOG` is unset
    pub default_filter: String,
    pub service_name: String,
    pub environment: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            default_filter: "info".to_string(),
            service_name: env!("CARGO_PKG_NAME").to_string(),
            environment: "development".to_string(),
        }
    }
}

impl TelemetryConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let format = match env::var("LOG_FORMAT") {
            Ok(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Self {
            format,
            default_filter: env::var("LOG_LEVEL").unwrap_or(defaults.default_filter),
            service_name: defaults.service_name,
            environment: env::var("APP_ENVIRONMENT").unwrap_or(defaults.environment),
        }
    }
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` takes precedence over the configured default filter. Calling this
/// twice returns an error from the second call instead of panicking.
pub fn init_tracing(config: &TelemetryConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.default_filter))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    match config.format {
        LogFormat::Json => builder.json().with_current_span(false).try_init()?,
        LogFormat::Pretty => builder.try_init()?,
    }

    tracing::info!(
        service_name = %config.service_name,
        service_version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        "Tracing initialized"
    );

    Ok(())
}

/// Per-request fields attached to access log lines
pub struct RequestLogFields {
    pub user_agent: Option<String>,
    pub client_address: String,
    pub method: String,
    pub path: String,
}

impl RequestLogFields {
    pub fn from_request(req: &HttpRequest) -> Self {
        Self {
            user_agent: req
                .headers()
                .get("user-agent")
                .and_then(|h| h.to_str().ok())
                .map(|s| s.to_string()),
            client_address: req
                .connection_info()
                .realip_remote_addr()
                .unwrap_or("unknown")
                .to_string(),
            method: req.method().to_string(),
            path: req.path().to_string(),
        }
    }
}

/// Sensitive data patterns to redact
static SENSITIVE_PATTERNS: &[(&str, &str)] = &[
    (r"(?i)bearer\s+[A-Za-z0-9\-._~+/]+=*", "Bearer [REDACTED]"),
    (
        r#"(?i)"(password|token|access_token|api[_-]?key|secret|authorization)":\s*"[^"]*""#,
        r#""$1": "[REDACTED]""#,
    ),
];

fn sensitive_regexes() -> &'static [(Regex, &'static str)] {
    static COMPILED: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        SENSITIVE_PATTERNS
            .iter()
            .filter_map(|(pattern, replacement)| {
                Regex::new(pattern).ok().map(|re| (re, *replacement))
            })
            .collect()
    })
}

/// Redact credentials from free text before it is logged or returned
pub fn redact_sensitive_data(input: &str) -> String {
    let mut result = input.to_string();
    for (re, replacement) in sensitive_regexes() {
        result = re.replace_all(&result, *replacement).into_owned();
    }
    result
}

/// Strip query string, fragment and userinfo from a URL for logging
///
/// FHIR search parameters routinely contain patient names and identifiers.
pub fn redact_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) => {
            let had_query = parsed.query().is_some();
            parsed.set_query(None);
            parsed.set_fragment(None);
            let _ = parsed.set_username("");
            let _ = parsed.set_password(None);
            let mut rendered = parsed.to_string();
            if had_query {
                rendered.push_str("?[REDACTED]");
            }
            rendered
        }
        Err(_) => raw.split('?').next().unwrap_or_default().to_string(),
    }
}
