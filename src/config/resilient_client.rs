//! Configuration for the upstream HTTP client
//!
//! Provides environment-based configuration for the resilient HTTP client
//! shared by the FHIR, document and medicine services.

use crate::services::resilient_client::{
    CircuitBreakerConfig, ResilientClientConfig, RetryConfig,
};
use std::env;
use std::str::FromStr;

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl ResilientClientConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            timeout_seconds: env_or("HTTP_CLIENT_TIMEOUT_SECONDS", defaults.timeout_seconds),
            connect_timeout_seconds: env_or(
                "HTTP_CLIENT_CONNECT_TIMEOUT_SECONDS",
                defaults.connect_timeout_seconds,
            ),
            retry: RetryConfig::from_env(),
            circuit_breaker: CircuitBreakerConfig::from_env(),
            enable_detailed_logging: env_or(
                "HTTP_CLIENT_DETAILED_LOGGING",
                defaults.enable_detailed_logging,
            ),
        }
    }
}

impl RetryConfig {
    /// Load retry configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        // Comma-separated status codes, e.g. "429,503"
        let retry_on_status = env::var("HTTP_CLIENT_RETRY_ON_STATUS")
            .ok()
            .map(|v| {
                v.split(',')
                    .filter_map(|s| s.trim().parse::<u16>().ok())
                    .collect()
            })
            .unwrap_or(defaults.retry_on_status);

        Self {
            max_attempts: env_or("HTTP_CLIENT_RETRY_MAX_ATTEMPTS", defaults.max_attempts),
            initial_delay_ms: env_or(
                "HTTP_CLIENT_RETRY_INITIAL_DELAY_MS",
                defaults.initial_delay_ms,
            ),
            max_delay_ms: env_or("HTTP_CLIENT_RETRY_MAX_DELAY_MS", defaults.max_delay_ms),
            retry_on_status,
        }
    }
}

impl CircuitBreakerConfig {
    /// Load circuit breaker configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            failure_threshold: env_or(
                "HTTP_CLIENT_CB_FAILURE_THRESHOLD",
                defaults.failure_threshold,
            ),
            success_threshold: env_or(
                "HTTP_CLIENT_CB_SUCCESS_THRESHOLD",
                defaults.success_threshold,
            ),
            timeout_seconds: env_or("HTTP_CLIENT_CB_TIMEOUT_SECONDS", defaults.timeout_seconds),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Mutex to synchronize tests that modify environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const KEYS: &[&str] = &[
        "HTTP_CLIENT_TIMEOUT_SECONDS",
        "HTTP_CLIENT_CONNECT_TIMEOUT_SECONDS",
        "HTTP_CLIENT_DETAILED_LOGGING",
        "HTTP_CLIENT_RETRY_MAX_ATTEMPTS",
        "HTTP_CLIENT_RETRY_INITIAL_DELAY_MS",
        "HTTP_CLIENT_RETRY_MAX_DELAY_MS",
        "HTTP_CLIENT_RETRY_ON_STATUS",
        "HTTP_CLIENT_CB_FAILURE_THRESHOLD",
        "HTTP_CLIENT_CB_SUCCESS_THRESHOLD",
        "HTTP_CLIENT_CB_TIMEOUT_SECONDS",
    ];

    fn clear_env() {
        for key in KEYS {
            unsafe {
                env::remove_var(key);
            }
        }
    }

    #[test]
    fn test_defaults_without_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();

        let config = ResilientClientConfig::from_env();
        assert_eq!(config.timeout_seconds, 30);
        assert_eq!(config.connect_timeout_seconds, 10);
        assert!(!config.enable_detailed_logging);
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
    }

    #[test]
    fn test_overrides_from_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();
        unsafe {
            env::set_var("HTTP_CLIENT_TIMEOUT_SECONDS", "5");
            env::set_var("HTTP_CLIENT_DETAILED_LOGGING", "true");
            env::set_var("HTTP_CLIENT_RETRY_MAX_ATTEMPTS", "0");
            env::set_var("HTTP_CLIENT_RETRY_ON_STATUS", "502, 503,junk");
            env::set_var("HTTP_CLIENT_CB_FAILURE_THRESHOLD", "not-a-number");
        }

        let config = ResilientClientConfig::from_env();
        assert_eq!(config.timeout_seconds, 5);
        assert!(config.enable_detailed_logging);
        assert_eq!(config.retry.max_attempts, 0);
        assert_eq!(config.retry.retry_on_status, vec![502, 503]);
        assert_eq!(config.circuit_breaker.failure_threshold, 5);

        clear_env();
    }
}
