//! HTTP listener and MCP transport configuration.

use std::env;

/// Configuration for the HTTP listener and the MCP endpoint
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Path the MCP streamable HTTP endpoint is mounted at
    pub mcp_path: String,
    /// When true no sessions are issued or required
    pub stateless: bool,
    /// Idle time after which a session is forgotten
    pub session_ttl_seconds: u64,
    /// Live sessions kept at once; the least recently used is evicted beyond this
    pub max_sessions: usize,
    /// Name reported in `serverInfo` during initialization
    pub server_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            mcp_path: "/mcp".to_string(),
            stateless: false,
            session_ttl_seconds: 3600,
            max_sessions: 1000,
            server_name: "FHIR Server".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let host = env::var("HOST").unwrap_or(defaults.host);

        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.port);

        let mcp_path = env::var("MCP_PATH")
            .map(|v| normalize_path(&v))
            .unwrap_or(defaults.mcp_path);

        let stateless = env::var("MCP_STATELESS")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(defaults.stateless);

        let session_ttl_seconds = env::var("MCP_SESSION_TTL_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.session_ttl_seconds);

        let max_sessions = env::var("MCP_MAX_SESSIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.max_sessions);

        let server_name = env::var("MCP_SERVER_NAME").unwrap_or(defaults.server_name);

        Self {
            host,
            port,
            mcp_path,
            stateless,
            session_ttl_seconds,
            max_sessions,
            server_name,
        }
    }

    /// Address tuple accepted by `HttpServer::bind`
    pub fn bind_address(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }
}

/// Ensure a leading slash and strip trailing ones (`mcp/` becomes `/mcp`)
fn normalize_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        "/mcp".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_container_contract() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.mcp_path, "/mcp");
        assert!(!config.stateless);
        assert_eq!(config.max_sessions, 1000);
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("mcp/"), "/mcp");
        assert_eq!(normalize_path("/mcp/"), "/mcp");
        assert_eq!(normalize_path("/api/mcp"), "/api/mcp");
        assert_eq!(normalize_path("/"), "/mcp");
        assert_eq!(normalize_path(""), "/mcp");
    }
}
