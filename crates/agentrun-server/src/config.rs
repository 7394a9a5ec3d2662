//! Server configuration.

/// HTTP server configuration.
pub struct ServerConfig {
    /// HTTP bind address.
    pub http_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: "127.0.0.1:8080".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load from the environment (`AGENTRUN_HTTP_ADDR`), falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            http_addr: std::env::var("AGENTRUN_HTTP_ADDR").unwrap_or(defaults.http_addr),
        }
    }
}
