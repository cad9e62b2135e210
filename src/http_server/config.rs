//! HTTP Server Configuration
//!
//! Bind address, CORS origins and pagination limits.

use serde::{Deserialize, Serialize};

/// HTTP server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpServerConfig {
    /// Host to bind to (default: "0.0.0.0")
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind to (default: 8000)
    #[serde(default = "default_port")]
    pub port: u16,

    /// CORS allowed origins; empty allows any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Page size when a list request gives no limit
    #[serde(default = "default_page_limit")]
    pub default_page_limit: usize,

    /// Largest page a list request may ask for
    #[serde(default = "max_page_limit")]
    pub max_page_limit: usize,
}

pub(crate) fn default_host() -> String {
    "0.0.0.0".to_string()
}

pub(crate) fn default_port() -> u16 {
    8000
}

pub(crate) fn default_page_limit() -> usize {
    100
}

pub(crate) fn max_page_limit() -> usize {
    1000
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
            default_page_limit: default_page_limit(),
            max_page_limit: max_page_limit(),
        }
    }
}

impl HttpServerConfig {
    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Effective page size for a requested limit.
    pub fn page_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_page_limit)
            .min(self.max_page_limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HttpServerConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8000);
        assert!(config.cors_origins.is_empty());
    }

    #[test]
    fn test_socket_addr() {
        let config = HttpServerConfig {
            port: 8080,
            ..Default::default()
        };
        assert_eq!(config.socket_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn test_page_limit_is_capped() {
        let config = HttpServerConfig::default();
        assert_eq!(config.page_limit(None), 100);
        assert_eq!(config.page_limit(Some(5)), 5);
        assert_eq!(config.page_limit(Some(50_000)), 1000);
    }
}
