//! Client configuration.

use std::path::Path;
use std::time::Duration;

use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::transport::ReconnectPolicy;

/// Environment variable overriding the WebSocket endpoint.
pub const WS_URL_VAR: &str = "STRICTLY_WS_URL";
/// Environment variable overriding the REST base URL.
pub const API_URL_VAR: &str = "STRICTLY_API_URL";

/// Top-level client configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Getters, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Where the game server lives.
    server: ServerConfig,
    /// Reconnect schedule.
    reconnect: ReconnectConfig,
}

/// Server endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// WebSocket endpoint for session traffic.
    ws_url: String,
    /// Base URL of the REST API.
    api_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ws_url: "ws://127.0.0.1:3000".to_string(),
            api_url: "http://127.0.0.1:3000".to_string(),
        }
    }
}

/// Backoff settings, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Getters, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Unit delay.
    base_ms: u64,
    /// Longest single delay.
    cap_ms: u64,
    /// Attempts before giving up.
    max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_ms: 1000,
            cap_ms: 30_000,
            max_attempts: 5,
        }
    }
}

impl From<ReconnectConfig> for ReconnectPolicy {
    fn from(config: ReconnectConfig) -> Self {
        ReconnectPolicy::new(
            Duration::from_millis(config.base_ms),
            Duration::from_millis(config.cap_ms),
            config.max_attempts,
        )
    }
}

impl ClientConfig {
    /// Loads configuration from a TOML file. Missing keys take defaults.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;

        info!(ws_url = %config.server.ws_url, "Config loaded successfully");
        Ok(config)
    }

    /// Applies endpoint overrides from the environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(
            std::env::var(WS_URL_VAR).ok(),
            std::env::var(API_URL_VAR).ok(),
        )
    }

    /// Replaces endpoints that are given.
    pub fn with_overrides(mut self, ws_url: Option<String>, api_url: Option<String>) -> Self {
        if let Some(url) = ws_url {
            debug!(%url, "Overriding WebSocket URL");
            self.server.ws_url = url;
        }
        if let Some(url) = api_url {
            debug!(%url, "Overriding API URL");
            self.server.api_url = url;
        }
        self
    }

    /// Transport reconnect policy.
    pub fn policy(&self) -> ReconnectPolicy {
        self.reconnect.into()
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.server().ws_url(), "ws://127.0.0.1:3000");
        assert_eq!(config.policy(), ReconnectPolicy::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[server]\nws_url = \"wss://games.example/ws\"\n\n[reconnect]\nmax_attempts = 3"
        )
        .unwrap();

        let config = ClientConfig::from_file(file.path()).unwrap();
        assert_eq!(config.server().ws_url(), "wss://games.example/ws");
        assert_eq!(config.server().api_url(), "http://127.0.0.1:3000");
        assert_eq!(*config.reconnect().max_attempts(), 3);
        assert_eq!(*config.reconnect().base_ms(), 1000);
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ClientConfig::from_file(dir.path().join("absent.toml")).unwrap_err();
        assert!(err.message.contains("Failed to read config file"));
    }

    #[test]
    fn test_bad_toml_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nws_url = 3").unwrap();
        let err = ClientConfig::from_file(file.path()).unwrap_err();
        assert!(err.message.contains("Failed to parse config"));
    }

    #[test]
    fn test_overrides_replace_only_given_urls() {
        let config = ClientConfig::default().with_overrides(Some("ws://other:9".into()), None);
        assert_eq!(config.server().ws_url(), "ws://other:9");
        assert_eq!(config.server().api_url(), "http://127.0.0.1:3000");
    }

    #[test]
    fn test_policy_from_millis() {
        let policy: ReconnectPolicy = ReconnectConfig {
            base_ms: 250,
            cap_ms: 1000,
            max_attempts: 2,
        }
        .into();
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.schedule().len(), 2);
    }
}
