//! Relay configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use webhook_relay::SenderConfig;

/// Environment variable overriding the receiver secret.
pub const SECRET_ENV: &str = "WEBHOOK_RELAY_SECRET";

/// Environment variable overriding the listen port.
pub const PORT_ENV: &str = "WEBHOOK_RELAY_PORT";

/// Complete relay configuration. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Listener and logging settings.
    pub server: ServerConfig,
    /// Inbound settings.
    pub receiver: ReceiverConfig,
    /// Outbound settings.
    pub sender: SenderSettings,
    /// Forwarding endpoints.
    pub forward: Vec<ForwardConfig>,
}

/// Server-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Log level used when `RUST_LOG` is not set.
    pub log_level: String,
    /// Also write logs to this file.
    pub log_file: Option<PathBuf>,
    /// Largest accepted request body.
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            log_level: "info".to_string(),
            log_file: None,
            body_limit_bytes: 2 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// Returns `host:port`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Inbound configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// Shared secret; unset or empty disables the check.
    pub secret: Option<String>,
}

/// Outbound configuration, in plain units.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderSettings {
    /// Per-request timeout.
    pub timeout_secs: u64,
    /// Transport-level retries.
    pub max_retries: u32,
    /// Backoff factor.
    pub retry_backoff_ms: u64,
    /// User agent; the crate default when unset.
    pub user_agent: Option<String>,
    /// Pause between batch targets.
    pub batch_delay_ms: u64,
    /// Deadline for one logical delivery; 0 disables it.
    pub max_elapsed_secs: u64,
}

impl Default for SenderSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            max_retries: 3,
            retry_backoff_ms: 1000,
            user_agent: None,
            batch_delay_ms: 100,
            max_elapsed_secs: 60,
        }
    }
}

impl SenderSettings {
    /// Converts to the sender's configuration.
    pub fn to_sender_config(&self) -> SenderConfig {
        let mut config = SenderConfig::new()
            .timeout(Duration::from_secs(self.timeout_secs))
            .max_retries(self.max_retries)
            .retry_backoff(Duration::from_millis(self.retry_backoff_ms))
            .batch_delay(Duration::from_millis(self.batch_delay_ms))
            .max_elapsed((self.max_elapsed_secs > 0).then(|| Duration::from_secs(self.max_elapsed_secs)));

        if let Some(user_agent) = &self.user_agent {
            config = config.user_agent(user_agent.clone());
        }

        config
    }
}

/// A forwarding endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardConfig {
    /// Endpoint identifier the handler is registered under.
    pub endpoint: String,
    /// Destination URLs, tried in order.
    pub urls: Vec<String>,
    /// Secret presented to the destinations.
    #[serde(default)]
    pub secret: Option<String>,
}

impl RelayConfig {
    /// Parses configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: RelayConfig = toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `WEBHOOK_RELAY_SECRET` and `WEBHOOK_RELAY_PORT`.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides looked up through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(secret) = lookup(SECRET_ENV) {
            self.receiver.secret = Some(secret);
        }

        if let Some(port) = lookup(PORT_ENV) {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("{PORT_ENV} is not a port: {port}")))?;
        }

        Ok(())
    }

    /// Checks the forwarding section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for forward in &self.forward {
            if forward.endpoint.trim_matches('/').is_empty() {
                return Err(ConfigError::Invalid("forward endpoint must not be empty".to_string()));
            }
            if forward.urls.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "forward endpoint '{}' has no urls",
                    forward.endpoint
                )));
            }
        }
        Ok(())
    }
}

/// Loads configuration from a TOML file.
pub fn load_config(path: impl AsRef<Path>) -> Result<RelayConfig, ConfigError> {
    let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::IoError(e.to_string()))?;
    RelayConfig::from_toml_str(&content)
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = RelayConfig::default();
        assert_eq!(config.server.bind_address(), "0.0.0.0:5000");
        assert!(config.receiver.secret.is_none());
        assert!(config.forward.is_empty());

        let sender = config.sender.to_sender_config();
        assert_eq!(sender.timeout, Duration::from_secs(10));
        assert_eq!(sender.max_retries, 3);
        assert_eq!(sender.retry_backoff, Duration::from_secs(1));
        assert_eq!(sender.max_elapsed, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_partial_file() {
        let config = RelayConfig::from_toml_str(
            r#"
            [server]
            port = 8080

            [receiver]
            secret = "s3cr3t"

            [sender]
            max_retries = 1
            max_elapsed_secs = 0
            user_agent = "relay/test"

            [[forward]]
            endpoint = "forward"
            urls = ["https://a.example/hook", "https://b.example/hook"]
            secret = "forward-secret"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.receiver.secret.as_deref(), Some("s3cr3t"));
        assert_eq!(config.forward.len(), 1);
        assert_eq!(config.forward[0].urls.len(), 2);

        let sender = config.sender.to_sender_config();
        assert_eq!(sender.max_retries, 1);
        assert_eq!(sender.timeout, Duration::from_secs(10));
        assert!(sender.max_elapsed.is_none());
        assert_eq!(sender.user_agent, "relay/test");
    }

    #[test]
    fn test_forward_without_urls_is_rejected() {
        let err = RelayConfig::from_toml_str(
            r#"
            [[forward]]
            endpoint = "forward"
            urls = []
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_parse_error() {
        let err = RelayConfig::from_toml_str("[server\nport = 1").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_overrides() {
        let mut config = RelayConfig::from_toml_str("[receiver]\nsecret = \"file\"").unwrap();
        config
            .apply_overrides(|key| match key {
                SECRET_ENV => Some("env".to_string()),
                PORT_ENV => Some("9000".to_string()),
                _ => None,
            })
            .unwrap();

        assert_eq!(config.receiver.secret.as_deref(), Some("env"));
        assert_eq!(config.server.port, 9000);

        let err = config
            .apply_overrides(|key| (key == PORT_ENV).then(|| "http".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nhost = \"127.0.0.1\"\nlog_file = \"relay.log\"").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.log_file, Some(PathBuf::from("relay.log")));
    }

    #[test]
    fn test_missing_file() {
        let err = load_config("/nonexistent/relay.toml").unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}
