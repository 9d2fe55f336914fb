//! Configuration loading for medsync-client.
//!
//! Configuration is loaded from a TOML file (default: `medsync.toml`).
//! Every section and field is optional.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use medsync_core::{ReconnectPolicy, DEFAULT_MAX_QUEUE_SIZE};

/// Root configuration for the offline core.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoreConfig {
    /// Cloud endpoint configuration.
    #[serde(default)]
    pub cloud: CloudConfig,
    /// Edge endpoint configuration.
    #[serde(default)]
    pub edge: EdgeConfig,
    /// Session channel configuration.
    #[serde(default)]
    pub channel: ChannelConfig,
    /// Request configuration.
    #[serde(default)]
    pub requests: RequestConfig,
    /// Queue drain configuration.
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Cloud endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CloudConfig {
    /// Base URL of the cloud translation API.
    #[serde(default = "default_cloud_url")]
    pub base_url: String,
}

/// Edge endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EdgeConfig {
    /// Edge addresses to health-check on discovery, in addition to
    /// whatever the cloud reports.
    #[serde(default)]
    pub candidates: Vec<String>,
    /// Health check timeout in milliseconds (default: 3000).
    #[serde(default = "default_health_timeout_ms")]
    pub health_timeout_ms: u64,
}

/// Session channel configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelConfig {
    /// WebSocket base URL. Derived from the cloud URL when absent.
    pub ws_url: Option<String>,
    /// Handshake timeout in milliseconds (default: 5000).
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
    /// First reconnect delay in milliseconds (default: 1000).
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Reconnect delay cap in milliseconds (default: 30000).
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    /// Random jitter cap in milliseconds (default: 0, disabled).
    #[serde(default)]
    pub backoff_jitter_ms: u64,
    /// Reconnect attempts before giving up (default: 5).
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
}

/// Request configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestConfig {
    /// Per-attempt translate timeout in milliseconds (default: 10000).
    #[serde(default = "default_request_timeout_ms")]
    pub timeout_ms: u64,
}

/// Queue drain configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Failed replays allowed before an item is marked failed (default: 3).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Pause between replayed items in milliseconds (default: 250).
    #[serde(default = "default_item_delay_ms")]
    pub item_delay_ms: u64,
    /// Maximum queued items (default: 10000).
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
}

// Default value functions
fn default_cloud_url() -> String {
    "https://api.medtranslate.ai".to_string()
}

fn default_health_timeout_ms() -> u64 {
    3_000
}

fn default_handshake_timeout_ms() -> u64 {
    5_000
}

fn default_backoff_base_ms() -> u64 {
    1_000
}

fn default_backoff_max_ms() -> u64 {
    30_000
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_item_delay_ms() -> u64 {
    250
}

fn default_max_queue_size() -> usize {
    DEFAULT_MAX_QUEUE_SIZE
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            base_url: default_cloud_url(),
        }
    }
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            candidates: Vec::new(),
            health_timeout_ms: default_health_timeout_ms(),
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            ws_url: None,
            handshake_timeout_ms: default_handshake_timeout_ms(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            backoff_jitter_ms: 0,
            max_reconnect_attempts: default_max_reconnect_attempts(),
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            item_delay_ms: default_item_delay_ms(),
            max_queue_size: default_max_queue_size(),
        }
    }
}

impl CoreConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

impl EdgeConfig {
    /// Health check timeout.
    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }
}

impl ChannelConfig {
    /// Handshake timeout.
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    /// Reconnect policy built from the backoff fields.
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            base_delay: Duration::from_millis(self.backoff_base_ms),
            max_delay: Duration::from_millis(self.backoff_max_ms),
            max_attempts: self.max_reconnect_attempts,
            jitter_max: Duration::from_millis(self.backoff_jitter_ms),
        }
    }

    /// The WebSocket base URL: `ws_url` if set, otherwise the cloud URL with
    /// its scheme switched (`https` → `wss`, `http` → `ws`).
    pub fn resolve_ws_url(&self, cloud_base_url: &str) -> String {
        if let Some(url) = &self.ws_url {
            return url.trim_end_matches('/').to_string();
        }
        let base = cloud_base_url.trim_end_matches('/');
        if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            base.to_string()
        }
    }
}

impl RequestConfig {
    /// Per-attempt translate timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl SyncConfig {
    /// Pause between replayed items.
    pub fn item_delay(&self) -> Duration {
        Duration::from_millis(self.item_delay_ms)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_values() {
        let config = CoreConfig::default();
        assert_eq!(config.cloud.base_url, "https://api.medtranslate.ai");
        assert_eq!(config.channel.handshake_timeout(), Duration::from_secs(5));
        assert_eq!(config.requests.timeout(), Duration::from_secs(10));
        assert_eq!(config.edge.health_timeout(), Duration::from_secs(3));
        assert_eq!(config.sync.max_retries, 3);
        assert_eq!(config.sync.item_delay(), Duration::from_millis(250));
    }

    #[test]
    fn default_reconnect_policy() {
        let policy = ChannelConfig::default().reconnect_policy();
        assert_eq!(policy, ReconnectPolicy::default());
    }

    #[test]
    fn config_from_toml_string() {
        let toml = r#"
[cloud]
base_url = "https://cloud.example"

[edge]
candidates = ["http://192.168.1.20:3000", "http://192.168.1.21:3000"]

[channel]
max_reconnect_attempts = 8
backoff_jitter_ms = 500

[requests]
timeout_ms = 4000

[sync]
item_delay_ms = 0
"#;

        let config: CoreConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.cloud.base_url, "https://cloud.example");
        assert_eq!(config.edge.candidates.len(), 2);
        assert_eq!(config.edge.health_timeout_ms, 3_000);
        assert_eq!(config.channel.reconnect_policy().max_attempts, 8);
        assert_eq!(
            config.channel.reconnect_policy().jitter_max,
            Duration::from_millis(500)
        );
        assert_eq!(config.requests.timeout_ms, 4_000);
        assert_eq!(config.sync.item_delay_ms, 0);
        assert_eq!(config.sync.max_retries, 3);
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config: CoreConfig = toml::from_str("").unwrap();
        assert_eq!(config.sync.max_queue_size, DEFAULT_MAX_QUEUE_SIZE);
        assert!(config.edge.candidates.is_empty());
    }

    #[test]
    fn ws_url_derived_from_cloud_scheme() {
        let channel = ChannelConfig::default();
        assert_eq!(
            channel.resolve_ws_url("https://api.medtranslate.ai/"),
            "wss://api.medtranslate.ai"
        );
        assert_eq!(channel.resolve_ws_url("http://localhost:8080"), "ws://localhost:8080");

        let explicit = ChannelConfig {
            ws_url: Some("wss://ws.example/".into()),
            ..ChannelConfig::default()
        };
        assert_eq!(explicit.resolve_ws_url("https://ignored"), "wss://ws.example");
    }

    #[test]
    fn missing_file_is_read_error() {
        let result = CoreConfig::from_file(std::path::Path::new("/nonexistent/medsync.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn invalid_toml_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("medsync.toml");
        std::fs::write(&path, "[sync]\nmax_retries = \"three\"").unwrap();
        let result = CoreConfig::from_file(&path);
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }
}
