//! Bridge configuration loading.

use std::path::Path;

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

const DEFAULT_URL: &str = "ws://localhost:8080/controller/websocket";
const DEFAULT_TOPIC: &str = "controllers:browser";

/// Which wire vocabulary the bridge speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vocabulary {
    Current,
    Legacy,
}

/// Runtime configuration for the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// WebSocket endpoint of the controller socket.
    pub url: String,
    /// Channel topic to join.
    pub topic: String,
    /// Flat reconnect interval in milliseconds. Half a second is safe for a
    /// controller expecting fewer than five simultaneous connections.
    pub reconnect_after_ms: u64,
    /// Heartbeat interval in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// Name of the dedicated connection-status port.
    pub status_port: String,
    /// Wire vocabulary to load binding tables for.
    pub vocabulary: Vocabulary,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            topic: DEFAULT_TOPIC.to_string(),
            reconnect_after_ms: 500,
            heartbeat_interval_ms: 1000,
            status_port: "connectionStatus".to_string(),
            vocabulary: Vocabulary::Current,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from defaults, an optional TOML file, and
    /// `BRIDGE__*` environment overrides, in that precedence order.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("url", DEFAULT_URL)?
            .set_default("topic", DEFAULT_TOPIC)?
            .set_default("reconnect_after_ms", 500_i64)?
            .set_default("heartbeat_interval_ms", 1000_i64)?
            .set_default("status_port", "connectionStatus")?
            .set_default("vocabulary", "current")?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        builder
            .add_source(Environment::with_prefix("BRIDGE").separator("__"))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::load(None).unwrap();
        assert_eq!(config.topic, "controllers:browser");
        assert_eq!(config.reconnect_after_ms, 500);
        assert_eq!(config.heartbeat_interval_ms, 1000);
        assert_eq!(config.vocabulary, Vocabulary::Current);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.toml");
        std::fs::write(
            &path,
            "url = \"ws://music.local/controller/websocket\"\nvocabulary = \"legacy\"\n",
        )
        .unwrap();

        let config = BridgeConfig::load(Some(&path)).unwrap();
        assert_eq!(config.url, "ws://music.local/controller/websocket");
        assert_eq!(config.vocabulary, Vocabulary::Legacy);
        // Untouched keys keep their defaults.
        assert_eq!(config.topic, "controllers:browser");
    }
}
