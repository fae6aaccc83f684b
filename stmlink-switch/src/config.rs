//! Configuration for the switch publisher.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use stmlink_core::switch::{BrokerConfig, POLL_INTERVAL};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchConfig {
    pub broker: BrokerSection,
    pub input: InputConfig,
    pub logging: LoggingConfig,
}

/// MQTT broker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerSection {
    pub host: String,
    pub port: u16,
    /// Empty generates `stmlink-switch-<pid>`.
    pub client_id: String,
    /// Topic the device subscribes to.
    pub topic: String,
    pub keep_alive_secs: u64,
    /// 0, 1 or 2.
    pub qos: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Key polling period in milliseconds.
    pub poll_interval_ms: u64,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for BrokerSection {
    fn default() -> Self {
        let broker = BrokerConfig::default();
        Self {
            host: broker.host,
            port: broker.port,
            client_id: broker.client_id,
            topic: broker.topic,
            keep_alive_secs: broker.keep_alive.as_secs(),
            qos: broker.qos,
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: POLL_INTERVAL.as_millis() as u64,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            // Quiet by default; the console already shows every action.
            level: "warn".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl SwitchConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Convert the broker section into the link's settings.
    pub fn to_broker_config(&self) -> BrokerConfig {
        BrokerConfig {
            host: self.broker.host.clone(),
            port: self.broker.port,
            client_id: self.broker.client_id.clone(),
            topic: self.broker.topic.clone(),
            keep_alive: Duration::from_secs(self.broker.keep_alive_secs),
            qos: self.broker.qos,
        }
    }

    /// Polling period, never below 1 ms.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.input.poll_interval_ms.max(1))
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_device_setup() {
        let cfg = SwitchConfig::default();
        let broker = cfg.to_broker_config();
        assert_eq!(broker.host, "emqx.van.xrak.xyz");
        assert_eq!(broker.port, 1883);
        assert_eq!(broker.topic, "LED");
        assert_eq!(broker.keep_alive, Duration::from_secs(60));
        assert_eq!(cfg.poll_interval(), Duration::from_millis(100));
        assert!(broker.validate().is_ok());
    }

    #[test]
    fn roundtrip_config() {
        let text = toml::to_string_pretty(&SwitchConfig::default()).unwrap();
        assert!(text.contains("keep_alive_secs"));
        let parsed: SwitchConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.broker.topic, "LED");
        assert_eq!(parsed.input.poll_interval_ms, 100);
    }

    #[test]
    fn partial_file_overrides_only_given_keys() {
        let parsed: SwitchConfig = toml::from_str(
            r#"
            [broker]
            host = "localhost"
            topic = "lab/LED"
            "#,
        )
        .unwrap();
        let broker = parsed.to_broker_config();
        assert_eq!(broker.host, "localhost");
        assert_eq!(broker.topic, "lab/LED");
        assert_eq!(broker.port, 1883);
    }

    #[test]
    fn zero_poll_interval_is_clamped() {
        let mut cfg = SwitchConfig::default();
        cfg.input.poll_interval_ms = 0;
        assert_eq!(cfg.poll_interval(), Duration::from_millis(1));
    }

    #[test]
    fn empty_topic_fails_validation() {
        let mut cfg = SwitchConfig::default();
        cfg.broker.topic.clear();
        assert!(cfg.to_broker_config().validate().is_err());
    }
}
