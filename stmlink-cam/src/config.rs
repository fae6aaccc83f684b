//! Configuration for the camera emulator.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use stmlink_core::LinkError;
use stmlink_core::cam::StreamerConfig;
use stmlink_core::cam::encoder::{DEFAULT_HEIGHT, DEFAULT_QUALITY, DEFAULT_WIDTH};
use stmlink_core::cam::packet::MAX_JPEG_SIZE;

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CamConfig {
    /// Where frames go, and where monitor mode listens.
    pub network: NetworkConfig,
    /// Frame source settings.
    pub capture: CaptureConfig,
    /// Resize and JPEG settings.
    pub encoding: EncodingConfig,
    /// Loop pacing.
    pub stream: StreamConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Receiver host name or address.
    pub target_host: String,
    /// Receiver UDP port.
    pub target_port: u16,
    /// Bind address used by `--listen` when no address is given on the
    /// command line.
    pub listen_addr: String,
}

/// Frame source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Stream a synthetic gradient instead of the desktop.
    pub test_pattern: bool,
    /// Monitor index to capture (0 = primary).
    pub monitor_index: usize,
    /// How long one capture may wait for a fresh desktop frame.
    pub capture_timeout_ms: u64,
    /// Test pattern resolution.
    pub pattern_width: u32,
    pub pattern_height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingConfig {
    /// Output resolution.
    pub width: u32,
    pub height: u32,
    /// JPEG quality, 1..=100.
    pub quality: u8,
    /// Frames whose JPEG is larger than this are dropped.
    pub max_jpeg_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Sleep after every loop iteration.
    pub frame_delay_ms: u64,
    /// Throughput log period; 0 disables it.
    pub report_interval_secs: u64,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            target_host: "127.0.0.1".into(),
            target_port: 8888,
            listen_addr: "0.0.0.0:8888".into(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            test_pattern: false,
            monitor_index: 0,
            capture_timeout_ms: 100,
            pattern_width: 1280,
            pattern_height: 720,
        }
    }
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            quality: DEFAULT_QUALITY,
            max_jpeg_bytes: MAX_JPEG_SIZE,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            frame_delay_ms: 33,
            report_interval_secs: 5,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl CamConfig {
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

    /// Override the target from a `HOST:PORT` string.
    pub fn set_target(&mut self, target: &str) -> Result<(), LinkError> {
        let (host, port) = target
            .rsplit_once(':')
            .ok_or_else(|| LinkError::Config(format!("target '{target}' is not HOST:PORT")))?;
        let port = port
            .parse::<u16>()
            .map_err(|e| LinkError::Config(format!("bad port in '{target}': {e}")))?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(LinkError::Config(format!("target '{target}' has no host")));
        }

        self.network.target_host = host.to_string();
        self.network.target_port = port;
        Ok(())
    }

    /// Resolve the target host to a socket address.
    pub async fn resolve_target(&self) -> Result<SocketAddr, LinkError> {
        let host = self.network.target_host.as_str();
        let port = self.network.target_port;
        tokio::net::lookup_host((host, port))
            .await?
            .next()
            .ok_or_else(|| LinkError::Config(format!("'{host}' did not resolve to an address")))
    }

    /// The configured monitor-mode bind address.
    pub fn listen_addr(&self) -> Result<SocketAddr, LinkError> {
        self.network.listen_addr.parse().map_err(|e| {
            LinkError::Config(format!("bad listen_addr '{}': {e}", self.network.listen_addr))
        })
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), LinkError> {
        let enc = &self.encoding;
        if enc.width == 0 || enc.height == 0 {
            return Err(LinkError::Config(format!(
                "output resolution must be non-zero, got {}x{}",
                enc.width, enc.height
            )));
        }
        if !(1..=100).contains(&enc.quality) {
            return Err(LinkError::Config(format!(
                "quality must be 1..=100, got {}",
                enc.quality
            )));
        }
        if enc.max_jpeg_bytes == 0 {
            return Err(LinkError::Config("max_jpeg_bytes must be non-zero".into()));
        }
        if self.capture.test_pattern
            && (self.capture.pattern_width == 0 || self.capture.pattern_height == 0)
        {
            return Err(LinkError::Config("test pattern size must be non-zero".into()));
        }
        if self.network.target_host.is_empty() {
            return Err(LinkError::Config("target_host is empty".into()));
        }
        Ok(())
    }

    /// Convert into the streamer's runtime settings.
    pub fn to_streamer_config(&self) -> StreamerConfig {
        StreamerConfig {
            width: self.encoding.width,
            height: self.encoding.height,
            quality: self.encoding.quality,
            max_jpeg_size: self.encoding.max_jpeg_bytes,
            frame_delay: Duration::from_millis(self.stream.frame_delay_ms),
            report_interval: Duration::from_secs(self.stream.report_interval_secs),
        }
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture.capture_timeout_ms)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let cfg = CamConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        assert!(text.contains("target_port"));
        assert!(text.contains("max_jpeg_bytes"));
    }

    #[test]
    fn defaults_match_camera_stream() {
        let cfg = CamConfig::default();
        let stream = cfg.to_streamer_config();
        assert_eq!((stream.width, stream.height), (640, 480));
        assert_eq!(stream.quality, 80);
        assert_eq!(stream.max_jpeg_size, 60_000);
        assert_eq!(stream.frame_delay, Duration::from_millis(33));
        assert_eq!(cfg.network.target_port, 8888);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let parsed: CamConfig = toml::from_str(
            r#"
            [encoding]
            quality = 50
            "#,
        )
        .unwrap();
        assert_eq!(parsed.encoding.quality, 50);
        assert_eq!(parsed.encoding.width, 640);
        assert_eq!(parsed.network.target_host, "127.0.0.1");
    }

    #[test]
    fn missing_file_falls_back() {
        let cfg = CamConfig::load(Path::new("/nonexistent/stmlink-cam.toml"));
        assert_eq!(cfg.network.target_port, 8888);
    }

    #[test]
    fn target_override() {
        let mut cfg = CamConfig::default();
        cfg.set_target("192.168.4.1:9000").unwrap();
        assert_eq!(cfg.network.target_host, "192.168.4.1");
        assert_eq!(cfg.network.target_port, 9000);

        cfg.set_target("[::1]:7000").unwrap();
        assert_eq!(cfg.network.target_host, "::1");

        assert!(cfg.set_target("no-port").is_err());
        assert!(cfg.set_target("host:99999").is_err());
        assert!(cfg.set_target(":8888").is_err());
    }

    #[test]
    fn validate_rejects_out_of_range() {
        let mut cfg = CamConfig::default();
        cfg.encoding.quality = 0;
        assert!(matches!(cfg.validate(), Err(LinkError::Config(_))));

        let mut cfg = CamConfig::default();
        cfg.encoding.width = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = CamConfig::default();
        cfg.encoding.max_jpeg_bytes = 0;
        assert!(cfg.validate().is_err());
    }

    #[tokio::test]
    async fn resolves_literal_target() {
        let cfg = CamConfig::default();
        let addr = cfg.resolve_target().await.unwrap();
        assert_eq!(addr, "127.0.0.1:8888".parse::<SocketAddr>().unwrap());
    }
}
