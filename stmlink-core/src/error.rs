//! Error types shared by the streamer and the switch publisher.
//!
//! All fallible operations return `Result<T, LinkError>`.
//! Loops decide per variant whether an error skips one iteration or ends
//! the program; the type itself carries no policy.

use std::time::Duration;
use thiserror::Error;

/// The canonical error type for stmlink.
#[derive(Debug, Error)]
pub enum LinkError {
    // ── I/O ──────────────────────────────────────────────────────
    /// A socket or terminal operation failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    // ── Frame pipeline ───────────────────────────────────────────
    /// The screen capture backend reported a failure.
    #[error("capture failed: {0}")]
    Capture(String),

    /// Pixel conversion, resizing or JPEG compression failed.
    #[error("encoding error: {0}")]
    Encode(String),

    /// The encoded frame is larger than the datagram budget.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// A received datagram does not follow the `[counter][jpeg]` layout.
    #[error("invalid packet: {0}")]
    InvalidPacket(&'static str),

    // ── Broker ───────────────────────────────────────────────────
    /// The MQTT client reported an error.
    #[error("broker error: {0}")]
    Broker(String),

    /// An mpsc channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,

    /// A bounded wait ran out.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    // ── Setup ────────────────────────────────────────────────────
    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

impl From<String> for LinkError {
    fn from(s: String) -> Self {
        LinkError::Other(s)
    }
}

impl From<&str> for LinkError {
    fn from(s: &str) -> Self {
        LinkError::Other(s.to_string())
    }
}

impl From<image::ImageError> for LinkError {
    fn from(e: image::ImageError) -> Self {
        LinkError::Encode(e.to_string())
    }
}

impl From<rumqttc::ClientError> for LinkError {
    fn from(e: rumqttc::ClientError) -> Self {
        LinkError::Broker(e.to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for LinkError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        LinkError::ChannelClosed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = LinkError::FrameTooLarge {
            size: 70_000,
            max: 60_000,
        };
        assert!(e.to_string().contains("70000"));
        assert!(e.to_string().contains("60000"));
    }

    #[test]
    fn from_string() {
        let e: LinkError = "something broke".into();
        assert!(matches!(e, LinkError::Other(_)));
    }

    #[test]
    fn from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let e: LinkError = io_err.into();
        assert!(matches!(e, LinkError::Io(_)));
    }
}
