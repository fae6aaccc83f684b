//! # stmlink-core
//!
//! Host-side helpers for an STM32 board that watches a camera-style UDP
//! stream and listens for ON/OFF commands on an MQTT topic.
//!
//! | Module   | Purpose                                                      |
//! |----------|--------------------------------------------------------------|
//! | `cam`    | screen capture → JPEG → `[u32 LE millis][jpeg]` UDP datagrams |
//! | `switch` | single-key console input → `ON` / `OFF` MQTT publishes       |
//! | `error`  | `LinkError`, shared by both                                  |

pub mod cam;
pub mod error;
pub mod switch;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use error::LinkError;

pub use cam::{
    FrameReceiver, FrameSink, FrameSource, FrameStreamer, JpegEncoder, PatternSource,
    StepOutcome, StreamStats, StreamerConfig, UdpFrameSender,
};
pub use switch::{
    BrokerConfig, ConnectionEvent, KeyInput, KeySource, MqttLink, Payload, SessionEnd,
    SwitchPublisher, SwitchSession, SwitchState,
};
