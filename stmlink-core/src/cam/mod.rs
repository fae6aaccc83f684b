//! # cam — screen-to-UDP camera emulator
//!
//! Emulates the frame output of a low-cost camera module: every datagram is
//! a 4-byte millisecond counter followed by one JPEG.
//!
//! ```text
//! FrameSource ──► JpegEncoder ──► size check ──► packet::encode ──► FrameSink
//!  (scrap /        (resize,        (drop if        ([u32 LE][jpeg])   (UDP)
//!   pattern)        RGB, JPEG)      > limit)
//! ```
//!
//! | Module       | Purpose                                           |
//! |--------------|---------------------------------------------------|
//! | `types`      | Raw and encoded frame types                       |
//! | `capture`    | `FrameSource` trait, scrap capturer, test pattern |
//! | `encoder`    | Resize + JPEG                                     |
//! | `packet`     | `[counter][jpeg]` datagram layout                 |
//! | `transport`  | UDP sender and receiver                           |
//! | `throughput` | Rolling fps / bandwidth meter for logging         |
//! | `streamer`   | The capture → send loop                           |

pub mod capture;
pub mod encoder;
pub mod packet;
pub mod streamer;
pub mod throughput;
pub mod transport;
pub mod types;

// ── Re-exports ───────────────────────────────────────────────────

#[cfg(feature = "scrap")]
pub use capture::ScrapCapturer;
pub use capture::{FrameSource, PatternSource};
pub use encoder::{JpegEncoder, probe_dimensions};
pub use packet::{FramePacket, HEADER_SIZE, MAX_JPEG_SIZE};
pub use streamer::{FrameStreamer, SkipReason, StepOutcome, StreamStats, StreamerConfig};
pub use throughput::ThroughputMeter;
pub use transport::{FrameReceiver, FrameSink, ReceivedFrame, UdpFrameSender};
pub use types::{EncodedFrame, PixelFormat, RawScreenFrame};
