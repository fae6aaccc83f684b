//! The capture → encode → send loop.
//!
//! One iteration ([`FrameStreamer::step`]):
//!
//! 1. [`FrameSource`] captures the screen.
//! 2. [`JpegEncoder`] downscales and compresses it.
//! 3. Frames whose JPEG exceeds `max_jpeg_size` are dropped.
//! 4. The `[counter][jpeg]` packet goes out through the [`FrameSink`].
//!
//! [`FrameStreamer::run`] repeats `step` with a fixed delay until the
//! shared `running` flag is cleared. Capture and encode failures skip the
//! frame; a send failure ends the loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant, SystemTime};

use tracing::{debug, info, warn};

use crate::cam::capture::FrameSource;
use crate::cam::encoder::{DEFAULT_HEIGHT, DEFAULT_QUALITY, DEFAULT_WIDTH, JpegEncoder};
use crate::cam::packet::{self, MAX_JPEG_SIZE};
use crate::cam::throughput::ThroughputMeter;
use crate::cam::transport::FrameSink;
use crate::error::LinkError;

// ── StreamerConfig ───────────────────────────────────────────────

/// Settings for [`FrameStreamer`].
#[derive(Debug, Clone)]
pub struct StreamerConfig {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// JPEG quality (1..=100).
    pub quality: u8,
    /// Frames with a larger JPEG are dropped.
    pub max_jpeg_size: usize,
    /// Sleep after every iteration.
    pub frame_delay: Duration,
    /// How often to log throughput. Zero disables the report.
    pub report_interval: Duration,
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            quality: DEFAULT_QUALITY,
            max_jpeg_size: MAX_JPEG_SIZE,
            frame_delay: Duration::from_millis(33),
            report_interval: Duration::from_secs(5),
        }
    }
}

// ── Outcomes ─────────────────────────────────────────────────────

/// Why an iteration produced no packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Capture,
    Encode,
}

/// Result of one [`FrameStreamer::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// A datagram of `bytes` bytes was sent with this counter.
    Sent { counter: u32, bytes: usize },
    /// The JPEG was `size` bytes, over the limit; nothing was sent.
    Dropped { size: usize },
    /// Capture or encoding failed; nothing was sent.
    Skipped(SkipReason),
}

/// Per-run counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub sent: u64,
    pub dropped: u64,
    pub capture_failures: u64,
    pub encode_failures: u64,
}

// ── FrameStreamer ────────────────────────────────────────────────

pub struct FrameStreamer<S, K> {
    source: S,
    encoder: JpegEncoder,
    sink: K,
    config: StreamerConfig,
    meter: ThroughputMeter,
    stats: StreamStats,
}

impl<S, K> FrameStreamer<S, K>
where
    S: FrameSource,
    K: FrameSink,
{
    /// Build a streamer; fails if the encoder settings are out of range.
    pub fn new(source: S, sink: K, config: StreamerConfig) -> Result<Self, LinkError> {
        if config.max_jpeg_size == 0 {
            return Err(LinkError::Config("max_jpeg_size must be non-zero".into()));
        }
        let encoder = JpegEncoder::new(config.width, config.height, config.quality)?;

        Ok(Self {
            source,
            encoder,
            sink,
            config,
            meter: ThroughputMeter::new(),
            stats: StreamStats::default(),
        })
    }

    /// Run a single capture → encode → send iteration.
    pub async fn step(&mut self) -> Result<StepOutcome, LinkError> {
        // 1. Capture.
        let raw = match self.source.capture_frame() {
            Ok(frame) => frame,
            Err(LinkError::Timeout(after)) => {
                debug!("no new screen frame within {after:?}");
                self.stats.capture_failures += 1;
                return Ok(StepOutcome::Skipped(SkipReason::Capture));
            }
            Err(e) => {
                warn!("screen capture failed: {e}");
                self.stats.capture_failures += 1;
                return Ok(StepOutcome::Skipped(SkipReason::Capture));
            }
        };

        // 2. Resize + JPEG.
        let encoded = match self.encoder.encode(&raw) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("failed to encode frame: {e}");
                self.stats.encode_failures += 1;
                return Ok(StepOutcome::Skipped(SkipReason::Encode));
            }
        };

        // 3. Size policy: drop, never fragment or re-encode.
        let size = encoded.data.len();
        if size > self.config.max_jpeg_size {
            let err = LinkError::FrameTooLarge {
                size,
                max: self.config.max_jpeg_size,
            };
            warn!("{err}; dropping frame");
            self.stats.dropped += 1;
            return Ok(StepOutcome::Dropped { size });
        }

        // 4. Send.
        let counter = packet::frame_counter(SystemTime::now());
        let datagram = packet::encode(counter, &encoded.data);
        let bytes = self.sink.send_datagram(&datagram).await?;

        self.stats.sent += 1;
        self.meter.record(bytes as u64);
        debug!(counter, bytes, "frame sent");

        Ok(StepOutcome::Sent { counter, bytes })
    }

    /// Loop until `running` is cleared or a send fails.
    pub async fn run(&mut self, running: &AtomicBool) -> Result<StreamStats, LinkError> {
        let mut last_report = Instant::now();

        while running.load(Ordering::SeqCst) {
            self.step().await?;

            if !self.config.report_interval.is_zero()
                && last_report.elapsed() >= self.config.report_interval
            {
                self.report();
                last_report = Instant::now();
            }

            tokio::time::sleep(self.config.frame_delay).await;
        }

        Ok(self.stats)
    }

    /// Counters since construction.
    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Give back the sink, e.g. to close the socket explicitly.
    pub fn into_sink(self) -> K {
        self.sink
    }

    fn report(&mut self) {
        self.meter.expire();
        info!(
            "streaming {:.1} fps, {} KB/s (sent {}, dropped {}, skipped {})",
            self.meter.frames_per_sec(),
            self.meter.bytes_per_sec() / 1024,
            self.stats.sent,
            self.stats.dropped,
            self.stats.capture_failures + self.stats.encode_failures,
        );
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cam::capture::PatternSource;
    use crate::cam::types::RawScreenFrame;
    use async_trait::async_trait;
    use std::time::UNIX_EPOCH;
    use tokio_test::{assert_err, assert_ok};

    #[derive(Default)]
    struct RecordingSink {
        datagrams: Vec<Vec<u8>>,
        fail: bool,
    }

    #[async_trait]
    impl FrameSink for RecordingSink {
        async fn send_datagram(&mut self, datagram: &[u8]) -> Result<usize, LinkError> {
            if self.fail {
                return Err(std::io::Error::new(std::io::ErrorKind::NetworkUnreachable, "down").into());
            }
            self.datagrams.push(datagram.to_vec());
            Ok(datagram.len())
        }
    }

    struct BrokenSource;

    impl FrameSource for BrokenSource {
        fn capture_frame(&mut self) -> Result<RawScreenFrame, LinkError> {
            Err(LinkError::Capture("display went away".into()))
        }
        fn width(&self) -> u32 {
            0
        }
        fn height(&self) -> u32 {
            0
        }
    }

    /// Produces frames whose buffer is too short to convert.
    struct TruncatedSource(PatternSource);

    impl FrameSource for TruncatedSource {
        fn capture_frame(&mut self) -> Result<RawScreenFrame, LinkError> {
            let mut f = self.0.capture_frame()?;
            f.data.truncate(f.data.len() / 2);
            Ok(f)
        }
        fn width(&self) -> u32 {
            self.0.width()
        }
        fn height(&self) -> u32 {
            self.0.height()
        }
    }

    fn now_ms() -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis() as u64
    }

    #[tokio::test]
    async fn sent_packet_carries_current_millis() {
        let mut streamer = FrameStreamer::new(
            PatternSource::new(320, 240),
            RecordingSink::default(),
            StreamerConfig::default(),
        )
        .unwrap();

        let before = now_ms();
        let outcome = assert_ok!(streamer.step().await);
        let after = now_ms();

        let StepOutcome::Sent { counter, bytes } = outcome else {
            panic!("expected Sent, got {outcome:?}");
        };
        let datagram = &streamer.sink().datagrams[0];
        assert_eq!(bytes, datagram.len());

        let wire = u32::from_le_bytes(datagram[..4].try_into().unwrap());
        assert_eq!(wire, counter);
        // Counter lies within [before, after] modulo 2^32.
        let offset = wire.wrapping_sub((before & 0xFFFF_FFFF) as u32);
        assert!(u64::from(offset) <= after - before, "offset {offset}");
    }

    #[tokio::test]
    async fn oversized_frame_is_not_sent() {
        let config = StreamerConfig {
            max_jpeg_size: 100,
            ..StreamerConfig::default()
        };
        let mut streamer =
            FrameStreamer::new(PatternSource::new(320, 240), RecordingSink::default(), config).unwrap();

        let outcome = assert_ok!(streamer.step().await);
        assert!(matches!(outcome, StepOutcome::Dropped { size } if size > 100));
        assert!(streamer.sink().datagrams.is_empty());
        assert_eq!(streamer.stats().dropped, 1);
        assert_eq!(streamer.stats().sent, 0);
    }

    #[tokio::test]
    async fn capture_failure_skips_frame() {
        let mut streamer =
            FrameStreamer::new(BrokenSource, RecordingSink::default(), StreamerConfig::default()).unwrap();

        let outcome = assert_ok!(streamer.step().await);
        assert_eq!(outcome, StepOutcome::Skipped(SkipReason::Capture));
        assert!(streamer.sink().datagrams.is_empty());
        assert_eq!(streamer.stats().capture_failures, 1);
    }

    #[tokio::test]
    async fn encode_failure_skips_frame() {
        let mut streamer = FrameStreamer::new(
            TruncatedSource(PatternSource::new(64, 64)),
            RecordingSink::default(),
            StreamerConfig::default(),
        )
        .unwrap();

        let outcome = assert_ok!(streamer.step().await);
        assert_eq!(outcome, StepOutcome::Skipped(SkipReason::Encode));
        assert_eq!(streamer.stats().encode_failures, 1);
    }

    #[tokio::test]
    async fn send_failure_propagates() {
        let sink = RecordingSink {
            fail: true,
            ..RecordingSink::default()
        };
        let mut streamer =
            FrameStreamer::new(PatternSource::new(64, 64), sink, StreamerConfig::default()).unwrap();

        let err = assert_err!(streamer.step().await);
        assert!(matches!(err, LinkError::Io(_)));
    }

    #[tokio::test]
    async fn run_stops_when_flag_clears() {
        let config = StreamerConfig {
            frame_delay: Duration::from_millis(1),
            ..StreamerConfig::default()
        };
        let mut streamer =
            FrameStreamer::new(PatternSource::new(64, 48), RecordingSink::default(), config).unwrap();

        let running = AtomicBool::new(false);
        let stats = streamer.run(&running).await.unwrap();
        assert_eq!(stats, StreamStats::default());
        assert!(streamer.into_sink().datagrams.is_empty());
    }

    #[test]
    fn rejects_zero_threshold() {
        let config = StreamerConfig {
            max_jpeg_size: 0,
            ..StreamerConfig::default()
        };
        let result = FrameStreamer::new(PatternSource::new(8, 8), RecordingSink::default(), config);
        assert!(matches!(result, Err(LinkError::Config(_))));
    }
}
