//! Streamer lifecycle.
//!
//! Opens the frame source and the UDP socket, runs the capture loop until
//! the stop flag clears, and closes the socket on every exit path.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};

use stmlink_core::cam::{FrameSource, FrameStreamer, PatternSource, StreamStats, UdpFrameSender};
use stmlink_core::LinkError;

use crate::config::CamConfig;

// ── CamService ───────────────────────────────────────────────────

pub struct CamService {
    config: CamConfig,
    running: Arc<AtomicBool>,
}

impl CamService {
    pub fn new(config: CamConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Obtain a handle that stops the service from another task.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Stream until stopped.
    ///
    /// Returns the loop counters. A send failure ends the loop and is
    /// returned after the socket has been closed.
    pub async fn run(&self) -> Result<StreamStats, LinkError> {
        self.config.validate()?;
        self.running.store(true, Ordering::SeqCst);

        let target = self.config.resolve_target().await?;
        let sender = UdpFrameSender::bind(target).await?;
        info!("sending frames to {target} from {}", sender.local_addr()?);

        if self.config.capture.test_pattern {
            return self.stream(self.pattern()?, sender).await;
        }
        self.stream_screen(sender).await
    }

    #[cfg(feature = "screen")]
    async fn stream_screen(&self, sender: UdpFrameSender) -> Result<StreamStats, LinkError> {
        use stmlink_core::cam::ScrapCapturer;

        let capturer = ScrapCapturer::new(
            self.config.capture.monitor_index,
            self.config.capture_timeout(),
        )?;
        self.stream(capturer, sender).await
    }

    #[cfg(not(feature = "screen"))]
    async fn stream_screen(&self, sender: UdpFrameSender) -> Result<StreamStats, LinkError> {
        warn!("built without screen capture; streaming the test pattern");
        self.stream(self.pattern()?, sender).await
    }

    fn pattern(&self) -> Result<PatternSource, LinkError> {
        let (w, h) = (
            self.config.capture.pattern_width,
            self.config.capture.pattern_height,
        );
        if w == 0 || h == 0 {
            return Err(LinkError::Config("test pattern size must be non-zero".into()));
        }
        info!("using {w}x{h} test pattern");
        Ok(PatternSource::new(w, h))
    }

    async fn stream<S: FrameSource>(
        &self,
        source: S,
        sender: UdpFrameSender,
    ) -> Result<StreamStats, LinkError> {
        info!(
            "capturing {}x{}, streaming {}x{} at quality {}",
            source.width(),
            source.height(),
            self.config.encoding.width,
            self.config.encoding.height,
            self.config.encoding.quality
        );

        let mut streamer = FrameStreamer::new(source, sender, self.config.to_streamer_config())?;
        let result = streamer.run(&self.running).await;
        let stats = streamer.stats();

        let sender = streamer.into_sink();
        info!(
            "closing socket: {} datagrams, {} bytes sent",
            sender.datagrams_sent(),
            sender.bytes_sent()
        );
        drop(sender);

        info!(
            "sent {}, dropped {}, capture failures {}, encode failures {}",
            stats.sent, stats.dropped, stats.capture_failures, stats.encode_failures
        );
        if let Err(e) = &result {
            warn!("streaming stopped: {e}");
        }
        self.running.store(false, Ordering::SeqCst);
        result
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use stmlink_core::cam::FrameReceiver;

    #[tokio::test]
    async fn streams_test_pattern_until_stopped() {
        let mut receiver = FrameReceiver::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let port = receiver.local_addr().unwrap().port();

        let mut config = CamConfig::default();
        config.network.target_port = port;
        config.capture.test_pattern = true;
        config.capture.pattern_width = 320;
        config.capture.pattern_height = 240;
        config.stream.frame_delay_ms = 5;

        let service = CamService::new(config);
        let stop = service.stop_handle();

        let recv = tokio::spawn(async move {
            let frame = receiver.recv_frame().await.unwrap();
            stop.store(false, Ordering::SeqCst);
            frame
        });

        let stats = tokio::time::timeout(Duration::from_secs(10), service.run())
            .await
            .expect("service did not stop")
            .unwrap();
        let frame = recv.await.unwrap();

        assert!(stats.sent >= 1);
        assert_eq!(&frame.jpeg[..2], &[0xFF, 0xD8]);
        assert!(!service.stop_handle().load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn invalid_config_fails_before_binding() {
        let mut config = CamConfig::default();
        config.encoding.quality = 0;
        let service = CamService::new(config);
        assert!(matches!(service.run().await, Err(LinkError::Config(_))));
    }
}
