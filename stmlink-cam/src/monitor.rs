//! Monitor mode: the receiving end of the stream.
//!
//! Binds a UDP socket, splits each datagram into counter + JPEG, reads the
//! JPEG header for its dimensions and logs what arrived. Malformed
//! datagrams are counted and skipped.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use stmlink_core::LinkError;
use stmlink_core::cam::{FrameReceiver, ThroughputMeter, probe_dimensions};

/// How often the receive loop re-checks the stop flag while idle.
const IDLE_CHECK: Duration = Duration::from_millis(250);
/// Period of the summary log line.
const REPORT_INTERVAL: Duration = Duration::from_secs(5);

/// One frame as seen by the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    pub counter: u32,
    pub jpeg_bytes: usize,
    pub width: u32,
    pub height: u32,
    pub from: SocketAddr,
}

/// Receive-side counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorStats {
    pub frames: u64,
    pub malformed: u64,
    /// Frames whose counter is behind the previous frame's.
    pub out_of_order: u64,
}

pub struct FrameMonitor {
    receiver: FrameReceiver,
    stats: MonitorStats,
    last_counter: Option<u32>,
    meter: ThroughputMeter,
}

impl FrameMonitor {
    pub async fn bind(addr: SocketAddr) -> Result<Self, LinkError> {
        Ok(Self::new(FrameReceiver::bind(addr).await?))
    }

    pub fn new(receiver: FrameReceiver) -> Self {
        Self {
            receiver,
            stats: MonitorStats::default(),
            last_counter: None,
            meter: ThroughputMeter::new(),
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr, LinkError> {
        self.receiver.local_addr()
    }

    pub fn stats(&self) -> MonitorStats {
        self.stats
    }

    /// Receive one datagram.
    ///
    /// `Ok(None)` means the datagram was malformed and has been skipped.
    pub async fn next_frame(&mut self) -> Result<Option<FrameInfo>, LinkError> {
        let frame = match self.receiver.recv_frame().await {
            Ok(frame) => frame,
            Err(LinkError::InvalidPacket(reason)) => {
                warn!("skipping malformed datagram: {reason}");
                self.stats.malformed += 1;
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let (width, height) = match probe_dimensions(&frame.jpeg) {
            Ok(dims) => dims,
            Err(e) => {
                warn!("skipping datagram #{} from {}: {e}", frame.counter, frame.from);
                self.stats.malformed += 1;
                return Ok(None);
            }
        };

        if let Some(prev) = self.last_counter {
            // Wrapping distance; anything in the upper half is a step back.
            if frame.counter.wrapping_sub(prev) > u32::MAX / 2 {
                debug!("counter went back from {prev} to {}", frame.counter);
                self.stats.out_of_order += 1;
            }
        }
        self.last_counter = Some(frame.counter);
        self.stats.frames += 1;
        self.meter.record(frame.jpeg.len() as u64);

        Ok(Some(FrameInfo {
            counter: frame.counter,
            jpeg_bytes: frame.jpeg.len(),
            width,
            height,
            from: frame.from,
        }))
    }

    /// Log frames until `running` clears or the socket fails.
    pub async fn run(&mut self, running: &AtomicBool) -> Result<MonitorStats, LinkError> {
        let mut last_report = Instant::now();

        while running.load(Ordering::SeqCst) {
            match tokio::time::timeout(IDLE_CHECK, self.next_frame()).await {
                Ok(Ok(Some(info))) => debug!(
                    "frame #{} {}x{} {} bytes from {}",
                    info.counter, info.width, info.height, info.jpeg_bytes, info.from
                ),
                Ok(Ok(None)) | Err(_) => {}
                Ok(Err(e)) => return Err(e),
            }

            if last_report.elapsed() >= REPORT_INTERVAL {
                self.meter.expire();
                info!(
                    "receiving {:.1} fps, {} KB/s (frames {}, malformed {}, out of order {})",
                    self.meter.frames_per_sec(),
                    self.meter.bytes_per_sec() / 1024,
                    self.stats.frames,
                    self.stats.malformed,
                    self.stats.out_of_order
                );
                last_report = Instant::now();
            }
        }

        Ok(self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stmlink_core::cam::{FrameSink, FrameSource, JpegEncoder, PatternSource, UdpFrameSender, packet};

    async fn pair() -> (UdpFrameSender, FrameMonitor) {
        let monitor = FrameMonitor::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let sender = UdpFrameSender::bind(monitor.local_addr().unwrap()).await.unwrap();
        (sender, monitor)
    }

    fn jpeg(w: u32, h: u32) -> Vec<u8> {
        let frame = PatternSource::new(w * 2, h * 2).capture_frame().unwrap();
        JpegEncoder::new(w, h, 60).unwrap().encode(&frame).unwrap().data
    }

    #[tokio::test]
    async fn reports_counter_and_dimensions() {
        let (mut sender, mut monitor) = pair().await;
        sender.send_datagram(&packet::encode(1234, &jpeg(160, 120))).await.unwrap();

        let info = monitor.next_frame().await.unwrap().unwrap();
        assert_eq!(info.counter, 1234);
        assert_eq!((info.width, info.height), (160, 120));
        assert_eq!(monitor.stats().frames, 1);
    }

    #[tokio::test]
    async fn malformed_datagrams_are_skipped() {
        let (mut sender, mut monitor) = pair().await;
        sender.send_datagram(&[1, 2]).await.unwrap();
        sender.send_datagram(&packet::encode(7, b"garbage")).await.unwrap();
        sender.send_datagram(&packet::encode(8, &jpeg(32, 32))).await.unwrap();

        assert_eq!(monitor.next_frame().await.unwrap(), None);
        assert_eq!(monitor.next_frame().await.unwrap(), None);
        let info = monitor.next_frame().await.unwrap().unwrap();
        assert_eq!(info.counter, 8);

        let stats = monitor.stats();
        assert_eq!(stats.malformed, 2);
        assert_eq!(stats.frames, 1);
    }

    #[tokio::test]
    async fn counts_counter_regressions() {
        let (mut sender, mut monitor) = pair().await;
        let image = jpeg(32, 32);
        for counter in [u32::MAX - 1, 3, 2, 10] {
            sender.send_datagram(&packet::encode(counter, &image)).await.unwrap();
        }
        for _ in 0..4 {
            monitor.next_frame().await.unwrap().unwrap();
        }
        // Wrap from MAX-1 to 3 is forward; 3 -> 2 is the only regression.
        assert_eq!(monitor.stats().out_of_order, 1);
    }

    #[tokio::test]
    async fn run_returns_when_stopped() {
        let (_sender, mut monitor) = pair().await;
        let running = AtomicBool::new(false);
        let stats = monitor.run(&running).await.unwrap();
        assert_eq!(stats, MonitorStats::default());
    }
}
