//! Rolling-window throughput meter.
//!
//! Only feeds the periodic "streaming at …" log line. The streamer never
//! changes its behaviour based on these numbers.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Records `(timestamp, bytes)` samples and reports the average byte and
/// frame rate over the most recent `window`.
pub struct ThroughputMeter {
    samples: VecDeque<(Instant, u64)>,
    window: Duration,
    total_bytes: u64,
}

impl ThroughputMeter {
    /// Meter with a 5-second window.
    pub fn new() -> Self {
        Self::with_window(Duration::from_secs(5))
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            samples: VecDeque::with_capacity(256),
            window,
            total_bytes: 0,
        }
    }

    /// Record one sent datagram of `bytes` at the current instant.
    pub fn record(&mut self, bytes: u64) {
        self.record_at(Instant::now(), bytes);
    }

    /// Record with an explicit timestamp (useful for testing).
    pub fn record_at(&mut self, when: Instant, bytes: u64) {
        self.samples.push_back((when, bytes));
        self.total_bytes += bytes;
        self.evict(when);
    }

    /// Forget samples that fell out of the window by now.
    pub fn expire(&mut self) {
        self.expire_at(Instant::now());
    }

    /// [`expire`](Self::expire) with an explicit clock.
    pub fn expire_at(&mut self, now: Instant) {
        self.evict(now);
    }

    /// Bytes per second over the window.
    pub fn bytes_per_sec(&self) -> u64 {
        match self.span() {
            Some(secs) => (self.total_bytes as f64 / secs) as u64,
            None => 0,
        }
    }

    /// Datagrams per second over the window.
    pub fn frames_per_sec(&self) -> f64 {
        match self.span() {
            Some(secs) => self.samples.len().saturating_sub(1) as f64 / secs,
            None => 0.0,
        }
    }

    /// Number of samples currently in the window.
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    // ── Internal ─────────────────────────────────────────────────

    /// Seconds between the oldest and newest sample; at least 1 ms.
    /// `None` with fewer than two samples.
    fn span(&self) -> Option<f64> {
        if self.samples.len() < 2 {
            return None;
        }
        let (first, last) = (self.samples.front()?, self.samples.back()?);
        let d = last.0.duration_since(first.0).max(Duration::from_millis(1));
        Some(d.as_secs_f64())
    }

    fn evict(&mut self, now: Instant) {
        while let Some(&(ts, bytes)) = self.samples.front() {
            if now.duration_since(ts) > self.window {
                self.samples.pop_front();
                self.total_bytes = self.total_bytes.saturating_sub(bytes);
            } else {
                break;
            }
        }
    }
}

impl Default for ThroughputMeter {
    fn default() -> Self {
        Self::new()
    }
}
