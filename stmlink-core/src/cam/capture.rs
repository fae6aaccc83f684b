//! Screen capture sources.
//!
//! [`FrameSource`] is the seam between the streamer loop and the OS:
//!
//! - [`ScrapCapturer`] grabs the desktop through `scrap` (X11 / DXGI /
//!   Quartz). Only built with the `scrap` feature.
//! - [`PatternSource`] renders a deterministic moving gradient for headless
//!   machines and tests.

use std::time::Instant;

use crate::cam::types::{PixelFormat, RawScreenFrame};
use crate::error::LinkError;

/// Something that yields one full-screen frame per call.
pub trait FrameSource {
    /// Capture the current screen contents.
    fn capture_frame(&mut self) -> Result<RawScreenFrame, LinkError>;

    /// Source width in pixels.
    fn width(&self) -> u32;

    /// Source height in pixels.
    fn height(&self) -> u32;
}

// ── PatternSource ────────────────────────────────────────────────

/// Synthetic BGRA source: horizontal red ramp, vertical green ramp and a
/// blue channel that advances with every captured frame.
pub struct PatternSource {
    width: u32,
    height: u32,
    tick: u32,
}

impl PatternSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            tick: 0,
        }
    }

    /// Frames produced so far.
    pub fn frames_produced(&self) -> u32 {
        self.tick
    }
}

impl FrameSource for PatternSource {
    fn capture_frame(&mut self) -> Result<RawScreenFrame, LinkError> {
        if self.width == 0 || self.height == 0 {
            return Err(LinkError::Capture("pattern source has zero size".into()));
        }

        let stride = self.width * 4;
        let mut data = Vec::with_capacity(stride as usize * self.height as usize);
        let blue = (self.tick.wrapping_mul(4) & 0xFF) as u8;

        for y in 0..self.height {
            let green = (y * 255 / self.height) as u8;
            for x in 0..self.width {
                let red = (x * 255 / self.width) as u8;
                data.extend_from_slice(&[blue, green, red, 0xFF]);
            }
        }

        self.tick = self.tick.wrapping_add(1);

        Ok(RawScreenFrame {
            width: self.width,
            height: self.height,
            stride,
            format: PixelFormat::Bgra8,
            data,
            timestamp: Instant::now(),
        })
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }
}

// ── ScrapCapturer ────────────────────────────────────────────────

#[cfg(feature = "scrap")]
pub use self::desktop::ScrapCapturer;

#[cfg(feature = "scrap")]
mod desktop {
    use std::io::ErrorKind::WouldBlock;
    use std::time::{Duration, Instant};

    use scrap::{Capturer, Display};
    use tracing::debug;

    use super::FrameSource;
    use crate::cam::types::{PixelFormat, RawScreenFrame};
    use crate::error::LinkError;

    /// Poll period while the backend has no new frame ready.
    const RETRY_DELAY: Duration = Duration::from_millis(5);

    /// Desktop capturer backed by `scrap`.
    ///
    /// `scrap` hands out frames lazily and answers `WouldBlock` until the
    /// compositor has produced one; [`capture_frame`](FrameSource::capture_frame)
    /// retries until `timeout` and then reports [`LinkError::Timeout`].
    pub struct ScrapCapturer {
        capturer: Capturer,
        width: u32,
        height: u32,
        timeout: Duration,
    }

    impl ScrapCapturer {
        /// Open monitor `monitor_index` (0 = primary).
        pub fn new(monitor_index: usize, timeout: Duration) -> Result<Self, LinkError> {
            let display = if monitor_index == 0 {
                Display::primary()?
            } else {
                Display::all()?
                    .into_iter()
                    .nth(monitor_index)
                    .ok_or_else(|| LinkError::Capture(format!("no monitor {monitor_index}")))?
            };

            let capturer = Capturer::new(display)
                .map_err(|e| LinkError::Capture(format!("cannot start capture: {e}")))?;
            let width = capturer.width() as u32;
            let height = capturer.height() as u32;
            debug!("scrap capturer on monitor {monitor_index}: {width}x{height}");

            Ok(Self {
                capturer,
                width,
                height,
                timeout,
            })
        }
    }

    impl FrameSource for ScrapCapturer {
        fn capture_frame(&mut self) -> Result<RawScreenFrame, LinkError> {
            let deadline = Instant::now() + self.timeout;
            loop {
                match self.capturer.frame() {
                    Ok(buffer) => {
                        let stride = (buffer.len() / self.height.max(1) as usize) as u32;
                        return Ok(RawScreenFrame {
                            width: self.width,
                            height: self.height,
                            stride,
                            format: PixelFormat::Bgra8,
                            data: buffer.to_vec(),
                            timestamp: Instant::now(),
                        });
                    }
                    Err(e) if e.kind() == WouldBlock => {
                        if Instant::now() >= deadline {
                            return Err(LinkError::Timeout(self.timeout));
                        }
                        std::thread::sleep(RETRY_DELAY);
                    }
                    Err(e) => return Err(LinkError::Capture(e.to_string())),
                }
            }
        }

        fn width(&self) -> u32 {
            self.width
        }

        fn height(&self) -> u32 {
            self.height
        }
    }
}
