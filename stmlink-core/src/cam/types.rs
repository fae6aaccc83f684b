//! Frame types passed between the capture, encode and send stages.
//!
//! Both are transient: a frame is created, transformed and discarded within
//! one streamer iteration.

use std::time::Instant;

use image::RgbImage;

use crate::error::LinkError;

// ── PixelFormat ──────────────────────────────────────────────────

/// Pixel layout for raw captured frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 4 bytes per pixel: Blue, Green, Red, Alpha (scrap / DXGI default).
    Bgra8,
    /// 4 bytes per pixel: Red, Green, Blue, Alpha.
    Rgba8,
}

impl PixelFormat {
    /// Bytes consumed by a single pixel in this format.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bgra8 | PixelFormat::Rgba8 => 4,
        }
    }

    /// Byte offsets of the red, green and blue channels within a pixel.
    const fn rgb_offsets(self) -> [usize; 3] {
        match self {
            PixelFormat::Bgra8 => [2, 1, 0],
            PixelFormat::Rgba8 => [0, 1, 2],
        }
    }
}

// ── RawScreenFrame ───────────────────────────────────────────────

/// A raw, uncompressed screen capture.
///
/// The `data` buffer holds `height` rows of `stride` bytes each.
/// `stride` may be larger than `width * bytes_per_pixel` when the capture
/// backend pads rows.
#[derive(Debug, Clone)]
pub struct RawScreenFrame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Row pitch in **bytes** (may exceed `width * bpp`).
    pub stride: u32,
    /// Pixel layout.
    pub format: PixelFormat,
    /// Raw pixel data, `stride * height` bytes.
    pub data: Vec<u8>,
    /// Monotonic capture timestamp.
    pub timestamp: Instant,
}

impl RawScreenFrame {
    /// Total byte size the raw bitmap occupies.
    pub fn byte_len(&self) -> usize {
        self.stride as usize * self.height as usize
    }

    /// Returns a row slice (including possible padding bytes).
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride as usize;
        let end = start + self.stride as usize;
        &self.data[start..end]
    }

    /// Repack into a tightly packed RGB image, dropping alpha and padding.
    ///
    /// Fails when the buffer is shorter than `stride * height` or the stride
    /// cannot hold a full row.
    pub fn to_rgb_image(&self) -> Result<RgbImage, LinkError> {
        let bpp = self.format.bytes_per_pixel();
        let row_len = self.width as usize * bpp;

        if self.width == 0 || self.height == 0 {
            return Err(LinkError::Encode("empty frame".into()));
        }
        if (self.stride as usize) < row_len {
            return Err(LinkError::Encode(format!(
                "stride {} shorter than row ({row_len} bytes)",
                self.stride
            )));
        }
        if self.data.len() < self.byte_len() {
            return Err(LinkError::Encode(format!(
                "frame buffer too short: {} < {}",
                self.data.len(),
                self.byte_len()
            )));
        }

        let [r, g, b] = self.format.rgb_offsets();
        let mut out = Vec::with_capacity(self.width as usize * self.height as usize * 3);
        for y in 0..self.height {
            for px in self.row(y)[..row_len].chunks_exact(bpp) {
                out.extend_from_slice(&[px[r], px[g], px[b]]);
            }
        }

        RgbImage::from_raw(self.width, self.height, out)
            .ok_or_else(|| LinkError::Encode("rgb buffer size mismatch".into()))
    }
}

// ── EncodedFrame ─────────────────────────────────────────────────

/// A JPEG-compressed frame ready to be wrapped in a packet.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    /// Encoded width in pixels.
    pub width: u32,
    /// Encoded height in pixels.
    pub height: u32,
    /// JPEG byte stream.
    pub data: Vec<u8>,
    /// Capture timestamp of the source frame.
    pub timestamp: Instant,
}
