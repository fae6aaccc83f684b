//! Resize + JPEG encoder.
//!
//! Every frame goes through the same three steps:
//!
//! 1. repack the capture into tightly packed RGB (drops alpha, fixes the
//!    BGR channel order of desktop captures),
//! 2. downscale to the fixed target resolution,
//! 3. compress to baseline JPEG at a fixed quality.
//!
//! There is no adaptive quality: the caller decides what to do with a frame
//! that comes out too large.

use std::io::Cursor;

use image::ImageDecoder;
use image::codecs::jpeg::{JpegDecoder, JpegEncoder as ImageJpegEncoder};
use image::imageops::{self, FilterType};

use crate::cam::types::{EncodedFrame, RawScreenFrame};
use crate::error::LinkError;

/// Default output width (VGA, a common camera-module stream size).
pub const DEFAULT_WIDTH: u32 = 640;
/// Default output height.
pub const DEFAULT_HEIGHT: u32 = 480;
/// Default JPEG quality (1..=100).
pub const DEFAULT_QUALITY: u8 = 80;

/// Fixed-resolution, fixed-quality JPEG encoder.
#[derive(Debug, Clone)]
pub struct JpegEncoder {
    width: u32,
    height: u32,
    quality: u8,
    filter: FilterType,
    frame_count: u64,
}

impl JpegEncoder {
    /// Create an encoder producing `width`×`height` JPEGs at `quality`.
    pub fn new(width: u32, height: u32, quality: u8) -> Result<Self, LinkError> {
        if width == 0 || height == 0 {
            return Err(LinkError::Config(format!(
                "target resolution must be non-zero, got {width}x{height}"
            )));
        }
        if !(1..=100).contains(&quality) {
            return Err(LinkError::Config(format!(
                "jpeg quality must be 1..=100, got {quality}"
            )));
        }

        Ok(Self {
            width,
            height,
            quality,
            filter: FilterType::Triangle,
            frame_count: 0,
        })
    }

    /// Encode one captured frame.
    pub fn encode(&mut self, source: &RawScreenFrame) -> Result<EncodedFrame, LinkError> {
        let rgb = source.to_rgb_image()?;

        let scaled = if rgb.dimensions() == (self.width, self.height) {
            rgb
        } else {
            imageops::resize(&rgb, self.width, self.height, self.filter)
        };

        let mut data = Vec::with_capacity(64 * 1024);
        ImageJpegEncoder::new_with_quality(&mut data, self.quality).encode_image(&scaled)?;

        self.frame_count += 1;

        Ok(EncodedFrame {
            width: self.width,
            height: self.height,
            data,
            timestamp: source.timestamp,
        })
    }

    /// Number of frames encoded so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

impl Default for JpegEncoder {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            quality: DEFAULT_QUALITY,
            filter: FilterType::Triangle,
            frame_count: 0,
        }
    }
}

/// Read width and height from a JPEG header without decoding pixels.
pub fn probe_dimensions(jpeg: &[u8]) -> Result<(u32, u32), LinkError> {
    let decoder = JpegDecoder::new(Cursor::new(jpeg))?;
    Ok(decoder.dimensions())
}

// ── Tests ────────────────────────────────────────────────────────
