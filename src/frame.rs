//! Decoded frame handling.
//!
//! A `Frame` is the request-scoped decoded image buffer: RGB8 pixels plus
//! dimensions. It is created by the boundary layer (HTTP handler or CLI),
//! exclusively owned by the request that decoded it, and dropped when the
//! request completes. Oracles receive the pixel slice read-only.

use anyhow::{anyhow, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::ImageEncoder;
use sha2::{Digest, Sha256};

/// Upper bound on inbound encoded image size.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Request-scoped decoded RGB8 image buffer.
pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Content hash computed at decode time, used to correlate log lines
    /// belonging to one request.
    content_hash: [u8; 32],
}

impl Frame {
    /// Decode an encoded raster image (JPEG or PNG) into an RGB8 frame.
    ///
    /// Undecodable bytes and zero-area images are input errors, rejected
    /// before any oracle runs.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(anyhow!("empty image payload"));
        }
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(anyhow!(
                "image payload exceeds {} byte limit",
                MAX_IMAGE_BYTES
            ));
        }
        let decoded = image::load_from_memory(bytes).context("undecodable image")?;
        let rgb = decoded.to_rgb8();
        let (width, height) = rgb.dimensions();
        Self::from_rgb8(rgb.into_raw(), width, height)
    }

    /// Wrap an already-decoded RGB8 buffer. Used by tests and by callers
    /// that decode elsewhere.
    pub fn from_rgb8(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!("zero-area image ({}x{})", width, height));
        }
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("image dimensions overflow"))?;
        if data.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes for {}x{}, got {}",
                expected,
                width,
                height,
                data.len()
            ));
        }
        let content_hash: [u8; 32] = Sha256::digest(&data).into();
        Ok(Self {
            data,
            width,
            height,
            content_hash,
        })
    }

    /// Read-only pixel slice handed to oracles.
    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Short hex id derived from the content hash, for log correlation.
    pub fn request_id(&self) -> String {
        hex::encode(&self.content_hash[..6])
    }

    /// Re-encode as JPEG for the external narrator call.
    pub fn to_jpeg(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut out, 85);
        encoder
            .write_image(
                &self.data,
                self.width,
                self.height,
                image::ExtendedColorType::Rgb8,
            )
            .context("jpeg encode failed")?;
        Ok(out)
    }
}
