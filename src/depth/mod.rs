//! Relative depth estimation layer.
//!
//! The depth oracle produces a dense per-pixel relative depth map for a
//! frame. Values are meaningful only in relative ordering within one image;
//! rescaling into real-world units happens in the fusion engine.

mod map;
pub mod stub;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use map::DepthMap;
pub use stub::StubDepth;

#[cfg(feature = "backend-tract")]
pub use tract::TractDepth;

use anyhow::Result;

/// Depth oracle interface.
///
/// Implementations are opaque pretrained models (or test doubles). A call is
/// a pure function of the input pixels: single-shot, idempotent, no retry on
/// failure.
pub trait DepthBackend: Send {
    /// Backend identifier, used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Estimate a relative depth map for an RGB8 frame.
    ///
    /// The returned map must match the frame dimensions; the pipeline treats
    /// a mismatch as malformed oracle output.
    fn estimate(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<DepthMap>;
}
