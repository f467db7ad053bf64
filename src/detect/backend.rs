use anyhow::Result;

use crate::detect::result::Detection;

/// Detector oracle interface.
///
/// An implementation is an opaque pretrained model (or a test double): a
/// pure function of the input pixels with no shared state between calls to
/// different backends. Calls are single-shot and idempotent; a failing call
/// is assumed to fail identically on retry, so no caller retries.
pub trait DetectorBackend: Send {
    /// Backend identifier, used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Run detection on an RGB8 frame.
    ///
    /// Implementations must treat the pixel slice as read-only and
    /// ephemeral.
    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<Detection>>;
}
