use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::Detection;

/// Stub detector for testing and model-less runs. Replays a fixed detection
/// set on every call.
pub struct StubDetector {
    detections: Vec<Detection>,
}

impl StubDetector {
    /// A detector that never fires.
    pub fn new() -> Self {
        Self { detections: vec![] }
    }

    /// A detector that reports the given detections on every frame.
    pub fn with_detections(detections: Vec<Detection>) -> Self {
        Self { detections }
    }
}

impl Default for StubDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for StubDetector {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, _pixels: &[u8], _width: u32, _height: u32) -> Result<Vec<Detection>> {
        Ok(self.detections.clone())
    }
}
