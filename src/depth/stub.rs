//! Fixed-output depth oracle for tests and model-less deployments.

use anyhow::{anyhow, Result};

use super::{DepthBackend, DepthMap};

/// Stub depth backend.
///
/// Either replays a prepared map (tests) or synthesizes a mid-range gradient
/// matching the frame dimensions (model-less daemon runs).
pub struct StubDepth {
    map: Option<DepthMap>,
}

impl StubDepth {
    /// Synthesize a vertical gradient per frame.
    pub fn new() -> Self {
        Self { map: None }
    }

    /// Replay a prepared depth map on every call.
    pub fn with_map(map: DepthMap) -> Self {
        Self { map: Some(map) }
    }
}

impl Default for StubDepth {
    fn default() -> Self {
        Self::new()
    }
}

impl DepthBackend for StubDepth {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn estimate(&mut self, _pixels: &[u8], width: u32, height: u32) -> Result<DepthMap> {
        if let Some(map) = &self.map {
            return Ok(map.clone());
        }
        if height == 0 {
            return Err(anyhow!("zero-height frame"));
        }
        // Lower rows read as closer, the way indoor scenes usually resolve.
        let mut values = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            let v = if height == 1 {
                1.0
            } else {
                1.0 - y as f32 / (height - 1) as f32
            };
            values.extend(std::iter::repeat(v).take(width as usize));
        }
        DepthMap::from_raw(width, height, values)
    }
}
