#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use super::{DepthBackend, DepthMap};

/// Tract-based depth backend for ONNX monocular depth models.
///
/// Loads a local model file, resizes frames to the model input size, and
/// upsamples the predicted grid back to frame resolution. The model is
/// expected to emit inverse relative depth (higher = closer), MiDaS-style;
/// the output is inverted so that higher means farther, then clipped and
/// normalized by `DepthMap::from_raw`.
pub struct TractDepth {
    model: TypedSimplePlan<TypedModel>,
    input_width: u32,
    input_height: u32,
}

impl TractDepth {
    /// Load an ONNX depth model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, input_width: u32, input_height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, input_height as usize, input_width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            input_width,
            input_height,
        })
    }

    fn build_input(&self, pixels: &[u8], width: u32, height: u32) -> Result<Tensor> {
        let expected_len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if pixels.len() != expected_len {
            return Err(anyhow!(
                "expected {} RGB bytes, received {}",
                expected_len,
                pixels.len()
            ));
        }

        let frame = image::RgbImage::from_raw(width, height, pixels.to_vec())
            .ok_or_else(|| anyhow!("frame buffer does not match dimensions"))?;
        let resized = image::imageops::resize(
            &frame,
            self.input_width,
            self.input_height,
            image::imageops::FilterType::Triangle,
        );

        let input_width = self.input_width as usize;
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, self.input_height as usize, input_width),
            |(_, channel, y, x)| resized.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0,
        );

        Ok(input.into_tensor())
    }

    fn decode_output(
        &self,
        outputs: TVec<TValue>,
        frame_width: u32,
        frame_height: u32,
    ) -> Result<DepthMap> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;

        // Accept [1, H, W] and [1, 1, H, W] export layouts.
        let (grid_height, grid_width) = match view.shape() {
            [1, h, w] => (*h, *w),
            [1, 1, h, w] => (*h, *w),
            shape => return Err(anyhow!("unexpected depth output shape {:?}", shape)),
        };

        let flat: Vec<f32> = view.iter().copied().collect();
        if flat.len() != grid_height * grid_width {
            return Err(anyhow!("depth output length does not match its shape"));
        }
        let max = flat.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        if !max.is_finite() {
            return Err(anyhow!("depth output contains non-finite values"));
        }

        // Invert: the model scores closer pixels higher, the map wants
        // farther pixels higher.
        let inverted: Vec<f32> = flat.iter().map(|v| max - v).collect();

        let grid = image::ImageBuffer::<image::Luma<f32>, Vec<f32>>::from_raw(
            grid_width as u32,
            grid_height as u32,
            inverted,
        )
        .ok_or_else(|| anyhow!("depth output does not fill its grid"))?;
        let upsampled = image::imageops::resize(
            &grid,
            frame_width,
            frame_height,
            image::imageops::FilterType::Triangle,
        );

        DepthMap::from_raw(frame_width, frame_height, upsampled.into_raw())
    }
}

impl DepthBackend for TractDepth {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn estimate(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<DepthMap> {
        let input = self.build_input(pixels, width, height)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.decode_output(outputs, width, height)
    }
}
