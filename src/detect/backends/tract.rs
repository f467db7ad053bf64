#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, Detection};

const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.4;
const DEFAULT_NMS_IOU_THRESHOLD: f32 = 0.5;

/// Tract-based detector backend for ONNX object-detection models.
///
/// Loads a local model file and runs inference on RGB frames. Frames are
/// resized to the model input size; boxes are scaled back to frame
/// coordinates. Expects the ultralytics export layout
/// `[1, 4 + num_classes, anchors]` with `cx, cy, w, h` rows first.
pub struct TractDetector {
    name: &'static str,
    model: TypedSimplePlan<TypedModel>,
    input_width: u32,
    input_height: u32,
    class_names: Vec<String>,
    confidence_threshold: f32,
    nms_iou_threshold: f32,
}

impl TractDetector {
    /// Load an ONNX detection model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(
        name: &'static str,
        model_path: P,
        input_width: u32,
        input_height: u32,
        class_names: Vec<String>,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();
        if class_names.is_empty() {
            return Err(anyhow!("detector '{}' needs a class-name list", name));
        }
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
            name,
            model,
            input_width,
            input_height,
            class_names,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            nms_iou_threshold: DEFAULT_NMS_IOU_THRESHOLD,
        })
    }

    /// Override the default confidence threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
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
    ) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = view.shape();
        if shape.len() != 3 || shape[0] != 1 {
            return Err(anyhow!("unexpected detector output shape {:?}", shape));
        }
        let rows = shape[1];
        let anchors = shape[2];
        if rows != 4 + self.class_names.len() {
            return Err(anyhow!(
                "detector output has {} rows, expected {} for {} classes",
                rows,
                4 + self.class_names.len(),
                self.class_names.len()
            ));
        }

        let sx = frame_width as f32 / self.input_width as f32;
        let sy = frame_height as f32 / self.input_height as f32;

        let mut candidates = Vec::new();
        for a in 0..anchors {
            let mut best_class = 0usize;
            let mut best_score = 0.0f32;
            for c in 0..self.class_names.len() {
                let score = view[[0, 4 + c, a]];
                if score > best_score {
                    best_score = score;
                    best_class = c;
                }
            }
            if best_score < self.confidence_threshold {
                continue;
            }

            let cx = view[[0, 0, a]] * sx;
            let cy = view[[0, 1, a]] * sy;
            let w = view[[0, 2, a]] * sx;
            let h = view[[0, 3, a]] * sy;
            let x1 = (cx - w / 2.0).clamp(0.0, frame_width as f32);
            let y1 = (cy - h / 2.0).clamp(0.0, frame_height as f32);
            let x2 = (cx + w / 2.0).clamp(0.0, frame_width as f32);
            let y2 = (cy + h / 2.0).clamp(0.0, frame_height as f32);
            let bbox = BoundingBox::new(x1, y1, x2, y2)?;
            candidates.push(Detection::new(
                self.class_names[best_class].clone(),
                best_score.min(1.0),
                bbox,
            ));
        }

        Ok(non_max_suppression(candidates, self.nms_iou_threshold))
    }
}

impl DetectorBackend for TractDetector {
    fn name(&self) -> &'static str {
        self.name
    }

    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<Detection>> {
        let input = self.build_input(pixels, width, height)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.decode_output(outputs, width, height)
    }
}

fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let ix = (a.x2.min(b.x2) - a.x1.max(b.x1)).max(0.0);
    let iy = (a.y2.min(b.y2) - a.y1.max(b.y1)).max(0.0);
    let inter = ix * iy;
    let union = a.width() * a.height() + b.width() * b.height() - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

/// Greedy class-agnostic non-maximum suppression.
fn non_max_suppression(mut candidates: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let mut kept: Vec<Detection> = Vec::new();
    for candidate in candidates {
        if kept
            .iter()
            .all(|k| iou(&k.bbox, &candidate.bbox) < iou_threshold)
        {
            kept.push(candidate);
        }
    }
    kept
}
