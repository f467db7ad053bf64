//! Normalized relative depth grid.

use anyhow::{anyhow, Result};

use crate::detect::BoundingBox;

/// Dense relative depth map, same dimensions as its source frame.
///
/// Invariants, enforced at construction: every value is in `[0, 1]`, and the
/// map is either all-zero or its maximum is exactly 1.0. Higher means
/// farther.
#[derive(Clone, Debug, PartialEq)]
pub struct DepthMap {
    width: u32,
    height: u32,
    values: Vec<f32>,
}

impl DepthMap {
    /// Build a depth map from raw model output.
    ///
    /// Negative values are clipped to zero and the map is rescaled so its
    /// maximum is 1.0 (an all-zero map stays all-zero). Non-finite values
    /// are malformed oracle output.
    pub fn from_raw(width: u32, height: u32, mut values: Vec<f32>) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| anyhow!("depth map dimensions overflow"))?;
        if expected == 0 {
            return Err(anyhow!("zero-area depth map ({}x{})", width, height));
        }
        if values.len() != expected {
            return Err(anyhow!(
                "depth map has {} values, expected {} for {}x{}",
                values.len(),
                expected,
                width,
                height
            ));
        }
        let mut max = 0.0f32;
        for v in values.iter_mut() {
            if !v.is_finite() {
                return Err(anyhow!("depth map contains a non-finite value"));
            }
            if *v < 0.0 {
                *v = 0.0;
            }
            if *v > max {
                max = *v;
            }
        }
        if max > 0.0 {
            for v in values.iter_mut() {
                *v /= max;
            }
        }
        Ok(Self {
            width,
            height,
            values,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Arithmetic mean of the depth values inside a bounding box.
    ///
    /// The box is clamped into the image and widened to at least a one-pixel
    /// line per axis, so a degenerate (zero-area) box never produces an
    /// undefined mean.
    pub fn mean_in_box(&self, bbox: &BoundingBox) -> f64 {
        let (x1, x2) = clamp_span(bbox.x1, bbox.x2, self.width);
        let (y1, y2) = clamp_span(bbox.y1, bbox.y2, self.height);

        let mut sum = 0.0f64;
        for y in y1..y2 {
            let row = y as usize * self.width as usize;
            for x in x1..x2 {
                sum += self.values[row + x as usize] as f64;
            }
        }
        let count = (x2 - x1) as f64 * (y2 - y1) as f64;
        sum / count
    }
}

/// Clamp a `[lo, hi)` pixel span into `[0, extent)`, keeping at least one
/// pixel.
fn clamp_span(lo: f32, hi: f32, extent: u32) -> (u32, u32) {
    let max_lo = extent.saturating_sub(1);
    let lo = (lo.floor().max(0.0) as u32).min(max_lo);
    let hi = (hi.ceil().max(0.0) as u32).clamp(lo + 1, extent.max(lo + 1));
    (lo, hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x1: f32, y1: f32, x2: f32, y2: f32) -> BoundingBox {
        BoundingBox::new(x1, y1, x2, y2).unwrap()
    }

    #[test]
    fn normalizes_maximum_to_one() {
        let map = DepthMap::from_raw(2, 2, vec![0.5, 1.0, 2.0, 4.0]).unwrap();
        assert_eq!(map.mean_in_box(&bbox(1.0, 1.0, 2.0, 2.0)), 1.0);
        assert!((map.mean_in_box(&bbox(0.0, 0.0, 1.0, 1.0)) - 0.125).abs() < 1e-9);
    }

    #[test]
    fn clips_negative_values() {
        let map = DepthMap::from_raw(2, 1, vec![-3.0, 2.0]).unwrap();
        assert_eq!(map.mean_in_box(&bbox(0.0, 0.0, 1.0, 1.0)), 0.0);
    }

    #[test]
    fn all_zero_map_stays_zero() {
        let map = DepthMap::from_raw(2, 2, vec![0.0; 4]).unwrap();
        assert_eq!(map.mean_in_box(&bbox(0.0, 0.0, 2.0, 2.0)), 0.0);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(DepthMap::from_raw(2, 2, vec![0.0; 3]).is_err());
    }

    #[test]
    fn rejects_non_finite_values() {
        assert!(DepthMap::from_raw(2, 1, vec![f32::NAN, 0.0]).is_err());
    }

    #[test]
    fn degenerate_box_reads_a_one_pixel_line() {
        let map = DepthMap::from_raw(3, 3, vec![
            0.0, 0.0, 0.0, //
            0.3, 0.6, 0.9, //
            0.0, 0.0, 1.0,
        ])
        .unwrap();
        // Zero-height box on row 1 still averages that row's span.
        let line = map.mean_in_box(&bbox(0.0, 1.0, 3.0, 1.0));
        assert!((line - 0.6).abs() < 1e-6);
        // Zero-area box reads exactly one pixel.
        let point = map.mean_in_box(&bbox(1.0, 1.0, 1.0, 1.0));
        assert!((point - 0.6).abs() < 1e-6);
    }

    #[test]
    fn box_outside_image_clamps_to_border() {
        let map = DepthMap::from_raw(2, 2, vec![0.1, 0.2, 0.3, 1.0]).unwrap();
        let v = map.mean_in_box(&bbox(5.0, 5.0, 9.0, 9.0));
        assert!((v - 1.0).abs() < 1e-6);
    }
}
