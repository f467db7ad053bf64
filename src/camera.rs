//! Pinhole camera assumption for geometric distance estimates.
//!
//! The horizontal field of view is a property of the capturing device, not
//! something measured per image. The default matches a common phone main
//! camera; deployments override it in configuration.

use anyhow::{anyhow, Result};

/// Assumed horizontal field of view of the capturing device, in degrees.
pub const DEFAULT_HORIZONTAL_FOV_DEGREES: f64 = 85.0;

/// Per-request camera model derived from the frame dimensions and the fixed
/// field-of-view assumption.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraModel {
    pub image_width: u32,
    pub image_height: u32,
    pub horizontal_fov_degrees: f64,
    /// Focal length in pixels, `width / (2 * tan(fov / 2))`.
    pub focal_length_px: f64,
}

impl CameraModel {
    /// Derive a camera model for a frame of the given dimensions.
    ///
    /// Rejects zero-width frames and field-of-view values outside (0, 180)
    /// degrees, both of which make the pinhole relation degenerate.
    pub fn new(image_width: u32, image_height: u32, horizontal_fov_degrees: f64) -> Result<Self> {
        if image_width == 0 {
            return Err(anyhow!("camera model requires a non-zero image width"));
        }
        if !(horizontal_fov_degrees > 0.0 && horizontal_fov_degrees < 180.0) {
            return Err(anyhow!(
                "horizontal fov must be within (0, 180) degrees, got {}",
                horizontal_fov_degrees
            ));
        }
        let half_fov_rad = (horizontal_fov_degrees / 2.0).to_radians();
        let focal_length_px = image_width as f64 / (2.0 * half_fov_rad.tan());
        Ok(Self {
            image_width,
            image_height,
            horizontal_fov_degrees,
            focal_length_px,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn focal_length_matches_pinhole_relation() {
        let cam = CameraModel::new(1000, 750, 85.0).unwrap();
        assert!((cam.focal_length_px - 543.9).abs() < 0.1);
    }

    #[test]
    fn zero_width_rejected() {
        assert!(CameraModel::new(0, 480, 85.0).is_err());
    }

    #[test]
    fn degenerate_fov_rejected() {
        assert!(CameraModel::new(640, 480, 0.0).is_err());
        assert!(CameraModel::new(640, 480, 180.0).is_err());
        assert!(CameraModel::new(640, 480, -10.0).is_err());
    }
}
