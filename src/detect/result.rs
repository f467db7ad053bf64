use anyhow::{anyhow, Result};

/// Axis-aligned rectangle in pixel coordinates.
///
/// Degenerate (zero-width or zero-height) boxes are representable; the
/// fusion engine clamps them to one-pixel spans before averaging or
/// dividing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Result<Self> {
        for v in [x1, y1, x2, y2] {
            if !v.is_finite() || v < 0.0 {
                return Err(anyhow!("bounding box coordinate {} out of range", v));
            }
        }
        if x2 < x1 || y2 < y1 {
            return Err(anyhow!(
                "inverted bounding box ({}, {}, {}, {})",
                x1,
                y1,
                x2,
                y2
            ));
        }
        Ok(Self { x1, y1, x2, y2 })
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }
}

/// One detected object instance.
///
/// Produced per inference call, owned by the requesting caller, discarded
/// at end of request.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    /// Class label as emitted by the model.
    pub label: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_box_is_allowed() {
        let b = BoundingBox::new(10.0, 20.0, 10.0, 20.0).unwrap();
        assert_eq!(b.width(), 0.0);
        assert_eq!(b.height(), 0.0);
    }

    #[test]
    fn inverted_box_is_rejected() {
        assert!(BoundingBox::new(10.0, 0.0, 5.0, 10.0).is_err());
    }

    #[test]
    fn non_finite_coordinate_is_rejected() {
        assert!(BoundingBox::new(f32::NAN, 0.0, 5.0, 10.0).is_err());
        assert!(BoundingBox::new(-1.0, 0.0, 5.0, 10.0).is_err());
    }
}
