//! Hybrid distance fusion.
//!
//! Each detected object gets two independent distance estimates: the mean of
//! the relative depth map over its bounding box, rescaled by an empirical
//! calibration factor, and a similar-triangles estimate from an assumed
//! real-world object height. When both exist the final distance is their
//! arithmetic mean.

use std::collections::HashMap;
use std::sync::OnceLock;

use anyhow::{anyhow, Result};
use serde::Serialize;

use crate::camera::CameraModel;
use crate::depth::DepthMap;
use crate::detect::Detection;

/// Default rescale factor from normalized relative depth to centimeters.
///
/// This is an empirical calibration constant tied to the depth model's
/// output scale, not a derived quantity. Deployments tune it via
/// configuration; it must not be silently "corrected".
pub const DEFAULT_DEPTH_SCALE_CM: f64 = 100.0;

/// Calibration for the depth-to-centimeters rescale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DepthCalibration {
    pub scale_cm: f64,
}

impl Default for DepthCalibration {
    fn default() -> Self {
        Self {
            scale_cm: DEFAULT_DEPTH_SCALE_CM,
        }
    }
}

/// Result of a case-normalized known-height lookup.
///
/// "No known height" is an explicit state, not a null: most labels a
/// general-purpose detector can emit have no entry, and the fusion engine
/// branches on this.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum HeightLookup {
    /// Assumed real-world height in centimeters.
    Known(f64),
    Unknown,
}

/// Immutable lookup table from lowercase object label to assumed real-world
/// height in centimeters.
///
/// Entries are heuristic. The built-in table covers the household
/// vocabulary of the specialized detector plus common general-model labels;
/// deployments extend or override it in configuration.
#[derive(Clone, Debug)]
pub struct KnownHeightTable {
    heights: HashMap<String, f64>,
}

fn label_key_pattern() -> &'static regex::Regex {
    static LABEL_RE: OnceLock<regex::Regex> = OnceLock::new();
    LABEL_RE.get_or_init(|| regex::Regex::new(r"^[a-z0-9 _'-]{1,64}$").unwrap())
}

impl KnownHeightTable {
    /// Built-in heuristic heights (centimeters) for household objects.
    pub fn default_heights() -> Vec<(&'static str, f64)> {
        vec![
            ("air conditioner", 30.0),
            ("armchair", 90.0),
            ("bathtub", 50.0),
            ("bed", 60.0),
            ("blanket", 10.0),
            ("book", 22.0),
            ("bookshelf", 180.0),
            ("bowls", 10.0),
            ("bucket", 30.0),
            ("cabinet", 150.0),
            ("ceiling_light", 20.0),
            ("chair", 90.0),
            ("charger", 5.0),
            ("clock", 30.0),
            ("commode", 45.0),
            ("curtains", 200.0),
            ("cushion", 40.0),
            ("dining table", 75.0),
            ("door", 200.0),
            ("door mat", 2.0),
            ("dvd_player", 6.0),
            ("fan", 60.0),
            ("fireplace", 80.0),
            ("floor_lamp", 140.0),
            ("fork", 20.0),
            ("glass", 12.0),
            ("god photo frames", 35.0),
            ("indian toilet", 35.0),
            ("laptop", 25.0),
            ("light lamp", 40.0),
            ("mirror", 100.0),
            ("mirror light", 10.0),
            ("mobile phone", 15.0),
            ("plate", 25.0),
            ("portrait", 45.0),
            ("power outlet", 10.0),
            ("refrigerator", 170.0),
            ("remote_control", 15.0),
            ("screen", 100.0),
            ("shower", 20.0),
            ("side_table", 50.0),
            ("soap", 7.0),
            ("sofa", 90.0),
            ("speaker", 25.0),
            ("spoon", 18.0),
            ("statue", 60.0),
            ("table", 75.0),
            ("tap", 15.0),
            ("television", 70.0),
            ("toilet paper", 12.0),
            ("tooth brush", 18.0),
            ("towel", 60.0),
            ("vanity cabinet", 85.0),
            ("vase", 30.0),
            ("wall_shelf", 20.0),
            ("washbasin", 90.0),
            ("water bottle", 25.0),
            ("water heater", 60.0),
            ("window", 120.0),
        ]
    }

    /// Table with only the built-in entries.
    pub fn builtin() -> Self {
        let heights = Self::default_heights()
            .into_iter()
            .map(|(label, cm)| (label.to_string(), cm))
            .collect();
        Self { heights }
    }

    /// Build a table from explicit entries, keys lowercased. Rejects empty
    /// or out-of-alphabet labels and non-positive heights.
    pub fn from_entries<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        let mut heights = HashMap::new();
        for (label, cm) in entries {
            let key = label.as_ref().trim().to_lowercase();
            if !label_key_pattern().is_match(&key) {
                return Err(anyhow!("invalid known-height label '{}'", label.as_ref()));
            }
            if !(cm > 0.0 && cm.is_finite()) {
                return Err(anyhow!("known height for '{}' must be positive, got {}", key, cm));
            }
            heights.insert(key, cm);
        }
        Ok(Self { heights })
    }

    /// Built-in table with per-deployment overrides merged on top.
    pub fn builtin_with_overrides<I, S>(overrides: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        let mut table = Self::builtin();
        let extra = Self::from_entries(overrides)?;
        table.heights.extend(extra.heights);
        Ok(table)
    }

    /// Case-insensitive lookup.
    pub fn lookup(&self, label: &str) -> HeightLookup {
        match self.heights.get(&label.trim().to_lowercase()) {
            Some(cm) => HeightLookup::Known(*cm),
            None => HeightLookup::Unknown,
        }
    }

    pub fn len(&self) -> usize {
        self.heights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heights.is_empty()
    }
}

impl Default for KnownHeightTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Per-object fused distance estimate, all fields in centimeters.
///
/// Never mutated after creation; full float precision is kept until display
/// formatting.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DistanceEstimate {
    /// Depth-map regional mean rescaled by the calibration factor.
    pub from_depth_cm: f64,
    /// Similar-triangles estimate; absent when the label has no known
    /// height.
    pub from_known_height_cm: Option<f64>,
    /// Mean of both estimates, or the depth estimate alone.
    pub final_cm: f64,
}

impl DistanceEstimate {
    /// Display form: two decimals, `"N/A"` for the absent branch.
    pub fn display(&self) -> DistanceDisplay {
        DistanceDisplay {
            from_depth: format_cm(self.from_depth_cm),
            from_known_height: match self.from_known_height_cm {
                Some(cm) => format_cm(cm),
                None => "N/A".to_string(),
            },
            final_estimate: format_cm(self.final_cm),
        }
    }
}

/// Formatted estimates for the outbound response.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DistanceDisplay {
    pub from_depth: String,
    pub from_known_height: String,
    #[serde(rename = "final")]
    pub final_estimate: String,
}

fn format_cm(cm: f64) -> String {
    format!("{:.2} cm", cm)
}

/// Fuse one detection with the depth map and camera model.
///
/// Deterministic: identical inputs produce bit-identical output.
pub fn estimate_distance(
    detection: &Detection,
    depth: &DepthMap,
    camera: &CameraModel,
    heights: &KnownHeightTable,
    calibration: DepthCalibration,
) -> DistanceEstimate {
    let mean_depth = depth.mean_in_box(&detection.bbox);
    let from_depth_cm = mean_depth * calibration.scale_cm;

    // Degenerate boxes clamp to one pixel of apparent height.
    let bbox_height_px = f64::from(detection.bbox.height()).max(1.0);

    let from_known_height_cm = match heights.lookup(&detection.label) {
        HeightLookup::Known(height_cm) => {
            Some(camera.focal_length_px * height_cm / bbox_height_px)
        }
        HeightLookup::Unknown => None,
    };

    let final_cm = match from_known_height_cm {
        Some(known_cm) => (from_depth_cm + known_cm) / 2.0,
        None => from_depth_cm,
    };

    DistanceEstimate {
        from_depth_cm,
        from_known_height_cm,
        final_cm,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;

    fn camera_1000px() -> CameraModel {
        CameraModel::new(1000, 750, 85.0).unwrap()
    }

    /// Depth map whose mean inside `[0,0,10,10)` is `mean`, normalized by a
    /// far pixel elsewhere.
    fn depth_with_region_mean(mean: f32) -> DepthMap {
        let mut values = vec![0.0f32; 20 * 20];
        for y in 0..10 {
            for x in 0..10 {
                values[y * 20 + x] = mean;
            }
        }
        values[19 * 20 + 19] = 1.0;
        DepthMap::from_raw(20, 20, values).unwrap()
    }

    #[test]
    fn unknown_label_uses_depth_alone() {
        let det = Detection::new(
            "zebra",
            0.9,
            BoundingBox::new(0.0, 0.0, 10.0, 10.0).unwrap(),
        );
        let est = estimate_distance(
            &det,
            &depth_with_region_mean(0.4),
            &camera_1000px(),
            &KnownHeightTable::builtin(),
            DepthCalibration::default(),
        );
        assert_eq!(est.from_known_height_cm, None);
        assert!((est.from_depth_cm - 40.0).abs() < 1e-6);
        assert_eq!(est.final_cm, est.from_depth_cm);
    }

    #[test]
    fn known_label_fuses_both_estimates() {
        // chair: 90 cm assumed height, 200 px apparent height.
        let det = Detection::new(
            "chair",
            0.9,
            BoundingBox::new(100.0, 50.0, 180.0, 250.0).unwrap(),
        );
        let mut values = vec![0.0f32; 1000 * 300];
        for v in values.iter_mut() {
            *v = 0.4;
        }
        values[0] = 1.0;
        let depth = DepthMap::from_raw(1000, 300, values).unwrap();

        let camera = camera_1000px();
        let est = estimate_distance(
            &det,
            &depth,
            &camera,
            &KnownHeightTable::builtin(),
            DepthCalibration::default(),
        );

        let expected_known = camera.focal_length_px * 90.0 / 200.0;
        let known = est.from_known_height_cm.unwrap();
        assert!((known - expected_known).abs() < 1e-9);
        assert!((known - 244.8).abs() < 0.1);
        assert!((est.from_depth_cm - 40.0).abs() < 1e-6);
        assert!((est.final_cm - (est.from_depth_cm + known) / 2.0).abs() < 1e-12);
        assert!((est.final_cm - 142.4).abs() < 0.1);
    }

    #[test]
    fn zero_height_box_clamps_to_one_pixel() {
        let det = Detection::new(
            "chair",
            0.9,
            BoundingBox::new(100.0, 50.0, 180.0, 50.0).unwrap(),
        );
        let est = estimate_distance(
            &det,
            &depth_with_region_mean(0.5),
            &camera_1000px(),
            &KnownHeightTable::builtin(),
            DepthCalibration::default(),
        );
        // focal * 90 / 1, not a division by zero.
        let known = est.from_known_height_cm.unwrap();
        let expected = camera_1000px().focal_length_px * 90.0;
        assert!((known - expected).abs() < 1e-9);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let table = KnownHeightTable::builtin();
        assert_eq!(table.lookup("Chair"), HeightLookup::Known(90.0));
        assert_eq!(table.lookup("  SOFA "), HeightLookup::Known(90.0));
        assert_eq!(table.lookup("spaceship"), HeightLookup::Unknown);
    }

    #[test]
    fn overrides_merge_over_builtin() {
        let table =
            KnownHeightTable::builtin_with_overrides(vec![("chair", 100.0), ("robot", 120.0)])
                .unwrap();
        assert_eq!(table.lookup("chair"), HeightLookup::Known(100.0));
        assert_eq!(table.lookup("robot"), HeightLookup::Known(120.0));
        assert_eq!(table.lookup("sofa"), HeightLookup::Known(90.0));
    }

    #[test]
    fn invalid_override_entries_are_rejected() {
        assert!(KnownHeightTable::from_entries(vec![("", 10.0)]).is_err());
        assert!(KnownHeightTable::from_entries(vec![("chair", 0.0)]).is_err());
        assert!(KnownHeightTable::from_entries(vec![("chair", -5.0)]).is_err());
        assert!(KnownHeightTable::from_entries(vec![("bad/label", 10.0)]).is_err());
    }

    #[test]
    fn custom_calibration_rescales_depth() {
        let det = Detection::new(
            "zebra",
            0.9,
            BoundingBox::new(0.0, 0.0, 10.0, 10.0).unwrap(),
        );
        let est = estimate_distance(
            &det,
            &depth_with_region_mean(0.4),
            &camera_1000px(),
            &KnownHeightTable::builtin(),
            DepthCalibration { scale_cm: 250.0 },
        );
        assert!((est.from_depth_cm - 100.0).abs() < 1e-6);
    }

    #[test]
    fn estimate_is_bit_identical_across_calls() {
        let det = Detection::new(
            "chair",
            0.9,
            BoundingBox::new(3.0, 2.0, 9.0, 8.0).unwrap(),
        );
        let depth = depth_with_region_mean(0.37);
        let camera = camera_1000px();
        let table = KnownHeightTable::builtin();
        let a = estimate_distance(&det, &depth, &camera, &table, DepthCalibration::default());
        let b = estimate_distance(&det, &depth, &camera, &table, DepthCalibration::default());
        assert_eq!(a, b);
        assert_eq!(a.final_cm.to_bits(), b.final_cm.to_bits());
    }

    #[test]
    fn display_formats_two_decimals_and_na() {
        let est = DistanceEstimate {
            from_depth_cm: 40.0,
            from_known_height_cm: None,
            final_cm: 40.0,
        };
        let d = est.display();
        assert_eq!(d.from_depth, "40.00 cm");
        assert_eq!(d.from_known_height, "N/A");
        assert_eq!(d.final_estimate, "40.00 cm");

        let est = DistanceEstimate {
            from_depth_cm: 40.0,
            from_known_height_cm: Some(244.755),
            final_cm: 142.3775,
        };
        assert_eq!(est.display().from_known_height, "244.76 cm");
        assert_eq!(est.display().final_estimate, "142.38 cm");
    }
}
