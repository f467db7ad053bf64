//! Coarse room classification from detected labels.
//!
//! A presence/count heuristic: each room category has a fixed set of
//! characteristic objects, and the category whose set overlaps the detected
//! label set the most wins. Intentionally not a learned classifier.

use serde::Serialize;

/// Fixed room vocabulary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum RoomCategory {
    #[serde(rename = "bedroom")]
    Bedroom,
    #[serde(rename = "living room")]
    LivingRoom,
    #[serde(rename = "kitchen")]
    Kitchen,
    #[serde(rename = "bathroom")]
    Bathroom,
    #[serde(rename = "dining room")]
    DiningRoom,
    #[serde(rename = "unknown")]
    Unknown,
}

impl RoomCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomCategory::Bedroom => "bedroom",
            RoomCategory::LivingRoom => "living room",
            RoomCategory::Kitchen => "kitchen",
            RoomCategory::Bathroom => "bathroom",
            RoomCategory::DiningRoom => "dining room",
            RoomCategory::Unknown => "unknown",
        }
    }
}

/// Chosen category plus the match score that selected it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RoomMatch {
    pub category: RoomCategory,
    pub score: usize,
}

/// Ordered room profiles: category plus its characteristic object labels.
///
/// Iteration order is the tie-break: on equal scores the
/// earliest-enumerated category wins. Labels are lowercase; matching is
/// case-insensitive against the detected set.
#[derive(Clone, Debug)]
pub struct RoomProfiles {
    profiles: Vec<(RoomCategory, Vec<&'static str>)>,
}

impl RoomProfiles {
    pub fn builtin() -> Self {
        Self {
            profiles: vec![
                (
                    RoomCategory::Bedroom,
                    vec!["bed", "blanket", "cushion", "side_table", "curtains", "mirror"],
                ),
                (
                    RoomCategory::LivingRoom,
                    vec![
                        "sofa",
                        "television",
                        "armchair",
                        "fireplace",
                        "speaker",
                        "remote_control",
                        "vase",
                    ],
                ),
                (
                    RoomCategory::Kitchen,
                    vec![
                        "refrigerator",
                        "plate",
                        "spoon",
                        "fork",
                        "tap",
                        "bowls",
                        "glass",
                    ],
                ),
                (
                    RoomCategory::Bathroom,
                    vec![
                        "bathtub",
                        "shower",
                        "soap",
                        "washbasin",
                        "toilet paper",
                        "tooth brush",
                        "towel",
                        "commode",
                    ],
                ),
                (
                    RoomCategory::DiningRoom,
                    vec!["dining table", "chair", "plate", "glass"],
                ),
            ],
        }
    }

    /// Classify a detected label set.
    ///
    /// Each characteristic label present contributes exactly 1 to its
    /// category's score, regardless of duplicate detections. A maximum
    /// score of 0 resolves to `Unknown`.
    pub fn classify<S: AsRef<str>>(&self, labels: &[S]) -> RoomMatch {
        let detected: std::collections::HashSet<String> = labels
            .iter()
            .map(|label| label.as_ref().trim().to_lowercase())
            .collect();

        let mut best = RoomMatch {
            category: RoomCategory::Unknown,
            score: 0,
        };
        for (category, characteristic) in &self.profiles {
            let score = characteristic
                .iter()
                .filter(|label| detected.contains(**label))
                .count();
            // Strict comparison keeps the earliest category on ties.
            if score > best.score {
                best = RoomMatch {
                    category: *category,
                    score,
                };
            }
        }
        best
    }
}

impl Default for RoomProfiles {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sofa_and_television_resolve_to_living_room() {
        let rooms = RoomProfiles::builtin();
        let m = rooms.classify(&["sofa", "television"]);
        assert_eq!(m.category, RoomCategory::LivingRoom);
        assert_eq!(m.score, 2);
    }

    #[test]
    fn empty_set_resolves_to_unknown_with_zero_score() {
        let rooms = RoomProfiles::builtin();
        let m = rooms.classify::<&str>(&[]);
        assert_eq!(m.category, RoomCategory::Unknown);
        assert_eq!(m.score, 0);
    }

    #[test]
    fn unmatched_labels_resolve_to_unknown() {
        let rooms = RoomProfiles::builtin();
        let m = rooms.classify(&["zebra", "spaceship"]);
        assert_eq!(m.category, RoomCategory::Unknown);
        assert_eq!(m.score, 0);
    }

    #[test]
    fn duplicates_count_once() {
        let rooms = RoomProfiles::builtin();
        let m = rooms.classify(&["sofa", "sofa", "sofa"]);
        assert_eq!(m.category, RoomCategory::LivingRoom);
        assert_eq!(m.score, 1);
    }

    #[test]
    fn matching_is_case_insensitive() {
        let rooms = RoomProfiles::builtin();
        let m = rooms.classify(&["Sofa", "TELEVISION"]);
        assert_eq!(m.category, RoomCategory::LivingRoom);
        assert_eq!(m.score, 2);
    }

    #[test]
    fn tie_resolves_to_earliest_category() {
        let rooms = RoomProfiles::builtin();
        // "plate" appears in both kitchen and dining room; kitchen is
        // enumerated first.
        let m = rooms.classify(&["plate"]);
        assert_eq!(m.category, RoomCategory::Kitchen);
        assert_eq!(m.score, 1);
    }

    #[test]
    fn higher_score_beats_enumeration_order() {
        let rooms = RoomProfiles::builtin();
        let m = rooms.classify(&["mirror", "dining table", "chair"]);
        assert_eq!(m.category, RoomCategory::DiningRoom);
        assert_eq!(m.score, 2);
    }
}
