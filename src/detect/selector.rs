//! Detector selection policy.
//!
//! Two oracles look at every frame: a general-purpose model and a model
//! fine-tuned on household objects. The specialized model is assumed higher
//! precision on domain objects, but when it fails to fire the general model
//! acts as the fallback. Under-detection is the worse failure mode for an
//! assistive system, so the selector keeps whichever output has more
//! detections.

use anyhow::{Context, Result};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::Detection;

/// Which of the two detector oracles produced a detection set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectorKind {
    General,
    Specialized,
}

impl DetectorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorKind::General => "general",
            DetectorKind::Specialized => "specialized",
        }
    }
}

/// Selection policy knobs.
///
/// The count comparison is fixed; the tie-break preference is a deployment
/// decision (the default favors the specialized model).
#[derive(Clone, Copy, Debug)]
pub struct SelectorPolicy {
    pub tie_break: DetectorKind,
}

impl Default for SelectorPolicy {
    fn default() -> Self {
        Self {
            tie_break: DetectorKind::Specialized,
        }
    }
}

/// Outcome of running both oracles on one frame.
#[derive(Clone, Debug)]
pub struct Selection {
    pub detections: Vec<Detection>,
    pub source: DetectorKind,
    pub general_count: usize,
    pub specialized_count: usize,
}

/// Run both detector oracles on the same frame and keep the set with the
/// larger detection count; ties go to the policy's preferred oracle.
///
/// The oracles run independently on identical input; either failing is an
/// oracle-unavailable condition for the whole request.
pub fn select_detections(
    general: &mut dyn DetectorBackend,
    specialized: &mut dyn DetectorBackend,
    policy: SelectorPolicy,
    pixels: &[u8],
    width: u32,
    height: u32,
) -> Result<Selection> {
    let general_out = general
        .detect(pixels, width, height)
        .with_context(|| format!("general detector '{}' unavailable", general.name()))?;
    let specialized_out = specialized
        .detect(pixels, width, height)
        .with_context(|| format!("specialized detector '{}' unavailable", specialized.name()))?;

    let general_count = general_out.len();
    let specialized_count = specialized_out.len();

    let source = if specialized_count > general_count {
        DetectorKind::Specialized
    } else if general_count > specialized_count {
        DetectorKind::General
    } else {
        policy.tie_break
    };

    log::debug!(
        "detector selection: general={} specialized={} -> {}",
        general_count,
        specialized_count,
        source.as_str()
    );

    let detections = match source {
        DetectorKind::General => general_out,
        DetectorKind::Specialized => specialized_out,
    };

    Ok(Selection {
        detections,
        source,
        general_count,
        specialized_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::backends::StubDetector;
    use crate::detect::result::BoundingBox;

    fn detections(labels: &[&str]) -> Vec<Detection> {
        labels
            .iter()
            .map(|label| {
                Detection::new(
                    *label,
                    0.9,
                    BoundingBox::new(0.0, 0.0, 10.0, 10.0).unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn larger_count_wins() {
        let mut general = StubDetector::with_detections(detections(&["a", "b", "c"]));
        let mut specialized =
            StubDetector::with_detections(detections(&["d", "e", "f", "g", "h"]));
        let sel = select_detections(
            &mut general,
            &mut specialized,
            SelectorPolicy::default(),
            &[0u8; 3],
            1,
            1,
        )
        .unwrap();
        assert_eq!(sel.source, DetectorKind::Specialized);
        assert_eq!(sel.detections.len(), 5);
        assert_eq!((sel.general_count, sel.specialized_count), (3, 5));
    }

    #[test]
    fn general_wins_when_specialized_underfires() {
        let mut general = StubDetector::with_detections(detections(&["a", "b"]));
        let mut specialized = StubDetector::with_detections(detections(&[]));
        let sel = select_detections(
            &mut general,
            &mut specialized,
            SelectorPolicy::default(),
            &[0u8; 3],
            1,
            1,
        )
        .unwrap();
        assert_eq!(sel.source, DetectorKind::General);
        assert_eq!(sel.detections.len(), 2);
    }

    #[test]
    fn tie_favors_specialized_by_default() {
        let mut general = StubDetector::with_detections(detections(&["a", "b", "c"]));
        let mut specialized = StubDetector::with_detections(detections(&["x", "y", "z"]));
        let sel = select_detections(
            &mut general,
            &mut specialized,
            SelectorPolicy::default(),
            &[0u8; 3],
            1,
            1,
        )
        .unwrap();
        assert_eq!(sel.source, DetectorKind::Specialized);
        assert_eq!(sel.detections[0].label, "x");
    }

    #[test]
    fn tie_break_is_overridable() {
        let mut general = StubDetector::with_detections(detections(&["a"]));
        let mut specialized = StubDetector::with_detections(detections(&["x"]));
        let sel = select_detections(
            &mut general,
            &mut specialized,
            SelectorPolicy {
                tie_break: DetectorKind::General,
            },
            &[0u8; 3],
            1,
            1,
        )
        .unwrap();
        assert_eq!(sel.source, DetectorKind::General);
    }

    #[test]
    fn oracle_failure_propagates() {
        struct FailingDetector;
        impl DetectorBackend for FailingDetector {
            fn name(&self) -> &'static str {
                "failing"
            }
            fn detect(&mut self, _: &[u8], _: u32, _: u32) -> Result<Vec<Detection>> {
                Err(anyhow::anyhow!("inference error"))
            }
        }
        let mut general = FailingDetector;
        let mut specialized = StubDetector::with_detections(vec![]);
        let err = select_detections(
            &mut general,
            &mut specialized,
            SelectorPolicy::default(),
            &[0u8; 3],
            1,
            1,
        )
        .unwrap_err();
        assert!(err.to_string().contains("unavailable"));
    }
}
