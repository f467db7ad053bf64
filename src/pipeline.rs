//! Per-request analysis pipeline.
//!
//! The engine owns the oracles (two detectors, one depth estimator, one
//! narrator) and the immutable deployment tables. Oracles are loaded once at
//! engine construction; each request borrows them for single-shot calls and
//! owns nothing but its decoded frame.

use anyhow::{anyhow, Context, Result};

use crate::camera::CameraModel;
use crate::config::AssistConfig;
use crate::depth::{DepthBackend, StubDepth};
use crate::detect::{
    select_detections, DetectorBackend, DetectorKind, SelectorPolicy, StubDetector,
};
use crate::distance::{
    estimate_distance, DepthCalibration, DistanceEstimate, KnownHeightTable,
};
use crate::frame::Frame;
use crate::narrate::{SceneNarrator, StaticNarrator, FALLBACK_DESCRIPTION};
use crate::room::{RoomMatch, RoomProfiles};

/// Immutable per-deployment knobs and tables.
pub struct EngineSettings {
    pub horizontal_fov_degrees: f64,
    pub calibration: DepthCalibration,
    pub selector: SelectorPolicy,
    pub heights: KnownHeightTable,
    pub rooms: RoomProfiles,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            horizontal_fov_degrees: crate::camera::DEFAULT_HORIZONTAL_FOV_DEGREES,
            calibration: DepthCalibration::default(),
            selector: SelectorPolicy::default(),
            heights: KnownHeightTable::builtin(),
            rooms: RoomProfiles::builtin(),
        }
    }
}

/// One detected object with its fused distance.
#[derive(Clone, Debug)]
pub struct ObjectReport {
    pub label: String,
    pub confidence: f32,
    pub distance: DistanceEstimate,
}

/// Assembled per-request result.
#[derive(Clone, Debug)]
pub struct SceneAnalysis {
    pub objects: Vec<ObjectReport>,
    pub room: RoomMatch,
    pub scene_description: String,
    /// Detected label set, deduplicated, in first-seen order.
    pub labels: Vec<String>,
    pub detector: DetectorKind,
}

pub struct Engine {
    general: Box<dyn DetectorBackend>,
    specialized: Box<dyn DetectorBackend>,
    depth: Box<dyn DepthBackend>,
    narrator: Box<dyn SceneNarrator>,
    settings: EngineSettings,
}

impl Engine {
    pub fn new(
        general: Box<dyn DetectorBackend>,
        specialized: Box<dyn DetectorBackend>,
        depth: Box<dyn DepthBackend>,
        narrator: Box<dyn SceneNarrator>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            general,
            specialized,
            depth,
            narrator,
            settings,
        }
    }

    /// Build an engine from deployment configuration.
    ///
    /// Model-backed oracles are used when paths are configured (and the
    /// `backend-tract` feature is compiled in); otherwise stub oracles run,
    /// with a warning, so the daemon stays usable for integration work.
    pub fn from_config(cfg: &AssistConfig) -> Result<Self> {
        let settings = EngineSettings {
            horizontal_fov_degrees: cfg.camera.horizontal_fov_degrees,
            calibration: DepthCalibration {
                scale_cm: cfg.fusion.depth_scale_cm,
            },
            selector: SelectorPolicy {
                tie_break: cfg.selector.tie_break,
            },
            heights: KnownHeightTable::builtin_with_overrides(
                cfg.known_heights.iter().map(|(k, v)| (k.as_str(), *v)),
            )?,
            rooms: RoomProfiles::builtin(),
        };

        let narrator: Box<dyn SceneNarrator> = match &cfg.narrator {
            Some(narrator_cfg) => Box::new(crate::narrate::HttpNarrator::new(
                &narrator_cfg.url,
                narrator_cfg.timeout_secs,
            )?),
            None => {
                log::warn!("no narrator endpoint configured; using static fallback text");
                Box::new(StaticNarrator::new(FALLBACK_DESCRIPTION))
            }
        };

        #[cfg(feature = "backend-tract")]
        if let Some(models) = &cfg.models {
            let general = crate::detect::TractDetector::new(
                "general",
                &models.general_path,
                models.input_width,
                models.input_height,
                models.general_classes.clone(),
            )?;
            let specialized = crate::detect::TractDetector::new(
                "specialized",
                &models.specialized_path,
                models.input_width,
                models.input_height,
                models.specialized_classes.clone(),
            )?;
            let depth = crate::depth::TractDepth::new(
                &models.depth_path,
                models.input_width,
                models.input_height,
            )?;
            return Ok(Self::new(
                Box::new(general),
                Box::new(specialized),
                Box::new(depth),
                narrator,
                settings,
            ));
        }

        #[cfg(not(feature = "backend-tract"))]
        if cfg.models.is_some() {
            return Err(anyhow!(
                "model paths configured but this build lacks the backend-tract feature"
            ));
        }

        log::warn!("no models configured; running with stub oracles");
        Ok(Self::new(
            Box::new(StubDetector::new()),
            Box::new(StubDetector::new()),
            Box::new(StubDepth::new()),
            narrator,
            settings,
        ))
    }

    /// Analyze one decoded frame.
    ///
    /// Oracle failures (either detector, the depth estimator, or a
    /// wrong-sized depth map) are fatal for the request: no partial results,
    /// since object/distance pairing needs detection and depth together.
    /// Narrator failure is the one recoverable case.
    pub fn analyze(&mut self, frame: &Frame) -> Result<SceneAnalysis> {
        let request_id = frame.request_id();
        let camera = CameraModel::new(
            frame.width,
            frame.height,
            self.settings.horizontal_fov_degrees,
        )?;

        let selection = select_detections(
            self.general.as_mut(),
            self.specialized.as_mut(),
            self.settings.selector,
            frame.pixels(),
            frame.width,
            frame.height,
        )?;

        let depth_name = self.depth.name();
        let depth = self
            .depth
            .estimate(frame.pixels(), frame.width, frame.height)
            .with_context(|| format!("depth oracle '{}' unavailable", depth_name))?;
        if depth.width() != frame.width || depth.height() != frame.height {
            return Err(anyhow!(
                "depth oracle '{}' returned a {}x{} map for a {}x{} frame",
                depth_name,
                depth.width(),
                depth.height(),
                frame.width,
                frame.height
            ));
        }

        let objects: Vec<ObjectReport> = selection
            .detections
            .iter()
            .map(|det| ObjectReport {
                label: det.label.clone(),
                confidence: det.confidence,
                distance: estimate_distance(
                    det,
                    &depth,
                    &camera,
                    &self.settings.heights,
                    self.settings.calibration,
                ),
            })
            .collect();

        let mut labels: Vec<String> = Vec::new();
        for det in &selection.detections {
            if !labels.iter().any(|seen| seen == &det.label) {
                labels.push(det.label.clone());
            }
        }

        let room = self.settings.rooms.classify(&labels);

        let scene_description = match self.narrator.describe(frame) {
            Ok(text) => text,
            Err(err) => {
                log::warn!(
                    "request {}: narrator '{}' failed, substituting fallback: {:#}",
                    request_id,
                    self.narrator.name(),
                    err
                );
                FALLBACK_DESCRIPTION.to_string()
            }
        };

        log::info!(
            "request {}: {} objects via {} detector, room {} (score {})",
            request_id,
            objects.len(),
            selection.source.as_str(),
            room.category.as_str(),
            room.score
        );

        Ok(SceneAnalysis {
            objects,
            room,
            scene_description,
            labels,
            detector: selection.source,
        })
    }
}
