//! NearSight Assistance Kernel (NAK)
//!
//! This crate estimates, from a single camera frame, which objects are
//! nearby, roughly how far away each one is, and what kind of room the
//! scene looks like, to assist a visually impaired user.
//!
//! # Architecture
//!
//! The pretrained models are opaque oracles behind capability traits; the
//! kernel contains the logic that combines their outputs:
//!
//! - `detect`: detector oracle interface, bounding boxes, and the
//!   two-detector selection policy
//! - `depth`: depth oracle interface and the normalized relative depth map
//! - `distance`: hybrid fusion of depth-map and known-height estimates
//! - `room`: coarse room classification from the detected label set
//! - `narrate`: external scene narrator with a fixed local fallback
//! - `pipeline`: per-request orchestration of the above
//! - `frame`, `camera`, `config`, `api`: decoded-image handling, the
//!   pinhole assumption, deployment configuration, and the HTTP boundary

pub mod api;
pub mod camera;
pub mod config;
pub mod depth;
pub mod detect;
pub mod distance;
pub mod frame;
pub mod narrate;
pub mod pipeline;
pub mod room;

pub use camera::{CameraModel, DEFAULT_HORIZONTAL_FOV_DEGREES};
pub use config::AssistConfig;
pub use depth::{DepthBackend, DepthMap, StubDepth};
pub use detect::{
    select_detections, BoundingBox, Detection, DetectorBackend, DetectorKind, Selection,
    SelectorPolicy, StubDetector,
};
pub use distance::{
    estimate_distance, DepthCalibration, DistanceEstimate, HeightLookup, KnownHeightTable,
    DEFAULT_DEPTH_SCALE_CM,
};
pub use frame::Frame;
pub use narrate::{HttpNarrator, SceneNarrator, StaticNarrator, FALLBACK_DESCRIPTION};
pub use pipeline::{Engine, EngineSettings, ObjectReport, SceneAnalysis};
pub use room::{RoomCategory, RoomMatch, RoomProfiles};

#[cfg(feature = "backend-tract")]
pub use depth::TractDepth;
#[cfg(feature = "backend-tract")]
pub use detect::TractDetector;
