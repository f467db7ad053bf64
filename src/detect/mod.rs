mod backend;
mod backends;
mod result;
mod selector;

pub use backend::DetectorBackend;
pub use backends::StubDetector;
pub use result::{BoundingBox, Detection};
pub use selector::{select_detections, DetectorKind, Selection, SelectorPolicy};

#[cfg(feature = "backend-tract")]
pub use backends::TractDetector;
