//! Marker detection adapter.
//!
//! `TagDetector` owns one `DetectionEngine` and the detector state the engine needs:
//! tunables, registered families and the image size it was created for.

mod backend;
mod backends;
mod detector;
mod result;

pub use backend::DetectionEngine;
pub use backends::ScriptedEngine;
#[cfg(feature = "detect-apriltag")]
pub use backends::AprilTagEngine;
pub use detector::{DetectorConfig, TagDetector, MAX_CORRECTED_BITS};
pub use result::{Detection, TagFamily};
