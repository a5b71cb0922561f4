pub mod stub;

#[cfg(feature = "detect-apriltag")]
pub mod apriltag;

pub use stub::ScriptedEngine;

#[cfg(feature = "detect-apriltag")]
pub use self::apriltag::AprilTagEngine;
