//! Tag Vision
//!
//! Camera frame acquisition and fiducial marker location for a robot.
//!
//! # Architecture
//!
//! The crate is built around two guarantees:
//!
//! 1. **Frames reflect the scene at call time.** A `CameraHandle` discards warmup frames after
//!    opening or a mode change and skips queued frames before every capture.
//! 2. **Only validated frames reach the caller.** The device's reported mode, the frame's
//!    layout and its geometry are all checked before a single byte is written out.
//!
//! # Module Structure
//!
//! - `capture`: camera sessions, resolution negotiation and device backends
//! - `frame`: colour and intensity frame types
//! - `threshold`: median denoise plus adaptive mean binarization
//! - `detect`: marker detection adapter over an opaque engine
//! - `pose`: four-point pose solving with the y-up convention
//! - `coordinates`, `token`, `calibration`: marker locations relative to the camera
//! - `camera`, `vision`: image sources and the capture/threshold/detect driver
//! - `config`: layered file and environment configuration

pub mod calibration;
pub mod camera;
pub mod capture;
pub mod config;
pub mod coordinates;
pub mod detect;
pub mod frame;
pub mod pose;
pub mod threshold;
pub mod token;
pub mod vision;

pub use calibration::{CameraCalibration, MarkerSizes};
pub use camera::{Camera, DeviceCamera, StillCamera};
pub use capture::{CameraHandle, CaptureError, CaptureStats, DeviceId};
pub use config::VisionConfig;
pub use coordinates::{Cartesian, LegacyPolar, Orientation, PixelCoordinate, Spherical};
pub use detect::{Detection, DetectionEngine, DetectorConfig, TagDetector, TagFamily};
pub use frame::{ColorFrame, GrayFrame, GrayImage, PixelFormat};
pub use pose::{solve_pose, Pose, PoseError};
pub use threshold::{binarize, KernelSize};
pub use token::{Token, TokenLocation};
pub use vision::Vision;
