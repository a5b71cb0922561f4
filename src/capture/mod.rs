//! Camera sessions.
//!
//! This module provides `CameraHandle`, one owned session on one physical device, and the
//! frame-acquisition state machine around it:
//!
//! - open: connect the backend, then discard `WARMUP_FRAMES` badly exposed frames
//! - negotiate: compare the requested mode against what the device reports, request a
//!   change if needed, and refuse to proceed when the device never reaches the request
//! - skip: discard `WARMUP_FRAMES` after a mode change, `STEADY_STATE_SKIP_FRAMES` otherwise,
//!   so the captured frame reflects the scene at call time rather than queued buffers
//! - capture: pull one frame, convert to intensity, validate layout and geometry, and only
//!   then copy into the caller's buffer
//!
//! A handle is closed by consuming it, so use after close does not compile:
//!
//! ```compile_fail
//! use tag_vision::capture::{CameraHandle, DeviceId};
//!
//! let mut handle = CameraHandle::open(DeviceId::from("stub://camera0")).unwrap();
//! handle.close();
//! let mut buf = vec![0u8; 640 * 480];
//! handle.capture(640, 480, &mut buf).unwrap();
//! ```

mod backend;
mod error;
pub mod synthetic;
#[cfg(feature = "capture-v4l2")]
pub mod v4l2;

use std::fmt;
use std::str::FromStr;

pub use backend::CaptureBackend;
pub use error::CaptureError;
pub use synthetic::{SyntheticBackend, SyntheticConfig};
#[cfg(feature = "capture-v4l2")]
pub use v4l2::V4l2Backend;

use crate::frame::GrayImage;

/// Frames discarded after opening or changing resolution. Early frames from a freshly
/// configured sensor come out underexposed.
pub const WARMUP_FRAMES: u32 = 11;

/// Frames discarded before every steady-state capture, flushing buffers queued before the
/// capture request.
pub const STEADY_STATE_SKIP_FRAMES: u32 = 5;

const STUB_SCHEME: &str = "stub://";

/// Physical device identifier: a device index or a device path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceId {
    Index(u32),
    Path(String),
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceId::Index(index) => write!(f, "#{}", index),
            DeviceId::Path(path) => f.write_str(path),
        }
    }
}

impl From<u32> for DeviceId {
    fn from(index: u32) -> Self {
        DeviceId::Index(index)
    }
}

impl From<&str> for DeviceId {
    fn from(path: &str) -> Self {
        DeviceId::Path(path.to_string())
    }
}

impl FromStr for DeviceId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(match s.parse::<u32>() {
            Ok(index) => DeviceId::Index(index),
            Err(_) => DeviceId::Path(s.to_string()),
        })
    }
}

/// Counters for the requests a handle has issued to its device.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub frames_captured: u64,
    pub frames_skipped: u64,
    pub width_sets: u64,
    pub height_sets: u64,
}

/// Exclusively owned session on one camera device.
///
/// Not `Sync`: at most one call sequence may be in flight per handle. Callers that share a
/// camera across workers must serialize access themselves.
pub struct CameraHandle {
    device: DeviceId,
    backend: Box<dyn CaptureBackend>,
    current_width: u32,
    current_height: u32,
    stats: CaptureStats,
    released: bool,
}

impl CameraHandle {
    /// Open a device, selecting the backend from the identifier.
    ///
    /// `stub://` paths open a synthetic device. Anything else needs the `capture-v4l2`
    /// feature.
    pub fn open(device: DeviceId) -> Result<Self, CaptureError> {
        let backend = backend_for(&device)?;
        Self::open_with(device, backend)
    }

    /// Open a session over an explicit backend.
    pub fn open_with(
        device: DeviceId,
        mut backend: Box<dyn CaptureBackend>,
    ) -> Result<Self, CaptureError> {
        if let Err(err) = backend.connect() {
            log::error!("unable to open capture device {}: {}", device, err);
            return Err(CaptureError::DeviceUnavailable {
                device: device.to_string(),
                reason: err.to_string(),
            });
        }

        let mut handle = Self {
            device,
            backend,
            current_width: 0,
            current_height: 0,
            stats: CaptureStats::default(),
            released: false,
        };
        handle.warmup();
        log::info!(
            "opened capture device {} via {} backend",
            handle.device,
            handle.backend.name()
        );
        Ok(handle)
    }

    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    /// Last resolution confirmed by a successful capture, `(0, 0)` before the first one.
    pub fn current_resolution(&self) -> (u32, u32) {
        (self.current_width, self.current_height)
    }

    pub fn stats(&self) -> CaptureStats {
        self.stats
    }

    /// Bring the device to exactly `width x height`, then flush stale frames.
    pub fn ensure_resolution(&mut self, width: u32, height: u32) -> Result<(), CaptureError> {
        let current = self.negotiated();

        if current != (width, height) {
            log::info!(
                "changing resolution from {}x{} to {}x{}",
                current.0,
                current.1,
                width,
                height
            );
            self.request_width(width);
            if self.backend.frame_height() != height {
                self.request_height(height);
            }
            self.warmup();
        } else {
            self.skip_frames(STEADY_STATE_SKIP_FRAMES);
        }

        let actual = self.negotiated();
        if actual.0 != width {
            log::error!("incorrect width set on device {}: {}", self.device, actual.0);
        }
        if actual.1 != height {
            log::error!("incorrect height set on device {}: {}", self.device, actual.1);
        }
        if actual != (width, height) {
            return Err(CaptureError::ResolutionUnsupported {
                requested: (width, height),
                actual,
            });
        }
        Ok(())
    }

    /// Capture one intensity frame of exactly `width x height` into `out`.
    ///
    /// `out` must hold exactly `width * height` bytes. It is written only when every check
    /// has passed; on failure its contents are untouched.
    pub fn capture(&mut self, width: u32, height: u32, out: &mut [u8]) -> Result<(), CaptureError> {
        let expected_len = width as usize * height as usize;
        if out.len() != expected_len {
            log::error!(
                "output buffer for {} holds {} bytes, {}x{} needs {}",
                self.device,
                out.len(),
                width,
                height,
                expected_len
            );
            return Err(CaptureError::BufferSize {
                expected: expected_len,
                actual: out.len(),
            });
        }

        self.ensure_resolution(width, height)?;

        let frame = match self.backend.read() {
            Ok(Some(frame)) if !frame.is_empty() => frame,
            Err(err) => {
                log::error!("failed to capture image from {}: {}", self.device, err);
                return Err(CaptureError::Backend(err));
            }
            Ok(_) => {
                log::error!("failed to capture image from {} (result was empty)", self.device);
                return Err(CaptureError::FrameUnavailable);
            }
        };

        let gray = frame.to_intensity();
        let Some(bytes) = gray.contiguous_bytes() else {
            log::error!(
                "captured frame from {} is not contiguous (width {}, stride {})",
                self.device,
                gray.width,
                gray.stride
            );
            return Err(CaptureError::LayoutInvalid {
                width: gray.width,
                stride: gray.stride,
            });
        };

        if gray.width != width {
            log::error!("width mismatch: {} expected, {} actual", width, gray.width);
        }
        if gray.height != height {
            log::error!("height mismatch: {} expected, {} actual", height, gray.height);
        }
        if (gray.width, gray.height) != (width, height) {
            return Err(CaptureError::GeometryMismatch {
                expected: (width, height),
                actual: (gray.width, gray.height),
            });
        }

        out.copy_from_slice(bytes);
        self.current_width = width;
        self.current_height = height;
        self.stats.frames_captured += 1;
        Ok(())
    }

    /// Capture into a freshly allocated image.
    pub fn capture_image(&mut self, width: u32, height: u32) -> Result<GrayImage, CaptureError> {
        let mut data = vec![0u8; width as usize * height as usize];
        self.capture(width, height, &mut data)?;
        Ok(GrayImage {
            width,
            height,
            data,
        })
    }

    /// Release the device. Consumes the handle.
    pub fn close(mut self) {
        self.release();
    }

    fn negotiated(&self) -> (u32, u32) {
        (self.backend.frame_width(), self.backend.frame_height())
    }

    fn request_width(&mut self, width: u32) {
        self.stats.width_sets += 1;
        if let Err(err) = self.backend.set_frame_width(width) {
            log::warn!("failed to request width {} on {}: {}", width, self.device, err);
        }
    }

    fn request_height(&mut self, height: u32) {
        self.stats.height_sets += 1;
        if let Err(err) = self.backend.set_frame_height(height) {
            log::warn!("failed to request height {} on {}: {}", height, self.device, err);
        }
    }

    fn warmup(&mut self) {
        self.skip_frames(WARMUP_FRAMES);
    }

    fn skip_frames(&mut self, count: u32) {
        log::debug!("skipping {} frames on {}", count, self.device);
        for _ in 0..count {
            if let Err(err) = self.backend.grab() {
                log::debug!("grab failed on {}: {}", self.device, err);
            }
            self.stats.frames_skipped += 1;
        }
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.backend.release();
            log::info!("closed capture device {}", self.device);
        }
    }
}

impl Drop for CameraHandle {
    fn drop(&mut self) {
        self.release();
    }
}

fn backend_for(device: &DeviceId) -> Result<Box<dyn CaptureBackend>, CaptureError> {
    if let DeviceId::Path(path) = device {
        if let Some(name) = path.strip_prefix(STUB_SCHEME) {
            return Ok(Box::new(SyntheticBackend::from_name(name)));
        }
    }

    #[cfg(feature = "capture-v4l2")]
    {
        Ok(Box::new(V4l2Backend::new(device)))
    }
    #[cfg(not(feature = "capture-v4l2"))]
    {
        log::error!("cannot open {}: built without the capture-v4l2 feature", device);
        Err(CaptureError::DeviceUnavailable {
            device: device.to_string(),
            reason: "device capture requires the capture-v4l2 feature".to_string(),
        })
    }
}
