use std::io;

use thiserror::Error;

/// Failure categories of the capture path.
///
/// None of these are retried inside the crate; retry policy belongs to the caller.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("unable to open capture device {device}: {reason}")]
    DeviceUnavailable { device: String, reason: String },

    #[error(
        "device does not support {}x{} (negotiated {}x{})",
        requested.0, requested.1, actual.0, actual.1
    )]
    ResolutionUnsupported {
        requested: (u32, u32),
        actual: (u32, u32),
    },

    #[error("failed to capture image (result was empty)")]
    FrameUnavailable,

    #[error(
        "frame geometry mismatch: {}x{} expected, {}x{} actual",
        expected.0, expected.1, actual.0, actual.1
    )]
    GeometryMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("frame is not contiguous (width {width}, row stride {stride})")]
    LayoutInvalid { width: u32, stride: usize },

    #[error("output buffer holds {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },

    #[error("capture backend failure: {0}")]
    Backend(#[from] io::Error),
}
