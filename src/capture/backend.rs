use std::io;

use crate::frame::ColorFrame;

/// Capture backend trait.
///
/// A backend owns one device session. It reports the mode the device has actually
/// negotiated, which may differ from the last request: hardware is free to ignore a set
/// request it cannot honour, so callers must re-read after every set.
///
/// Backends are driven from a single thread through `&mut self`; the trait only requires
/// `Send` so a session can be moved to a worker.
pub trait CaptureBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Open the underlying device. Called exactly once, before any other method.
    fn connect(&mut self) -> io::Result<()>;

    /// Currently negotiated frame width.
    fn frame_width(&self) -> u32;

    /// Currently negotiated frame height.
    fn frame_height(&self) -> u32;

    /// Request a new frame width. Success only means the request was issued.
    fn set_frame_width(&mut self, width: u32) -> io::Result<()>;

    /// Request a new frame height. Success only means the request was issued.
    fn set_frame_height(&mut self, height: u32) -> io::Result<()>;

    /// Pull one frame from the device and discard it.
    fn grab(&mut self) -> io::Result<()>;

    /// Pull one frame. `Ok(None)` means the device produced an empty frame.
    fn read(&mut self) -> io::Result<Option<ColorFrame>>;

    /// Release the device session. Called at most once.
    fn release(&mut self) {}
}
