//! Synthetic capture backend for `stub://` devices.
//!
//! Behaves like a cheap USB camera: a fixed list of supported modes, set requests for
//! anything else are silently ignored, and failures can be injected to exercise every
//! branch of the capture state machine without hardware.

use std::io;

use super::backend::CaptureBackend;
use crate::frame::{ColorFrame, PixelFormat};

/// Configuration for a synthetic device.
#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    /// Device name (the part after `stub://`).
    pub name: String,
    /// Modes the device can achieve exactly.
    pub modes: Vec<(u32, u32)>,
    /// Mode reported right after opening.
    pub initial_mode: (u32, u32),
    /// When false, `connect` fails as if the device were missing.
    pub available: bool,
    /// When true, setting the width also snaps the height to the first supported mode
    /// with that width, as many UVC drivers do.
    pub linked_modes: bool,
    /// Pixel format of delivered frames.
    pub format: PixelFormat,
    /// Extra bytes appended to every row of delivered frames.
    pub row_padding: usize,
    /// Deliver frames at this size regardless of the negotiated mode.
    pub frame_size_override: Option<(u32, u32)>,
    /// Number of upcoming reads that return an empty frame.
    pub empty_frames: u32,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            name: "camera0".to_string(),
            modes: vec![(640, 480), (1280, 720), (1920, 1080)],
            initial_mode: (640, 480),
            available: true,
            linked_modes: false,
            format: PixelFormat::Bgr24,
            row_padding: 0,
            frame_size_override: None,
            empty_frames: 0,
        }
    }
}

/// Synthetic capture device.
pub struct SyntheticBackend {
    config: SyntheticConfig,
    requested: (u32, u32),
    mode: (u32, u32),
    frame_count: u64,
    connected: bool,
}

impl SyntheticBackend {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            requested: config.initial_mode,
            mode: config.initial_mode,
            config,
            frame_count: 0,
            connected: false,
        }
    }

    /// Default synthetic device named after a `stub://` URI remainder.
    pub fn from_name(name: &str) -> Self {
        Self::new(SyntheticConfig {
            name: name.to_string(),
            ..SyntheticConfig::default()
        })
    }

    fn supports(&self, mode: (u32, u32)) -> bool {
        self.config.modes.contains(&mode)
    }

    fn apply_request(&mut self) {
        if self.supports(self.requested) {
            self.mode = self.requested;
        }
    }

    fn ensure_connected(&self) -> io::Result<()> {
        if self.connected {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::NotConnected,
                format!("synthetic device {} not connected", self.config.name),
            ))
        }
    }

    /// Diagonal gradient drifting one step per frame.
    fn generate_pixels(&self, width: u32, height: u32) -> (usize, Vec<u8>) {
        let bpp = self.config.format.bytes_per_pixel();
        let stride = width as usize * bpp + self.config.row_padding;
        let mut data = vec![0u8; stride * height as usize];
        for y in 0..height as usize {
            for x in 0..width as usize {
                let v = ((x + y) as u64 + self.frame_count) % 256;
                let offset = y * stride + x * bpp;
                for channel in 0..bpp {
                    data[offset + channel] = v as u8;
                }
            }
        }
        (stride, data)
    }
}

impl CaptureBackend for SyntheticBackend {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn connect(&mut self) -> io::Result<()> {
        if !self.config.available {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such device: stub://{}", self.config.name),
            ));
        }
        self.connected = true;
        log::info!(
            "SyntheticBackend: connected to stub://{} ({}x{})",
            self.config.name,
            self.mode.0,
            self.mode.1
        );
        Ok(())
    }

    fn frame_width(&self) -> u32 {
        self.mode.0
    }

    fn frame_height(&self) -> u32 {
        self.mode.1
    }

    fn set_frame_width(&mut self, width: u32) -> io::Result<()> {
        self.ensure_connected()?;
        self.requested.0 = width;
        if self.config.linked_modes {
            if let Some(mode) = self.config.modes.iter().find(|m| m.0 == width) {
                self.requested = *mode;
            }
        }
        self.apply_request();
        Ok(())
    }

    fn set_frame_height(&mut self, height: u32) -> io::Result<()> {
        self.ensure_connected()?;
        self.requested.1 = height;
        self.apply_request();
        Ok(())
    }

    fn grab(&mut self) -> io::Result<()> {
        self.ensure_connected()?;
        self.frame_count += 1;
        Ok(())
    }

    fn read(&mut self) -> io::Result<Option<ColorFrame>> {
        self.ensure_connected()?;
        self.frame_count += 1;
        if self.config.empty_frames > 0 {
            self.config.empty_frames -= 1;
            return Ok(None);
        }

        let (width, height) = self.config.frame_size_override.unwrap_or(self.mode);
        let (stride, data) = self.generate_pixels(width, height);
        ColorFrame::with_stride(width, height, stride, self.config.format, data)
            .map(Some)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err.to_string()))
    }

    fn release(&mut self) {
        self.connected = false;
        log::info!("SyntheticBackend: released stub://{}", self.config.name);
    }
}
