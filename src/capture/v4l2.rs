//! V4L2 capture backend.
//!
//! Streams from a local device node (e.g. /dev/video0) through memory-mapped buffers.
//! Format changes require the stream to be torn down, so every set request stops the
//! stream, applies the format, re-reads what the driver accepted, and restarts streaming.

use std::io;

use ouroboros::self_referencing;
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::prelude::MmapStream;
use v4l::video::Capture;
use v4l::FourCC;

use super::backend::CaptureBackend;
use super::DeviceId;
use crate::frame::{ColorFrame, PixelFormat};

const STREAM_BUFFERS: u32 = 4;

#[self_referencing]
struct StreamState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: MmapStream<'this, v4l::Device>,
}

/// V4L2 device session.
pub struct V4l2Backend {
    path: String,
    idle: Option<v4l::Device>,
    state: Option<StreamState>,
    width: u32,
    height: u32,
    stride: usize,
    format: PixelFormat,
}

impl V4l2Backend {
    pub fn new(device: &DeviceId) -> Self {
        let path = match device {
            DeviceId::Index(index) => format!("/dev/video{}", index),
            DeviceId::Path(path) => path.clone(),
        };
        Self {
            path,
            idle: None,
            state: None,
            width: 0,
            height: 0,
            stride: 0,
            format: PixelFormat::Yuyv,
        }
    }

    fn start_stream(device: v4l::Device) -> io::Result<StreamState> {
        StreamStateTryBuilder {
            device,
            stream_builder: |device| {
                MmapStream::with_buffers(device, Type::VideoCapture, STREAM_BUFFERS)
            },
        }
        .try_build()
    }

    fn record_format(&mut self, format: &v4l::Format) -> io::Result<()> {
        self.format = pixel_format(format.fourcc).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::Unsupported,
                format!("unsupported pixel format {} on {}", format.fourcc, self.path),
            )
        })?;
        self.width = format.width;
        self.height = format.height;
        self.stride = format.stride as usize;
        Ok(())
    }

    fn reconfigure(&mut self, width: Option<u32>, height: Option<u32>) -> io::Result<()> {
        let device = match (self.state.take(), self.idle.take()) {
            (Some(state), _) => state.into_heads().device,
            (None, Some(device)) => device,
            (None, None) => {
                return Err(io::Error::new(
                    io::ErrorKind::NotConnected,
                    format!("v4l2 device {} not connected", self.path),
                ))
            }
        };

        let mut format = device.format()?;
        if let Some(width) = width {
            format.width = width;
        }
        if let Some(height) = height {
            format.height = height;
        }
        let requested = device.set_format(&format);
        if let Err(err) = &requested {
            log::warn!("V4l2Backend: failed to set format on {}: {}", self.path, err);
        }

        if let Err(err) = device.format().and_then(|current| self.record_format(&current)) {
            self.idle = Some(device);
            return Err(err);
        }
        self.state = Some(Self::start_stream(device)?);
        requested.map(|_| ())
    }

    fn next_buffer(&mut self) -> io::Result<Vec<u8>> {
        let state = self.state.as_mut().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotConnected, "v4l2 stream not running")
        })?;
        state.with_stream_mut(|stream| {
            stream.next().map(|(buf, meta)| {
                let used = meta.bytesused as usize;
                if used == 0 || used > buf.len() {
                    buf.to_vec()
                } else {
                    buf[..used].to_vec()
                }
            })
        })
    }
}

fn pixel_format(fourcc: FourCC) -> Option<PixelFormat> {
    match &fourcc.repr {
        b"YUYV" => Some(PixelFormat::Yuyv),
        b"BGR3" => Some(PixelFormat::Bgr24),
        b"RGB3" => Some(PixelFormat::Rgb24),
        b"GREY" => Some(PixelFormat::Gray8),
        _ => None,
    }
}

impl CaptureBackend for V4l2Backend {
    fn name(&self) -> &'static str {
        "v4l2"
    }

    fn connect(&mut self) -> io::Result<()> {
        let device = v4l::Device::with_path(&self.path)?;
        let mut format = device.format()?;
        format.fourcc = FourCC::new(b"YUYV");
        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!("V4l2Backend: failed to set YUYV on {}: {}", self.path, err);
                device.format()?
            }
        };
        self.record_format(&format)?;
        self.state = Some(Self::start_stream(device)?);

        log::info!(
            "V4l2Backend: connected to {} ({}x{})",
            self.path,
            self.width,
            self.height
        );
        Ok(())
    }

    fn frame_width(&self) -> u32 {
        self.width
    }

    fn frame_height(&self) -> u32 {
        self.height
    }

    fn set_frame_width(&mut self, width: u32) -> io::Result<()> {
        self.reconfigure(Some(width), None)
    }

    fn set_frame_height(&mut self, height: u32) -> io::Result<()> {
        self.reconfigure(None, Some(height))
    }

    fn grab(&mut self) -> io::Result<()> {
        self.next_buffer().map(|_| ())
    }

    fn read(&mut self) -> io::Result<Option<ColorFrame>> {
        let data = self.next_buffer()?;
        if data.is_empty() {
            return Ok(None);
        }
        let stride = if self.stride == 0 {
            self.width as usize * self.format.bytes_per_pixel()
        } else {
            self.stride
        };
        // Short buffers are a truncated transfer, reported the same way as an empty frame.
        match ColorFrame::with_stride(self.width, self.height, stride, self.format, data) {
            Ok(frame) => Ok(Some(frame)),
            Err(err) => {
                log::warn!("V4l2Backend: discarding frame from {}: {}", self.path, err);
                Ok(None)
            }
        }
    }

    fn release(&mut self) {
        self.state = None;
        self.idle = None;
        log::info!("V4l2Backend: released {}", self.path);
    }
}
