//! Frame containers and colour-to-intensity normalization.
//!
//! - `ColorFrame`: one frame as delivered by a capture backend, possibly with padded rows.
//! - `GrayFrame`: single-channel intensity frame, still carrying the source row pitch.
//! - `GrayImage`: owned, contiguous intensity image handed to binarization and detection.
//!
//! Conversion never repacks rows. A padded colour frame yields a padded intensity frame, and
//! the capture path refuses to copy out of anything that is not one contiguous block.

use anyhow::{anyhow, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Bgr24,
    Rgb24,
    Yuyv,
    Gray8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bgr24 | PixelFormat::Rgb24 => 3,
            PixelFormat::Yuyv => 2,
            PixelFormat::Gray8 => 1,
        }
    }
}

/// One colour frame retrieved from a device.
///
/// `stride` is the row pitch in bytes and is at least `width * bytes_per_pixel`.
#[derive(Clone, Debug)]
pub struct ColorFrame {
    pub width: u32,
    pub height: u32,
    pub stride: usize,
    pub format: PixelFormat,
    pub data: Vec<u8>,
}

impl ColorFrame {
    /// Build a frame with tightly packed rows.
    pub fn packed(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Result<Self> {
        let stride = width as usize * format.bytes_per_pixel();
        Self::with_stride(width, height, stride, format, data)
    }

    pub fn with_stride(
        width: u32,
        height: u32,
        stride: usize,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> Result<Self> {
        let row_bytes = (width as usize)
            .checked_mul(format.bytes_per_pixel())
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if stride < row_bytes {
            return Err(anyhow!(
                "row stride {} shorter than {} bytes of pixel data",
                stride,
                row_bytes
            ));
        }
        let expected = stride
            .checked_mul(height as usize)
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if data.len() < expected {
            return Err(anyhow!(
                "frame length mismatch: expected at least {}, got {}",
                expected,
                data.len()
            ));
        }
        Ok(Self {
            width,
            height,
            stride,
            format,
            data,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.data.is_empty()
    }

    /// Convert to single-channel intensity.
    ///
    /// Row padding is carried over as pixel padding: a source whose rows are padded by `n`
    /// bytes produces an intensity frame whose stride exceeds its width.
    pub fn to_intensity(&self) -> GrayFrame {
        let bpp = self.format.bytes_per_pixel();
        let w = self.width as usize;
        let h = self.height as usize;
        let pad_px = (self.stride - w * bpp) / bpp;
        let stride = w + pad_px;

        let mut data = vec![0u8; stride * h];
        for y in 0..h {
            let src = &self.data[y * self.stride..y * self.stride + w * bpp];
            let dst = &mut data[y * stride..y * stride + w];
            match self.format {
                PixelFormat::Bgr24 => {
                    for (out, px) in dst.iter_mut().zip(src.chunks_exact(3)) {
                        *out = luma(px[2], px[1], px[0]);
                    }
                }
                PixelFormat::Rgb24 => {
                    for (out, px) in dst.iter_mut().zip(src.chunks_exact(3)) {
                        *out = luma(px[0], px[1], px[2]);
                    }
                }
                PixelFormat::Yuyv => {
                    for (out, px) in dst.iter_mut().zip(src.chunks_exact(2)) {
                        *out = px[0];
                    }
                }
                PixelFormat::Gray8 => dst.copy_from_slice(src),
            }
        }

        GrayFrame {
            width: self.width,
            height: self.height,
            stride,
            data,
        }
    }
}

/// BT.601 luma in 14-bit fixed point.
fn luma(r: u8, g: u8, b: u8) -> u8 {
    const R: u32 = 4899;
    const G: u32 = 9617;
    const B: u32 = 1868;
    ((r as u32 * R + g as u32 * G + b as u32 * B + (1 << 13)) >> 14) as u8
}

/// Single-channel intensity frame with an explicit row stride in pixels.
#[derive(Clone, Debug)]
pub struct GrayFrame {
    pub width: u32,
    pub height: u32,
    pub stride: usize,
    data: Vec<u8>,
}

impl GrayFrame {
    pub fn is_contiguous(&self) -> bool {
        self.stride == self.width as usize
    }

    /// The packed pixel block, or `None` when rows are padded.
    pub fn contiguous_bytes(&self) -> Option<&[u8]> {
        if !self.is_contiguous() {
            return None;
        }
        let len = self.width as usize * self.height as usize;
        Some(&self.data[..len])
    }

    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        &self.data[start..start + self.width as usize]
    }
}

/// Owned contiguous intensity (or binary) image, row-major, `data.len() == width * height`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl GrayImage {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = pixel_count(width, height)?;
        if data.len() != expected {
            return Err(anyhow!(
                "image length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn filled(width: u32, height: u32, value: u8) -> Result<Self> {
        let len = pixel_count(width, height)?;
        Ok(Self {
            width,
            height,
            data: vec![value; len],
        })
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.data[y as usize * self.width as usize + x as usize]
    }
}

pub(crate) fn pixel_count(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}
