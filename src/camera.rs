//! Image sources.
//!
//! A `Camera` is anything that yields intensity images of a fixed size: a physical device
//! or a still image used for debugging and tests.

use anyhow::{anyhow, Context, Result};

use crate::calibration::CameraCalibration;
use crate::capture::{CameraHandle, DeviceId};
use crate::frame::GrayImage;

pub trait Camera {
    /// Prepare the source. Called once, before any capture.
    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    /// Size of captured images as `(width, height)`.
    fn image_size(&self) -> Result<(u32, u32)>;

    /// Capture one intensity image.
    fn capture_image(&mut self) -> Result<GrayImage>;

    /// Calibration for converting detections into locations, if known.
    fn calibration(&self) -> Option<&CameraCalibration> {
        None
    }
}

/// Physical camera captured at a fixed proposed size.
pub struct DeviceCamera {
    device: DeviceId,
    image_size: (u32, u32),
    calibration: Option<CameraCalibration>,
    handle: Option<CameraHandle>,
}

impl DeviceCamera {
    pub fn new(
        device: DeviceId,
        image_size: (u32, u32),
        calibration: Option<CameraCalibration>,
    ) -> Self {
        Self {
            device,
            image_size,
            calibration,
            handle: None,
        }
    }

    /// Release the device so other processes can open it.
    pub fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.close();
        }
    }
}

impl Camera for DeviceCamera {
    fn init(&mut self) -> Result<()> {
        if self.handle.is_none() {
            let handle = CameraHandle::open(self.device.clone())?;
            self.handle = Some(handle);
        }
        Ok(())
    }

    fn image_size(&self) -> Result<(u32, u32)> {
        if self.handle.is_none() {
            return Err(anyhow!("must initialise camera before getting image size"));
        }
        Ok(self.image_size)
    }

    fn capture_image(&mut self) -> Result<GrayImage> {
        let (width, height) = self.image_size;
        let handle = self
            .handle
            .as_mut()
            .ok_or_else(|| anyhow!("capture device not available"))?;
        handle
            .capture_image(width, height)
            .with_context(|| format!("capture {}x{} from {}", width, height, self.device))
    }

    fn calibration(&self) -> Option<&CameraCalibration> {
        self.calibration.as_ref()
    }
}

/// Pseudo-camera returning the same image on every capture.
pub struct StillCamera {
    image: GrayImage,
    calibration: Option<CameraCalibration>,
}

impl StillCamera {
    pub fn new(image: GrayImage, calibration: Option<CameraCalibration>) -> Self {
        Self { image, calibration }
    }

    /// Load a still image from disk, converted to luma.
    #[cfg(feature = "image-io")]
    pub fn from_file(
        path: &std::path::Path,
        calibration: Option<CameraCalibration>,
    ) -> Result<Self> {
        let luma = image::open(path)
            .with_context(|| format!("failed to open image {}", path.display()))?
            .into_luma8();
        let (width, height) = luma.dimensions();
        let image = GrayImage::new(width, height, luma.into_raw())?;
        Ok(Self::new(image, calibration))
    }
}

impl Camera for StillCamera {
    fn image_size(&self) -> Result<(u32, u32)> {
        Ok(self.image.size())
    }

    fn capture_image(&mut self) -> Result<GrayImage> {
        Ok(self.image.clone())
    }

    fn calibration(&self) -> Option<&CameraCalibration> {
        self.calibration.as_ref()
    }
}
