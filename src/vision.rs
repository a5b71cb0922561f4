//! Vision driver: capture, threshold, detect, locate.

use anyhow::{anyhow, Result};

use crate::calibration::MarkerSizes;
use crate::camera::Camera;
use crate::detect::{DetectionEngine, DetectorConfig, TagDetector};
use crate::frame::GrayImage;
use crate::threshold::threshold_image;
use crate::token::Token;

/// Ties one camera to one marker detector.
///
/// The camera is initialised on first use and the detector is created lazily, sized to the
/// camera's images.
pub struct Vision<C: Camera> {
    camera: C,
    camera_ready: bool,
    engine: Option<Box<dyn DetectionEngine>>,
    detector: Option<TagDetector>,
    detector_config: DetectorConfig,
    marker_sizes: MarkerSizes,
}

impl<C: Camera> Vision<C> {
    pub fn new(camera: C, engine: Box<dyn DetectionEngine>) -> Self {
        Self {
            camera,
            camera_ready: false,
            engine: Some(engine),
            detector: None,
            detector_config: DetectorConfig::default(),
            marker_sizes: MarkerSizes::default(),
        }
    }

    pub fn with_detector_config(mut self, config: DetectorConfig) -> Self {
        self.detector_config = config;
        self
    }

    pub fn with_marker_sizes(mut self, sizes: MarkerSizes) -> Self {
        self.marker_sizes = sizes;
        self
    }

    /// The camera, initialised on first access.
    pub fn camera(&mut self) -> Result<&mut C> {
        if !self.camera_ready {
            self.camera.init()?;
            self.camera_ready = true;
        }
        Ok(&mut self.camera)
    }

    fn detector(&mut self) -> Result<&mut TagDetector> {
        if self.detector.is_none() {
            let size = self.camera()?.image_size()?;
            let engine = self
                .engine
                .take()
                .ok_or_else(|| anyhow!("detection engine already consumed"))?;
            self.detector = Some(TagDetector::new(engine, self.detector_config, size)?);
        }
        self.detector
            .as_mut()
            .ok_or_else(|| anyhow!("detector not initialised"))
    }

    pub fn capture_image(&mut self) -> Result<GrayImage> {
        self.camera()?.capture_image()
    }

    /// Denoise and binarize an image for detection.
    pub fn threshold_image(&self, image: &GrayImage) -> GrayImage {
        threshold_image(image)
    }

    /// Threshold an image, detect markers in it, and locate them when calibrated.
    pub fn process_image(&mut self, image: &GrayImage) -> Result<Vec<Token>> {
        let binary = self.threshold_image(image);
        let detections = self.detector()?.detect(&binary)?;
        let calibration = self.camera.calibration();
        let tokens = detections
            .iter()
            .map(|d| Token::from_detection(d, calibration, &self.marker_sizes))
            .collect();
        Ok(tokens)
    }

    /// Capture one image and process it.
    pub fn snapshot(&mut self) -> Result<Vec<Token>> {
        let image = self.capture_image()?;
        self.process_image(&image)
    }
}
