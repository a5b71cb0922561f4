use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use super::backend::DetectionEngine;
use super::result::{Detection, TagFamily};
use crate::frame::GrayImage;

/// Largest number of bit errors a registered family may correct.
pub const MAX_CORRECTED_BITS: u8 = 2;

/// Detector tunables, passed to the engine unchanged.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Decimate the input by this factor before quad detection.
    pub decimate: f32,
    /// Gaussian blur applied before quad detection; negative sharpens.
    pub sigma: f32,
    /// Spend more time aligning tag edges.
    pub refine_edges: bool,
    /// Spend more time decoding tags.
    pub refine_decode: bool,
    /// Spend more time refining tag position. Required for a non-zero `goodness`.
    pub refine_pose: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            decimate: 1.0,
            sigma: 0.0,
            refine_edges: true,
            refine_decode: false,
            refine_pose: false,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.decimate.is_finite() && self.decimate > 0.0) {
            return Err(anyhow!("decimate must be a positive number, got {}", self.decimate));
        }
        if !self.sigma.is_finite() {
            return Err(anyhow!("sigma must be finite, got {}", self.sigma));
        }
        Ok(())
    }
}

/// Marker detector sized for one image geometry.
///
/// Families are registered explicitly through `add_family`. Registering the same family
/// again is a no-op. If nothing was registered by the first `detect`, the default family
/// is registered then.
pub struct TagDetector {
    engine: Box<dyn DetectionEngine>,
    config: DetectorConfig,
    families: Vec<TagFamily>,
    image_size: (u32, u32),
}

impl TagDetector {
    pub fn new(
        mut engine: Box<dyn DetectionEngine>,
        config: DetectorConfig,
        image_size: (u32, u32),
    ) -> Result<Self> {
        config.validate()?;
        engine
            .configure(&config)
            .with_context(|| format!("configure {} detection engine", engine.name()))?;
        Ok(Self {
            engine,
            config,
            families: Vec::new(),
            image_size,
        })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Configured image size as `(width, height)`.
    pub fn image_size(&self) -> (u32, u32) {
        self.image_size
    }

    pub fn families(&self) -> &[TagFamily] {
        &self.families
    }

    /// Register a family with the engine. Idempotent.
    pub fn add_family(&mut self, family: TagFamily) -> Result<()> {
        if self.families.contains(&family) {
            return Ok(());
        }
        self.engine
            .add_family(family, MAX_CORRECTED_BITS)
            .with_context(|| format!("register family {}", family.name()))?;
        log::debug!(
            "registered family {} with {} engine",
            family.name(),
            self.engine.name()
        );
        self.families.push(family);
        Ok(())
    }

    /// Detect markers in an intensity or binary image of the configured size.
    pub fn detect(&mut self, image: &GrayImage) -> Result<Vec<Detection>> {
        if image.size() != self.image_size {
            return Err(anyhow!(
                "cannot process images of an incompatible size: detector is configured for \
                 {}x{}, given image at {}x{}",
                self.image_size.0,
                self.image_size.1,
                image.width,
                image.height
            ));
        }
        if self.families.is_empty() {
            self.add_family(TagFamily::default())?;
        }
        self.engine.detect(image)
    }
}
