use anyhow::Result;

use crate::detect::detector::DetectorConfig;
use crate::detect::result::{Detection, TagFamily};
use crate::frame::GrayImage;

/// Marker decoding engine.
///
/// The engine wraps an external decoding library. Its internals (quad fitting, edge
/// refinement, bit decoding) are opaque; `TagDetector` only shapes inputs and hands back
/// whatever the engine reports. An empty vector is the engine's "nothing found".
pub trait DetectionEngine: Send {
    /// Engine identifier.
    fn name(&self) -> &'static str;

    /// Apply detector tunables. Called once before any family is registered.
    fn configure(&mut self, config: &DetectorConfig) -> Result<()>;

    /// Register a family, allowing up to `bits_corrected` bit errors per decode.
    fn add_family(&mut self, family: TagFamily, bits_corrected: u8) -> Result<()>;

    /// Run detection. The image is borrowed for the duration of the call only.
    fn detect(&mut self, image: &GrayImage) -> Result<Vec<Detection>>;
}
