use anyhow::{anyhow, Result};

use crate::detect::backend::DetectionEngine;
use crate::detect::detector::DetectorConfig;
use crate::detect::result::{Detection, TagFamily};
use crate::frame::GrayImage;

/// Scripted engine for testing. Reports a preset list of detections on every frame.
///
/// Only detections of registered families are reported, and `goodness` is zeroed unless
/// pose refinement was enabled, matching what a real decoder returns.
pub struct ScriptedEngine {
    script: Vec<Detection>,
    families: Vec<(TagFamily, u8)>,
    refine_pose: bool,
    frames_seen: u64,
}

impl ScriptedEngine {
    pub fn new(script: Vec<Detection>) -> Self {
        Self {
            script,
            families: Vec::new(),
            refine_pose: false,
            frames_seen: 0,
        }
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl DetectionEngine for ScriptedEngine {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn configure(&mut self, config: &DetectorConfig) -> Result<()> {
        self.refine_pose = config.refine_pose;
        Ok(())
    }

    fn add_family(&mut self, family: TagFamily, bits_corrected: u8) -> Result<()> {
        if self.families.iter().any(|(f, _)| *f == family) {
            return Err(anyhow!("family {} registered twice", family.name()));
        }
        self.families.push((family, bits_corrected));
        Ok(())
    }

    fn detect(&mut self, _image: &GrayImage) -> Result<Vec<Detection>> {
        self.frames_seen += 1;
        let detections = self
            .script
            .iter()
            .filter(|d| {
                self.families
                    .iter()
                    .any(|(family, bits)| *family == d.family && d.hamming <= *bits)
            })
            .map(|d| {
                let mut d = d.clone();
                if !self.refine_pose {
                    d.goodness = 0.0;
                }
                d
            })
            .collect();
        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinates::PixelCoordinate;

    fn detection(id: u32, family: TagFamily, hamming: u8) -> Detection {
        Detection {
            family,
            id,
            hamming,
            decision_margin: 40.0,
            goodness: 0.7,
            homography: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            center: PixelCoordinate::new(5.0, 5.0),
            corners: [PixelCoordinate::default(); 4],
        }
    }

    #[test]
    fn reports_registered_families_within_correction_budget() {
        let mut engine = ScriptedEngine::new(vec![
            detection(1, TagFamily::Tag36h11, 0),
            detection(2, TagFamily::Tag36h11, 3),
            detection(3, TagFamily::Tag16h5, 0),
        ]);
        engine.configure(&DetectorConfig::default()).unwrap();
        engine.add_family(TagFamily::Tag36h11, 2).unwrap();
        let image = GrayImage::filled(8, 8, 0).unwrap();

        let found = engine.detect(&image).unwrap();
        assert_eq!(found.iter().map(|d| d.id).collect::<Vec<_>>(), vec![1]);
        assert_eq!(found[0].goodness, 0.0);

        engine.detect(&image).unwrap();
        assert_eq!(engine.frames_seen(), 2);
    }

    #[test]
    fn duplicate_family_is_an_error() {
        let mut engine = ScriptedEngine::default();
        engine.add_family(TagFamily::Tag25h9, 1).unwrap();
        assert!(engine.add_family(TagFamily::Tag25h9, 1).is_err());
        assert_eq!(engine.frames_seen(), 0);
    }
}
