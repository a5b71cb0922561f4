#![cfg(feature = "detect-apriltag")]

use anyhow::{anyhow, Result};
use nalgebra::{SMatrix, SVector};

use crate::coordinates::PixelCoordinate;
use crate::detect::backend::DetectionEngine;
use crate::detect::detector::DetectorConfig;
use crate::detect::result::{Detection, TagFamily};
use crate::frame::GrayImage;

/// AprilTag engine over the native apriltag library.
///
/// One native detector is kept per registered family so every detection can be attributed
/// to its family. Native detectors are built on first use after configuration or
/// registration changes.
pub struct AprilTagEngine {
    config: DetectorConfig,
    families: Vec<(TagFamily, u8)>,
    detectors: Vec<(TagFamily, ::apriltag::Detector)>,
    stale: bool,
}

impl AprilTagEngine {
    pub fn new() -> Self {
        Self {
            config: DetectorConfig::default(),
            families: Vec::new(),
            detectors: Vec::new(),
            stale: true,
        }
    }

    fn rebuild(&mut self) -> Result<()> {
        let mut detectors = Vec::with_capacity(self.families.len());
        for &(family, bits) in &self.families {
            let mut detector = ::apriltag::DetectorBuilder::new()
                .add_family_bits(native_family(family), bits as usize)
                .build()
                .map_err(|err| {
                    anyhow!("failed to build apriltag detector for {}: {:?}", family.name(), err)
                })?;
            detector.set_decimation(self.config.decimate);
            detector.set_sigma(self.config.sigma);
            detector.set_refine_edges(self.config.refine_edges);
            detectors.push((family, detector));
        }
        self.detectors = detectors;
        self.stale = false;
        Ok(())
    }
}

impl Default for AprilTagEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn native_family(family: TagFamily) -> ::apriltag::Family {
    match family {
        TagFamily::Tag36h11 => ::apriltag::Family::tag_36h11(),
        TagFamily::Tag25h9 => ::apriltag::Family::tag_25h9(),
        TagFamily::Tag16h5 => ::apriltag::Family::tag_16h5(),
    }
}

fn to_native_image(image: &GrayImage) -> Result<::apriltag::Image> {
    let (w, h) = (image.width as usize, image.height as usize);
    let mut native = ::apriltag::Image::zeros_with_stride(w, h, w)
        .ok_or_else(|| anyhow!("cannot allocate {}x{} apriltag image", w, h))?;
    for y in 0..h {
        for x in 0..w {
            native[(x, y)] = image.data[y * w + x];
        }
    }
    Ok(native)
}

/// Tag-to-image homography from the four corners, which sit at (-1, 1), (1, 1), (1, -1) and
/// (-1, -1) in tag coordinates.
fn homography_from_corners(corners: &[[f64; 2]; 4]) -> Option<[[f64; 3]; 3]> {
    const TAG: [[f64; 2]; 4] = [[-1.0, 1.0], [1.0, 1.0], [1.0, -1.0], [-1.0, -1.0]];
    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();
    for (i, (t, c)) in TAG.iter().zip(corners).enumerate() {
        let (tx, ty) = (t[0], t[1]);
        let (u, v) = (c[0], c[1]);
        a.row_mut(2 * i)
            .copy_from_slice(&[tx, ty, 1.0, 0.0, 0.0, 0.0, -u * tx, -u * ty]);
        a.row_mut(2 * i + 1)
            .copy_from_slice(&[0.0, 0.0, 0.0, tx, ty, 1.0, -v * tx, -v * ty]);
        b[2 * i] = u;
        b[2 * i + 1] = v;
    }
    let h = a.lu().solve(&b)?;
    Some([[h[0], h[1], h[2]], [h[3], h[4], h[5]], [h[6], h[7], 1.0]])
}

impl DetectionEngine for AprilTagEngine {
    fn name(&self) -> &'static str {
        "apriltag"
    }

    fn configure(&mut self, config: &DetectorConfig) -> Result<()> {
        if config.refine_decode || config.refine_pose {
            log::debug!("apriltag: refine_decode and refine_pose have no native counterpart");
        }
        self.config = *config;
        self.stale = true;
        Ok(())
    }

    fn add_family(&mut self, family: TagFamily, bits_corrected: u8) -> Result<()> {
        if self.families.iter().any(|(f, _)| *f == family) {
            return Err(anyhow!("family {} registered twice", family.name()));
        }
        self.families.push((family, bits_corrected));
        self.stale = true;
        Ok(())
    }

    fn detect(&mut self, image: &GrayImage) -> Result<Vec<Detection>> {
        if self.stale {
            self.rebuild()?;
        }
        let native = to_native_image(image)?;

        let mut out = Vec::new();
        for (family, detector) in self.detectors.iter_mut() {
            for det in detector.detect(&native) {
                let corners = det.corners();
                let Some(homography) = homography_from_corners(&corners) else {
                    log::debug!("apriltag: dropping degenerate quad for id {}", det.id());
                    continue;
                };
                let center = det.center();
                out.push(Detection {
                    family: *family,
                    id: det.id() as u32,
                    hamming: det.hamming() as u8,
                    decision_margin: det.decision_margin(),
                    // The native library does not score pose refinement.
                    goodness: 0.0,
                    homography,
                    center: PixelCoordinate::new(center[0], center[1]),
                    corners: corners.map(|c| PixelCoordinate::new(c[0], c[1])),
                });
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn homography_maps_tag_corners_to_pixels() {
        let corners = [[100.0, 50.0], [140.0, 52.0], [138.0, 90.0], [98.0, 88.0]];
        let h = homography_from_corners(&corners).unwrap();
        let apply = |x: f64, y: f64| {
            let w = h[2][0] * x + h[2][1] * y + h[2][2];
            (
                (h[0][0] * x + h[0][1] * y + h[0][2]) / w,
                (h[1][0] * x + h[1][1] * y + h[1][2]) / w,
            )
        };
        let (u, v) = apply(1.0, -1.0);
        assert!((u - 138.0).abs() < 1e-9 && (v - 90.0).abs() < 1e-9);
    }

    #[test]
    fn blank_frame_has_no_markers() {
        let mut engine = AprilTagEngine::new();
        engine.configure(&DetectorConfig::default()).unwrap();
        engine.add_family(TagFamily::Tag36h11, 2).unwrap();
        let found = engine.detect(&GrayImage::filled(64, 48, 255).unwrap()).unwrap();
        assert!(found.is_empty());
    }
}
