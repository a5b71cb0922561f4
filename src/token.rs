//! Marker observations enriched with camera-relative location.

use serde::Serialize;

use crate::calibration::{CameraCalibration, MarkerSizes};
use crate::coordinates::{
    cartesian_to_legacy_polar, cartesian_to_spherical, Cartesian, LegacyPolar, Orientation,
    PixelCoordinate, Spherical,
};
use crate::detect::Detection;
use crate::pose::{marker_object_points, solve_pose};

/// Where a token sits relative to the camera.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct TokenLocation {
    pub cartesian: Cartesian,
    pub spherical: Spherical,
    pub legacy_polar: LegacyPolar,
    pub orientation: Orientation,
}

impl TokenLocation {
    pub fn from_transforms(rotation: [f64; 3], translation: [f64; 3]) -> Self {
        let cartesian = Cartesian::from(translation);
        Self {
            cartesian,
            spherical: cartesian_to_spherical(cartesian),
            legacy_polar: cartesian_to_legacy_polar(cartesian),
            orientation: Orientation::from(rotation),
        }
    }
}

/// One detected marker.
#[derive(Clone, Debug, Serialize)]
pub struct Token {
    pub id: u32,
    pub certainty: f32,
    pub pixel_corners: [PixelCoordinate; 4],
    pub pixel_centre: PixelCoordinate,
    /// Present only when a calibration was available and the pose solve succeeded.
    pub location: Option<TokenLocation>,
}

impl Token {
    pub fn from_detection(
        detection: &Detection,
        calibration: Option<&CameraCalibration>,
        marker_sizes: &MarkerSizes,
    ) -> Self {
        let corners = detection.corners;
        let n = corners.len() as f64;
        let pixel_centre = PixelCoordinate::new(
            corners.iter().map(|c| c.x).sum::<f64>() / n,
            corners.iter().map(|c| c.y).sum::<f64>() / n,
        );

        let location = calibration.and_then(|calibration| {
            let object = marker_object_points(marker_sizes.size_of(detection.id));
            let image = corners.map(|c| [c.x, c.y]);
            match solve_pose(&object, &image, calibration) {
                Ok(pose) => Some(TokenLocation::from_transforms(pose.rotation, pose.translation)),
                Err(err) => {
                    log::warn!("no location for marker {}: {}", detection.id, err);
                    None
                }
            }
        });

        Self {
            id: detection.id,
            certainty: detection.goodness,
            pixel_corners: corners,
            pixel_centre,
            location,
        }
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Token {}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Token: {}, certainty: {}", self.id, self.certainty)
    }
}
