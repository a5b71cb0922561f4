//! Coordinate types and conversions between camera-relative frames.

use serde::{Deserialize, Serialize};

/// Point in image space, pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PixelCoordinate {
    pub x: f64,
    pub y: f64,
}

impl PixelCoordinate {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Camera-relative cartesian position: x right, y up, z forward.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Cartesian {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Cartesian {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

impl From<[f64; 3]> for Cartesian {
    fn from(v: [f64; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

/// Rodrigues rotation vector of a marker relative to the camera, radians.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Orientation {
    pub rot_x: f64,
    pub rot_y: f64,
    pub rot_z: f64,
}

impl From<[f64; 3]> for Orientation {
    fn from(v: [f64; 3]) -> Self {
        Self {
            rot_x: v[0],
            rot_y: v[1],
            rot_z: v[2],
        }
    }
}

/// Rotation about the x axis, rotation about the y axis, and distance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Spherical {
    pub rot_x: f64,
    pub rot_y: f64,
    pub dist: f64,
}

/// Kept for compatibility with older consumers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyPolar {
    pub polar_x: f64,
    pub polar_y: f64,
    pub dist: f64,
}

pub fn cartesian_to_spherical(c: Cartesian) -> Spherical {
    Spherical {
        rot_x: c.y.atan2(c.z),
        rot_y: c.x.atan2(c.z),
        dist: c.norm(),
    }
}

pub fn cartesian_to_legacy_polar(c: Cartesian) -> LegacyPolar {
    LegacyPolar {
        polar_x: c.z.atan2(c.x),
        polar_y: c.z.atan2(c.y),
        dist: c.norm(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_4;

    #[test]
    fn straight_ahead_has_no_rotation() {
        let s = cartesian_to_spherical(Cartesian::new(0.0, 0.0, 2.0));
        assert_eq!(s.rot_x, 0.0);
        assert_eq!(s.rot_y, 0.0);
        assert_eq!(s.dist, 2.0);
    }

    #[test]
    fn up_and_right_rotate_positive() {
        let s = cartesian_to_spherical(Cartesian::new(1.0, 1.0, 1.0));
        assert!((s.rot_x - FRAC_PI_4).abs() < 1e-12);
        assert!((s.rot_y - FRAC_PI_4).abs() < 1e-12);
        assert!((s.dist - 3f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn legacy_polar_measures_from_the_axes() {
        let p = cartesian_to_legacy_polar(Cartesian::new(1.0, 0.0, 1.0));
        assert!((p.polar_x - FRAC_PI_4).abs() < 1e-12);
        assert!((p.polar_y - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }
}
