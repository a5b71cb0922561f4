use serde::Serialize;

use crate::coordinates::PixelCoordinate;

/// Marker families a detection engine can be asked to decode.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum TagFamily {
    #[default]
    Tag36h11,
    Tag25h9,
    Tag16h5,
}

impl TagFamily {
    pub fn name(self) -> &'static str {
        match self {
            TagFamily::Tag36h11 => "tag36h11",
            TagFamily::Tag25h9 => "tag25h9",
            TagFamily::Tag16h5 => "tag16h5",
        }
    }
}

/// One decoded marker.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Detection {
    pub family: TagFamily,
    pub id: u32,
    /// Number of bit errors corrected while decoding (0..=2).
    pub hamming: u8,
    pub decision_margin: f32,
    /// Only meaningful when pose refinement is enabled; zero otherwise.
    pub goodness: f32,
    /// Tag-to-image homography, row-major.
    pub homography: [[f64; 3]; 3],
    pub center: PixelCoordinate,
    /// Image corners, wrapping counter-clockwise around the tag.
    pub corners: [PixelCoordinate; 4],
}
