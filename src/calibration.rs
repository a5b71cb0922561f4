//! Camera calibration and marker geometry tables.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

/// Pinhole intrinsics plus `(k1, k2, p1, p2, k3)` distortion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraCalibration {
    /// Row-major `[[fx, skew, cx], [0, fy, cy], [0, 0, 1]]`.
    pub camera_matrix: [[f64; 3]; 3],
    #[serde(default)]
    pub distortion: [f64; 5],
}

impl CameraCalibration {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read calibration file {}", path.display()))?;
        let calibration: Self = toml::from_str(&raw)
            .with_context(|| format!("invalid calibration file {}", path.display()))?;
        calibration.validate()?;
        Ok(calibration)
    }

    pub fn is_finite(&self) -> bool {
        self.camera_matrix.iter().flatten().all(|v| v.is_finite())
            && self.distortion.iter().all(|v| v.is_finite())
    }

    pub fn validate(&self) -> Result<()> {
        if !self.is_finite() {
            return Err(anyhow!("calibration contains non-finite values"));
        }
        let k = &self.camera_matrix;
        if k[0][0] <= 0.0 || k[1][1] <= 0.0 {
            return Err(anyhow!(
                "calibration focal lengths must be positive (fx {}, fy {})",
                k[0][0],
                k[1][1]
            ));
        }
        if k[1][0] != 0.0 || k[2] != [0.0, 0.0, 1.0] {
            return Err(anyhow!("camera matrix must be upper triangular with k33 = 1"));
        }
        Ok(())
    }
}

/// Edge length of markers, per marker id, with a fallback for unlisted ids.
#[derive(Clone, Debug, PartialEq)]
pub struct MarkerSizes {
    pub default_size: f64,
    pub sizes: HashMap<u32, f64>,
}

impl Default for MarkerSizes {
    fn default() -> Self {
        Self {
            default_size: 0.25,
            sizes: HashMap::new(),
        }
    }
}

impl MarkerSizes {
    pub fn size_of(&self, id: u32) -> f64 {
        self.sizes.get(&id).copied().unwrap_or(self.default_size)
    }

    pub fn validate(&self) -> Result<()> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.default_size) {
            return Err(anyhow!("default marker size must be positive"));
        }
        if let Some((id, size)) = self.sizes.iter().find(|(_, size)| !positive(**size)) {
            return Err(anyhow!("marker {} has invalid size {}", id, size));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_calibration_from_toml() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(
            file,
            "camera_matrix = [[1000.0, 0.0, 640.0], [0.0, 1000.0, 360.0], [0.0, 0.0, 1.0]]\n\
             distortion = [-0.1, 0.02, 0.0, 0.0, 0.0]"
        )?;
        let cal = CameraCalibration::load(file.path())?;
        assert_eq!(cal.camera_matrix[0][2], 640.0);
        assert_eq!(cal.distortion[0], -0.1);
        Ok(())
    }

    #[test]
    fn rejects_non_positive_focal_length() {
        let cal = CameraCalibration {
            camera_matrix: [[0.0, 0.0, 1.0], [0.0, 1.0, 1.0], [0.0, 0.0, 1.0]],
            distortion: [0.0; 5],
        };
        assert!(cal.validate().is_err());
    }

    #[test]
    fn marker_sizes_fall_back_to_default() {
        let mut sizes = MarkerSizes::default();
        sizes.sizes.insert(7, 0.1);
        assert_eq!(sizes.size_of(7), 0.1);
        assert_eq!(sizes.size_of(8), 0.25);
        sizes.sizes.insert(9, -1.0);
        assert!(sizes.validate().is_err());
    }
}
