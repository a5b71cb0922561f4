use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::calibration::{CameraCalibration, MarkerSizes};
use crate::capture::DeviceId;
use crate::detect::DetectorConfig;

const DEFAULT_DEVICE: &str = "stub://camera0";
const DEFAULT_WIDTH: u32 = 1280;
const DEFAULT_HEIGHT: u32 = 720;

#[derive(Debug, Deserialize, Default)]
struct VisionConfigFile {
    camera: Option<CameraConfigFile>,
    detector: Option<DetectorConfig>,
    calibration: Option<CalibrationConfigFile>,
    markers: Option<MarkersConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    device: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct CalibrationConfigFile {
    path: Option<PathBuf>,
    camera_matrix: Option<[[f64; 3]; 3]>,
    distortion: Option<[f64; 5]>,
}

#[derive(Debug, Deserialize, Default)]
struct MarkersConfigFile {
    default_size: Option<f64>,
    sizes: Option<HashMap<String, f64>>,
}

#[derive(Debug, Clone)]
pub struct VisionConfig {
    pub camera: CameraSettings,
    pub detector: DetectorConfig,
    pub calibration: Option<CameraCalibration>,
    pub markers: MarkerSizes,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CameraSettings {
    pub device: DeviceId,
    pub width: u32,
    pub height: u32,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            camera: CameraSettings {
                device: DeviceId::from(DEFAULT_DEVICE),
                width: DEFAULT_WIDTH,
                height: DEFAULT_HEIGHT,
            },
            detector: DetectorConfig::default(),
            calibration: None,
            markers: MarkerSizes::default(),
        }
    }
}

impl VisionConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("TAG_VISION_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: VisionConfigFile) -> Result<Self> {
        let defaults = Self::default();
        let camera = match file.camera {
            Some(camera) => CameraSettings {
                device: camera
                    .device
                    .map(|device| parse_device(&device))
                    .unwrap_or(defaults.camera.device),
                width: camera.width.unwrap_or(DEFAULT_WIDTH),
                height: camera.height.unwrap_or(DEFAULT_HEIGHT),
            },
            None => defaults.camera,
        };
        let calibration = match file.calibration {
            Some(calibration) => Some(calibration_from_file(calibration)?),
            None => None,
        };
        let markers = match file.markers {
            Some(markers) => {
                let mut sizes = HashMap::new();
                for (id, size) in markers.sizes.unwrap_or_default() {
                    let id: u32 = id
                        .trim()
                        .parse()
                        .map_err(|_| anyhow!("marker id {:?} is not an integer", id))?;
                    sizes.insert(id, size);
                }
                MarkerSizes {
                    default_size: markers
                        .default_size
                        .unwrap_or(defaults.markers.default_size),
                    sizes,
                }
            }
            None => defaults.markers,
        };
        Ok(Self {
            camera,
            detector: file.detector.unwrap_or_default(),
            calibration,
            markers,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(device) = std::env::var("TAG_VISION_DEVICE") {
            if !device.trim().is_empty() {
                self.camera.device = parse_device(&device);
            }
        }
        if let Ok(width) = std::env::var("TAG_VISION_WIDTH") {
            self.camera.width = width
                .trim()
                .parse()
                .map_err(|_| anyhow!("TAG_VISION_WIDTH must be an integer number of pixels"))?;
        }
        if let Ok(height) = std::env::var("TAG_VISION_HEIGHT") {
            self.camera.height = height
                .trim()
                .parse()
                .map_err(|_| anyhow!("TAG_VISION_HEIGHT must be an integer number of pixels"))?;
        }
        if let Ok(path) = std::env::var("TAG_VISION_CALIBRATION") {
            if !path.trim().is_empty() {
                self.calibration = Some(CameraCalibration::load(Path::new(path.trim()))?);
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!(
                "camera resolution must be non-zero, got {}x{}",
                self.camera.width,
                self.camera.height
            ));
        }
        self.detector.validate()?;
        if let Some(calibration) = &self.calibration {
            calibration.validate()?;
        }
        self.markers.validate()?;
        Ok(())
    }
}

fn parse_device(value: &str) -> DeviceId {
    match value.parse::<DeviceId>() {
        Ok(device) => device,
        Err(never) => match never {},
    }
}

fn calibration_from_file(file: CalibrationConfigFile) -> Result<CameraCalibration> {
    match (file.path, file.camera_matrix) {
        (Some(_), Some(_)) => Err(anyhow!(
            "calibration must be given either as a path or inline, not both"
        )),
        (Some(path), None) => CameraCalibration::load(&path),
        (None, Some(camera_matrix)) => Ok(CameraCalibration {
            camera_matrix,
            distortion: file.distortion.unwrap_or_default(),
        }),
        (None, None) => Err(anyhow!("calibration section needs a path or a camera_matrix")),
    }
}

fn read_config_file(path: &Path) -> Result<VisionConfigFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
