//! vision_debug - capture frames, binarize them and print located markers

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;

#[cfg(feature = "detect-apriltag")]
use tag_vision::detect::AprilTagEngine;
#[cfg(not(feature = "detect-apriltag"))]
use tag_vision::detect::ScriptedEngine;
use tag_vision::{
    Camera, DetectionEngine, DeviceCamera, DeviceId, GrayImage, Token, Vision, VisionConfig,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Capture device index or path (overrides config; `stub://...` selects the synthetic camera).
    #[arg(long, conflicts_with = "input")]
    device: Option<String>,
    /// Read a still image instead of a camera (requires the `image-io` feature).
    #[arg(long)]
    input: Option<PathBuf>,
    /// Capture width in pixels (overrides config).
    #[arg(long)]
    width: Option<u32>,
    /// Capture height in pixels (overrides config).
    #[arg(long)]
    height: Option<u32>,
    /// Write the thresholded image instead of the captured one.
    #[arg(long)]
    after_thresholding: bool,
    /// Save the last frame to this path (requires the `image-io` feature).
    #[arg(long)]
    output: Option<PathBuf>,
    /// Print tokens as JSON lines.
    #[arg(long)]
    json: bool,
    /// Number of frames to process.
    #[arg(long, default_value_t = 1)]
    frames: u32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if args.frames == 0 {
        return Err(anyhow!("frames must be >= 1"));
    }

    let mut cfg = VisionConfig::load().context("load configuration")?;
    if let Some(device) = args.device.as_deref() {
        cfg.camera.device = device
            .parse::<DeviceId>()
            .unwrap_or_else(|never| match never {});
    }
    if let Some(width) = args.width {
        cfg.camera.width = width;
    }
    if let Some(height) = args.height {
        cfg.camera.height = height;
    }

    match args.input.as_deref() {
        Some(path) => run(open_still(path, &cfg)?, &cfg, &args),
        None => {
            log::info!(
                "capturing {}x{} from {}",
                cfg.camera.width,
                cfg.camera.height,
                cfg.camera.device
            );
            let camera = DeviceCamera::new(
                cfg.camera.device.clone(),
                (cfg.camera.width, cfg.camera.height),
                cfg.calibration.clone(),
            );
            run(camera, &cfg, &args)
        }
    }
}

#[cfg(feature = "image-io")]
fn open_still(path: &std::path::Path, cfg: &VisionConfig) -> Result<tag_vision::StillCamera> {
    tag_vision::StillCamera::from_file(path, cfg.calibration.clone())
}

#[cfg(not(feature = "image-io"))]
fn open_still(path: &std::path::Path, _cfg: &VisionConfig) -> Result<tag_vision::StillCamera> {
    Err(anyhow!(
        "cannot read {}: built without the image-io feature",
        path.display()
    ))
}

#[cfg(feature = "detect-apriltag")]
fn detection_engine() -> Box<dyn DetectionEngine> {
    Box::new(AprilTagEngine::new())
}

#[cfg(not(feature = "detect-apriltag"))]
fn detection_engine() -> Box<dyn DetectionEngine> {
    log::warn!("using the scripted detection engine; no markers will be reported");
    Box::new(ScriptedEngine::default())
}

fn run<C: Camera>(camera: C, cfg: &VisionConfig, args: &Args) -> Result<()> {
    let mut vision = Vision::new(camera, detection_engine())
        .with_detector_config(cfg.detector)
        .with_marker_sizes(cfg.markers.clone());

    let mut last = None;
    for frame in 0..args.frames {
        let image = vision.capture_image()?;
        let tokens = vision.process_image(&image)?;
        log::info!("frame {}: {} token(s)", frame, tokens.len());
        for token in &tokens {
            print_token(token, args.json)?;
        }
        last = Some(image);
    }

    if let (Some(path), Some(image)) = (args.output.as_deref(), last) {
        let image = if args.after_thresholding {
            vision.threshold_image(&image)
        } else {
            image
        };
        save_image(path, &image)?;
        log::info!("wrote {}", path.display());
    }
    Ok(())
}

fn print_token(token: &Token, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(token)?);
        return Ok(());
    }
    println!("{}", token);
    println!(
        "  centre: ({:.1}, {:.1})",
        token.pixel_centre.x, token.pixel_centre.y
    );
    match &token.location {
        Some(location) => {
            let c = location.cartesian;
            let s = location.spherical;
            println!("  cartesian: x {:.3} y {:.3} z {:.3}", c.x, c.y, c.z);
            println!(
                "  spherical: rot_x {:.3} rot_y {:.3} dist {:.3}",
                s.rot_x, s.rot_y, s.dist
            );
        }
        None => println!("  location: unknown (no calibration or pose failed)"),
    }
    Ok(())
}

#[cfg(feature = "image-io")]
fn save_image(path: &std::path::Path, image: &GrayImage) -> Result<()> {
    let buffer = image::GrayImage::from_raw(image.width, image.height, image.data.clone())
        .ok_or_else(|| anyhow!("image buffer does not match its dimensions"))?;
    buffer
        .save(path)
        .with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(not(feature = "image-io"))]
fn save_image(path: &std::path::Path, _image: &GrayImage) -> Result<()> {
    Err(anyhow!(
        "cannot write {}: built without the image-io feature",
        path.display()
    ))
}
