use std::io;

use tag_vision::capture::{
    CameraHandle, CaptureBackend, CaptureError, CaptureStats, DeviceId, SyntheticBackend,
    SyntheticConfig, STEADY_STATE_SKIP_FRAMES, WARMUP_FRAMES,
};
use tag_vision::{ColorFrame, PixelFormat};

const SENTINEL: u8 = 0xA5;

fn open(config: SyntheticConfig) -> CameraHandle {
    CameraHandle::open_with(
        DeviceId::from("stub://camera0"),
        Box::new(SyntheticBackend::new(config)),
    )
    .expect("open synthetic camera")
}

/// A device fixed at 640x480 whose frame reads fail after the pipe breaks.
struct BrokenReadBackend;

impl CaptureBackend for BrokenReadBackend {
    fn name(&self) -> &'static str {
        "broken-read"
    }

    fn connect(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn frame_width(&self) -> u32 {
        640
    }

    fn frame_height(&self) -> u32 {
        480
    }

    fn set_frame_width(&mut self, _width: u32) -> io::Result<()> {
        Ok(())
    }

    fn set_frame_height(&mut self, _height: u32) -> io::Result<()> {
        Ok(())
    }

    fn grab(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn read(&mut self) -> io::Result<Option<ColorFrame>> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "stream stopped"))
    }
}

fn delta(after: CaptureStats, before: CaptureStats) -> CaptureStats {
    CaptureStats {
        frames_captured: after.frames_captured - before.frames_captured,
        frames_skipped: after.frames_skipped - before.frames_skipped,
        width_sets: after.width_sets - before.width_sets,
        height_sets: after.height_sets - before.height_sets,
    }
}

#[test]
fn unavailable_device_fails_to_open() {
    let result = CameraHandle::open_with(
        DeviceId::Index(7),
        Box::new(SyntheticBackend::new(SyntheticConfig {
            available: false,
            ..SyntheticConfig::default()
        })),
    );
    match result {
        Err(CaptureError::DeviceUnavailable { device, .. }) => assert_eq!(device, "#7"),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("open should fail for a missing device"),
    }
}

#[cfg(not(feature = "capture-v4l2"))]
#[test]
fn non_stub_device_needs_a_capture_backend() {
    let err = CameraHandle::open(DeviceId::from("/dev/video0"))
        .err()
        .expect("no backend for real devices");
    assert!(matches!(err, CaptureError::DeviceUnavailable { .. }));
}

#[test]
fn steady_state_capture_skips_five_frames_and_sets_nothing() {
    let mut handle = open(SyntheticConfig::default());
    let mut buf = vec![SENTINEL; 640 * 480];

    let before = handle.stats();
    handle.capture(640, 480, &mut buf).expect("capture");
    let d = delta(handle.stats(), before);

    assert_eq!(d.frames_skipped, u64::from(STEADY_STATE_SKIP_FRAMES));
    assert_eq!(d.width_sets, 0);
    assert_eq!(d.height_sets, 0);
    assert_eq!(d.frames_captured, 1);
    assert_eq!(handle.current_resolution(), (640, 480));
    assert!(buf.iter().any(|&b| b != SENTINEL));
}

#[test]
fn changing_resolution_sets_both_dimensions_then_warms_up() {
    let mut handle = open(SyntheticConfig::default());
    let mut buf = vec![0u8; 1280 * 720];

    let before = handle.stats();
    handle.capture(1280, 720, &mut buf).expect("capture");
    let d = delta(handle.stats(), before);

    assert_eq!(d.width_sets, 1);
    assert_eq!(d.height_sets, 1);
    assert_eq!(d.frames_skipped, u64::from(WARMUP_FRAMES));
    assert_eq!(handle.current_resolution(), (1280, 720));

    // Same mode again: no set requests, just the steady-state skip.
    let before = handle.stats();
    handle.capture(1280, 720, &mut buf).expect("second capture");
    let d = delta(handle.stats(), before);
    assert_eq!(d.width_sets, 0);
    assert_eq!(d.height_sets, 0);
    assert_eq!(d.frames_skipped, u64::from(STEADY_STATE_SKIP_FRAMES));
}

#[test]
fn linked_modes_skip_the_height_request() {
    let mut handle = open(SyntheticConfig {
        linked_modes: true,
        ..SyntheticConfig::default()
    });
    let mut buf = vec![0u8; 1920 * 1080];

    let before = handle.stats();
    handle.capture(1920, 1080, &mut buf).expect("capture");
    let d = delta(handle.stats(), before);
    assert_eq!(d.width_sets, 1);
    assert_eq!(d.height_sets, 0);
}

#[test]
fn captured_pixels_are_the_scene_intensity() {
    let mut handle = open(SyntheticConfig {
        format: PixelFormat::Rgb24,
        ..SyntheticConfig::default()
    });
    let image = handle.capture_image(640, 480).expect("capture");
    // The synthetic scene is a grey diagonal gradient, so neighbouring pixels differ by one.
    let a = image.get(10, 10);
    let b = image.get(11, 10);
    assert_eq!(b, a.wrapping_add(1));
    assert_eq!(image.get(10, 11), b);
}

#[test]
fn unsupported_resolution_is_refused_without_writing() {
    let mut handle = open(SyntheticConfig::default());
    let mut buf = vec![SENTINEL; 800 * 600];

    let err = handle.capture(800, 600, &mut buf).unwrap_err();
    match err {
        CaptureError::ResolutionUnsupported { requested, actual } => {
            assert_eq!(requested, (800, 600));
            assert_eq!(actual, (640, 480));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(buf.iter().all(|&b| b == SENTINEL));
    assert_eq!(handle.stats().frames_captured, 0);
}

#[test]
fn empty_frame_leaves_buffer_untouched() {
    let mut handle = open(SyntheticConfig {
        empty_frames: 1,
        ..SyntheticConfig::default()
    });
    let mut buf = vec![SENTINEL; 640 * 480];

    let err = handle.capture(640, 480, &mut buf).unwrap_err();
    assert!(matches!(err, CaptureError::FrameUnavailable));
    assert!(buf.iter().all(|&b| b == SENTINEL));

    // The device recovers on the next read.
    handle.capture(640, 480, &mut buf).expect("recovered capture");
}

#[test]
fn padded_rows_are_rejected_as_non_contiguous() {
    let mut handle = open(SyntheticConfig {
        row_padding: 6,
        ..SyntheticConfig::default()
    });
    let mut buf = vec![SENTINEL; 640 * 480];

    let err = handle.capture(640, 480, &mut buf).unwrap_err();
    match err {
        CaptureError::LayoutInvalid { width, stride } => {
            assert_eq!(width, 640);
            assert_eq!(stride, 642);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(buf.iter().all(|&b| b == SENTINEL));
}

#[test]
fn frame_of_wrong_size_is_a_geometry_mismatch() {
    let mut handle = open(SyntheticConfig {
        frame_size_override: Some((320, 240)),
        ..SyntheticConfig::default()
    });
    let mut buf = vec![SENTINEL; 640 * 480];

    let err = handle.capture(640, 480, &mut buf).unwrap_err();
    match err {
        CaptureError::GeometryMismatch { expected, actual } => {
            assert_eq!(expected, (640, 480));
            assert_eq!(actual, (320, 240));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(buf.iter().all(|&b| b == SENTINEL));
    assert_eq!(handle.current_resolution(), (0, 0));
}

#[test]
fn read_failure_surfaces_the_backend_error_without_writing() {
    let mut handle =
        CameraHandle::open_with(DeviceId::from("broken0"), Box::new(BrokenReadBackend))
            .expect("open broken-read camera");
    let mut buf = vec![SENTINEL; 640 * 480];

    let err = handle.capture(640, 480, &mut buf).unwrap_err();
    match err {
        CaptureError::Backend(io_err) => assert_eq!(io_err.kind(), io::ErrorKind::BrokenPipe),
        other => panic!("unexpected error: {other}"),
    }
    assert!(buf.iter().all(|&b| b == SENTINEL));
    assert_eq!(handle.stats().frames_captured, 0);
}
