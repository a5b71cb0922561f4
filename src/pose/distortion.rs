//! Pinhole projection with 5-coefficient Brown–Conrady distortion `(k1, k2, p1, p2, k3)`.

use nalgebra::Vector3;

use crate::calibration::CameraCalibration;

const UNDISTORT_ITERATIONS: usize = 20;

/// Apply lens distortion to a normalized image point.
fn distort(distortion: &[f64; 5], x: f64, y: f64) -> (f64, f64) {
    let [k1, k2, p1, p2, k3] = *distortion;
    let r2 = x * x + y * y;
    let radial = 1.0 + r2 * (k1 + r2 * (k2 + r2 * k3));
    let xd = x * radial + 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
    let yd = y * radial + p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;
    (xd, yd)
}

/// Project a camera-frame point to pixels. `None` when the point is not in front of the
/// camera.
pub(crate) fn project(calibration: &CameraCalibration, point: &Vector3<f64>) -> Option<[f64; 2]> {
    if point.z <= f64::EPSILON {
        return None;
    }
    let (xd, yd) = distort(&calibration.distortion, point.x / point.z, point.y / point.z);
    let k = &calibration.camera_matrix;
    Some([
        k[0][0] * xd + k[0][1] * yd + k[0][2],
        k[1][1] * yd + k[1][2],
    ])
}

/// Map a pixel to its undistorted normalized image coordinates.
///
/// Inverts the distortion model by fixed-point iteration.
pub(crate) fn undistort(calibration: &CameraCalibration, pixel: [f64; 2]) -> [f64; 2] {
    let k = &calibration.camera_matrix;
    let [k1, k2, p1, p2, k3] = calibration.distortion;

    let yd = (pixel[1] - k[1][2]) / k[1][1];
    let xd = (pixel[0] - k[0][2] - k[0][1] * yd) / k[0][0];

    let (mut x, mut y) = (xd, yd);
    for _ in 0..UNDISTORT_ITERATIONS {
        let r2 = x * x + y * y;
        let inv_radial = 1.0 / (1.0 + r2 * (k1 + r2 * (k2 + r2 * k3)));
        let dx = 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
        let dy = p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;
        x = (xd - dx) * inv_radial;
        y = (yd - dy) * inv_radial;
    }
    [x, y]
}
