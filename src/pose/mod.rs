//! Pose solver adapter.
//!
//! Fixed-size four-point pose: 4 object points, 4 image points, a 3x3 camera matrix and 5
//! distortion coefficients in, a rotation vector and translation out.
//!
//! Solvers work in image convention, where y grows downward. `solve_pose` negates the
//! translation's y component so that up is positive for callers. The flip is applied
//! unconditionally; solvers must not apply it themselves.

mod distortion;
mod iterative;

use serde::Serialize;
use thiserror::Error;

pub use iterative::IterativePnp;

use crate::calibration::CameraCalibration;

/// Object-space corners, one per marker corner.
pub type ObjectPoints = [[f64; 3]; 4];

/// Image-space corners in pixels, same order as the object points.
pub type ImagePoints = [[f64; 2]; 4];

/// Rodrigues rotation vector plus translation, in the units of the object points.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Pose {
    pub rotation: [f64; 3],
    pub translation: [f64; 3],
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoseError {
    #[error("pose inputs contain non-finite values")]
    InvalidInput,
    #[error("pose solver failed")]
    SolverFailed,
}

/// Raw four-point pose solver.
///
/// Returns the pose in the solver's own image convention, or `None` on failure.
pub trait PnpSolver {
    fn solve(
        &self,
        object_points: &ObjectPoints,
        image_points: &ImagePoints,
        calibration: &CameraCalibration,
    ) -> Option<Pose>;
}

/// Solve with the default iterative solver.
pub fn solve_pose(
    object_points: &ObjectPoints,
    image_points: &ImagePoints,
    calibration: &CameraCalibration,
) -> Result<Pose, PoseError> {
    solve_pose_with(&IterativePnp, object_points, image_points, calibration)
}

/// Solve with an explicit solver and convert the result to the y-up convention.
pub fn solve_pose_with<S: PnpSolver + ?Sized>(
    solver: &S,
    object_points: &ObjectPoints,
    image_points: &ImagePoints,
    calibration: &CameraCalibration,
) -> Result<Pose, PoseError> {
    let finite = object_points.iter().flatten().all(|v| v.is_finite())
        && image_points.iter().flatten().all(|v| v.is_finite())
        && calibration.is_finite();
    if !finite {
        return Err(PoseError::InvalidInput);
    }

    let mut pose = solver
        .solve(object_points, image_points, calibration)
        .ok_or(PoseError::SolverFailed)?;
    pose.translation[1] = -pose.translation[1];
    Ok(pose)
}

/// Corners of a square marker with edge length `size`, centred on the origin in the z = 0
/// plane.
///
/// Ordered like detector corners: (-1, 1), (1, 1), (1, -1), (-1, -1) in tag units, which
/// wraps counter-clockwise in the image.
pub fn marker_object_points(size: f64) -> ObjectPoints {
    let h = size / 2.0;
    [[-h, h, 0.0], [h, h, 0.0], [h, -h, 0.0], [-h, -h, 0.0]]
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSolver(Option<Pose>);

    impl PnpSolver for FixedSolver {
        fn solve(&self, _: &ObjectPoints, _: &ImagePoints, _: &CameraCalibration) -> Option<Pose> {
            self.0
        }
    }

    fn calibration() -> CameraCalibration {
        CameraCalibration {
            camera_matrix: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            distortion: [0.0; 5],
        }
    }

    #[test]
    fn adapter_negates_vertical_translation_only() {
        let raw = Pose {
            rotation: [0.1, 0.2, 0.3],
            translation: [1.0, 2.0, 3.0],
        };
        let pose = solve_pose_with(
            &FixedSolver(Some(raw)),
            &marker_object_points(1.0),
            &[[0.0; 2]; 4],
            &calibration(),
        )
        .unwrap();
        assert_eq!(pose.rotation, raw.rotation);
        assert_eq!(pose.translation, [1.0, -2.0, 3.0]);
    }

    #[test]
    fn solver_failure_propagates() {
        let err = solve_pose_with(
            &FixedSolver(None),
            &marker_object_points(1.0),
            &[[0.0; 2]; 4],
            &calibration(),
        )
        .unwrap_err();
        assert_eq!(err, PoseError::SolverFailed);
    }

    #[test]
    fn non_finite_inputs_are_rejected() {
        let mut image = [[0.0; 2]; 4];
        image[2][1] = f64::NAN;
        let err = solve_pose(&marker_object_points(1.0), &image, &calibration()).unwrap_err();
        assert_eq!(err, PoseError::InvalidInput);
    }

    #[test]
    fn marker_corners_span_the_edge_length() {
        let pts = marker_object_points(0.25);
        assert_eq!(pts[0], [-0.125, 0.125, 0.0]);
        assert_eq!(pts[2], [0.125, -0.125, 0.0]);
    }
}
