use approx::assert_abs_diff_eq;
use nalgebra::{Rotation3, Vector3};

use tag_vision::pose::{
    marker_object_points, solve_pose, solve_pose_with, ImagePoints, IterativePnp, ObjectPoints,
    PnpSolver, PoseError,
};
use tag_vision::CameraCalibration;

fn calibration(distortion: [f64; 5]) -> CameraCalibration {
    CameraCalibration {
        camera_matrix: [[800.0, 0.0, 320.0], [0.0, 800.0, 240.0], [0.0, 0.0, 1.0]],
        distortion,
    }
}

fn project(
    cal: &CameraCalibration,
    object: &ObjectPoints,
    rvec: [f64; 3],
    tvec: [f64; 3],
) -> ImagePoints {
    let rotation = Rotation3::new(Vector3::from(rvec));
    let translation = Vector3::from(tvec);
    let [k1, k2, p1, p2, k3] = cal.distortion;
    let k = cal.camera_matrix;
    object.map(|p| {
        let c = rotation * Vector3::from(p) + translation;
        let (x, y) = (c.x / c.z, c.y / c.z);
        let r2 = x * x + y * y;
        let radial = 1.0 + k1 * r2 + k2 * r2 * r2 + k3 * r2 * r2 * r2;
        let xd = x * radial + 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
        let yd = y * radial + p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;
        [k[0][0] * xd + k[0][2], k[1][1] * yd + k[1][2]]
    })
}

fn assert_vec_eq(actual: [f64; 3], expected: [f64; 3], epsilon: f64) {
    for i in 0..3 {
        assert_abs_diff_eq!(actual[i], expected[i], epsilon = epsilon);
    }
}

#[test]
fn fronto_parallel_marker_on_the_optical_axis() {
    let cal = calibration([0.0; 5]);
    let object = marker_object_points(1.0);
    let image = project(&cal, &object, [0.0; 3], [0.0, 0.0, 5.0]);

    let raw = IterativePnp.solve(&object, &image, &cal).expect("raw solve");
    assert_vec_eq(raw.translation, [0.0, 0.0, 5.0], 1e-6);
    assert_vec_eq(raw.rotation, [0.0, 0.0, 0.0], 1e-6);

    let pose = solve_pose(&object, &image, &cal).expect("adapter solve");
    assert_vec_eq(pose.translation, [0.0, 0.0, 5.0], 1e-6);
}

#[test]
fn adapter_reports_up_as_positive() {
    let cal = calibration([0.0; 5]);
    let object = marker_object_points(1.0);
    let image = project(&cal, &object, [0.0; 3], [0.2, 0.3, 5.0]);

    let raw = IterativePnp.solve(&object, &image, &cal).expect("raw solve");
    assert_vec_eq(raw.translation, [0.2, 0.3, 5.0], 1e-6);

    let pose = solve_pose(&object, &image, &cal).expect("adapter solve");
    assert_vec_eq(pose.translation, [0.2, -0.3, 5.0], 1e-6);
    assert_vec_eq(pose.rotation, raw.rotation, 1e-12);
}

#[test]
fn recovers_a_tilted_marker() {
    let cal = calibration([0.0; 5]);
    let object = marker_object_points(0.25);
    let rvec = [0.3, -0.2, 0.1];
    let tvec = [0.1, -0.05, 1.5];
    let image = project(&cal, &object, rvec, tvec);

    let raw = IterativePnp.solve(&object, &image, &cal).expect("raw solve");
    assert_vec_eq(raw.rotation, rvec, 1e-6);
    assert_vec_eq(raw.translation, tvec, 1e-6);
}

#[test]
fn accounts_for_lens_distortion() {
    let cal = calibration([-0.2, 0.05, 0.001, -0.0005, 0.0]);
    let object = marker_object_points(0.25);
    let rvec = [0.1, 0.15, -0.05];
    let tvec = [0.3, 0.2, 2.0];
    let image = project(&cal, &object, rvec, tvec);

    let pose = solve_pose(&object, &image, &cal).expect("solve");
    assert_vec_eq(pose.rotation, rvec, 1e-6);
    assert_vec_eq(pose.translation, [0.3, -0.2, 2.0], 1e-6);
}

#[test]
fn non_coplanar_points_are_rejected() {
    let cal = calibration([0.0; 5]);
    let object: ObjectPoints = [
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 0.0, 1.0],
    ];
    let image: ImagePoints = [[320.0, 240.0], [480.0, 240.0], [320.0, 400.0], [330.0, 250.0]];

    let err = solve_pose_with(&IterativePnp, &object, &image, &cal).unwrap_err();
    assert_eq!(err, PoseError::SolverFailed);
}

#[test]
fn infinite_calibration_is_invalid_input() {
    let mut cal = calibration([0.0; 5]);
    cal.distortion[0] = f64::INFINITY;
    let object = marker_object_points(1.0);
    let image = project(&calibration([0.0; 5]), &object, [0.0; 3], [0.0, 0.0, 5.0]);

    assert_eq!(
        solve_pose(&object, &image, &cal).unwrap_err(),
        PoseError::InvalidInput
    );
}
