//! Planar four-point pose solver.
//!
//! Initializes from the plane-to-image homography of the undistorted points, then refines
//! rotation and translation with damped Gauss–Newton on the pixel reprojection error.

use nalgebra::{Matrix3, Rotation3, SMatrix, SVector, Vector3};

use super::distortion::{project, undistort};
use super::{Pose, PnpSolver};
use crate::calibration::CameraCalibration;

const MAX_ITERATIONS: usize = 50;
const PLANARITY_TOLERANCE: f64 = 1e-6;
const STEP_TOLERANCE: f64 = 1e-12;
const JACOBIAN_STEP: f64 = 1e-7;

type Residuals = SVector<f64, 8>;
type Params = SVector<f64, 6>;

/// Homography initialisation followed by iterative refinement.
#[derive(Clone, Copy, Debug, Default)]
pub struct IterativePnp;

impl PnpSolver for IterativePnp {
    fn solve(
        &self,
        object_points: &[[f64; 3]; 4],
        image_points: &[[f64; 2]; 4],
        calibration: &CameraCalibration,
    ) -> Option<Pose> {
        let object: Vec<Vector3<f64>> = object_points
            .iter()
            .map(|p| Vector3::new(p[0], p[1], p[2]))
            .collect();
        let normalized: Vec<[f64; 2]> = image_points
            .iter()
            .map(|&px| undistort(calibration, px))
            .collect();

        let initial = initial_pose(&object, &normalized)?;
        let refined = refine(initial, &object, image_points, calibration)?;

        let rotation = Rotation3::new(Vector3::new(refined[0], refined[1], refined[2]));
        let translation = Vector3::new(refined[3], refined[4], refined[5]);
        if refined.iter().any(|v| !v.is_finite()) || (rotation * object[0] + translation).z <= 0.0 {
            return None;
        }

        Some(Pose {
            rotation: [refined[0], refined[1], refined[2]],
            translation: [refined[3], refined[4], refined[5]],
        })
    }
}

/// Pose from the homography between the object plane and the normalized image.
fn initial_pose(object: &[Vector3<f64>], normalized: &[[f64; 2]]) -> Option<Params> {
    let centroid = object.iter().fold(Vector3::zeros(), |acc, p| acc + p) / object.len() as f64;
    let mut centered = SMatrix::<f64, 3, 4>::zeros();
    for (i, p) in object.iter().enumerate() {
        centered.set_column(i, &(p - centroid));
    }

    let svd = centered.svd(true, false);
    let u = svd.u?;
    let sv = svd.singular_values;
    let (largest, smallest) = (sv.max(), sv.min());
    if largest <= f64::EPSILON || smallest > PLANARITY_TOLERANCE * largest {
        return None;
    }

    // Plane basis: the two dominant directions, normal last, right-handed.
    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| sv[b].total_cmp(&sv[a]));
    let e1: Vector3<f64> = u.column(order[0]).into_owned();
    let e2: Vector3<f64> = u.column(order[1]).into_owned();
    let basis = Matrix3::from_columns(&[e1, e2, e1.cross(&e2)]);

    // Solve for the homography with h33 = 1.
    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();
    for (i, (p, n)) in object.iter().zip(normalized).enumerate() {
        let q = basis.transpose() * (p - centroid);
        let (qx, qy) = (q.x, q.y);
        let (x, y) = (n[0], n[1]);
        let r = 2 * i;
        a.row_mut(r)
            .copy_from_slice(&[qx, qy, 1.0, 0.0, 0.0, 0.0, -x * qx, -x * qy]);
        a.row_mut(r + 1)
            .copy_from_slice(&[0.0, 0.0, 0.0, qx, qy, 1.0, -y * qx, -y * qy]);
        b[r] = x;
        b[r + 1] = y;
    }
    let h = a.lu().solve(&b)?;
    let hm = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0);

    let h1: Vector3<f64> = hm.column(0).into_owned();
    let h2: Vector3<f64> = hm.column(1).into_owned();
    let h3: Vector3<f64> = hm.column(2).into_owned();
    let mut scale = 2.0 / (h1.norm() + h2.norm());
    if h3.z * scale < 0.0 {
        scale = -scale;
    }
    let r1 = h1 * scale;
    let r2 = h2 * scale;
    let t_plane = h3 * scale;
    let approx = Matrix3::from_columns(&[r1, r2, r1.cross(&r2)]);

    let rsvd = approx.svd(true, true);
    let mut r_plane = rsvd.u? * rsvd.v_t?;
    if r_plane.determinant() < 0.0 {
        r_plane = -r_plane;
    }

    let rotation = r_plane * basis.transpose();
    let translation = t_plane - rotation * centroid;
    let rvec = Rotation3::from_matrix(&rotation).scaled_axis();

    Some(Params::new(
        rvec.x,
        rvec.y,
        rvec.z,
        translation.x,
        translation.y,
        translation.z,
    ))
}

fn residuals(
    params: &Params,
    object: &[Vector3<f64>],
    image_points: &[[f64; 2]; 4],
    calibration: &CameraCalibration,
) -> Option<Residuals> {
    let rotation = Rotation3::new(Vector3::new(params[0], params[1], params[2]));
    let translation = Vector3::new(params[3], params[4], params[5]);
    let mut out = Residuals::zeros();
    for (i, (p, observed)) in object.iter().zip(image_points).enumerate() {
        let projected = project(calibration, &(rotation * p + translation))?;
        out[2 * i] = projected[0] - observed[0];
        out[2 * i + 1] = projected[1] - observed[1];
    }
    Some(out)
}

fn refine(
    mut params: Params,
    object: &[Vector3<f64>],
    image_points: &[[f64; 2]; 4],
    calibration: &CameraCalibration,
) -> Option<Params> {
    let mut current = residuals(&params, object, image_points, calibration)?;
    let mut lambda = 1e-3;

    for _ in 0..MAX_ITERATIONS {
        let mut jacobian = SMatrix::<f64, 8, 6>::zeros();
        for j in 0..6 {
            let mut forward = params;
            let mut backward = params;
            forward[j] += JACOBIAN_STEP;
            backward[j] -= JACOBIAN_STEP;
            let rf = residuals(&forward, object, image_points, calibration)?;
            let rb = residuals(&backward, object, image_points, calibration)?;
            jacobian.set_column(j, &((rf - rb) / (2.0 * JACOBIAN_STEP)));
        }

        let jtj = jacobian.transpose() * jacobian;
        let jtr = jacobian.transpose() * current;

        let mut improved = false;
        while lambda < 1e9 {
            let mut damped = jtj;
            for d in 0..6 {
                damped[(d, d)] += lambda * jtj[(d, d)].max(1e-9);
            }
            let Some(step) = damped.lu().solve(&(-jtr)) else {
                lambda *= 10.0;
                continue;
            };
            let candidate = params + step;
            match residuals(&candidate, object, image_points, calibration) {
                Some(next) if next.norm_squared() < current.norm_squared() => {
                    params = candidate;
                    current = next;
                    lambda = (lambda * 0.1).max(1e-12);
                    improved = step.norm() > STEP_TOLERANCE;
                    break;
                }
                _ => lambda *= 10.0,
            }
        }
        if !improved {
            break;
        }
    }
    Some(params)
}
