//! Least-squares affine estimation from ground-projected correspondences.

use crate::image::ImageHandle;
use crate::project::{GroundProjector, ImageId};
use crate::trace::{trace_event, trace_span, trace_warn};
use crate::transform::Affine2;
use crate::util::{RegError, RegResult};
use nalgebra::{DMatrix, DVector, Matrix3, Vector3};

/// Minimum number of correspondences an affine fit accepts.
pub const MIN_AFFINE_CORRESPONDENCES: usize = 3;

fn normalization(points: &[(f64, f64)]) -> Matrix3<f64> {
    let n = points.len() as f64;
    let (cx, cy) = points
        .iter()
        .fold((0.0, 0.0), |acc, p| (acc.0 + p.0 / n, acc.1 + p.1 / n));
    let mean_dist = points
        .iter()
        .map(|p| (p.0 - cx).hypot(p.1 - cy))
        .sum::<f64>()
        / n;
    let s = if mean_dist > 1e-12 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };
    Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0)
}

/// Fits the affine map sending `src[i]` to `dst[i]` in the least-squares sense.
///
/// Points are Hartley-normalized before the SVD solve.
pub fn fit_affine(src: &[(f64, f64)], dst: &[(f64, f64)]) -> RegResult<Affine2> {
    if src.len() != dst.len() {
        return Err(RegError::InvalidInput("correspondence lists differ in length"));
    }
    if src.len() < MIN_AFFINE_CORRESPONDENCES {
        return Err(RegError::InsufficientCorrespondences {
            found: src.len(),
            required: MIN_AFFINE_CORRESPONDENCES,
        });
    }

    let ts = normalization(src);
    let td = normalization(dst);
    let n = src.len();
    let mut design = DMatrix::<f64>::zeros(n, 3);
    let mut bx = DVector::<f64>::zeros(n);
    let mut by = DVector::<f64>::zeros(n);
    for (i, (s, d)) in src.iter().zip(dst).enumerate() {
        let sn = ts * Vector3::new(s.0, s.1, 1.0);
        let dn = td * Vector3::new(d.0, d.1, 1.0);
        design[(i, 0)] = sn[0];
        design[(i, 1)] = sn[1];
        design[(i, 2)] = 1.0;
        bx[i] = dn[0];
        by[i] = dn[1];
    }

    let svd = design.svd(true, true);
    if svd.rank(1e-9) < 3 {
        return Err(RegError::DegenerateGeometry {
            reason: "correspondences are collinear",
        });
    }
    let px = svd
        .solve(&bx, 1e-12)
        .map_err(|_| RegError::DegenerateGeometry {
            reason: "affine least-squares solve failed",
        })?;
    let py = svd
        .solve(&by, 1e-12)
        .map_err(|_| RegError::DegenerateGeometry {
            reason: "affine least-squares solve failed",
        })?;

    let normalized = Matrix3::new(px[0], px[1], px[2], py[0], py[1], py[2], 0.0, 0.0, 1.0);
    let td_inv = td.try_inverse().ok_or(RegError::DegenerateGeometry {
        reason: "normalization is singular",
    })?;
    let m = td_inv * normalized * ts;
    Ok(Affine2::new(
        m[(0, 0)],
        m[(0, 1)],
        m[(0, 2)],
        m[(1, 0)],
        m[(1, 1)],
        m[(1, 2)],
    ))
}

/// Estimates the reference-to-moving pixel affine around `center`.
///
/// The window `center ± (half_x, half_y)` must lie inside the reference raster.
/// Its four corners and center are projected reference -> ground -> moving;
/// points that fail to project are dropped and at least
/// [`MIN_AFFINE_CORRESPONDENCES`] must survive.
pub fn estimate_affine_transformation(
    projector: &dyn GroundProjector,
    reference: ImageHandle<'_>,
    moving: ImageId,
    center: (f64, f64),
    half_x: usize,
    half_y: usize,
) -> RegResult<Affine2> {
    let _span = trace_span!("estimate_affine", reference = reference.id.0, moving = moving.0).entered();
    let (cx, cy) = center;
    let start_x = (cx - half_x as f64).trunc();
    let start_y = (cy - half_y as f64).trunc();
    let stop_x = (cx + half_x as f64).trunc();
    let stop_y = (cy + half_y as f64).trunc();
    let max_x = reference.raster.width() as f64 - 1.0;
    let max_y = reference.raster.height() as f64 - 1.0;
    if !(start_x >= 0.0 && start_y >= 0.0 && stop_x <= max_x && stop_y <= max_y) {
        return Err(RegError::WindowOutOfBounds {
            x: cx,
            y: cy,
            img_width: reference.raster.width(),
            img_height: reference.raster.height(),
        });
    }

    let probes = [
        (start_x, start_y),
        (start_x, stop_y),
        (stop_x, stop_y),
        (stop_x, start_y),
        (cx, cy),
    ];
    let mut src = Vec::with_capacity(probes.len());
    let mut dst = Vec::with_capacity(probes.len());
    for (x, y) in probes {
        match projector.image_to_image(reference.id, moving, x, y) {
            Ok(projected) => {
                src.push((x, y));
                dst.push(projected);
            }
            Err(err) => {
                let reason = err.to_string();
                trace_warn!("affine_probe_dropped", x = x, y = y, reason = reason.as_str());
            }
        }
    }
    trace_event!("affine_probes", kept = src.len());
    if src.len() < MIN_AFFINE_CORRESPONDENCES {
        return Err(RegError::InsufficientCorrespondences {
            found: src.len(),
            required: MIN_AFFINE_CORRESPONDENCES,
        });
    }
    fit_affine(&src, &dst)
}

#[cfg(test)]
mod tests {
    use super::fit_affine;
    use crate::transform::Affine2;

    #[test]
    fn exact_correspondences_recover_the_map() {
        let truth = Affine2::new(0.98, 0.05, 12.5, -0.04, 1.02, -7.25);
        let src = [(10.0, 10.0), (10.0, 130.0), (130.0, 130.0), (130.0, 10.0), (70.0, 70.0)];
        let dst: Vec<_> = src.iter().map(|p| truth.apply(p.0, p.1)).collect();
        let fitted = fit_affine(&src, &dst).unwrap();
        for (a, b) in fitted.coefficients().iter().zip(truth.coefficients()) {
            assert!((a - b).abs() < 1e-8, "{a} vs {b}");
        }
    }

    #[test]
    fn collinear_points_are_degenerate() {
        let src = [(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)];
        let dst = [(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)];
        assert!(fit_affine(&src, &dst).is_err());
    }
}
