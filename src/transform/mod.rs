//! Planar transforms between image pixel frames.
//!
//! `Affine2` is a 2-D affine map stored as a homogeneous 3x3 matrix; it is the
//! reference-to-moving transform used by the geometric orchestrator.
//! `Similarity` is the rotation/scale pair recovered by the log-polar estimator.

use nalgebra::{Matrix3, Vector3};

pub mod affine;
pub mod logpolar;

pub use affine::{estimate_affine_transformation, fit_affine, MIN_AFFINE_CORRESPONDENCES};
pub use logpolar::{estimate_logpolar_transform, LogPolarConfig};

/// Affine map `(x, y) -> (a x + b y + c, d x + e y + f)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Affine2 {
    m: Matrix3<f64>,
}

impl Default for Affine2 {
    fn default() -> Self {
        Self::identity()
    }
}

impl Affine2 {
    /// Builds the map from its six coefficients.
    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self {
            m: Matrix3::new(a, b, c, d, e, f, 0.0, 0.0, 1.0),
        }
    }

    /// Builds the map from a row-major `[a, b, c, d, e, f]` array.
    pub fn from_coefficients(c: [f64; 6]) -> Self {
        Self::new(c[0], c[1], c[2], c[3], c[4], c[5])
    }

    /// Identity map.
    pub fn identity() -> Self {
        Self {
            m: Matrix3::identity(),
        }
    }

    /// Pure translation.
    pub fn translation(tx: f64, ty: f64) -> Self {
        Self::new(1.0, 0.0, tx, 0.0, 1.0, ty)
    }

    /// Linear part `[[a, b], [d, e]]` with translation `(c, f)`.
    pub fn from_linear(linear: [[f64; 2]; 2], translation: (f64, f64)) -> Self {
        Self::new(
            linear[0][0],
            linear[0][1],
            translation.0,
            linear[1][0],
            linear[1][1],
            translation.1,
        )
    }

    /// Returns the homogeneous matrix.
    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.m
    }

    /// Returns `[a, b, c, d, e, f]`.
    pub fn coefficients(&self) -> [f64; 6] {
        [
            self.m[(0, 0)],
            self.m[(0, 1)],
            self.m[(0, 2)],
            self.m[(1, 0)],
            self.m[(1, 1)],
            self.m[(1, 2)],
        ]
    }

    /// Returns the linear part `[[a, b], [d, e]]`.
    pub fn linear(&self) -> [[f64; 2]; 2] {
        [
            [self.m[(0, 0)], self.m[(0, 1)]],
            [self.m[(1, 0)], self.m[(1, 1)]],
        ]
    }

    /// Maps a point.
    #[inline]
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let v = self.m * Vector3::new(x, y, 1.0);
        (v[0], v[1])
    }

    /// Returns the inverse map, or `None` when the linear part is singular.
    pub fn inverse(&self) -> Option<Self> {
        let det = self.m[(0, 0)] * self.m[(1, 1)] - self.m[(0, 1)] * self.m[(1, 0)];
        if det.abs() < 1e-12 {
            return None;
        }
        self.m.try_inverse().map(|m| Self { m })
    }

    /// Returns `next ∘ self`: apply `self` first, then `next`.
    pub fn then(&self, next: &Affine2) -> Affine2 {
        Affine2 { m: next.m * self.m }
    }

    /// Scale factor of the linear part (square root of the absolute determinant).
    pub fn scale(&self) -> f64 {
        let [[a, b], [d, e]] = self.linear();
        (a * e - b * d).abs().sqrt()
    }
}

/// Rotation and isotropic scale about a center.
///
/// Positive rotations turn +x toward +y in pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Similarity {
    pub rotation_deg: f64,
    pub scale: f64,
}

impl Default for Similarity {
    fn default() -> Self {
        Self {
            rotation_deg: 0.0,
            scale: 1.0,
        }
    }
}

impl Similarity {
    /// Creates a similarity from a rotation in degrees and a scale.
    pub fn new(rotation_deg: f64, scale: f64) -> Self {
        Self {
            rotation_deg,
            scale,
        }
    }

    /// Linear part `s * R(theta)`.
    pub fn linear(&self) -> [[f64; 2]; 2] {
        let (sin, cos) = self.rotation_deg.to_radians().sin_cos();
        [
            [self.scale * cos, -self.scale * sin],
            [self.scale * sin, self.scale * cos],
        ]
    }

    /// Affine map `p -> c + s R (p - c)`.
    pub fn about(&self, cx: f64, cy: f64) -> Affine2 {
        self.between((cx, cy), (cx, cy))
    }

    /// Affine map `p -> to + s R (p - from)`.
    pub fn between(&self, from: (f64, f64), to: (f64, f64)) -> Affine2 {
        let l = self.linear();
        let tx = to.0 - (l[0][0] * from.0 + l[0][1] * from.1);
        let ty = to.1 - (l[1][0] * from.0 + l[1][1] * from.1);
        Affine2::from_linear(l, (tx, ty))
    }
}
