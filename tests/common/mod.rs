//! Deterministic synthetic scenes shared by the integration tests.

#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use subreg::{Affine2, AffineProjector, ControlPoint, ImageId, Measure, OwnedImage};

/// Periodic value noise: random lattice values blended with smoothstep weights.
pub struct ValueNoise {
    cells: usize,
    spacing: f64,
    values: Vec<f32>,
}

impl ValueNoise {
    pub fn new(seed: u64, spacing: f64, cells: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let values = (0..cells * cells).map(|_| rng.random::<f32>()).collect();
        Self {
            cells,
            spacing,
            values,
        }
    }

    fn lattice(&self, i: i64, j: i64) -> f32 {
        let n = self.cells as i64;
        let i = i.rem_euclid(n) as usize;
        let j = j.rem_euclid(n) as usize;
        self.values[j * self.cells + i]
    }

    pub fn at(&self, x: f64, y: f64) -> f32 {
        let gx = x / self.spacing;
        let gy = y / self.spacing;
        let (i, j) = (gx.floor(), gy.floor());
        let smooth = |t: f64| (t * t * (3.0 - 2.0 * t)) as f32;
        let (tx, ty) = (smooth(gx - i), smooth(gy - j));
        let (i, j) = (i as i64, j as i64);
        let top = self.lattice(i, j) * (1.0 - tx) + self.lattice(i + 1, j) * tx;
        let bottom = self.lattice(i, j + 1) * (1.0 - tx) + self.lattice(i + 1, j + 1) * tx;
        top * (1.0 - ty) + bottom * ty
    }
}

/// Two octaves of value noise scaled to roughly `[0, 255]`.
pub struct Texture {
    fine: ValueNoise,
    coarse: ValueNoise,
}

impl Texture {
    pub fn new(seed: u64) -> Self {
        Self {
            fine: ValueNoise::new(seed, 3.5, 512),
            coarse: ValueNoise::new(seed.wrapping_add(1), 11.0, 256),
        }
    }

    pub fn at(&self, x: f64, y: f64) -> f32 {
        255.0 * (0.65 * self.fine.at(x, y) + 0.35 * self.coarse.at(x, y))
    }

    /// Renders the texture on the pixel grid.
    pub fn render(&self, width: usize, height: usize) -> OwnedImage {
        OwnedImage::from_fn(width, height, |x, y| self.at(x as f64, y as f64)).unwrap()
    }

    /// Renders `image(q) = texture(map⁻¹(q))`, i.e. the texture moved by `map`.
    pub fn render_mapped(&self, width: usize, height: usize, map: &Affine2) -> OwnedImage {
        let inverse = map.inverse().unwrap();
        OwnedImage::from_fn(width, height, |x, y| {
            let (sx, sy) = inverse.apply(x as f64, y as f64);
            self.at(sx, sy)
        })
        .unwrap()
    }

    /// Renders the texture translated so that `image(q) = texture(q + shift)`.
    pub fn render_shifted(&self, width: usize, height: usize, shift: (f64, f64)) -> OwnedImage {
        OwnedImage::from_fn(width, height, |x, y| {
            self.at(x as f64 + shift.0, y as f64 + shift.1)
        })
        .unwrap()
    }
}

/// Rotation by `deg` degrees and isotropic scale `scale`, plus translation.
pub fn similarity(deg: f64, scale: f64, translation: (f64, f64)) -> Affine2 {
    let (sin, cos) = deg.to_radians().sin_cos();
    Affine2::from_linear(
        [[scale * cos, -scale * sin], [scale * sin, scale * cos]],
        translation,
    )
}

pub fn assert_close(actual: (f64, f64), expected: (f64, f64), tolerance: f64) {
    let d = (actual.0 - expected.0).hypot(actual.1 - expected.1);
    assert!(
        d <= tolerance,
        "({:.3}, {:.3}) is {d:.3} px from ({:.3}, {:.3})",
        actual.0,
        actual.1,
        expected.0,
        expected.1
    );
}

/// Elongated Gaussian blobs at random positions and orientations.
///
/// The magnitude spectrum of such a scene is strongly anisotropic, which the
/// log-polar estimator needs to see a rotation.
pub struct BlobScene {
    blobs: Vec<Blob>,
}

struct Blob {
    x: f64,
    y: f64,
    cos: f64,
    sin: f64,
    inv_major: f64,
    inv_minor: f64,
    amplitude: f32,
}

impl BlobScene {
    pub fn new(seed: u64, count: usize, extent: f64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let blobs = (0..count)
            .map(|_| {
                let angle = rng.random::<f64>() * std::f64::consts::PI;
                let (sin, cos) = angle.sin_cos();
                let major = 3.0 + 9.0 * rng.random::<f64>();
                let minor = 1.0 + 2.0 * rng.random::<f64>();
                Blob {
                    x: extent * rng.random::<f64>(),
                    y: extent * rng.random::<f64>(),
                    cos,
                    sin,
                    inv_major: 1.0 / (major * major),
                    inv_minor: 1.0 / (minor * minor),
                    amplitude: 40.0 + 200.0 * rng.random::<f32>(),
                }
            })
            .collect();
        Self { blobs }
    }

    pub fn at(&self, x: f64, y: f64) -> f32 {
        self.blobs
            .iter()
            .map(|b| {
                let (dx, dy) = (x - b.x, y - b.y);
                let u = b.cos * dx + b.sin * dy;
                let v = -b.sin * dx + b.cos * dy;
                let r = u * u * b.inv_major + v * v * b.inv_minor;
                if r > 30.0 {
                    0.0
                } else {
                    b.amplitude * (-0.5 * r).exp() as f32
                }
            })
            .sum()
    }

    pub fn render_mapped(&self, width: usize, height: usize, map: &Affine2) -> OwnedImage {
        let inverse = map.inverse().unwrap();
        OwnedImage::from_fn(width, height, |x, y| {
            let (sx, sy) = inverse.apply(x as f64, y as f64);
            self.at(sx, sy)
        })
        .unwrap()
    }
}

pub const IMAGE_A: ImageId = ImageId(1);
pub const IMAGE_B: ImageId = ImageId(2);
pub const IMAGE_SMALL: ImageId = ImageId(3);

/// Two overlapping views of one textured surface plus a small image that
/// does not see the point.
///
/// A is the texture itself and doubles as the ground frame. B sees the
/// texture through `B(q) = texture(M⁻¹ q)`, with `M` a 1.5° rotation and 2%
/// scale that sends `point` to `truth`. The projector's model of B is off by
/// `bias` pixels, so the projected location misses `truth` by that much.
pub struct Scenario {
    pub a: OwnedImage,
    pub b: OwnedImage,
    pub small: OwnedImage,
    pub projector: AffineProjector,
    pub point: (f64, f64),
    pub truth: (f64, f64),
    pub bias: (f64, f64),
}

impl Scenario {
    pub fn new() -> Self {
        let texture = Texture::new(2024);
        let point = (250.78, 250.50);
        let truth = (266.92, 271.00);
        let bias = (-3.4, 2.6);

        let linear = similarity(1.5, 1.02, (0.0, 0.0));
        let (lx, ly) = linear.apply(point.0, point.1);
        let map = similarity(1.5, 1.02, (truth.0 - lx, truth.1 - ly));
        let biased = similarity(1.5, 1.02, (truth.0 - lx + bias.0, truth.1 - ly + bias.1));

        let mut projector = AffineProjector::new();
        projector
            .insert_bounded(IMAGE_A, Affine2::identity(), 520, 520)
            .unwrap();
        projector
            .insert_bounded(IMAGE_B, biased.inverse().unwrap(), 560, 560)
            .unwrap();
        projector
            .insert_bounded(IMAGE_SMALL, Affine2::identity(), 100, 100)
            .unwrap();

        Self {
            a: texture.render(520, 520),
            b: texture.render_mapped(560, 560, &map),
            small: texture.render(100, 100),
            projector,
            point,
            truth,
            bias,
        }
    }

    /// Image id -> raster lookup for the point drivers.
    pub fn catalog(&self) -> HashMap<ImageId, OwnedImage> {
        HashMap::from([
            (IMAGE_A, self.a.clone()),
            (IMAGE_B, self.b.clone()),
            (IMAGE_SMALL, self.small.clone()),
        ])
    }

    /// Where the projector places `point` in B.
    pub fn projected(&self) -> (f64, f64) {
        (self.truth.0 + self.bias.0, self.truth.1 + self.bias.1)
    }

    /// Control point with the reference measure in A and one measure per
    /// listed image at its projected location.
    pub fn control_point(&self, images: &[ImageId]) -> ControlPoint {
        let mut measures = vec![Measure::new(10, IMAGE_A, self.point.0, self.point.1)];
        for (i, &image) in images.iter().enumerate() {
            let (x, y) = self.projected();
            measures.push(Measure::new(11 + i as u64, image, x, y));
        }
        ControlPoint {
            id: 1,
            reference_index: 0,
            measures,
        }
    }
}
