//! Separable quadratic refinement on the central 3x3 of a neighborhood.

use crate::refine::quad1d::quad_peak_offset_1d;
use crate::surface::Neighborhood;

/// Sub-pixel offset of the neighborhood center from separable 1-D fits.
///
/// `dx` comes from the center row and `dy` from the center column; an
/// ill-conditioned axis falls back to zero.
pub fn quad_offset_2d(n: &Neighborhood) -> (f64, f64) {
    let r = n.radius();
    let c = |i: usize, j: usize| n.at(i, j) as f64;
    let dx = quad_peak_offset_1d(c(r - 1, r), c(r, r), c(r + 1, r)).unwrap_or(0.0);
    let dy = quad_peak_offset_1d(c(r, r - 1), c(r, r), c(r, r + 1)).unwrap_or(0.0);
    (dx, dy)
}

#[cfg(test)]
mod tests {
    use super::quad_offset_2d;
    use crate::surface::{Better, CorrelationSurface};

    #[test]
    fn separable_paraboloid_offset() {
        let mut data = Vec::new();
        for y in 0..5 {
            for x in 0..5 {
                let fx = x as f32 - 2.0;
                let fy = y as f32 - 2.0;
                data.push(1.0 - (fx - 0.3).powi(2) - (fy + 0.2).powi(2));
            }
        }
        let surface = CorrelationSurface::new(data, 5, 5, Better::Max).unwrap();
        let n = surface.neighborhood(2, 2, 1).unwrap();
        let (dx, dy) = quad_offset_2d(&n);
        assert!((dx - 0.3).abs() < 1e-4);
        assert!((dy + 0.2).abs() < 1e-4);
    }
}
