//! Weighted-centroid refinement over a score neighborhood.

use crate::surface::Neighborhood;

/// Center of mass of the cells rising above the border ring, relative to the
/// neighborhood center.
///
/// Only the peak's own lobe carries weight, so skewed tails of a broad surface
/// do not pull the estimate. A radius of 1 leaves the integer position.
/// Returns `(0, 0)` for a flat neighborhood.
pub fn center_of_mass(n: &Neighborhood) -> (f64, f64) {
    let floor = border_max(n);
    weighted_offset(n, 0, |v| v - floor)
}

/// Edge-referenced weighting of the interior cells.
///
/// The border ring of the neighborhood sets `edge_max`; interior cells scoring
/// above `edge_max + max_scaler * (edge_max - peak)` contribute with weight
/// equal to their height above that threshold.
pub fn edge_weighted(n: &Neighborhood, max_scaler: f64) -> (f64, f64) {
    if n.side() < 3 {
        return (0.0, 0.0);
    }
    let edge_max = border_max(n);
    let peak = n.values().iter().copied().fold(f32::NEG_INFINITY, f32::max) as f64;
    let threshold = edge_max + max_scaler * (edge_max - peak);
    weighted_offset(n, 1, |v| if v > threshold { v - threshold } else { 0.0 })
}

fn border_max(n: &Neighborhood) -> f64 {
    let side = n.side();
    let mut edge_max = f64::NEG_INFINITY;
    for j in 0..side {
        for i in 0..side {
            if i == 0 || j == 0 || i + 1 == side || j + 1 == side {
                edge_max = edge_max.max(n.at(i, j) as f64);
            }
        }
    }
    edge_max
}

fn weighted_offset(n: &Neighborhood, inset: usize, weight: impl Fn(f64) -> f64) -> (f64, f64) {
    let side = n.side();
    let center = n.radius() as f64;
    let mut total = 0.0f64;
    let mut sx = 0.0f64;
    let mut sy = 0.0f64;
    for j in inset..side - inset {
        for i in inset..side - inset {
            let w = weight(n.at(i, j) as f64);
            if w <= 0.0 || !w.is_finite() {
                continue;
            }
            total += w;
            sx += w * i as f64;
            sy += w * j as f64;
        }
    }
    if total <= 1e-12 {
        return (0.0, 0.0);
    }
    (sx / total - center, sy / total - center)
}

#[cfg(test)]
mod tests {
    use super::{center_of_mass, edge_weighted};
    use crate::surface::{Better, CorrelationSurface};

    fn gaussian_surface(cx: f32, cy: f32) -> CorrelationSurface {
        let mut data = Vec::new();
        for y in 0..7 {
            for x in 0..7 {
                let dx = x as f32 - cx;
                let dy = y as f32 - cy;
                data.push((-(dx * dx + dy * dy) / 2.0).exp());
            }
        }
        CorrelationSurface::new(data, 7, 7, Better::Max).unwrap()
    }

    #[test]
    fn symmetric_peak_has_zero_offset() {
        let s = gaussian_surface(3.0, 3.0);
        let n = s.neighborhood(3, 3, 2).unwrap();
        let (dx, dy) = center_of_mass(&n);
        assert!(dx.abs() < 1e-6 && dy.abs() < 1e-6);
        let (dx, dy) = edge_weighted(&n, 0.2);
        assert!(dx.abs() < 1e-6 && dy.abs() < 1e-6);
    }

    #[test]
    fn skewed_tails_do_not_pull_the_centroid() {
        // Symmetric inner lobe, raised tail on the left.
        let mut data = Vec::new();
        for y in 0..5 {
            for x in 0..5 {
                let value = match (x as i32 - 2).abs() + (y as i32 - 2).abs() {
                    0 => 1.0,
                    1 => 0.8,
                    _ if x < 2 => 0.55,
                    _ => 0.3,
                };
                data.push(value);
            }
        }
        let s = CorrelationSurface::new(data, 5, 5, Better::Max).unwrap();
        let n = s.neighborhood(2, 2, 2).unwrap();
        let (dx, dy) = center_of_mass(&n);
        assert!(dx.abs() < 1e-9, "dx={dx}");
        assert!(dy.abs() < 1e-9, "dy={dy}");
    }

    #[test]
    fn offsets_follow_the_true_peak() {
        let s = gaussian_surface(3.3, 2.8);
        let n = s.neighborhood(3, 3, 2).unwrap();
        let (dx, dy) = center_of_mass(&n);
        assert!(dx > 0.05 && dx < 0.4, "dx={dx}");
        assert!(dy < -0.02 && dy > -0.3, "dy={dy}");
        let (ex, ey) = edge_weighted(&n, 0.2);
        assert!(ex > 0.0 && ey < 0.0);
    }
}
