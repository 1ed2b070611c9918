//! Three-sample peak interpolation along one axis.

/// Estimates the sub-sample peak offset for a quadratic fit.
///
/// Given samples at `x = -1, 0, +1` (`fm`, `f0`, `fp`), this returns the peak
/// offset `dx` in `[-1, 1]` when the fitted parabola is concave and stable.
pub fn quad_peak_offset_1d(fm: f64, f0: f64, fp: f64) -> Option<f64> {
    if !fm.is_finite() || !f0.is_finite() || !fp.is_finite() {
        return None;
    }

    let denom = fm - 2.0 * f0 + fp;
    if denom.abs() < 1e-12 || denom >= 0.0 {
        return None;
    }

    let dx = 0.5 * (fm - fp) / denom;
    if dx.is_finite() && dx.abs() <= 1.0 {
        Some(dx)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::quad_peak_offset_1d;

    #[test]
    fn quad_peak_offset_symmetric() {
        let dx = quad_peak_offset_1d(0.9, 1.0, 0.9).unwrap();
        assert!(dx.abs() < 1e-12);
    }

    #[test]
    fn quad_peak_offset_shifted() {
        let f = |x: f64| 1.0 - (x - 0.25).powi(2);
        let dx = quad_peak_offset_1d(f(-1.0), f(0.0), f(1.0)).unwrap();
        assert!((dx - 0.25).abs() < 1e-9);
    }

    #[test]
    fn quad_peak_offset_non_concave() {
        assert!(quad_peak_offset_1d(1.0, 0.5, 1.0).is_none());
    }
}
