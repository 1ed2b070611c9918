//! Mathematical helpers shared by the estimators.

/// Folds a rotation in degrees into the half-open range (-90, 90].
///
/// Log-polar estimates are ambiguous by 180 degrees, so the fold adds or
/// subtracts half turns until the angle lands in range.
pub(crate) fn fold_half_turn_deg(angle_deg: f64) -> f64 {
    let mut folded = angle_deg % 360.0;
    while folded <= -90.0 {
        folded += 180.0;
    }
    while folded > 90.0 {
        folded -= 180.0;
    }
    folded
}

/// Euclidean distance between two points.
pub(crate) fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - b.0).hypot(a.1 - b.1)
}

/// Rounds an even size up to the next odd size.
pub(crate) fn make_odd(size: usize) -> usize {
    if size % 2 == 0 {
        size + 1
    } else {
        size
    }
}

/// Mean and population variance of finite samples, accumulated in `f64`.
pub(crate) fn mean_variance(values: impl Iterator<Item = f32>) -> (f64, f64) {
    let mut count = 0usize;
    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    for value in values {
        let v = value as f64;
        count += 1;
        sum += v;
        sum_sq += v * v;
    }
    if count == 0 {
        return (0.0, 0.0);
    }
    let n = count as f64;
    let mean = sum / n;
    let variance = (sum_sq / n - mean * mean).max(0.0);
    (mean, variance)
}
