//! Mutual information between windows and the exhaustive MI matcher.

use crate::image::ImageView;
use crate::matcher::{centered_offset, Ambiguity, MatchResult, MutualInformationMatcher};
use crate::refine::{refine_extremum, SubpixelMethod};
use crate::surface::{Better, CorrelationSurface};
use crate::util::{RegError, RegResult};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Histogram range of a window: `[min, max]`, widened around constant windows.
fn value_range(view: ImageView<'_, f32>) -> (f64, f64) {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for row in view.rows() {
        for &v in row {
            lo = lo.min(v as f64);
            hi = hi.max(v as f64);
        }
    }
    if hi - lo <= f64::EPSILON * hi.abs().max(1.0) {
        (lo - 0.5, lo + 0.5)
    } else {
        (lo, hi)
    }
}

#[inline]
fn bin_index(v: f32, lo: f64, hi: f64, bins: usize) -> usize {
    let t = (v as f64 - lo) / (hi - lo) * bins as f64;
    (t.floor().max(0.0) as usize).min(bins - 1)
}

/// Mutual information of two equal-shaped windows, in nats.
///
/// Each window is binned over its own value range into `bins` bins.
pub fn mutual_information(
    a: ImageView<'_, f32>,
    b: ImageView<'_, f32>,
    bins: usize,
) -> RegResult<f64> {
    if bins == 0 {
        return Err(RegError::InvalidInput("mutual information needs at least one bin"));
    }
    if a.shape() != b.shape() {
        return Err(RegError::ShapeMismatch {
            left: a.shape(),
            right: b.shape(),
        });
    }
    if !a.all_finite() || !b.all_finite() {
        return Err(RegError::NoData);
    }
    let (alo, ahi) = value_range(a);
    let (blo, bhi) = value_range(b);

    let mut joint = vec![0u32; bins * bins];
    for (ra, rb) in a.rows().zip(b.rows()) {
        for (&va, &vb) in ra.iter().zip(rb) {
            let i = bin_index(va, alo, ahi, bins);
            let j = bin_index(vb, blo, bhi, bins);
            joint[i * bins + j] += 1;
        }
    }

    let total = (a.width() * a.height()) as f64;
    let mut pa = vec![0.0f64; bins];
    let mut pb = vec![0.0f64; bins];
    for i in 0..bins {
        for j in 0..bins {
            let p = joint[i * bins + j] as f64 / total;
            pa[i] += p;
            pb[j] += p;
        }
    }

    let mut mi = 0.0f64;
    for i in 0..bins {
        for j in 0..bins {
            let count = joint[i * bins + j];
            if count == 0 {
                continue;
            }
            let p = count as f64 / total;
            mi += p * (p / (pa[i] * pb[j])).ln();
        }
    }
    Ok(mi.max(0.0))
}

fn score_row(
    template: ImageView<'_, f32>,
    search: ImageView<'_, f32>,
    y: usize,
    columns: usize,
    bins: usize,
) -> RegResult<Vec<f32>> {
    let (tw, th) = template.shape();
    (0..columns)
        .map(|x| {
            let window = search.roi(x, y, tw, th)?;
            Ok(mutual_information(template, window, bins)? as f32)
        })
        .collect()
}

/// Slides `template` over every placement in `search` scoring mutual information.
///
/// The best cell is refined with edge-referenced weighting.
pub fn mutual_information_match(
    template: ImageView<'_, f32>,
    search: ImageView<'_, f32>,
    cfg: &MutualInformationMatcher,
) -> RegResult<MatchResult> {
    if !template.all_finite() || !search.all_finite() {
        return Err(RegError::NoData);
    }
    let (tw, th) = template.shape();
    let (sw, sh) = search.shape();
    if tw > sw || th > sh {
        return Err(RegError::ShapeMismatch {
            left: template.shape(),
            right: search.shape(),
        });
    }
    let columns = sw - tw + 1;
    let rows = sh - th + 1;

    #[cfg(feature = "rayon")]
    let scored: RegResult<Vec<Vec<f32>>> = (0..rows)
        .into_par_iter()
        .map(|y| score_row(template, search, y, columns, cfg.bins))
        .collect();
    #[cfg(not(feature = "rayon"))]
    let scored: RegResult<Vec<Vec<f32>>> = (0..rows)
        .map(|y| score_row(template, search, y, columns, cfg.bins))
        .collect();

    let scores = scored?.into_iter().flatten().collect();
    let surface = CorrelationSurface::new(scores, columns, rows, Better::Max)?;
    let best = surface
        .extremum()
        .ok_or(RegError::DegenerateWindow { reason: "no finite scores" })?;
    let score = best.score as f64;
    let method = SubpixelMethod::EdgeWeighted {
        max_scaler: cfg.max_scaler,
    };
    match refine_extremum(&surface, best, cfg.radius, method) {
        Some((x, y)) => {
            let (dx, dy) = centered_offset(x, y, template.shape(), search.shape());
            Ok(MatchResult::matched(dx, dy, score, Some(surface)))
        }
        None => Ok(MatchResult::ambiguous(
            Ambiguity::RefinementOutOfBounds,
            score,
            Some(surface),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::OwnedImage;

    #[test]
    fn self_information_is_entropy() {
        let img = OwnedImage::from_fn(10, 10, |x, _| x as f32).unwrap();
        let mi = mutual_information(img.view(), img.view(), 10).unwrap();
        assert!((mi - 10f64.ln()).abs() < 1e-9);
    }

    #[test]
    fn shapes_must_agree() {
        let a = OwnedImage::filled(4, 4, 1.0).unwrap();
        let b = OwnedImage::filled(4, 5, 1.0).unwrap();
        assert!(matches!(
            mutual_information(a.view(), b.view(), 8),
            Err(RegError::ShapeMismatch { .. })
        ));
    }
}
