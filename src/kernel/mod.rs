//! Correlation kernel implementations.
//!
//! A kernel scores every placement of a template inside a search window and
//! returns the scores as a `CorrelationSurface`. The scalar kernel is the
//! reference; the FFT kernel computes the same scores through frequency-domain
//! dot products plus summed-area tables, and the rayon kernel parallelizes the
//! scalar loops over rows.

use crate::image::ImageView;
use crate::surface::{Better, CorrelationSurface};
use crate::template::TemplatePlan;
use crate::util::{RegError, RegResult};
use std::str::FromStr;

pub mod fft;
pub mod scalar;

#[cfg(feature = "rayon")]
pub mod rayon;

/// Templates with at least this many pixels are scored with the FFT kernel.
pub const FFT_MIN_TEMPLATE_AREA: usize = 225;

/// Normalized template-matching metric.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Metric {
    /// Zero-mean normalized cross-correlation.
    #[default]
    CcoeffNormed,
    /// Normalized cross-correlation without mean removal.
    CcorrNormed,
    /// Normalized sum of squared differences.
    SqdiffNormed,
}

impl Metric {
    /// Better direction of the metric's scores.
    pub fn better(self) -> Better {
        match self {
            Metric::CcoeffNormed | Metric::CcorrNormed => Better::Max,
            Metric::SqdiffNormed => Better::Min,
        }
    }

    /// Configuration name of the metric.
    pub fn name(self) -> &'static str {
        match self {
            Metric::CcoeffNormed => "ccoeff_normed",
            Metric::CcorrNormed => "ccorr_normed",
            Metric::SqdiffNormed => "sqdiff_normed",
        }
    }
}

impl FromStr for Metric {
    type Err = RegError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ccoeff_normed" | "zncc" => Ok(Metric::CcoeffNormed),
            "ccorr_normed" => Ok(Metric::CcorrNormed),
            "sqdiff_normed" => Ok(Metric::SqdiffNormed),
            other => Err(RegError::UnknownStrategy {
                kind: "metric",
                name: other.to_string(),
            }),
        }
    }
}

/// Kernel trait for scoring and scan operations.
pub trait Kernel {
    /// Computes the score at a single placement (top-left coordinates).
    fn score_at(image: ImageView<'_, f32>, plan: &TemplatePlan, metric: Metric, x: usize, y: usize)
        -> f32;

    /// Scores every valid placement of the template.
    fn scan(image: ImageView<'_, f32>, plan: &TemplatePlan, metric: Metric)
        -> RegResult<CorrelationSurface>;
}

/// Turns raw window sums into a metric score.
///
/// `dot` is the sum of template times image, `sum_i` and `sum_i2` are the
/// window sum and sum of squares.
#[inline]
pub(crate) fn score_from_sums(
    metric: Metric,
    plan: &TemplatePlan,
    dot: f64,
    sum_i: f64,
    sum_i2: f64,
) -> f32 {
    let n = plan.area() as f64;
    let score = match metric {
        Metric::CcoeffNormed => {
            let var_i = sum_i2 - sum_i * sum_i / n;
            if var_i <= 1e-8 * n {
                0.0
            } else {
                (dot - plan.mean() * sum_i) / (plan.var_t() * var_i).sqrt()
            }
        }
        Metric::CcorrNormed => {
            let denom = (plan.sum_sq() * sum_i2).sqrt();
            if denom <= 1e-12 {
                0.0
            } else {
                dot / denom
            }
        }
        Metric::SqdiffNormed => {
            let num = (plan.sum_sq() - 2.0 * dot + sum_i2).max(0.0);
            let denom = (plan.sum_sq() * sum_i2).sqrt();
            if denom <= 1e-12 {
                if num <= 1e-12 {
                    0.0
                } else {
                    1.0
                }
            } else {
                num / denom
            }
        }
    };
    score as f32
}

pub(crate) fn placement_range(image: ImageView<'_, f32>, plan: &TemplatePlan) -> RegResult<(usize, usize)> {
    if image.width() < plan.width() || image.height() < plan.height() {
        return Err(RegError::RoiOutOfBounds {
            x: 0,
            y: 0,
            width: plan.width(),
            height: plan.height(),
            img_width: image.width(),
            img_height: image.height(),
        });
    }
    Ok((image.width() - plan.width(), image.height() - plan.height()))
}

/// Scores `template` at every placement inside `image`.
///
/// Large templates go through the FFT kernel; small ones through the scalar
/// kernel (row-parallel with the `rayon` feature). Non-finite pixels in either
/// input are a `NoData` error.
pub fn match_template(
    image: ImageView<'_, f32>,
    template: ImageView<'_, f32>,
    metric: Metric,
) -> RegResult<CorrelationSurface> {
    let plan = TemplatePlan::from_view(template)?;
    if !image.all_finite() {
        return Err(RegError::NoData);
    }
    match_plan(image, &plan, metric)
}

/// Scores a prepared plan at every placement inside `image`.
pub fn match_plan(
    image: ImageView<'_, f32>,
    plan: &TemplatePlan,
    metric: Metric,
) -> RegResult<CorrelationSurface> {
    if plan.area() >= FFT_MIN_TEMPLATE_AREA {
        return fft::FftKernel::scan(image, plan, metric);
    }
    #[cfg(feature = "rayon")]
    {
        self::rayon::ParallelScalarKernel::scan(image, plan, metric)
    }
    #[cfg(not(feature = "rayon"))]
    {
        scalar::ScalarKernel::scan(image, plan, metric)
    }
}
