//! Scalar reference kernel.

use crate::image::ImageView;
use crate::kernel::{placement_range, score_from_sums, Kernel, Metric};
use crate::surface::CorrelationSurface;
use crate::template::TemplatePlan;
use crate::util::RegResult;

/// Direct-summation kernel.
pub struct ScalarKernel;

/// Accumulates `(dot, sum_i, sum_i2)` for one placement.
#[inline]
pub(crate) fn window_sums(
    image: ImageView<'_, f32>,
    plan: &TemplatePlan,
    x: usize,
    y: usize,
) -> Option<(f64, f64, f64)> {
    let tw = plan.width();
    let tpl = plan.data();
    let mut dot = 0.0f64;
    let mut sum_i = 0.0f64;
    let mut sum_i2 = 0.0f64;
    for ty in 0..plan.height() {
        let row = image.row(y + ty)?.get(x..x + tw)?;
        let trow = &tpl[ty * tw..(ty + 1) * tw];
        for (&t, &v) in trow.iter().zip(row) {
            let v = v as f64;
            dot += t as f64 * v;
            sum_i += v;
            sum_i2 += v * v;
        }
    }
    Some((dot, sum_i, sum_i2))
}

impl Kernel for ScalarKernel {
    fn score_at(
        image: ImageView<'_, f32>,
        plan: &TemplatePlan,
        metric: Metric,
        x: usize,
        y: usize,
    ) -> f32 {
        match window_sums(image, plan, x, y) {
            Some((dot, sum_i, sum_i2)) => score_from_sums(metric, plan, dot, sum_i, sum_i2),
            None => f32::NAN,
        }
    }

    fn scan(
        image: ImageView<'_, f32>,
        plan: &TemplatePlan,
        metric: Metric,
    ) -> RegResult<CorrelationSurface> {
        let (max_x, max_y) = placement_range(image, plan)?;
        let mut scores = Vec::with_capacity((max_x + 1) * (max_y + 1));
        for y in 0..=max_y {
            for x in 0..=max_x {
                scores.push(Self::score_at(image, plan, metric, x, y));
            }
        }
        CorrelationSurface::new(scores, max_x + 1, max_y + 1, metric.better())
    }
}
