//! Rayon-parallel kernel (feature-gated).
//!
//! Parallelizes the scalar kernel over placement rows; each worker scores all
//! x positions of its rows.

use crate::image::ImageView;
use crate::kernel::scalar::ScalarKernel;
use crate::kernel::{placement_range, Kernel, Metric};
use crate::surface::CorrelationSurface;
use crate::template::TemplatePlan;
use crate::util::RegResult;
use rayon::prelude::*;

/// Row-parallel direct-summation kernel.
pub struct ParallelScalarKernel;

impl Kernel for ParallelScalarKernel {
    fn score_at(
        image: ImageView<'_, f32>,
        plan: &TemplatePlan,
        metric: Metric,
        x: usize,
        y: usize,
    ) -> f32 {
        ScalarKernel::score_at(image, plan, metric, x, y)
    }

    fn scan(
        image: ImageView<'_, f32>,
        plan: &TemplatePlan,
        metric: Metric,
    ) -> RegResult<CorrelationSurface> {
        let (max_x, max_y) = placement_range(image, plan)?;
        let rows: Vec<Vec<f32>> = (0..=max_y)
            .into_par_iter()
            .map(|y| {
                (0..=max_x)
                    .map(|x| ScalarKernel::score_at(image, plan, metric, x, y))
                    .collect()
            })
            .collect();
        let scores = rows.into_iter().flatten().collect();
        CorrelationSurface::new(scores, max_x + 1, max_y + 1, metric.better())
    }
}
