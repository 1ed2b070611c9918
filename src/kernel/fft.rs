//! FFT kernel: fast normalized cross-correlation.
//!
//! Template-times-window dot products for all placements come from one
//! frequency-domain product; window sums and sums of squares come from
//! summed-area tables, so the cost no longer scales with the template area.

use crate::image::ImageView;
use crate::kernel::scalar::ScalarKernel;
use crate::kernel::{placement_range, score_from_sums, Kernel, Metric};
use crate::spectral::{to_complex, Fft2};
use crate::surface::CorrelationSurface;
use crate::template::TemplatePlan;
use crate::util::RegResult;
use rustfft::num_complex::Complex;

/// Frequency-domain kernel.
pub struct FftKernel;

/// Summed-area tables of values and squared values.
struct SummedArea {
    stride: usize,
    sum: Vec<f64>,
    sum_sq: Vec<f64>,
}

impl SummedArea {
    fn new(image: ImageView<'_, f32>) -> Self {
        let stride = image.width() + 1;
        let mut sum = vec![0.0f64; stride * (image.height() + 1)];
        let mut sum_sq = vec![0.0f64; stride * (image.height() + 1)];
        for (y, row) in image.rows().enumerate() {
            let mut run = 0.0f64;
            let mut run_sq = 0.0f64;
            for (x, &v) in row.iter().enumerate() {
                let v = v as f64;
                run += v;
                run_sq += v * v;
                let idx = (y + 1) * stride + x + 1;
                sum[idx] = sum[idx - stride] + run;
                sum_sq[idx] = sum_sq[idx - stride] + run_sq;
            }
        }
        Self {
            stride,
            sum,
            sum_sq,
        }
    }

    fn window(&self, x: usize, y: usize, width: usize, height: usize) -> (f64, f64) {
        let a = y * self.stride + x;
        let b = y * self.stride + x + width;
        let c = (y + height) * self.stride + x;
        let d = (y + height) * self.stride + x + width;
        (
            self.sum[d] - self.sum[b] - self.sum[c] + self.sum[a],
            self.sum_sq[d] - self.sum_sq[b] - self.sum_sq[c] + self.sum_sq[a],
        )
    }
}

impl Kernel for FftKernel {
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
        let width = image.width();
        let height = image.height();
        let fft = Fft2::new(width, height);

        let mut spectrum = to_complex(image);
        fft.forward(&mut spectrum);

        let mut tpl_spectrum = vec![Complex::new(0.0, 0.0); width * height];
        let tw = plan.width();
        for (ty, trow) in plan.data().chunks_exact(tw).enumerate() {
            for (tx, &t) in trow.iter().enumerate() {
                tpl_spectrum[ty * width + tx] = Complex::new(t as f64, 0.0);
            }
        }
        fft.forward(&mut tpl_spectrum);

        for (s, t) in spectrum.iter_mut().zip(&tpl_spectrum) {
            *s *= t.conj();
        }
        fft.inverse(&mut spectrum);

        let table = SummedArea::new(image);
        let mut scores = Vec::with_capacity((max_x + 1) * (max_y + 1));
        for y in 0..=max_y {
            for x in 0..=max_x {
                let dot = spectrum[y * width + x].re;
                let (sum_i, sum_i2) = table.window(x, y, tw, plan.height());
                scores.push(score_from_sums(metric, plan, dot, sum_i, sum_i2));
            }
        }
        CorrelationSurface::new(scores, max_x + 1, max_y + 1, metric.better())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::OwnedImage;

    #[test]
    fn fft_scores_match_scalar_scores() {
        let img = OwnedImage::from_fn(23, 19, |x, y| {
            (((x * 13) ^ (y * 7) ^ (x * y)) & 0xFF) as f32
        })
        .unwrap();
        let tpl = img.view().roi(4, 6, 9, 7).unwrap().to_owned_image();
        let plan = TemplatePlan::from_view(tpl.view()).unwrap();
        for metric in [Metric::CcoeffNormed, Metric::CcorrNormed, Metric::SqdiffNormed] {
            let a = ScalarKernel::scan(img.view(), &plan, metric).unwrap();
            let b = FftKernel::scan(img.view(), &plan, metric).unwrap();
            assert_eq!((a.width(), a.height()), (b.width(), b.height()));
            for (u, v) in a.data().iter().zip(b.data()) {
                assert!((u - v).abs() < 1e-4, "{metric:?}: {u} vs {v}");
            }
        }
    }
}
