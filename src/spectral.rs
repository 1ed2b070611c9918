//! Two-dimensional FFT helpers on row-major buffers.

use crate::image::ImageView;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// Planned forward and inverse 2-D transforms for a fixed `width x height`.
pub(crate) struct Fft2 {
    width: usize,
    height: usize,
    row_forward: Arc<dyn Fft<f64>>,
    row_inverse: Arc<dyn Fft<f64>>,
    col_forward: Arc<dyn Fft<f64>>,
    col_inverse: Arc<dyn Fft<f64>>,
}

impl Fft2 {
    pub(crate) fn new(width: usize, height: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            width,
            height,
            row_forward: planner.plan_fft_forward(width),
            row_inverse: planner.plan_fft_inverse(width),
            col_forward: planner.plan_fft_forward(height),
            col_inverse: planner.plan_fft_inverse(height),
        }
    }

    /// In-place forward transform.
    pub(crate) fn forward(&self, data: &mut [Complex<f64>]) {
        self.transform(data, &self.row_forward, &self.col_forward);
    }

    /// In-place inverse transform, normalized by `1 / (width * height)`.
    pub(crate) fn inverse(&self, data: &mut [Complex<f64>]) {
        self.transform(data, &self.row_inverse, &self.col_inverse);
        let scale = 1.0 / (self.width * self.height) as f64;
        for v in data.iter_mut() {
            *v *= scale;
        }
    }

    fn transform(&self, data: &mut [Complex<f64>], row: &Arc<dyn Fft<f64>>, col: &Arc<dyn Fft<f64>>) {
        debug_assert_eq!(data.len(), self.width * self.height);
        row.process(data);
        let mut column = vec![Complex::new(0.0, 0.0); self.height];
        for x in 0..self.width {
            for (y, c) in column.iter_mut().enumerate() {
                *c = data[y * self.width + x];
            }
            col.process(&mut column);
            for (y, c) in column.iter().enumerate() {
                data[y * self.width + x] = *c;
            }
        }
    }
}

/// Copies a real view into a complex buffer, multiplying by `weight(x, y)`.
pub(crate) fn to_complex_weighted(
    view: ImageView<'_, f32>,
    weight: impl Fn(usize, usize) -> f64,
) -> Vec<Complex<f64>> {
    let mut out = Vec::with_capacity(view.width() * view.height());
    for (y, row) in view.rows().enumerate() {
        for (x, &v) in row.iter().enumerate() {
            out.push(Complex::new(v as f64 * weight(x, y), 0.0));
        }
    }
    out
}

/// Copies a real view into a complex buffer.
pub(crate) fn to_complex(view: ImageView<'_, f32>) -> Vec<Complex<f64>> {
    to_complex_weighted(view, |_, _| 1.0)
}

/// Periodic Hann window of length `n`.
pub(crate) fn hann_window(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f64::consts::PI * i as f64 / n as f64).cos()))
        .collect()
}

/// Magnitude spectrum with the zero frequency moved to `(width / 2, height / 2)`.
pub(crate) fn shifted_magnitude(data: &[Complex<f64>], width: usize, height: usize) -> Vec<f64> {
    let mut out = vec![0.0f64; width * height];
    for y in 0..height {
        let sy = (y + height / 2) % height;
        for x in 0..width {
            let sx = (x + width / 2) % width;
            out[sy * width + sx] = data[y * width + x].norm();
        }
    }
    out
}

/// Maps a peak index to a signed circular shift.
pub(crate) fn signed_shift(index: usize, len: usize) -> f64 {
    if index > len / 2 {
        index as f64 - len as f64
    } else {
        index as f64
    }
}
