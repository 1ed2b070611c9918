//! Single-shot phase correlation.
//!
//! Both windows are mean-removed and multiplied by a separable Hann taper so
//! the window border does not leak into the spectrum. The whitened
//! cross-power spectrum is inverted to a correlation peak, and the peak is
//! refined by evaluating the inverse transform on a `1 / UPSAMPLE` grid over
//! one pixel around it.

use crate::image::ImageView;
use crate::matcher::MatchResult;
use crate::refine::quad1d::quad_peak_offset_1d;
use crate::spectral::{hann_window, signed_shift, to_complex, Fft2};
use crate::util::{RegError, RegResult};
use rustfft::num_complex::Complex;

/// Sub-pixel resolution of the peak search.
const UPSAMPLE: usize = 20;

/// Shift between two windows with `reference(q + shift) ≈ moving(q)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhaseEstimate {
    /// Sub-pixel `(x, y)` shift.
    pub shift: (f64, f64),
    /// Height of the normalized correlation peak.
    pub score: f64,
    /// `sqrt(|1 - cc^2 / (sum(a^2) sum(b^2))|)` at the integer peak, over the
    /// tapered windows.
    pub error: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Taper {
    Hann,
    /// Inputs already periodic along both axes.
    None,
}

fn mean(view: ImageView<'_, f32>) -> f64 {
    let n = (view.width() * view.height()) as f64;
    view.rows()
        .flat_map(|row| row.iter())
        .map(|&v| v as f64)
        .sum::<f64>()
        / n
}

fn prepare(view: ImageView<'_, f32>, taper: Taper) -> Vec<Complex<f64>> {
    match taper {
        Taper::Hann => {
            let wx = hann_window(view.width());
            let wy = hann_window(view.height());
            let mu = mean(view);
            let mut out = Vec::with_capacity(view.width() * view.height());
            for (y, row) in view.rows().enumerate() {
                for (x, &v) in row.iter().enumerate() {
                    out.push(Complex::new((v as f64 - mu) * wx[x] * wy[y], 0.0));
                }
            }
            out
        }
        Taper::None => to_complex(view),
    }
}

fn energy(data: &[Complex<f64>]) -> f64 {
    data.iter().map(|c| c.norm_sqr()).sum()
}

/// Frequency of bin `k` in a transform of length `n`, in `[-n/2, n/2)`.
fn signed_frequency(k: usize, n: usize) -> f64 {
    if k >= (n + 1) / 2 {
        k as f64 - n as f64
    } else {
        k as f64
    }
}

/// `kernel[j * len + k] = exp(2πi f_k (center + o_j) / len)` for the upsampled offsets `o_j`.
fn shift_kernel(len: usize, center: f64, offsets: &[f64]) -> Vec<Complex<f64>> {
    let tau = 2.0 * std::f64::consts::PI;
    let mut kernel = Vec::with_capacity(len * offsets.len());
    for &o in offsets {
        for k in 0..len {
            let phase = tau * signed_frequency(k, len) * (center + o) / len as f64;
            kernel.push(Complex::from_polar(1.0, phase));
        }
    }
    kernel
}

/// Refines an integer peak `(sx, sy)` of the inverse of `spectrum`.
///
/// Returns the sub-pixel peak and the correlation height there.
fn upsampled_peak(
    spectrum: &[Complex<f64>],
    width: usize,
    height: usize,
    sx: f64,
    sy: f64,
) -> ((f64, f64), f64) {
    let n = 2 * UPSAMPLE + 1;
    let step = 1.0 / UPSAMPLE as f64;
    let offsets: Vec<f64> = (0..n)
        .map(|i| (i as f64 - UPSAMPLE as f64) * step)
        .collect();
    let kx = shift_kernel(width, sx, &offsets);
    let ky = shift_kernel(height, sy, &offsets);

    // Rows first, then columns: partial[y * n + j] sums row y against column offset j.
    let mut partial = vec![Complex::new(0.0, 0.0); height * n];
    for (y, row) in spectrum.chunks_exact(width).enumerate() {
        for j in 0..n {
            partial[y * n + j] = row
                .iter()
                .zip(&kx[j * width..(j + 1) * width])
                .map(|(s, k)| s * k)
                .sum();
        }
    }
    let scale = 1.0 / (width * height) as f64;
    let mut grid = vec![0.0f64; n * n];
    for i in 0..n {
        let ky_row = &ky[i * height..(i + 1) * height];
        for j in 0..n {
            let acc: Complex<f64> = ky_row
                .iter()
                .enumerate()
                .map(|(y, k)| partial[y * n + j] * k)
                .sum();
            grid[i * n + j] = acc.re * scale;
        }
    }

    let (mut bi, mut bj) = (UPSAMPLE, UPSAMPLE);
    let mut best = f64::NEG_INFINITY;
    for i in 0..n {
        for j in 0..n {
            if grid[i * n + j] > best {
                best = grid[i * n + j];
                bi = i;
                bj = j;
            }
        }
    }
    let at = |i: usize, j: usize| grid[i * n + j];
    let sub_x = if bj > 0 && bj + 1 < n {
        quad_peak_offset_1d(at(bi, bj - 1), best, at(bi, bj + 1)).unwrap_or(0.0)
    } else {
        0.0
    };
    let sub_y = if bi > 0 && bi + 1 < n {
        quad_peak_offset_1d(at(bi - 1, bj), best, at(bi + 1, bj)).unwrap_or(0.0)
    } else {
        0.0
    };
    (
        (
            sx + offsets[bj] + sub_x * step,
            sy + offsets[bi] + sub_y * step,
        ),
        best,
    )
}

fn correlate(
    reference: ImageView<'_, f32>,
    moving: ImageView<'_, f32>,
    taper: Taper,
) -> RegResult<PhaseEstimate> {
    if reference.shape() != moving.shape() {
        return Err(RegError::ShapeMismatch {
            left: reference.shape(),
            right: moving.shape(),
        });
    }
    if !reference.all_finite() || !moving.all_finite() {
        return Err(RegError::NoData);
    }

    let (width, height) = reference.shape();
    let mut cross = prepare(reference, taper);
    let mut spec_m = prepare(moving, taper);
    let total = energy(&cross) * energy(&spec_m);
    if total <= 1e-12 {
        return Err(RegError::DegenerateWindow {
            reason: "zero energy",
        });
    }

    let fft = Fft2::new(width, height);
    fft.forward(&mut cross);
    fft.forward(&mut spec_m);
    for (r, m) in cross.iter_mut().zip(&spec_m) {
        *r *= m.conj();
    }

    let whitened: Vec<Complex<f64>> = cross
        .iter()
        .map(|c| {
            let mag = c.norm();
            if mag > 1e-15 {
                c / mag
            } else {
                Complex::new(0.0, 0.0)
            }
        })
        .collect();
    let mut surface = whitened.clone();
    fft.inverse(&mut surface);
    fft.inverse(&mut cross);

    let mut peak = 0usize;
    let mut best = f64::NEG_INFINITY;
    for (idx, c) in surface.iter().enumerate() {
        if c.re > best {
            best = c.re;
            peak = idx;
        }
    }
    let sx = signed_shift(peak % width, width);
    let sy = signed_shift(peak / width, height);
    let (shift, score) = upsampled_peak(&whitened, width, height, sx, sy);

    let cc = cross[peak].norm();
    let error = (1.0 - cc * cc / total).abs().sqrt();
    Ok(PhaseEstimate {
        shift,
        score,
        error,
    })
}

/// Phase correlation of two equal-sized windows.
pub fn phase_cross_correlation(
    reference: ImageView<'_, f32>,
    moving: ImageView<'_, f32>,
) -> RegResult<PhaseEstimate> {
    correlate(reference, moving, Taper::Hann)
}

/// Phase correlation of inputs that wrap around both axes, without a taper.
pub(crate) fn periodic_phase_correlation(
    reference: ImageView<'_, f32>,
    moving: ImageView<'_, f32>,
) -> RegResult<PhaseEstimate> {
    correlate(reference, moving, Taper::None)
}

/// Phase correlation of `template` against the centered template-sized part of `search`.
pub(crate) fn phase_match(
    template: ImageView<'_, f32>,
    search: ImageView<'_, f32>,
) -> RegResult<MatchResult> {
    let (tw, th) = template.shape();
    let (sw, sh) = search.shape();
    if tw > sw || th > sh {
        return Err(RegError::ShapeMismatch {
            left: template.shape(),
            right: search.shape(),
        });
    }
    let x0 = (sw - tw) / 2;
    let y0 = (sh - th) / 2;
    let center = search.roi(x0, y0, tw, th)?;
    let estimate = phase_cross_correlation(center, template)?;
    let dx = estimate.shift.0 + x0 as f64 - (sw - tw) as f64 * 0.5;
    let dy = estimate.shift.1 + y0 as f64 - (sh - th) as f64 * 0.5;
    Ok(MatchResult::matched(dx, dy, estimate.score, None))
}
