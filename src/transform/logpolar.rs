//! Rotation and scale recovery from log-polar magnitude spectra.
//!
//! A rotation of the image rotates its magnitude spectrum and a scale change
//! scales it radially; in log-polar coordinates both become translations,
//! which phase correlation recovers. The magnitude spectrum is symmetric under
//! a half turn, so only the first half of the angle axis is correlated and
//! rotations are reported in `(-90, 90]` degrees.

use crate::image::resample::{gaussian_blur, sample_bilinear};
use crate::image::{ImageView, OwnedImage};
use crate::matcher::periodic_phase_correlation;
use crate::spectral::{hann_window, shifted_magnitude, to_complex_weighted, Fft2};
use crate::trace::{trace_event, trace_span};
use crate::transform::Similarity;
use crate::util::math::fold_half_turn_deg;
use crate::util::{RegError, RegResult};

/// Band-pass settings for the log-polar estimator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LogPolarConfig {
    /// Sigma of the fine Gaussian of the difference-of-Gaussians filter.
    pub low_sigma: f64,
    /// Sigma of the coarse Gaussian of the difference-of-Gaussians filter.
    pub high_sigma: f64,
}

impl Default for LogPolarConfig {
    fn default() -> Self {
        Self {
            low_sigma: 0.5,
            high_sigma: 30.0,
        }
    }
}

/// Difference of Gaussians, `blur(low) - blur(high)`.
fn band_pass(view: ImageView<'_, f32>, cfg: &LogPolarConfig) -> RegResult<OwnedImage> {
    let fine = gaussian_blur(view, cfg.low_sigma)?;
    let coarse = gaussian_blur(view, cfg.high_sigma)?;
    let data = fine
        .data()
        .iter()
        .zip(coarse.data())
        .map(|(f, c)| f - c)
        .collect();
    OwnedImage::new(data, view.width(), view.height())
}

/// Centered magnitude spectrum of the band-passed, Hann-windowed view.
fn magnitude_spectrum(view: ImageView<'_, f32>, cfg: &LogPolarConfig) -> RegResult<OwnedImage> {
    let (width, height) = view.shape();
    let filtered = band_pass(view, cfg)?;
    let wx = hann_window(width);
    let wy = hann_window(height);
    let mut spectrum = to_complex_weighted(filtered.view(), |x, y| wx[x] * wy[y]);
    Fft2::new(width, height).forward(&mut spectrum);
    let magnitude = shifted_magnitude(&spectrum, width, height);
    OwnedImage::new(
        magnitude.into_iter().map(|v| v as f32).collect(),
        width,
        height,
    )
}

/// Log-polar geometry shared by both spectra.
struct LogPolarGrid {
    rows: usize,
    cols: usize,
    k_radius: f64,
}

impl LogPolarGrid {
    fn new(size: usize) -> RegResult<Self> {
        let radius = size as f64 / 4.0;
        if radius <= 1.0 {
            return Err(RegError::InvalidInput("log-polar estimation needs at least 8x8 pixels"));
        }
        Ok(Self {
            rows: size,
            cols: size,
            k_radius: size as f64 / radius.ln(),
        })
    }

    /// Resamples the first half turn of a centered spectrum.
    fn remap_half(&self, spectrum: &OwnedImage) -> RegResult<OwnedImage> {
        let view = spectrum.view();
        let cx = (spectrum.width() / 2) as f64;
        let cy = (spectrum.height() / 2) as f64;
        let rows = self.rows / 2;
        OwnedImage::from_fn(self.cols, rows, |col, row| {
            let angle = 2.0 * std::f64::consts::PI * row as f64 / self.rows as f64;
            let r = (col as f64 / self.k_radius).exp();
            let (sin, cos) = angle.sin_cos();
            sample_bilinear(&view, cx + r * cos, cy + r * sin)
        })
    }
}

/// Central square of side `min(width, height)`.
fn central_square(view: ImageView<'_, f32>) -> RegResult<ImageView<'_, f32>> {
    let side = view.width().min(view.height());
    view.roi(
        (view.width() - side) / 2,
        (view.height() - side) / 2,
        side,
        side,
    )
}

/// Estimates the similarity that maps `reference` onto `moving`.
///
/// The result satisfies `moving(q) ≈ reference(M⁻¹ q)` with `M` the rotation
/// and scale about the image center. Non-square inputs are cropped to their
/// central square.
pub fn estimate_logpolar_transform(
    reference: ImageView<'_, f32>,
    moving: ImageView<'_, f32>,
    cfg: &LogPolarConfig,
) -> RegResult<Similarity> {
    if reference.shape() != moving.shape() {
        return Err(RegError::ShapeMismatch {
            left: reference.shape(),
            right: moving.shape(),
        });
    }
    if !reference.all_finite() || !moving.all_finite() {
        return Err(RegError::NoData);
    }
    let reference = central_square(reference)?;
    let moving = central_square(moving)?;
    let size = reference.width();
    let _span = trace_span!("logpolar_estimate", size = size).entered();

    let grid = LogPolarGrid::new(size)?;
    let ref_polar = grid.remap_half(&magnitude_spectrum(reference, cfg)?)?;
    let mov_polar = grid.remap_half(&magnitude_spectrum(moving, cfg)?)?;
    let estimate = periodic_phase_correlation(ref_polar.view(), mov_polar.view())?;

    let (shift_col, shift_row) = estimate.shift;
    let rotation = fold_half_turn_deg(-(360.0 / grid.rows as f64) * shift_row);
    let scale = (shift_col / grid.k_radius).exp();
    trace_event!(
        "logpolar_result",
        rotation_deg = rotation,
        scale = scale,
        score = estimate.score
    );
    Ok(Similarity::new(rotation, scale))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_mismatch_is_rejected() {
        let a = OwnedImage::filled(32, 32, 1.0).unwrap();
        let b = OwnedImage::filled(32, 30, 1.0).unwrap();
        let err = estimate_logpolar_transform(a.view(), b.view(), &LogPolarConfig::default());
        assert!(matches!(err, Err(RegError::ShapeMismatch { .. })));
    }
}
