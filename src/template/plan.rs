//! Template plan precomputation for normalized correlation metrics.

use crate::image::ImageView;
use crate::util::{RegError, RegResult};

/// Precomputed statistics and buffers for template matching.
pub struct TemplatePlan {
    width: usize,
    height: usize,
    mean: f64,
    var_t: f64,
    sum_sq: f64,
    data: Vec<f32>,
}

impl TemplatePlan {
    /// Builds a plan from a template view.
    ///
    /// Fails with `NoData` on non-finite pixels and `DegenerateWindow` on a
    /// constant template.
    pub fn from_view(tpl: ImageView<'_, f32>) -> RegResult<Self> {
        let width = tpl.width();
        let height = tpl.height();
        let count = width
            .checked_mul(height)
            .ok_or(RegError::InvalidDimensions { width, height })?;

        let mut data = Vec::with_capacity(count);
        let mut sum = 0.0f64;
        let mut sum_sq = 0.0f64;
        for row in tpl.rows() {
            for &value in row {
                if !value.is_finite() {
                    return Err(RegError::NoData);
                }
                let v = value as f64;
                sum += v;
                sum_sq += v * v;
                data.push(value);
            }
        }

        let n = count as f64;
        let mean = sum / n;
        let variance = sum_sq / n - mean * mean;
        if variance <= 1e-8 {
            return Err(RegError::DegenerateWindow {
                reason: "zero variance",
            });
        }

        Ok(Self {
            width,
            height,
            mean,
            var_t: variance * n,
            sum_sq,
            data,
        })
    }

    /// Returns the template width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the template height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of template pixels.
    pub fn area(&self) -> usize {
        self.width * self.height
    }

    /// Returns the mean intensity of the template.
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sum of squared deviations from the mean.
    pub fn var_t(&self) -> f64 {
        self.var_t
    }

    /// Sum of squared intensities.
    pub fn sum_sq(&self) -> f64 {
        self.sum_sq
    }

    /// Template pixels in row-major order.
    pub fn data(&self) -> &[f32] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::TemplatePlan;
    use crate::image::ImageView;
    use crate::util::RegError;

    #[test]
    fn constant_template_is_degenerate() {
        let data = vec![7.0f32; 9];
        let view = ImageView::from_slice(&data, 3, 3).unwrap();
        assert_eq!(
            TemplatePlan::from_view(view).err(),
            Some(RegError::DegenerateWindow {
                reason: "zero variance"
            })
        );
    }

    #[test]
    fn statistics_match_definition() {
        let data = vec![1.0f32, 2.0, 3.0, 4.0];
        let plan = TemplatePlan::from_view(ImageView::from_slice(&data, 2, 2).unwrap()).unwrap();
        assert!((plan.mean() - 2.5).abs() < 1e-12);
        assert!((plan.var_t() - 5.0).abs() < 1e-12);
        assert!((plan.sum_sq() - 30.0).abs() < 1e-12);
    }
}
