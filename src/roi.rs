//! Boundary-safe windows around fractional centers.
//!
//! A `Roi` remembers a center and half extents; `clip` reads the realized
//! window. The integer center is the truncated center and the fractional part
//! is kept as the sub-pixel residual. A side that would leave the raster is
//! truncated: the window shrinks, it never shifts.

use crate::image::{ImageView, OwnedImage, PixelBounds, RasterSource};
use crate::util::math::mean_variance;
use crate::util::{RegError, RegResult};

/// Window request around `(x, y)` with half extents `(size_x, size_y)`.
#[derive(Clone, Copy)]
pub struct Roi<'a> {
    source: &'a dyn RasterSource,
    x: f64,
    y: f64,
    size_x: usize,
    size_y: usize,
    bounds: PixelBounds,
}

impl<'a> Roi<'a> {
    /// Creates a window request; fails when the window misses the raster entirely.
    pub fn new(
        source: &'a dyn RasterSource,
        x: f64,
        y: f64,
        size_x: usize,
        size_y: usize,
    ) -> RegResult<Self> {
        let out_of_bounds = RegError::WindowOutOfBounds {
            x,
            y,
            img_width: source.width(),
            img_height: source.height(),
        };
        if !x.is_finite() || !y.is_finite() {
            return Err(out_of_bounds);
        }
        let bounds = window_bounds(x, y, size_x, size_y, source.width(), source.height())
            .ok_or(out_of_bounds)?;
        Ok(Self {
            source,
            x,
            y,
            size_x,
            size_y,
            bounds,
        })
    }

    /// Requested center x.
    pub fn x(&self) -> f64 {
        self.x
    }

    /// Requested center y.
    pub fn y(&self) -> f64 {
        self.y
    }

    /// Requested half extents.
    pub fn half_extents(&self) -> (usize, usize) {
        (self.size_x, self.size_y)
    }

    /// Integer (truncated) center.
    pub fn center_pixel(&self) -> (i64, i64) {
        (self.x.trunc() as i64, self.y.trunc() as i64)
    }

    /// Fractional part of the center left over after truncation.
    pub fn residual(&self) -> (f64, f64) {
        (self.x.fract(), self.y.fract())
    }

    /// Realized inclusive pixel bounds.
    pub fn bounds(&self) -> PixelBounds {
        self.bounds
    }

    /// True when at least one side was truncated by the raster edge.
    pub fn is_clipped(&self) -> bool {
        let (cx, cy) = self.center_pixel();
        self.bounds.width() != 2 * self.size_x + 1
            || self.bounds.height() != 2 * self.size_y + 1
            || cx < 0
            || cy < 0
    }

    /// Reads the realized window.
    pub fn clip(&self) -> RegResult<Window> {
        let data = self.source.read_window(self.bounds)?;
        if data.shape() != (self.bounds.width(), self.bounds.height()) {
            return Err(RegError::ShapeMismatch {
                left: data.shape(),
                right: (self.bounds.width(), self.bounds.height()),
            });
        }
        Ok(Window {
            data,
            bounds: self.bounds,
            no_data: self.source.no_data(),
        })
    }
}

fn window_bounds(
    x: f64,
    y: f64,
    size_x: usize,
    size_y: usize,
    width: usize,
    height: usize,
) -> Option<PixelBounds> {
    if width == 0 || height == 0 {
        return None;
    }
    let cx = x.trunc() as i64;
    let cy = y.trunc() as i64;
    let x0 = (cx - size_x as i64).max(0);
    let y0 = (cy - size_y as i64).max(0);
    let x1 = (cx + size_x as i64).min(width as i64 - 1);
    let y1 = (cy + size_y as i64).min(height as i64 - 1);
    if x0 > x1 || y0 > y1 {
        return None;
    }
    Some(PixelBounds {
        x0: x0 as usize,
        y0: y0 as usize,
        x1: x1 as usize,
        y1: y1 as usize,
    })
}

/// Pixels of a realized window plus its placement in the source raster.
#[derive(Clone, Debug)]
pub struct Window {
    data: OwnedImage,
    bounds: PixelBounds,
    no_data: Option<f32>,
}

impl Window {
    /// Pixel view of the window.
    pub fn view(&self) -> ImageView<'_, f32> {
        self.data.view()
    }

    /// Owned pixels.
    pub fn image(&self) -> &OwnedImage {
        &self.data
    }

    /// Realized bounds in source pixels.
    pub fn bounds(&self) -> PixelBounds {
        self.bounds
    }

    /// `(width, height)` of the window.
    pub fn shape(&self) -> (usize, usize) {
        self.data.shape()
    }

    /// Source-pixel coordinate of the window's geometric center.
    pub fn geometric_center(&self) -> (f64, f64) {
        (
            self.bounds.x0 as f64 + (self.bounds.width() as f64 - 1.0) * 0.5,
            self.bounds.y0 as f64 + (self.bounds.height() as f64 - 1.0) * 0.5,
        )
    }

    /// False when any pixel is non-finite or equals the raster's no-data value.
    pub fn is_valid(&self) -> bool {
        self.data
            .data()
            .iter()
            .all(|&v| v.is_finite() && Some(v) != self.no_data)
    }

    /// Population variance of the window.
    pub fn variance(&self) -> f64 {
        mean_variance(self.data.data().iter().copied()).1
    }

    /// Fails unless the window is valid and has non-zero variance.
    pub fn ensure_matchable(&self) -> RegResult<()> {
        if !self.is_valid() {
            return Err(RegError::NoData);
        }
        if self.variance() <= 1e-12 {
            return Err(RegError::DegenerateWindow {
                reason: "zero variance",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn residual_keeps_fraction() {
        let img = OwnedImage::filled(50, 50, 0.0).unwrap();
        let roi = Roi::new(&img, 20.75, 10.25, 3, 3).unwrap();
        assert_eq!(roi.center_pixel(), (20, 10));
        let (rx, ry) = roi.residual();
        assert!((rx - 0.75).abs() < 1e-12 && (ry - 0.25).abs() < 1e-12);
        assert!(!roi.is_clipped());
    }

    #[test]
    fn window_outside_raster_is_an_error() {
        let img = OwnedImage::filled(10, 10, 0.0).unwrap();
        assert!(Roi::new(&img, 40.0, 5.0, 3, 3).is_err());
        assert!(Roi::new(&img, f64::NAN, 5.0, 3, 3).is_err());
    }
}
