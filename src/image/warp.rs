//! Rasters resampled through an affine pixel mapping.
//!
//! `AffineWarpedSource` presents a source raster in another image's pixel
//! frame without materializing the whole warp: each `read_window` maps the
//! requested window into the source, reads the covering source window once and
//! interpolates. Output pixels that map outside the source, or whose taps touch
//! no-data, are NaN.

use crate::image::resample::{sample, Interpolation};
use crate::image::{ImageView, OwnedImage, PixelBounds, RasterSource};
use crate::transform::Affine2;
use crate::util::{RegError, RegResult};

/// Interpolation taps reach this many pixels beyond the sample position.
const TAP_MARGIN: f64 = 2.0;

/// A source raster seen through `map`, which sends output pixels to source pixels.
pub struct AffineWarpedSource<'a> {
    source: &'a dyn RasterSource,
    map: Affine2,
    width: usize,
    height: usize,
    interpolation: Interpolation,
}

impl<'a> AffineWarpedSource<'a> {
    /// Wraps `source` as a `width x height` raster whose pixel `p` is `source(map(p))`.
    pub fn new(source: &'a dyn RasterSource, map: Affine2, width: usize, height: usize) -> Self {
        Self {
            source,
            map,
            width,
            height,
            interpolation: Interpolation::Bicubic,
        }
    }

    /// Overrides the interpolation kernel (bicubic by default).
    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    /// Output-to-source pixel mapping.
    pub fn map(&self) -> &Affine2 {
        &self.map
    }

    fn source_footprint(&self, bounds: PixelBounds) -> Option<PixelBounds> {
        let corners = [
            self.map.apply(bounds.x0 as f64, bounds.y0 as f64),
            self.map.apply(bounds.x1 as f64, bounds.y0 as f64),
            self.map.apply(bounds.x0 as f64, bounds.y1 as f64),
            self.map.apply(bounds.x1 as f64, bounds.y1 as f64),
        ];
        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for (x, y) in corners {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        let src_w = self.source.width() as f64;
        let src_h = self.source.height() as f64;
        if !(min_x.is_finite() && min_y.is_finite() && max_x.is_finite() && max_y.is_finite()) {
            return None;
        }
        let x0 = (min_x.floor() - TAP_MARGIN).max(0.0);
        let y0 = (min_y.floor() - TAP_MARGIN).max(0.0);
        let x1 = (max_x.ceil() + TAP_MARGIN).min(src_w - 1.0);
        let y1 = (max_y.ceil() + TAP_MARGIN).min(src_h - 1.0);
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
}

impl RasterSource for AffineWarpedSource<'_> {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn read_window(&self, bounds: PixelBounds) -> RegResult<OwnedImage> {
        let bounds = bounds
            .clipped_to(self.width, self.height)
            .ok_or(RegError::RoiOutOfBounds {
                x: bounds.x0,
                y: bounds.y0,
                width: bounds.width(),
                height: bounds.height(),
                img_width: self.width,
                img_height: self.height,
            })?;

        let Some(footprint) = self.source_footprint(bounds) else {
            return OwnedImage::filled(bounds.width(), bounds.height(), f32::NAN);
        };
        let mut local = self.source.read_window(footprint)?;
        if let Some(ndv) = self.source.no_data() {
            for v in local.data_mut() {
                if *v == ndv {
                    *v = f32::NAN;
                }
            }
        }

        let max_x = (self.source.width() - 1) as f64;
        let max_y = (self.source.height() - 1) as f64;
        let ox = footprint.x0 as f64;
        let oy = footprint.y0 as f64;
        let local_view = local.view();
        OwnedImage::from_fn(bounds.width(), bounds.height(), |i, j| {
            let (sx, sy) = self.map.apply((bounds.x0 + i) as f64, (bounds.y0 + j) as f64);
            if !(0.0..=max_x).contains(&sx) || !(0.0..=max_y).contains(&sy) {
                return f32::NAN;
            }
            sample(&local_view, sx - ox, sy - oy, self.interpolation)
        })
    }
}

/// Warps a whole view into a `width x height` output.
///
/// `map` sends output pixels to input pixels; samples outside the input are
/// set to `fill`.
pub fn warp_image(
    view: ImageView<'_, f32>,
    map: &Affine2,
    width: usize,
    height: usize,
    interpolation: Interpolation,
    fill: f32,
) -> RegResult<OwnedImage> {
    let max_x = (view.width() - 1) as f64;
    let max_y = (view.height() - 1) as f64;
    OwnedImage::from_fn(width, height, |x, y| {
        let (sx, sy) = map.apply(x as f64, y as f64);
        if !(0.0..=max_x).contains(&sx) || !(0.0..=max_y).contains(&sy) {
            return fill;
        }
        sample(&view, sx, sy, interpolation)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translation_warp_reads_shifted_pixels() {
        let img = OwnedImage::from_fn(20, 20, |x, y| (x * 2 + y * 7) as f32).unwrap();
        let warped = AffineWarpedSource::new(&img, Affine2::translation(3.0, -2.0), 20, 20);
        let window = warped
            .read_window(PixelBounds { x0: 4, y0: 6, x1: 8, y1: 9 })
            .unwrap();
        assert_eq!(window.shape(), (5, 4));
        assert!((window.get(0, 0).unwrap() - img.get(7, 4).unwrap()).abs() < 1e-3);
        assert!((window.get(4, 3).unwrap() - img.get(11, 7).unwrap()).abs() < 1e-3);
    }

    #[test]
    fn pixels_outside_source_are_nan() {
        let img = OwnedImage::filled(10, 10, 1.0).unwrap();
        let warped = AffineWarpedSource::new(&img, Affine2::translation(8.0, 0.0), 10, 10);
        let window = warped
            .read_window(PixelBounds { x0: 0, y0: 0, x1: 3, y1: 0 })
            .unwrap();
        assert!(window.get(0, 0).unwrap().is_finite());
        assert!(window.get(3, 0).unwrap().is_nan());
    }
}
