//! Image views, owned rasters and the pixel-provider interface.
//!
//! `ImageView` is a borrowed 2D view into a 1D buffer with an explicit stride.
//! The stride counts elements between the starts of consecutive rows, so a
//! stride larger than the width represents padded rows. ROI slices are zero-copy
//! views into the same backing slice and retain the original stride.
//!
//! Registration works on `f32` pixels. `RasterSource` is the narrow interface
//! through which windows are read from whatever holds the pixels: an in-memory
//! `OwnedImage`, a borrowed view, or a raster resampled on the fly
//! (`warp::AffineWarpedSource`).

use crate::project::ImageId;
use crate::util::{RegError, RegResult};
use std::collections::HashMap;

#[cfg(feature = "image-io")]
pub mod io;
pub mod resample;
pub mod warp;

/// Borrowed 2D image view with an explicit stride.
#[derive(Copy, Clone, Debug)]
pub struct ImageView<'a, T> {
    data: &'a [T],
    width: usize,
    height: usize,
    stride: usize,
}

impl<'a, T> ImageView<'a, T> {
    /// Creates a contiguous view with `stride == width`.
    pub fn from_slice(data: &'a [T], width: usize, height: usize) -> RegResult<Self> {
        Self::new(data, width, height, width)
    }

    /// Creates a view with an explicit stride.
    pub fn new(data: &'a [T], width: usize, height: usize, stride: usize) -> RegResult<Self> {
        let needed = required_len(width, height, stride)?;
        if data.len() < needed {
            return Err(RegError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            stride,
        })
    }

    /// Returns the image width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the image height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the stride in elements between row starts.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Returns `(width, height)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Returns the backing slice including any row padding.
    pub fn as_slice(&self) -> &'a [T] {
        self.data
    }

    /// Returns the element at `(x, y)` if it is within bounds.
    pub fn get(&self, x: usize, y: usize) -> Option<&'a T> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = y.checked_mul(self.stride)?.checked_add(x)?;
        self.data.get(idx)
    }

    /// Returns a contiguous slice for row `y` with length `width`.
    pub fn row(&self, y: usize) -> Option<&'a [T]> {
        if y >= self.height {
            return None;
        }
        let start = y.checked_mul(self.stride)?;
        let end = start.checked_add(self.width)?;
        self.data.get(start..end)
    }

    /// Iterates rows top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &'a [T]> + '_ {
        (0..self.height).filter_map(move |y| self.row(y))
    }

    /// Returns a zero-copy ROI view into the same backing buffer.
    pub fn roi(&self, x: usize, y: usize, width: usize, height: usize) -> RegResult<ImageView<'a, T>> {
        if width == 0 || height == 0 {
            return Err(RegError::InvalidDimensions { width, height });
        }
        let out_of_bounds = RegError::RoiOutOfBounds {
            x,
            y,
            width,
            height,
            img_width: self.width,
            img_height: self.height,
        };
        let end_x = x.checked_add(width).ok_or_else(|| out_of_bounds.clone())?;
        let end_y = y.checked_add(height).ok_or_else(|| out_of_bounds.clone())?;
        if end_x > self.width || end_y > self.height {
            return Err(out_of_bounds);
        }

        let start = y * self.stride + x;
        let data = self.data.get(start..).ok_or(RegError::BufferTooSmall {
            needed: start.saturating_add(1),
            got: self.data.len(),
        })?;
        ImageView::new(data, width, height, self.stride)
    }
}

impl ImageView<'_, f32> {
    /// Copies the view into a contiguous owned image.
    pub fn to_owned_image(&self) -> OwnedImage {
        let mut data = Vec::with_capacity(self.width * self.height);
        for row in self.rows() {
            data.extend_from_slice(row);
        }
        OwnedImage {
            data,
            width: self.width,
            height: self.height,
        }
    }

    /// Returns true when every pixel is finite.
    pub fn all_finite(&self) -> bool {
        self.rows().all(|row| row.iter().all(|v| v.is_finite()))
    }
}

fn required_len(width: usize, height: usize, stride: usize) -> RegResult<usize> {
    if width == 0 || height == 0 {
        return Err(RegError::InvalidDimensions { width, height });
    }
    if stride < width {
        return Err(RegError::InvalidStride { width, stride });
    }
    (height - 1)
        .checked_mul(stride)
        .and_then(|v| v.checked_add(width))
        .ok_or(RegError::InvalidDimensions { width, height })
}

/// Owned contiguous `f32` raster.
#[derive(Clone, Debug, PartialEq)]
pub struct OwnedImage {
    data: Vec<f32>,
    width: usize,
    height: usize,
}

impl OwnedImage {
    /// Wraps a row-major buffer of exactly `width * height` pixels.
    pub fn new(data: Vec<f32>, width: usize, height: usize) -> RegResult<Self> {
        if width == 0 || height == 0 {
            return Err(RegError::InvalidDimensions { width, height });
        }
        let needed = width
            .checked_mul(height)
            .ok_or(RegError::InvalidDimensions { width, height })?;
        if data.len() < needed {
            return Err(RegError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        if data.len() > needed {
            return Err(RegError::InvalidDimensions { width, height });
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Builds an image by evaluating `f(x, y)` at every pixel.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> f32) -> RegResult<Self> {
        let mut data = Vec::with_capacity(width.saturating_mul(height));
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self::new(data, width, height)
    }

    /// Image filled with a single value.
    pub fn filled(width: usize, height: usize, value: f32) -> RegResult<Self> {
        Self::new(vec![value; width.saturating_mul(height)], width, height)
    }

    /// Converts 8-bit samples to `f32`.
    pub fn from_u8(data: &[u8], width: usize, height: usize) -> RegResult<Self> {
        Self::new(data.iter().map(|&v| v as f32).collect(), width, height)
    }

    /// Returns a borrowed view of the image.
    pub fn view(&self) -> ImageView<'_, f32> {
        ImageView {
            data: &self.data,
            width: self.width,
            height: self.height,
            stride: self.width,
        }
    }

    /// Returns the image width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the image height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns `(width, height)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Returns the row-major pixel buffer.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Returns the pixel at `(x, y)`.
    pub fn get(&self, x: usize, y: usize) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get(y * self.width + x).copied()
    }

    pub(crate) fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }
}

/// Inclusive pixel rectangle `[x0, x1] x [y0, y1]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelBounds {
    pub x0: usize,
    pub y0: usize,
    pub x1: usize,
    pub y1: usize,
}

impl PixelBounds {
    /// Number of columns covered.
    pub fn width(&self) -> usize {
        self.x1 - self.x0 + 1
    }

    /// Number of rows covered.
    pub fn height(&self) -> usize {
        self.y1 - self.y0 + 1
    }

    /// Intersects the rectangle with a `width x height` raster.
    pub fn clipped_to(&self, width: usize, height: usize) -> Option<PixelBounds> {
        if width == 0 || height == 0 || self.x0 >= width || self.y0 >= height {
            return None;
        }
        let x1 = self.x1.min(width - 1);
        let y1 = self.y1.min(height - 1);
        if self.x0 > x1 || self.y0 > y1 {
            return None;
        }
        Some(PixelBounds {
            x0: self.x0,
            y0: self.y0,
            x1,
            y1,
        })
    }
}

/// Provider of raster windows.
///
/// Implementations clip the request to their own extent; a request that does
/// not intersect the raster is an error.
pub trait RasterSource: Send + Sync {
    /// Raster width in pixels.
    fn width(&self) -> usize;

    /// Raster height in pixels.
    fn height(&self) -> usize;

    /// Value marking missing pixels, if the raster has one.
    fn no_data(&self) -> Option<f32> {
        None
    }

    /// Reads the pixels inside `bounds` (clipped to the raster) into an owned image.
    fn read_window(&self, bounds: PixelBounds) -> RegResult<OwnedImage>;
}

/// Copies the clipped `bounds` of a view.
pub(crate) fn copy_window(view: ImageView<'_, f32>, bounds: PixelBounds) -> RegResult<OwnedImage> {
    let clipped = bounds
        .clipped_to(view.width(), view.height())
        .ok_or(RegError::RoiOutOfBounds {
            x: bounds.x0,
            y: bounds.y0,
            width: bounds.width(),
            height: bounds.height(),
            img_width: view.width(),
            img_height: view.height(),
        })?;
    let sub = view.roi(clipped.x0, clipped.y0, clipped.width(), clipped.height())?;
    Ok(sub.to_owned_image())
}

impl RasterSource for OwnedImage {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn read_window(&self, bounds: PixelBounds) -> RegResult<OwnedImage> {
        copy_window(self.view(), bounds)
    }
}

impl RasterSource for ImageView<'_, f32> {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn read_window(&self, bounds: PixelBounds) -> RegResult<OwnedImage> {
        copy_window(*self, bounds)
    }
}

/// Raster with an explicit no-data marker.
#[derive(Clone, Debug)]
pub struct NoDataRaster<S> {
    inner: S,
    no_data: f32,
}

impl<S: RasterSource> NoDataRaster<S> {
    /// Tags `inner` with a no-data value.
    pub fn new(inner: S, no_data: f32) -> Self {
        Self { inner, no_data }
    }
}

impl<S: RasterSource> RasterSource for NoDataRaster<S> {
    fn width(&self) -> usize {
        self.inner.width()
    }

    fn height(&self) -> usize {
        self.inner.height()
    }

    fn no_data(&self) -> Option<f32> {
        Some(self.no_data)
    }

    fn read_window(&self, bounds: PixelBounds) -> RegResult<OwnedImage> {
        self.inner.read_window(bounds)
    }
}

/// Raster plus the identity used by the ground projector.
#[derive(Clone, Copy)]
pub struct ImageHandle<'a> {
    pub id: ImageId,
    pub raster: &'a dyn RasterSource,
}

impl<'a> ImageHandle<'a> {
    /// Pairs an image id with its pixels.
    pub fn new(id: ImageId, raster: &'a dyn RasterSource) -> Self {
        Self { id, raster }
    }
}

/// Resolves image ids to rasters for point registration.
pub trait ImageCatalog: Sync {
    /// Returns the raster for `id`, if the catalog has it.
    fn raster(&self, id: ImageId) -> Option<&dyn RasterSource>;
}

impl<S: RasterSource> ImageCatalog for HashMap<ImageId, S> {
    fn raster(&self, id: ImageId) -> Option<&dyn RasterSource> {
        self.get(&id).map(|s| s as &dyn RasterSource)
    }
}
