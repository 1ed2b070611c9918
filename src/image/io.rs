//! Convenience helpers for loading rasters via the `image` crate.
//!
//! Available when the `image-io` feature is enabled.

use crate::image::OwnedImage;
use crate::util::{RegError, RegResult};
use std::path::Path;

/// Creates an owned `f32` raster from an 8-bit grayscale buffer.
pub fn owned_from_gray_image(img: &image::GrayImage) -> RegResult<OwnedImage> {
    let width = img.width() as usize;
    let height = img.height() as usize;
    OwnedImage::from_u8(img.as_raw(), width, height)
}

/// Creates an owned `f32` raster from a 16-bit grayscale buffer.
pub fn owned_from_gray16_image(
    img: &image::ImageBuffer<image::Luma<u16>, Vec<u16>>,
) -> RegResult<OwnedImage> {
    let width = img.width() as usize;
    let height = img.height() as usize;
    OwnedImage::new(img.as_raw().iter().map(|&v| v as f32).collect(), width, height)
}

/// Creates an owned `f32` raster from a dynamic image.
///
/// 32-bit float images keep their values; 16-bit images keep their full range;
/// everything else is converted to 8-bit luma first.
pub fn owned_from_dynamic_image(img: &image::DynamicImage) -> RegResult<OwnedImage> {
    match img {
        image::DynamicImage::ImageLuma16(gray) => owned_from_gray16_image(gray),
        image::DynamicImage::ImageRgb32F(_) | image::DynamicImage::ImageRgba32F(_) => {
            let luma = img.to_luma32f();
            let width = luma.width() as usize;
            let height = luma.height() as usize;
            OwnedImage::new(luma.into_raw(), width, height)
        }
        _ => owned_from_gray_image(&img.to_luma8()),
    }
}

/// Loads an image from disk as a single-band `f32` raster.
pub fn load_gray_image<P: AsRef<Path>>(path: P) -> RegResult<OwnedImage> {
    let img = image::open(path).map_err(|err| RegError::ImageIo {
        reason: err.to_string(),
    })?;
    owned_from_dynamic_image(&img)
}
