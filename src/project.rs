//! Ground projection interface.
//!
//! Sensor models live outside this crate. Registration only needs to send a
//! pixel of one image to the ground and back into another image, which is what
//! `GroundProjector` exposes. `AffineProjector` is a small in-crate
//! implementation where every image carries an affine pixel-to-ground model.

use crate::transform::Affine2;
use crate::util::{RegError, RegResult};
use std::collections::HashMap;
use thiserror::Error;

/// Identifier of an image known to the projector and the image catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(pub u64);

impl std::fmt::Display for ImageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A ground coordinate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GroundPoint {
    pub lon: f64,
    pub lat: f64,
}

/// Reasons a projection can fail.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ProjectionError {
    /// The pixel does not intersect the body.
    #[error("pixel ({x}, {y}) of image {image} does not project to the ground")]
    OffBody { image: ImageId, x: f64, y: f64 },
    /// The ground point falls outside the image.
    #[error("ground point ({lon}, {lat}) does not project into image {image}")]
    NotInImage { image: ImageId, lon: f64, lat: f64 },
    /// The projector has no model for the image.
    #[error("no camera model for image {0}")]
    UnknownImage(ImageId),
    /// The external service reported an error.
    #[error("projection service failed: {0}")]
    Service(String),
}

/// Pixel <-> ground projection service.
pub trait GroundProjector: Sync {
    /// Projects pixel `(x, y)` of `image` to the ground.
    fn to_ground(&self, image: ImageId, x: f64, y: f64) -> Result<GroundPoint, ProjectionError>;

    /// Projects a ground point into `image` pixel coordinates.
    fn to_image(&self, image: ImageId, ground: GroundPoint) -> Result<(f64, f64), ProjectionError>;

    /// Projects pixel `(x, y)` of `from` into `to` through the ground.
    fn image_to_image(
        &self,
        from: ImageId,
        to: ImageId,
        x: f64,
        y: f64,
    ) -> Result<(f64, f64), ProjectionError> {
        let ground = self.to_ground(from, x, y)?;
        self.to_image(to, ground)
    }
}

#[derive(Clone, Debug)]
struct ImageModel {
    pixel_to_ground: Affine2,
    ground_to_pixel: Affine2,
    extent: Option<(usize, usize)>,
}

/// Projector backed by one affine pixel-to-ground model per image.
#[derive(Clone, Debug, Default)]
pub struct AffineProjector {
    models: HashMap<ImageId, ImageModel>,
}

impl AffineProjector {
    /// Creates an empty projector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `image` with an unbounded pixel-to-ground model.
    pub fn insert(&mut self, image: ImageId, pixel_to_ground: Affine2) -> RegResult<&mut Self> {
        self.insert_model(image, pixel_to_ground, None)
    }

    /// Registers `image`; ground points landing outside `width x height` fail to project.
    pub fn insert_bounded(
        &mut self,
        image: ImageId,
        pixel_to_ground: Affine2,
        width: usize,
        height: usize,
    ) -> RegResult<&mut Self> {
        self.insert_model(image, pixel_to_ground, Some((width, height)))
    }

    fn insert_model(
        &mut self,
        image: ImageId,
        pixel_to_ground: Affine2,
        extent: Option<(usize, usize)>,
    ) -> RegResult<&mut Self> {
        let ground_to_pixel = pixel_to_ground
            .inverse()
            .ok_or(RegError::DegenerateGeometry {
                reason: "pixel-to-ground model is singular",
            })?;
        self.models.insert(
            image,
            ImageModel {
                pixel_to_ground,
                ground_to_pixel,
                extent,
            },
        );
        Ok(self)
    }

    fn model(&self, image: ImageId) -> Result<&ImageModel, ProjectionError> {
        self.models
            .get(&image)
            .ok_or(ProjectionError::UnknownImage(image))
    }
}

impl GroundProjector for AffineProjector {
    fn to_ground(&self, image: ImageId, x: f64, y: f64) -> Result<GroundPoint, ProjectionError> {
        let model = self.model(image)?;
        let (lon, lat) = model.pixel_to_ground.apply(x, y);
        if !lon.is_finite() || !lat.is_finite() {
            return Err(ProjectionError::OffBody { image, x, y });
        }
        Ok(GroundPoint { lon, lat })
    }

    fn to_image(&self, image: ImageId, ground: GroundPoint) -> Result<(f64, f64), ProjectionError> {
        let model = self.model(image)?;
        let (x, y) = model.ground_to_pixel.apply(ground.lon, ground.lat);
        if let Some((width, height)) = model.extent {
            let inside = x >= 0.0 && y >= 0.0 && x <= (width - 1) as f64 && y <= (height - 1) as f64;
            if !inside {
                return Err(ProjectionError::NotInImage {
                    image,
                    lon: ground.lon,
                    lat: ground.lat,
                });
            }
        }
        Ok((x, y))
    }
}
