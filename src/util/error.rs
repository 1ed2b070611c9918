//! Error types for subreg.

use crate::project::ProjectionError;
use thiserror::Error;

/// Result alias for subreg operations.
pub type RegResult<T> = std::result::Result<T, RegError>;

/// Errors that can occur while extracting windows, matching or estimating transforms.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum RegError {
    /// The input data or parameters are invalid.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// Width or height is zero, or their product overflows.
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },
    /// Row stride is smaller than the row width.
    #[error("invalid stride {stride} for width {width}")]
    InvalidStride { width: usize, stride: usize },
    /// Backing buffer is shorter than the view requires.
    #[error("buffer too small: needed {needed}, got {got}")]
    BufferTooSmall { needed: usize, got: usize },
    /// A rectangular sub-view does not fit inside its parent.
    #[error("roi {width}x{height} at ({x}, {y}) exceeds {img_width}x{img_height} image")]
    RoiOutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
        img_width: usize,
        img_height: usize,
    },
    /// A window centered at `(x, y)` does not intersect (or must lie inside) the raster.
    #[error("window centered at ({x}, {y}) is outside the {img_width}x{img_height} raster")]
    WindowOutOfBounds {
        x: f64,
        y: f64,
        img_width: usize,
        img_height: usize,
    },
    /// The window contains no-data or non-finite pixels.
    #[error("window contains no-data or non-finite pixels")]
    NoData,
    /// The window cannot be matched (for example zero variance).
    #[error("degenerate window: {reason}")]
    DegenerateWindow { reason: &'static str },
    /// Two windows that must share a shape do not.
    #[error("window shapes differ: {left:?} vs {right:?}")]
    ShapeMismatch {
        left: (usize, usize),
        right: (usize, usize),
    },
    /// Too few correspondences survived projection to fit a transform.
    #[error("found {found} projectable correspondences, need at least {required}")]
    InsufficientCorrespondences { found: usize, required: usize },
    /// Correspondences do not constrain the transform (for example collinear points).
    #[error("degenerate geometry: {reason}")]
    DegenerateGeometry { reason: &'static str },
    /// The ground projection service failed.
    #[error(transparent)]
    Projection(#[from] ProjectionError),
    /// A strategy name did not match any known variant.
    #[error("unknown {kind} `{name}`")]
    UnknownStrategy { kind: &'static str, name: String },
    /// Every parameter set failed for a correspondence expected to succeed.
    #[error("all {attempts} parameter sets failed for measure {measure_id}")]
    AllAttemptsFailed { measure_id: u64, attempts: usize },
    /// The image catalog has no raster for a measure.
    #[error("no raster available for image {image}")]
    MissingImage { image: u64 },
    /// The persistence sink rejected a batch.
    #[error("measure sink error: {reason}")]
    Sink { reason: String },
    /// Errors from the optional image loading helpers.
    #[error("image io error: {reason}")]
    ImageIo { reason: String },
}

impl RegError {
    /// Returns true for failures caused by the data handed to a matcher.
    ///
    /// These are never retried; the attempt is reported as failed-precondition.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            RegError::NoData
                | RegError::DegenerateWindow { .. }
                | RegError::ShapeMismatch { .. }
                | RegError::WindowOutOfBounds { .. }
                | RegError::RoiOutOfBounds { .. }
                | RegError::InsufficientCorrespondences { .. }
                | RegError::DegenerateGeometry { .. }
        )
    }
}
