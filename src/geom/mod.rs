//! Geometric match orchestration.
//!
//! A `GeomContext` projects a reference point into the moving image, builds
//! the reference-to-moving pixel transform and exposes the moving image
//! resampled into the reference frame. `run` then matches one window
//! configuration and maps the result back into moving-image pixels. Every
//! failure of an attempt is an `AttemptFailure` value.

use crate::image::warp::AffineWarpedSource;
use crate::image::{ImageHandle, RasterSource};
use crate::matcher::{Ambiguity, MatchStatus, MatcherKind, WindowMatcher};
use crate::params::ParameterSet;
use crate::project::{GroundProjector, ProjectionError};
use crate::subpixel::subpixel_template;
use crate::surface::CorrelationSurface;
use crate::trace::{trace_event, trace_span};
use crate::transform::{estimate_affine_transformation, Affine2, Similarity};
use crate::util::math::distance;
use crate::util::RegError;
use std::str::FromStr;
use thiserror::Error;

/// How the reference-to-moving transform is built.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum GeometryMode {
    /// Least-squares affine from projected window corners and center.
    #[default]
    ProjectedAffine,
    /// Pure translation onto the projected point.
    Translation,
    /// Supplied rotation and scale about the projected point.
    Supplied(Similarity),
}

impl FromStr for GeometryMode {
    type Err = RegError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "affine" | "projected_affine" => Ok(GeometryMode::ProjectedAffine),
            "translation" | "none" => Ok(GeometryMode::Translation),
            _ => Err(RegError::UnknownStrategy {
                kind: "geometry",
                name: s.to_string(),
            }),
        }
    }
}

/// Per-call orchestration settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeomConfig {
    pub mode: GeometryMode,
    pub matcher: MatcherKind,
    /// Half extents of the window whose corners feed the affine fit.
    pub affine_half: (usize, usize),
}

impl Default for GeomConfig {
    fn default() -> Self {
        Self {
            mode: GeometryMode::ProjectedAffine,
            matcher: MatcherKind::default(),
            affine_half: (60, 60),
        }
    }
}

/// Why one registration attempt produced no candidate.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum AttemptFailure {
    #[error("projection failed: {0}")]
    Projection(ProjectionError),
    #[error("precondition failed: {0}")]
    Precondition(RegError),
    #[error("ambiguous match: {0}")]
    Ambiguous(Ambiguity),
}

impl From<RegError> for AttemptFailure {
    fn from(err: RegError) -> Self {
        match err {
            RegError::Projection(err) => AttemptFailure::Projection(err),
            other => AttemptFailure::Precondition(other),
        }
    }
}

impl From<ProjectionError> for AttemptFailure {
    fn from(err: ProjectionError) -> Self {
        AttemptFailure::Projection(err)
    }
}

/// Successful attempt.
#[derive(Clone, Debug, PartialEq)]
pub struct GeomMatch {
    /// Matched moving-image x.
    pub sample: f64,
    /// Matched moving-image y.
    pub line: f64,
    /// Projected moving-image location before matching.
    pub initial: (f64, f64),
    /// Distance from `initial` to the match, moving-image pixels.
    pub distance: f64,
    /// Match location in the warped (reference-frame) moving raster.
    pub warped: (f64, f64),
    /// Match location minus the reference point, reference-frame pixels.
    pub shift: (f64, f64),
    pub score: f64,
    pub surface: Option<CorrelationSurface>,
}

/// Projection and transform shared by all attempts of one correspondence.
pub struct GeomContext<'a> {
    reference: ImageHandle<'a>,
    moving: ImageHandle<'a>,
    point: (f64, f64),
    initial: (f64, f64),
    warped: AffineWarpedSource<'a>,
}

impl<'a> GeomContext<'a> {
    /// Projects `point` of `reference` into `moving` and builds the transform.
    pub fn prepare(
        projector: &dyn GroundProjector,
        reference: ImageHandle<'a>,
        moving: ImageHandle<'a>,
        point: (f64, f64),
        cfg: &GeomConfig,
    ) -> Result<Self, AttemptFailure> {
        let initial = projector.image_to_image(reference.id, moving.id, point.0, point.1)?;
        let transform = match cfg.mode {
            GeometryMode::ProjectedAffine => estimate_affine_transformation(
                projector,
                reference,
                moving.id,
                point,
                cfg.affine_half.0,
                cfg.affine_half.1,
            )?,
            GeometryMode::Translation => {
                Affine2::translation(initial.0 - point.0, initial.1 - point.1)
            }
            GeometryMode::Supplied(similarity) => similarity.between(point, initial),
        };
        trace_event!(
            "geom_prepared",
            initial_x = initial.0,
            initial_y = initial.1,
            scale = transform.scale()
        );
        let warped = AffineWarpedSource::new(
            moving.raster,
            transform,
            reference.raster.width(),
            reference.raster.height(),
        );
        Ok(Self {
            reference,
            moving,
            point,
            initial,
            warped,
        })
    }

    /// Reference image.
    pub fn reference(&self) -> ImageHandle<'a> {
        self.reference
    }

    /// Moving image.
    pub fn moving(&self) -> ImageHandle<'a> {
        self.moving
    }

    /// Reference-image point being registered.
    pub fn point(&self) -> (f64, f64) {
        self.point
    }

    /// Projected location in the moving image.
    pub fn initial(&self) -> (f64, f64) {
        self.initial
    }

    /// Reference-to-moving pixel transform.
    pub fn transform(&self) -> &Affine2 {
        self.warped.map()
    }

    /// Moving raster resampled into the reference frame.
    pub fn warped(&self) -> &dyn RasterSource {
        &self.warped
    }

    /// Matches one window configuration.
    pub fn run(
        &self,
        matcher: &dyn WindowMatcher,
        parameters: &ParameterSet,
    ) -> Result<GeomMatch, AttemptFailure> {
        let _span = trace_span!(
            "geom_match",
            image = parameters.image_size().0,
            template = parameters.template_size().0
        )
        .entered();
        let reg = subpixel_template(
            self.reference.raster,
            &self.warped,
            self.point,
            self.point,
            parameters,
            matcher,
        );
        let warped = match (reg.status, reg.point) {
            (MatchStatus::Matched, Some(p)) => p,
            (MatchStatus::Ambiguous(reason), _) => return Err(AttemptFailure::Ambiguous(reason)),
            (MatchStatus::FailedPrecondition(err), _) => return Err(err.into()),
            (MatchStatus::Matched, None) => return Err(AttemptFailure::Precondition(RegError::NoData)),
        };
        let (sample, line) = self.transform().apply(warped.0, warped.1);
        let moved = distance((sample, line), self.initial);
        trace_event!(
            "geom_matched",
            sample = sample,
            line = line,
            distance = moved,
            score = reg.score
        );
        Ok(GeomMatch {
            sample,
            line,
            initial: self.initial,
            distance: moved,
            warped,
            shift: (warped.0 - self.point.0, warped.1 - self.point.1),
            score: reg.score,
            surface: reg.surface,
        })
    }
}

/// Prepares a context and matches one configuration with `cfg.matcher`.
pub fn geom_match(
    projector: &dyn GroundProjector,
    reference: ImageHandle<'_>,
    moving: ImageHandle<'_>,
    point: (f64, f64),
    parameters: &ParameterSet,
    cfg: &GeomConfig,
) -> Result<GeomMatch, AttemptFailure> {
    GeomContext::prepare(projector, reference, moving, point, cfg)?.run(&cfg.matcher, parameters)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_names_parse() {
        assert_eq!("affine".parse::<GeometryMode>().unwrap(), GeometryMode::ProjectedAffine);
        assert_eq!("Translation".parse::<GeometryMode>().unwrap(), GeometryMode::Translation);
        assert!("warp".parse::<GeometryMode>().is_err());
    }

    #[test]
    fn projection_errors_keep_their_kind() {
        let err = RegError::Projection(ProjectionError::Service("down".into()));
        assert!(matches!(AttemptFailure::from(err), AttemptFailure::Projection(_)));
        assert!(matches!(
            AttemptFailure::from(RegError::NoData),
            AttemptFailure::Precondition(RegError::NoData)
        ));
    }
}
