//! subreg locates the same surface point in overlapping images to sub-pixel
//! precision.
//!
//! The crate is organized leaf-first: boundary-safe windows ([`roi`]),
//! correlation kernels and window matchers ([`kernel`], [`matcher`]),
//! similarity and affine estimation ([`transform`]), point registration
//! between two rasters ([`subpixel`]), geometric orchestration through a
//! ground projector ([`geom`]) and multi-configuration consensus
//! ([`consensus`], [`register`]). Parallel sweeps are available through the
//! `rayon` feature and structured logging through the `tracing` feature.

pub mod consensus;
pub mod geom;
pub mod image;
pub mod kernel;
pub mod lowlevel;
pub mod matcher;
pub mod params;
pub mod project;
pub mod refine;
pub mod register;
pub mod roi;
mod spectral;
pub mod subpixel;
pub mod surface;
pub mod template;
mod trace;
pub mod transform;
pub mod util;

pub use consensus::{
    check_for_shift_consensus, decide, CandidateFit, CandidateMeasure, ConsensusDecision,
    RejectReason,
};
pub use geom::{geom_match, AttemptFailure, GeomConfig, GeomContext, GeomMatch, GeometryMode};
pub use image::{
    ImageCatalog, ImageHandle, ImageView, NoDataRaster, OwnedImage, PixelBounds, RasterSource,
};
pub use kernel::{match_template, Metric};
pub use matcher::{
    Ambiguity, AutoregTemplate, MatchResult, MatchStatus, MatcherKind, MutualInformationMatcher,
    PhaseMatcher, UpsampledTemplate, WindowMatcher,
};
pub use params::{default_sweep, ParameterSet};
pub use project::{AffineProjector, GroundPoint, GroundProjector, ImageId, ProjectionError};
pub use refine::SubpixelMethod;
pub use register::{
    simple_register_point, smart_register_point, ControlPoint, CostFunction, IgnoreRecord,
    Measure, MeasureSink, MeasureUpdate, MemorySink, PointReport, SimpleConfig, SmartConfig,
};
pub use roi::{Roi, Window};
pub use subpixel::{IterativePhase, Registration};
pub use surface::{Better, CorrelationSurface};
pub use transform::{Affine2, LogPolarConfig, Similarity};
pub use util::{RegError, RegResult};
