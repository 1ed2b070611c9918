//! Window matchers: template/search pair in, sub-pixel offset out.
//!
//! Every matcher reports the offset of the template center relative to the
//! search window's geometric center, in base-resolution pixels of the search
//! window, together with a quality score and the tri-state outcome.

pub mod mutual_info;
pub mod naive;
pub mod phase;

use crate::image::ImageView;
use crate::kernel::Metric;
use crate::refine::SubpixelMethod;
use crate::subpixel::IterativePhase;
use crate::surface::CorrelationSurface;
use crate::util::{RegError, RegResult};
use std::fmt;
use std::str::FromStr;

pub use mutual_info::{mutual_information, mutual_information_match};
pub use naive::{pattern_match, pattern_match_autoreg};
pub(crate) use phase::periodic_phase_correlation;
pub use phase::{phase_cross_correlation, PhaseEstimate};

/// Why a match produced no usable offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ambiguity {
    /// The best score lies on the outer edge of the surface.
    ExtremumOnEdge,
    /// The refinement neighborhood does not fit inside the surface.
    RefinementOutOfBounds,
    /// The iterative estimate drifted beyond the allowed distance.
    Diverged,
    /// The iterative window shrank below one pixel before converging.
    WindowExhausted,
}

impl fmt::Display for Ambiguity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Ambiguity::ExtremumOnEdge => "extremum on the edge of the correlation surface",
            Ambiguity::RefinementOutOfBounds => "refinement neighborhood leaves the surface",
            Ambiguity::Diverged => "iterative estimate diverged",
            Ambiguity::WindowExhausted => "iterative window exhausted before convergence",
        };
        f.write_str(text)
    }
}

/// Outcome of one match.
#[derive(Clone, Debug, PartialEq)]
pub enum MatchStatus {
    Matched,
    Ambiguous(Ambiguity),
    FailedPrecondition(RegError),
}

/// Offset, score and outcome of one match.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchResult {
    /// Template center x relative to the search-window center.
    pub dx: f64,
    /// Template center y relative to the search-window center.
    pub dy: f64,
    /// Score at the best placement, in the metric's own units.
    pub score: f64,
    pub surface: Option<CorrelationSurface>,
    pub status: MatchStatus,
}

impl MatchResult {
    pub fn matched(dx: f64, dy: f64, score: f64, surface: Option<CorrelationSurface>) -> Self {
        Self {
            dx,
            dy,
            score,
            surface,
            status: MatchStatus::Matched,
        }
    }

    pub fn ambiguous(reason: Ambiguity, score: f64, surface: Option<CorrelationSurface>) -> Self {
        Self {
            dx: f64::NAN,
            dy: f64::NAN,
            score,
            surface,
            status: MatchStatus::Ambiguous(reason),
        }
    }

    pub fn failed(err: RegError) -> Self {
        Self {
            dx: f64::NAN,
            dy: f64::NAN,
            score: f64::NAN,
            surface: None,
            status: MatchStatus::FailedPrecondition(err),
        }
    }

    /// Lifts a precondition error into a failed result.
    pub fn from_result(result: RegResult<MatchResult>) -> Self {
        result.unwrap_or_else(Self::failed)
    }

    /// True for a usable offset.
    pub fn is_matched(&self) -> bool {
        self.status == MatchStatus::Matched
    }

    /// Offset when matched.
    pub fn offset(&self) -> Option<(f64, f64)> {
        self.is_matched().then_some((self.dx, self.dy))
    }
}

/// Offset of a template placed with its top-left corner at `(x, y)` of the
/// search window, relative to the search-window center.
#[inline]
pub(crate) fn centered_offset(
    x: f64,
    y: f64,
    template: (usize, usize),
    search: (usize, usize),
) -> (f64, f64) {
    (
        x - (search.0 as f64 - template.0 as f64) * 0.5,
        y - (search.1 as f64 - template.1 as f64) * 0.5,
    )
}

/// Capability shared by every matcher strategy.
pub trait WindowMatcher: Sync {
    /// Locates `template` inside `search`.
    fn match_windows(&self, template: ImageView<'_, f32>, search: ImageView<'_, f32>)
        -> MatchResult;
}

/// Native-resolution correlation with local-surface refinement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AutoregTemplate {
    pub metric: Metric,
    pub radius: usize,
    pub method: SubpixelMethod,
}

impl Default for AutoregTemplate {
    fn default() -> Self {
        Self {
            metric: Metric::CcoeffNormed,
            radius: 2,
            method: SubpixelMethod::CenterOfMass,
        }
    }
}

impl WindowMatcher for AutoregTemplate {
    fn match_windows(
        &self,
        template: ImageView<'_, f32>,
        search: ImageView<'_, f32>,
    ) -> MatchResult {
        MatchResult::from_result(pattern_match_autoreg(template, search, self))
    }
}

/// Correlation on bicubically upsampled windows.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UpsampledTemplate {
    pub upsampling: usize,
    pub metric: Metric,
}

impl Default for UpsampledTemplate {
    fn default() -> Self {
        Self {
            upsampling: 4,
            metric: Metric::CcoeffNormed,
        }
    }
}

impl WindowMatcher for UpsampledTemplate {
    fn match_windows(
        &self,
        template: ImageView<'_, f32>,
        search: ImageView<'_, f32>,
    ) -> MatchResult {
        MatchResult::from_result(pattern_match(template, search, self))
    }
}

/// Exhaustive mutual-information search.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MutualInformationMatcher {
    pub bins: usize,
    pub radius: usize,
    pub max_scaler: f64,
}

impl Default for MutualInformationMatcher {
    fn default() -> Self {
        Self {
            bins: 100,
            radius: 2,
            max_scaler: 0.2,
        }
    }
}

impl WindowMatcher for MutualInformationMatcher {
    fn match_windows(
        &self,
        template: ImageView<'_, f32>,
        search: ImageView<'_, f32>,
    ) -> MatchResult {
        MatchResult::from_result(mutual_information_match(template, search, self))
    }
}

/// Single-shot phase correlation on the central template-sized part of the search window.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PhaseMatcher;

impl WindowMatcher for PhaseMatcher {
    fn match_windows(
        &self,
        template: ImageView<'_, f32>,
        search: ImageView<'_, f32>,
    ) -> MatchResult {
        MatchResult::from_result(phase::phase_match(template, search))
    }
}

/// Closed set of matcher strategies selectable by name.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MatcherKind {
    Template(AutoregTemplate),
    Upsampled(UpsampledTemplate),
    MutualInformation(MutualInformationMatcher),
    Phase(PhaseMatcher),
    IterativePhase(IterativePhase),
}

impl Default for MatcherKind {
    fn default() -> Self {
        MatcherKind::Template(AutoregTemplate::default())
    }
}

impl MatcherKind {
    /// Configuration name of the strategy.
    pub fn name(&self) -> &'static str {
        match self {
            MatcherKind::Template(_) => "template",
            MatcherKind::Upsampled(_) => "upsampled",
            MatcherKind::MutualInformation(_) => "mutual_information",
            MatcherKind::Phase(_) => "phase",
            MatcherKind::IterativePhase(_) => "iterative_phase",
        }
    }
}

impl FromStr for MatcherKind {
    type Err = RegError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "template" | "autoreg" => Ok(MatcherKind::Template(AutoregTemplate::default())),
            "upsampled" | "classic" => Ok(MatcherKind::Upsampled(UpsampledTemplate::default())),
            "mutual_information" | "mutualinformation" | "mi" => Ok(
                MatcherKind::MutualInformation(MutualInformationMatcher::default()),
            ),
            "phase" | "phase_single" => Ok(MatcherKind::Phase(PhaseMatcher)),
            "iterative_phase" | "iterative" => {
                Ok(MatcherKind::IterativePhase(IterativePhase::default()))
            }
            _ => Err(RegError::UnknownStrategy {
                kind: "matcher",
                name: s.to_string(),
            }),
        }
    }
}

impl WindowMatcher for MatcherKind {
    fn match_windows(
        &self,
        template: ImageView<'_, f32>,
        search: ImageView<'_, f32>,
    ) -> MatchResult {
        match self {
            MatcherKind::Template(m) => m.match_windows(template, search),
            MatcherKind::Upsampled(m) => m.match_windows(template, search),
            MatcherKind::MutualInformation(m) => m.match_windows(template, search),
            MatcherKind::Phase(m) => m.match_windows(template, search),
            MatcherKind::IterativePhase(m) => m.match_windows(template, search),
        }
    }
}
