//! Sub-pixel registration of a point between two rasters.
//!
//! These functions extract windows around a reference point and an initial
//! guess in the moving raster, run a matcher and turn the window-level offset
//! into the moving-raster location of the reference point.

use crate::image::resample::Interpolation;
use crate::image::warp::warp_image;
use crate::image::{ImageView, RasterSource};
use crate::matcher::{
    phase_cross_correlation, Ambiguity, MatchResult, MatchStatus, WindowMatcher,
};
use crate::params::ParameterSet;
use crate::roi::{Roi, Window};
use crate::surface::CorrelationSurface;
use crate::trace::{trace_event, trace_span};
use crate::transform::{estimate_logpolar_transform, LogPolarConfig, Similarity};
use crate::util::math::{distance, make_odd};
use crate::util::{RegError, RegResult};

/// Moving-raster location of a reference point, with the match outcome.
#[derive(Clone, Debug, PartialEq)]
pub struct Registration {
    pub status: MatchStatus,
    /// Location in the moving raster when matched.
    pub point: Option<(f64, f64)>,
    pub score: f64,
    pub surface: Option<CorrelationSurface>,
}

impl Registration {
    fn failed(err: RegError) -> Self {
        Self {
            status: MatchStatus::FailedPrecondition(err),
            point: None,
            score: f64::NAN,
            surface: None,
        }
    }

    fn ambiguous(reason: Ambiguity, score: f64, surface: Option<CorrelationSurface>) -> Self {
        Self {
            status: MatchStatus::Ambiguous(reason),
            point: None,
            score,
            surface,
        }
    }

    pub fn is_matched(&self) -> bool {
        self.status == MatchStatus::Matched
    }
}

/// Convergent phase correlation with shrinking windows.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IterativePhase {
    /// Initial full window size `(x, y)`.
    pub size: (usize, usize),
    /// Pixels removed from each window side length per iteration.
    pub reduction: usize,
    /// Largest per-axis update still counted as converged.
    pub convergence_threshold: f64,
    /// Largest allowed distance from the starting guess.
    pub max_dist: f64,
}

impl Default for IterativePhase {
    fn default() -> Self {
        Self {
            size: (51, 51),
            reduction: 11,
            convergence_threshold: 1.0,
            max_dist: 50.0,
        }
    }
}

impl WindowMatcher for IterativePhase {
    fn match_windows(
        &self,
        template: ImageView<'_, f32>,
        search: ImageView<'_, f32>,
    ) -> MatchResult {
        let (tw, th) = template.shape();
        let (sw, sh) = search.shape();
        let search_center = ((sw as f64 - 1.0) * 0.5, (sh as f64 - 1.0) * 0.5);
        let template_center = ((tw as f64 - 1.0) * 0.5, (th as f64 - 1.0) * 0.5);
        let cfg = IterativePhase {
            size: (self.size.0.min(tw), self.size.1.min(th)),
            ..*self
        };
        // The template stays put; the estimate walks inside the search window.
        let reg = iterative_phase(&template, &search, template_center, search_center, &cfg);
        match (reg.status, reg.point) {
            (MatchStatus::Matched, Some(p)) => MatchResult::matched(
                p.0 - search_center.0,
                p.1 - search_center.1,
                reg.score,
                None,
            ),
            (MatchStatus::Ambiguous(reason), _) => MatchResult::ambiguous(reason, reg.score, None),
            (MatchStatus::FailedPrecondition(err), _) => MatchResult::failed(err),
            (MatchStatus::Matched, None) => MatchResult::failed(RegError::NoData),
        }
    }
}

/// Moving-raster location of `ref_point` given the offset of the moving window
/// center inside the reference window.
fn moving_location(
    ref_point: (f64, f64),
    reference: &Window,
    moving: &Window,
    offset: (f64, f64),
) -> (f64, f64) {
    let rc = reference.geometric_center();
    let mc = moving.geometric_center();
    (
        mc.0 + (ref_point.0 - rc.0) - offset.0,
        mc.1 + (ref_point.1 - rc.1) - offset.1,
    )
}

/// Marks a matched result ambiguous when its best cell lies on the surface edge.
pub(crate) fn reject_edge_extremum(result: MatchResult) -> MatchResult {
    if !result.is_matched() {
        return result;
    }
    let on_edge = result
        .surface
        .as_ref()
        .and_then(|s| s.extremum().map(|e| s.is_on_edge(e.x, e.y)))
        .unwrap_or(false);
    if on_edge {
        MatchResult::ambiguous(Ambiguity::ExtremumOnEdge, result.score, result.surface)
    } else {
        result
    }
}

fn extract(
    source: &dyn RasterSource,
    center: (f64, f64),
    half: (usize, usize),
) -> RegResult<Window> {
    let window = Roi::new(source, center.0, center.1, half.0, half.1)?.clip()?;
    window.ensure_matchable()?;
    Ok(window)
}

/// Template matching of a moving window against a reference search window.
///
/// The search window (`parameters.image_size`) is read around `ref_point` in
/// `reference`, the template (`parameters.template_size`) around
/// `moving_point` in `moving`.
pub fn subpixel_template(
    reference: &dyn RasterSource,
    moving: &dyn RasterSource,
    ref_point: (f64, f64),
    moving_point: (f64, f64),
    parameters: &ParameterSet,
    matcher: &dyn WindowMatcher,
) -> Registration {
    let windows = extract(reference, ref_point, parameters.image_half()).and_then(|search| {
        extract(moving, moving_point, parameters.template_half()).map(|tpl| (search, tpl))
    });
    let (search, template) = match windows {
        Ok(pair) => pair,
        Err(err) => return Registration::failed(err),
    };
    let result = reject_edge_extremum(matcher.match_windows(template.view(), search.view()));
    match result.status {
        MatchStatus::Matched => Registration {
            status: MatchStatus::Matched,
            point: Some(moving_location(
                ref_point,
                &search,
                &template,
                (result.dx, result.dy),
            )),
            score: result.score,
            surface: result.surface,
        },
        MatchStatus::Ambiguous(reason) => {
            Registration::ambiguous(reason, result.score, result.surface)
        }
        MatchStatus::FailedPrecondition(err) => Registration::failed(err),
    }
}

/// Reads equally sized windows around both points, shrinking both to the
/// common odd size when clipping made them differ.
fn paired_windows(
    reference: &dyn RasterSource,
    moving: &dyn RasterSource,
    ref_point: (f64, f64),
    moving_point: (f64, f64),
    size: (usize, usize),
) -> RegResult<(Window, Window)> {
    let half = (size.0 / 2, size.1 / 2);
    let ref_win = extract(reference, ref_point, half)?;
    let mov_win = extract(moving, moving_point, half)?;
    if ref_win.shape() == mov_win.shape() {
        return Ok((ref_win, mov_win));
    }
    let common = |a: usize, b: usize| {
        let m = a.min(b);
        if m % 2 == 0 {
            m - 1
        } else {
            m
        }
    };
    let (rw, rh) = ref_win.shape();
    let (mw, mh) = mov_win.shape();
    let half = (common(rw, mw) / 2, common(rh, mh) / 2);
    let ref_win = extract(reference, ref_point, half)?;
    let mov_win = extract(moving, moving_point, half)?;
    if ref_win.shape() != mov_win.shape() {
        return Err(RegError::ShapeMismatch {
            left: ref_win.shape(),
            right: mov_win.shape(),
        });
    }
    Ok((ref_win, mov_win))
}

/// Single-shot phase correlation of equally sized windows around both points.
pub fn subpixel_phase(
    reference: &dyn RasterSource,
    moving: &dyn RasterSource,
    ref_point: (f64, f64),
    moving_point: (f64, f64),
    size: (usize, usize),
) -> Registration {
    let size = (make_odd(size.0), make_odd(size.1));
    let attempt = paired_windows(reference, moving, ref_point, moving_point, size).and_then(
        |(ref_win, mov_win)| {
            let est = phase_cross_correlation(ref_win.view(), mov_win.view())?;
            Ok((
                moving_location(ref_point, &ref_win, &mov_win, est.shift),
                est.score,
            ))
        },
    );
    match attempt {
        Ok((point, score)) => Registration {
            status: MatchStatus::Matched,
            point: Some(point),
            score,
            surface: None,
        },
        Err(err) => Registration::failed(err),
    }
}

/// Repeats phase correlation around the current estimate with shrinking windows.
///
/// Stops as converged once both components of an update are within
/// `convergence_threshold`, as diverged once the estimate is farther than
/// `max_dist` from `moving_point`, and as exhausted once the window size drops
/// below one pixel.
pub fn iterative_phase(
    reference: &dyn RasterSource,
    moving: &dyn RasterSource,
    ref_point: (f64, f64),
    moving_point: (f64, f64),
    cfg: &IterativePhase,
) -> Registration {
    let _span = trace_span!("iterative_phase").entered();
    let mut size = (cfg.size.0 as i64, cfg.size.1 as i64);
    let mut current = moving_point;
    let mut iterations = 0usize;
    loop {
        if size.0 < 1 || size.1 < 1 {
            trace_event!("iterative_phase_exhausted", iterations = iterations);
            return Registration::ambiguous(Ambiguity::WindowExhausted, f64::NAN, None);
        }
        let window = (size.0 as usize, size.1 as usize);
        let (ref_win, mov_win) =
            match paired_windows(reference, moving, ref_point, current, window) {
                Ok(pair) => pair,
                Err(err) => return Registration::failed(err),
            };
        let est = match phase_cross_correlation(ref_win.view(), mov_win.view()) {
            Ok(est) => est,
            Err(err) => return Registration::failed(err),
        };
        iterations += 1;
        let next = moving_location(ref_point, &ref_win, &mov_win, est.shift);
        let delta = (next.0 - current.0, next.1 - current.1);
        current = next;

        if distance(current, moving_point) > cfg.max_dist {
            trace_event!("iterative_phase_diverged", iterations = iterations);
            return Registration::ambiguous(Ambiguity::Diverged, est.score, None);
        }
        if delta.0.abs() <= cfg.convergence_threshold && delta.1.abs() <= cfg.convergence_threshold
        {
            trace_event!(
                "iterative_phase_converged",
                iterations = iterations,
                score = est.score
            );
            return Registration {
                status: MatchStatus::Matched,
                point: Some(current),
                score: est.score,
                surface: None,
            };
        }
        size = (
            size.0 - cfg.reduction as i64,
            size.1 - cfg.reduction as i64,
        );
    }
}

/// Result of Fourier-Mellin registration.
#[derive(Clone, Debug, PartialEq)]
pub struct FourierMellin {
    /// Rotation and scale taking `reference` onto `moving`.
    pub similarity: Similarity,
    /// Moving-image location of the reference image center.
    pub registration: Registration,
}

/// Log-polar similarity estimate, reference pre-warp, then iterative phase.
///
/// The reference is rotated and scaled about its center to look like
/// `moving`; pixels that fall outside it are NaN. Iterative phase then runs
/// from the image center.
pub fn fourier_mellin(
    reference: ImageView<'_, f32>,
    moving: ImageView<'_, f32>,
    logpolar: &LogPolarConfig,
    iterative: &IterativePhase,
) -> RegResult<FourierMellin> {
    let similarity = estimate_logpolar_transform(reference, moving, logpolar)?;
    let (width, height) = reference.shape();
    let center = ((width as f64 - 1.0) * 0.5, (height as f64 - 1.0) * 0.5);
    let forward = similarity.about(center.0, center.1);
    let inverse = forward.inverse().ok_or(RegError::DegenerateGeometry {
        reason: "similarity scale is zero",
    })?;
    let warped = warp_image(reference, &inverse, width, height, Interpolation::Bicubic, f32::NAN)?;
    let registration = iterative_phase(&warped, &moving, center, center, iterative);
    Ok(FourierMellin {
        similarity,
        registration,
    })
}
