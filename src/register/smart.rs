//! Multi-configuration registration with consensus and reverse validation.

use crate::consensus::{decide, CandidateFit, CandidateMeasure, ConsensusDecision, RejectReason};
use crate::geom::{AttemptFailure, GeomConfig, GeomContext};
use crate::image::{ImageCatalog, ImageHandle, RasterSource};
use crate::kernel::{match_template, Metric};
use crate::matcher::mutual_information;
use crate::params::{default_sweep, smallest_template_half, ParameterSet};
use crate::project::GroundProjector;
use crate::register::{
    handle, ControlPoint, IgnoreRecord, Measure, MeasureSink, MeasureUpdate, PointReport,
};
use crate::roi::{Roi, Window};
use crate::trace::{trace_event, trace_span, trace_warn};
use crate::util::math::distance;
use crate::util::{RegError, RegResult};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Settings of consensus registration.
#[derive(Clone, Debug, PartialEq)]
pub struct SmartConfig {
    pub geom: GeomConfig,
    /// Window configurations swept per measure.
    pub parameters: Vec<ParameterSet>,
    /// Distance within which candidates agree.
    pub consensus_tolerance: f64,
    /// Distance within which a reverse registration must return.
    pub validation_tolerance: f64,
    /// Reverse registrations that must return within tolerance.
    pub min_validated: usize,
    pub mi_bins: usize,
    pub chooser: String,
    /// Fail with `AllAttemptsFailed` instead of ignoring when nothing matched.
    pub strict: bool,
}

impl Default for SmartConfig {
    fn default() -> Self {
        Self {
            geom: GeomConfig::default(),
            parameters: default_sweep(),
            consensus_tolerance: 0.5,
            validation_tolerance: 1.0,
            min_validated: 2,
            mi_bins: 100,
            chooser: "smart_subpixel_registration".to_string(),
            strict: false,
        }
    }
}

fn read_valid(
    source: &dyn RasterSource,
    center: (f64, f64),
    half: (usize, usize),
) -> RegResult<Window> {
    let window = Roi::new(source, center.0, center.1, half.0, half.1)?.clip()?;
    if !window.is_valid() {
        return Err(RegError::NoData);
    }
    Ok(window)
}

/// Reference window at the reference point and warped window at `warped_point`.
fn window_pair(
    ctx: &GeomContext<'_>,
    warped_point: (f64, f64),
    half: (usize, usize),
) -> RegResult<(Window, Window)> {
    let reference = read_valid(ctx.reference().raster, ctx.point(), half)?;
    let warped = read_valid(ctx.warped(), warped_point, half)?;
    if reference.shape() != warped.shape() {
        return Err(RegError::ShapeMismatch {
            left: reference.shape(),
            right: warped.shape(),
        });
    }
    Ok((reference, warped))
}

/// Mutual information and zero-shift correlation before matching.
fn baseline(ctx: &GeomContext<'_>, half: (usize, usize), bins: usize) -> RegResult<(f64, f64)> {
    let (reference, warped) = window_pair(ctx, ctx.point(), half)?;
    let mi = mutual_information(reference.view(), warped.view(), bins)?;
    let surface = match_template(reference.view(), warped.view(), Metric::CcoeffNormed)?;
    let corr = surface
        .get(0, 0)
        .ok_or(RegError::DegenerateWindow { reason: "empty baseline surface" })?;
    Ok((mi, corr as f64))
}

/// Runs every parameter set for one measure.
///
/// Fails as a whole only when the correspondence cannot be set up (projection,
/// affine fit or baseline windows); failures of single parameter sets are
/// kept in the returned candidates.
pub fn register_candidates(
    projector: &dyn GroundProjector,
    reference: ImageHandle<'_>,
    moving: ImageHandle<'_>,
    point: (f64, f64),
    measure_id: u64,
    cfg: &SmartConfig,
) -> Result<Vec<CandidateMeasure>, AttemptFailure> {
    let _span = trace_span!("register_candidates", measure = measure_id).entered();
    let ctx = GeomContext::prepare(projector, reference, moving, point, &cfg.geom)?;
    let half = smallest_template_half(&cfg.parameters)
        .ok_or(RegError::InvalidInput("at least one parameter set is required"))?;
    let (baseline_mi, baseline_corr) = baseline(&ctx, half, cfg.mi_bins)?;
    trace_event!(
        "baseline",
        mutual_information = baseline_mi,
        correlation = baseline_corr
    );

    let attempt = |index: usize, parameters: &ParameterSet| {
        let fit = ctx.run(&cfg.geom.matcher, parameters).and_then(|m| {
            let (reference, warped) = window_pair(&ctx, m.warped, half)?;
            let mi_score = mutual_information(reference.view(), warped.view(), cfg.mi_bins)?;
            Ok(CandidateFit {
                sample: m.sample,
                line: m.line,
                template_score: m.score,
                mi_score,
                shift: m.distance,
            })
        });
        if let Err(err) = &fit {
            let reason = err.to_string();
            trace_warn!("attempt_failed", index = index, reason = reason.as_str());
        }
        CandidateMeasure {
            measure_id,
            parameter_index: index,
            parameters: *parameters,
            baseline_mi,
            baseline_corr,
            fit,
        }
    };

    #[cfg(feature = "rayon")]
    let candidates = cfg
        .parameters
        .par_iter()
        .enumerate()
        .map(|(i, p)| attempt(i, p))
        .collect();
    #[cfg(not(feature = "rayon"))]
    let candidates = cfg
        .parameters
        .iter()
        .enumerate()
        .map(|(i, p)| attempt(i, p))
        .collect();
    Ok(candidates)
}

/// Registers `chosen` in `moving` back into `reference` with every parameter
/// set and counts results within `validation_tolerance` of `reference_point`.
pub fn validate_candidate(
    projector: &dyn GroundProjector,
    reference: ImageHandle<'_>,
    moving: ImageHandle<'_>,
    reference_point: (f64, f64),
    chosen: (f64, f64),
    cfg: &SmartConfig,
) -> usize {
    let _span = trace_span!("validate_candidate").entered();
    let ctx = match GeomContext::prepare(projector, moving, reference, chosen, &cfg.geom) {
        Ok(ctx) => ctx,
        Err(err) => {
            let reason = err.to_string();
            trace_warn!("validation_setup_failed", reason = reason.as_str());
            return 0;
        }
    };
    let within = |parameters: &ParameterSet| match ctx.run(&cfg.geom.matcher, parameters) {
        Ok(m) => distance((m.sample, m.line), reference_point) <= cfg.validation_tolerance,
        Err(_) => false,
    };

    #[cfg(feature = "rayon")]
    let count = cfg.parameters.par_iter().filter(|p| within(p)).count();
    #[cfg(not(feature = "rayon"))]
    let count = cfg.parameters.iter().filter(|p| within(p)).count();
    trace_event!("validation", within = count);
    count
}

/// Registers one measure: sweep, consensus, then reverse validation.
pub fn register_measure(
    projector: &dyn GroundProjector,
    reference: ImageHandle<'_>,
    moving: ImageHandle<'_>,
    reference_point: (f64, f64),
    measure_id: u64,
    cfg: &SmartConfig,
) -> RegResult<ConsensusDecision> {
    let candidates =
        match register_candidates(projector, reference, moving, reference_point, measure_id, cfg) {
            Ok(candidates) => candidates,
            Err(err) => {
                return Ok(ConsensusDecision::Reject {
                    measure_id,
                    reason: RejectReason::Attempt(err),
                })
            }
        };
    if cfg.strict && candidates.iter().all(|c| c.fit.is_err()) {
        return Err(RegError::AllAttemptsFailed {
            measure_id,
            attempts: candidates.len(),
        });
    }

    let decision = decide(measure_id, &candidates, cfg.consensus_tolerance);
    let Some(chosen) = decision.chosen().and_then(CandidateMeasure::point) else {
        return Ok(decision);
    };
    let within = validate_candidate(projector, reference, moving, reference_point, chosen, cfg);
    if within < cfg.min_validated {
        trace_warn!(
            "validation_failed",
            measure = measure_id,
            within = within
        );
        return Ok(ConsensusDecision::Reject {
            measure_id,
            reason: RejectReason::FailedValidation {
                within_tolerance: within,
                required: cfg.min_validated,
            },
        });
    }
    Ok(decision)
}

fn register_one(
    projector: &dyn GroundProjector,
    catalog: &dyn ImageCatalog,
    reference: ImageHandle<'_>,
    reference_point: (f64, f64),
    measure: &Measure,
    cfg: &SmartConfig,
) -> RegResult<ConsensusDecision> {
    let moving = match handle(catalog, measure.image) {
        Ok(moving) => moving,
        Err(err) => {
            return Ok(ConsensusDecision::Reject {
                measure_id: measure.id,
                reason: RejectReason::Attempt(AttemptFailure::Precondition(err)),
            })
        }
    };
    register_measure(projector, reference, moving, reference_point, measure.id, cfg)
}

/// Registers every non-reference measure of `point` and writes the results.
///
/// Accepted measures are written in one update batch, rejected ones in one
/// ignore batch carrying the rejection reason.
pub fn smart_register_point(
    point: &ControlPoint,
    catalog: &dyn ImageCatalog,
    projector: &dyn GroundProjector,
    cfg: &SmartConfig,
    sink: &mut dyn MeasureSink,
) -> RegResult<PointReport> {
    let _span = trace_span!("smart_register_point", point = point.id).entered();
    let reference_measure = point.reference()?;
    let reference = handle(catalog, reference_measure.image)?;
    let reference_point = reference_measure.point();
    let moving: Vec<&Measure> = point.moving_measures().collect();

    #[cfg(feature = "rayon")]
    let decisions: RegResult<Vec<ConsensusDecision>> = moving
        .par_iter()
        .map(|m| register_one(projector, catalog, reference, reference_point, m, cfg))
        .collect();
    #[cfg(not(feature = "rayon"))]
    let decisions: RegResult<Vec<ConsensusDecision>> = moving
        .iter()
        .map(|m| register_one(projector, catalog, reference, reference_point, m, cfg))
        .collect();
    let decisions = decisions?;

    let mut report = PointReport {
        point_id: point.id,
        ..PointReport::default()
    };
    for decision in &decisions {
        match decision {
            ConsensusDecision::Accept { chosen, cost, .. } => {
                if let Ok(fit) = &chosen.fit {
                    report.updates.push(MeasureUpdate {
                        measure_id: chosen.measure_id,
                        sample: fit.sample,
                        line: fit.line,
                        weight: *cost,
                        template_metric: fit.template_score,
                        template_shift: fit.shift,
                        ignore: false,
                        chooser: cfg.chooser.clone(),
                    });
                }
            }
            ConsensusDecision::Reject { measure_id, reason } => {
                let reason = reason.to_string();
                trace_warn!(
                    "measure_rejected",
                    measure = *measure_id,
                    reason = reason.as_str()
                );
                report.ignored.push(IgnoreRecord {
                    measure_id: *measure_id,
                    chooser: cfg.chooser.clone(),
                    reason,
                });
            }
        }
    }
    report.decisions = decisions;
    report.flush(sink)?;
    trace_event!(
        "point_registered",
        updated = report.updates.len(),
        ignored = report.ignored.len()
    );
    Ok(report)
}
