//! Single-configuration registration with a cost threshold.

use crate::geom::{geom_match, GeomConfig};
use crate::image::ImageCatalog;
use crate::params::ParameterSet;
use crate::project::GroundProjector;
use crate::register::{handle, ControlPoint, IgnoreRecord, MeasureSink, MeasureUpdate, PointReport};
use crate::trace::{trace_event, trace_span, trace_warn};
use crate::util::RegResult;

/// Turns a match score and the distance moved into a registration cost.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CostFunction {
    /// The score itself.
    Metric,
    /// `score / shift^2`, favoring matches that barely moved.
    #[default]
    MetricOverShiftSquared,
}

impl CostFunction {
    pub fn cost(self, metric: f64, shift: f64) -> f64 {
        match self {
            CostFunction::Metric => metric,
            CostFunction::MetricOverShiftSquared => {
                let cost = metric / (shift * shift);
                if cost.is_nan() {
                    0.0
                } else {
                    cost
                }
            }
        }
    }
}

/// Settings of threshold registration.
#[derive(Clone, Debug, PartialEq)]
pub struct SimpleConfig {
    pub geom: GeomConfig,
    pub parameters: ParameterSet,
    pub cost: CostFunction,
    /// Costs at or below this are not trusted.
    pub threshold: f64,
    pub chooser: String,
}

impl Default for SimpleConfig {
    fn default() -> Self {
        Self {
            geom: GeomConfig::default(),
            parameters: ParameterSet::from_odd((251, 251), (51, 51)),
            cost: CostFunction::default(),
            threshold: 0.005,
            chooser: "subpixel_register_point".to_string(),
        }
    }
}

/// Registers every non-reference measure of `point` with one parameter set.
///
/// A measure whose cost is at or below the threshold is ignored unless it
/// carries a previous weight; a previous weight at least as large as the new
/// cost keeps the previous coordinates.
pub fn simple_register_point(
    point: &ControlPoint,
    catalog: &dyn ImageCatalog,
    projector: &dyn GroundProjector,
    cfg: &SimpleConfig,
    sink: &mut dyn MeasureSink,
) -> RegResult<PointReport> {
    let _span = trace_span!("simple_register_point", point = point.id).entered();
    let reference_measure = point.reference()?;
    let reference = handle(catalog, reference_measure.image)?;
    let mut report = PointReport {
        point_id: point.id,
        ..PointReport::default()
    };
    let ignore = |measure_id: u64, reason: String| IgnoreRecord {
        measure_id,
        chooser: cfg.chooser.clone(),
        reason,
    };

    for measure in point.moving_measures() {
        let moving = match handle(catalog, measure.image) {
            Ok(moving) => moving,
            Err(err) => {
                report.ignored.push(ignore(measure.id, err.to_string()));
                continue;
            }
        };
        let matched = match geom_match(
            projector,
            reference,
            moving,
            reference_measure.point(),
            &cfg.parameters,
            &cfg.geom,
        ) {
            Ok(matched) => matched,
            Err(err) => {
                let reason = err.to_string();
                trace_warn!("measure_failed", measure = measure.id, reason = reason.as_str());
                report.ignored.push(ignore(measure.id, reason));
                continue;
            }
        };
        let cost = cfg.cost.cost(matched.score, matched.distance);
        trace_event!("measure_cost", measure = measure.id, cost = cost);
        match measure.weight {
            Some(previous) if previous >= cost => {
                report.unchanged.push(measure.id);
                continue;
            }
            None if cost <= cfg.threshold => {
                report.ignored.push(ignore(
                    measure.id,
                    format!("cost {cost:.6} is at or below the threshold {}", cfg.threshold),
                ));
                continue;
            }
            _ => {}
        }
        report.updates.push(MeasureUpdate {
            measure_id: measure.id,
            sample: matched.sample,
            line: matched.line,
            weight: cost,
            template_metric: matched.score,
            template_shift: matched.distance,
            ignore: false,
            chooser: cfg.chooser.clone(),
        });
    }

    report.flush(sink)?;
    Ok(report)
}
