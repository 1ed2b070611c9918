//! Point-level registration drivers and the measure persistence interface.
//!
//! A `ControlPoint` holds one measure per image; one of them is the reference.
//! The drivers register every other measure against it and write accepted
//! coordinates and ignore records to a `MeasureSink`, one batch per kind.

pub mod simple;
pub mod smart;

use crate::consensus::ConsensusDecision;
use crate::image::{ImageCatalog, ImageHandle};
use crate::project::ImageId;
use crate::util::{RegError, RegResult};

pub use simple::{simple_register_point, CostFunction, SimpleConfig};
pub use smart::{
    register_candidates, register_measure, smart_register_point, validate_candidate, SmartConfig,
};

/// Observation of a control point in one image.
#[derive(Clone, Debug, PartialEq)]
pub struct Measure {
    pub id: u64,
    pub image: ImageId,
    pub sample: f64,
    pub line: f64,
    /// Location before any registration.
    pub apriori_sample: f64,
    pub apriori_line: f64,
    /// Cost of the last accepted registration, if any.
    pub weight: Option<f64>,
    pub ignore: bool,
}

impl Measure {
    /// A measure at `(sample, line)` that has never been registered.
    pub fn new(id: u64, image: ImageId, sample: f64, line: f64) -> Self {
        Self {
            id,
            image,
            sample,
            line,
            apriori_sample: sample,
            apriori_line: line,
            weight: None,
            ignore: false,
        }
    }

    pub fn point(&self) -> (f64, f64) {
        (self.sample, self.line)
    }
}

/// A ground feature observed in several images.
#[derive(Clone, Debug, PartialEq)]
pub struct ControlPoint {
    pub id: u64,
    /// Index into `measures` of the reference measure.
    pub reference_index: usize,
    pub measures: Vec<Measure>,
}

impl ControlPoint {
    /// The reference measure.
    pub fn reference(&self) -> RegResult<&Measure> {
        self.measures
            .get(self.reference_index)
            .ok_or(RegError::InvalidInput("reference index out of range"))
    }

    /// All measures except the reference.
    pub fn moving_measures(&self) -> impl Iterator<Item = &Measure> + '_ {
        self.measures
            .iter()
            .enumerate()
            .filter(move |(i, _)| *i != self.reference_index)
            .map(|(_, m)| m)
    }
}

/// New registered coordinates for one measure.
#[derive(Clone, Debug, PartialEq)]
pub struct MeasureUpdate {
    pub measure_id: u64,
    pub sample: f64,
    pub line: f64,
    pub weight: f64,
    /// Correlation score of the accepted match.
    pub template_metric: f64,
    /// Distance moved from the projected location.
    pub template_shift: f64,
    pub ignore: bool,
    /// Name of the registration routine that chose the coordinate.
    pub chooser: String,
}

/// Request to mark a measure ignored.
#[derive(Clone, Debug, PartialEq)]
pub struct IgnoreRecord {
    pub measure_id: u64,
    pub chooser: String,
    pub reason: String,
}

/// Persistence service for registration results.
///
/// Each call carries one batch that the implementation applies atomically.
pub trait MeasureSink {
    fn apply_updates(&mut self, updates: &[MeasureUpdate]) -> RegResult<()>;
    fn set_ignored(&mut self, records: &[IgnoreRecord]) -> RegResult<()>;
}

/// Sink that keeps every batch in memory.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    pub update_batches: Vec<Vec<MeasureUpdate>>,
    pub ignore_batches: Vec<Vec<IgnoreRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All updates across batches.
    pub fn updates(&self) -> impl Iterator<Item = &MeasureUpdate> + '_ {
        self.update_batches.iter().flatten()
    }

    /// All ignore records across batches.
    pub fn ignored(&self) -> impl Iterator<Item = &IgnoreRecord> + '_ {
        self.ignore_batches.iter().flatten()
    }
}

impl MeasureSink for MemorySink {
    fn apply_updates(&mut self, updates: &[MeasureUpdate]) -> RegResult<()> {
        self.update_batches.push(updates.to_vec());
        Ok(())
    }

    fn set_ignored(&mut self, records: &[IgnoreRecord]) -> RegResult<()> {
        self.ignore_batches.push(records.to_vec());
        Ok(())
    }
}

/// What a point-level driver did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointReport {
    pub point_id: u64,
    pub updates: Vec<MeasureUpdate>,
    pub ignored: Vec<IgnoreRecord>,
    /// Measures whose previous registration was kept.
    pub unchanged: Vec<u64>,
    /// Consensus decisions, one per moving measure (smart registration only).
    pub decisions: Vec<ConsensusDecision>,
}

impl PointReport {
    /// Writes the non-empty batches to `sink`.
    pub(crate) fn flush(&self, sink: &mut dyn MeasureSink) -> RegResult<()> {
        if !self.updates.is_empty() {
            sink.apply_updates(&self.updates)?;
        }
        if !self.ignored.is_empty() {
            sink.set_ignored(&self.ignored)?;
        }
        Ok(())
    }
}

/// Looks up the raster of a measure's image.
pub(crate) fn handle<'a>(catalog: &'a dyn ImageCatalog, image: ImageId) -> RegResult<ImageHandle<'a>> {
    catalog
        .raster(image)
        .map(|raster| ImageHandle::new(image, raster))
        .ok_or(RegError::MissingImage { image: image.0 })
}
