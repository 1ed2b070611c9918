//! Window-size configurations swept by the consensus engine.

use crate::util::math::make_odd;
use crate::util::{RegError, RegResult};

/// Immutable search-window / template size pair, sizes given as `(x, y)`.
///
/// Even sizes are rounded up to the next odd size so windows have a center
/// pixel; half extents are `size / 2` after rounding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ParameterSet {
    image_size: (usize, usize),
    template_size: (usize, usize),
}

impl ParameterSet {
    /// Validates and normalizes a search/template size pair.
    pub fn new(image_size: (usize, usize), template_size: (usize, usize)) -> RegResult<Self> {
        let image_size = (make_odd(image_size.0), make_odd(image_size.1));
        let template_size = (make_odd(template_size.0), make_odd(template_size.1));
        if template_size.0 > image_size.0 || template_size.1 > image_size.1 {
            return Err(RegError::InvalidInput(
                "template size must not exceed the search window size",
            ));
        }
        Ok(Self {
            image_size,
            template_size,
        })
    }

    /// Pair of sizes already known to be odd and ordered.
    pub(crate) const fn from_odd(image_size: (usize, usize), template_size: (usize, usize)) -> Self {
        Self {
            image_size,
            template_size,
        }
    }

    /// Square search window and template.
    pub fn square(image_size: usize, template_size: usize) -> RegResult<Self> {
        Self::new((image_size, image_size), (template_size, template_size))
    }

    /// Odd search-window size.
    pub fn image_size(&self) -> (usize, usize) {
        self.image_size
    }

    /// Odd template size.
    pub fn template_size(&self) -> (usize, usize) {
        self.template_size
    }

    /// Search-window half extents.
    pub fn image_half(&self) -> (usize, usize) {
        (self.image_size.0 / 2, self.image_size.1 / 2)
    }

    /// Template half extents.
    pub fn template_half(&self) -> (usize, usize) {
        (self.template_size.0 / 2, self.template_size.1 / 2)
    }
}

/// Smallest template half extents (per axis) across a sweep.
pub(crate) fn smallest_template_half(parameters: &[ParameterSet]) -> Option<(usize, usize)> {
    let hx = parameters.iter().map(|p| p.template_half().0).min()?;
    let hy = parameters.iter().map(|p| p.template_half().1).min()?;
    Some((hx, hy))
}

/// The six search/template sizes used for multi-scale consensus sweeps.
pub fn default_sweep() -> Vec<ParameterSet> {
    [(121, 61), (151, 67), (181, 73), (221, 81), (251, 89), (281, 98)]
        .into_iter()
        .filter_map(|(image, template)| ParameterSet::square(image, template).ok())
        .collect()
}
