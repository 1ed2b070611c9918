//! Sub-pixel refinement of surface extrema.
//!
//! Every method works on the `(2r+1)^2` neighborhood of the integer extremum
//! and returns `None` when that neighborhood does not fit inside the surface.

pub mod centroid;
pub mod quad1d;
pub mod quad2d;

use crate::surface::{CorrelationSurface, Extremum};

/// How the local score neighborhood is turned into a sub-pixel offset.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum SubpixelMethod {
    /// Center of mass of the cells rising above the neighborhood border.
    #[default]
    CenterOfMass,
    /// Interior cells weighted by height above an edge-referenced threshold.
    EdgeWeighted { max_scaler: f64 },
    /// Separable quadratic fit on the central 3x3.
    Parabolic,
}

/// Sub-pixel position of `peak` in surface coordinates, or `None` near the edge.
pub fn refine_extremum(
    surface: &CorrelationSurface,
    peak: Extremum,
    radius: usize,
    method: SubpixelMethod,
) -> Option<(f64, f64)> {
    let radius = radius.max(1);
    let neighborhood = surface.neighborhood(peak.x, peak.y, radius)?;
    let (dx, dy) = match method {
        SubpixelMethod::CenterOfMass => centroid::center_of_mass(&neighborhood),
        SubpixelMethod::EdgeWeighted { max_scaler } => {
            centroid::edge_weighted(&neighborhood, max_scaler)
        }
        SubpixelMethod::Parabolic => quad2d::quad_offset_2d(&neighborhood),
    };
    Some((peak.x as f64 + dx, peak.y as f64 + dy))
}
