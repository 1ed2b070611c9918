//! Low-level building blocks for custom registration pipelines.
//!
//! These items expose template plans, kernels, refinement helpers and the
//! single-window estimators underneath the point-level drivers. Most users
//! should prefer `smart_register_point`, `GeomContext` and the matchers
//! re-exported at the crate root.

pub use crate::image::resample::{gaussian_blur, sample, zoom_bicubic, Interpolation};
pub use crate::image::warp::{warp_image, AffineWarpedSource};
pub use crate::kernel::fft::FftKernel;
#[cfg(feature = "rayon")]
pub use crate::kernel::rayon::ParallelScalarKernel;
pub use crate::kernel::scalar::ScalarKernel;
pub use crate::kernel::{match_plan, Kernel, FFT_MIN_TEMPLATE_AREA};
pub use crate::matcher::{
    mutual_information, mutual_information_match, pattern_match, pattern_match_autoreg,
    phase_cross_correlation, PhaseEstimate,
};
pub use crate::refine::centroid::{center_of_mass, edge_weighted};
pub use crate::refine::quad1d::quad_peak_offset_1d;
pub use crate::refine::quad2d::quad_offset_2d;
pub use crate::refine::refine_extremum;
pub use crate::subpixel::{
    fourier_mellin, iterative_phase, subpixel_phase, subpixel_template, FourierMellin,
};
pub use crate::template::TemplatePlan;
pub use crate::transform::{
    estimate_affine_transformation, estimate_logpolar_transform, fit_affine,
};
