//! Template preparation for correlation kernels.

mod plan;

pub use plan::TemplatePlan;
