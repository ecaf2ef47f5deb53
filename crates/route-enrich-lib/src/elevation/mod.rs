//! Progressive elevation profiles
//!
//! A route is resampled at a fixed interval ([`sample_route`]), elevations are fetched
//! coarse-to-fine from an [`ElevationLookup`] ([`ElevationRefiner`]) and the result is
//! condensed into gain/loss, grades and a display-sized series.

mod gain;
mod profile;
mod refine;
mod sampler;

pub use gain::{GainLoss, GainLossConfig, compute_gain_loss, gain_loss_of};
pub use profile::{
    DISPLAY_TARGET_POINTS, ElevationSummary, GRADE_LOOKAHEAD_M, GradeClass, downsample_for_display,
    grade_series,
};
pub use refine::{
    ElevationLookup, ElevationRefiner, ElevationSample, ElevationSnapshot, RefineConfig,
    refine_elevations,
};
pub use sampler::{RouteSample, SamplerConfig, sample_route};
