//! Derived views of a refined elevation profile

use super::{ElevationSample, GainLoss, compute_gain_loss};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Lookahead distance used for grades
pub const GRADE_LOOKAHEAD_M: f64 = 100.0;

/// Point count a profile is reduced to for display
pub const DISPLAY_TARGET_POINTS: usize = 750;

/// Grade in percent from each sample to the first sample at least `lookahead_m` further
///
/// Samples without such a lookahead (the tail of the route) or with an unresolved
/// elevation at either end repeat the previous grade, 0 at the start.
pub fn grade_series(samples: &[ElevationSample], lookahead_m: f64) -> Vec<f64> {
    let mut grades = Vec::with_capacity(samples.len());
    let mut previous = 0.0;
    let mut ahead = 0;

    for (i, sample) in samples.iter().enumerate() {
        ahead = ahead.max(i + 1);
        while ahead < samples.len() && samples[ahead].distance_m - sample.distance_m < lookahead_m {
            ahead += 1;
        }

        let grade = samples.get(ahead).and_then(|end| {
            let run = end.distance_m - sample.distance_m;
            let rise = end.elevation_m? - sample.elevation_m?;
            Some(if run > 0.0 { rise / run * 100.0 } else { 0.0 })
        });

        previous = grade.unwrap_or(previous);
        grades.push(previous);
    }

    grades
}

/// Steepness bucket of a grade
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum GradeClass {
    Flat,
    Moderate,
    Steep,
    VerySteep,
    Extreme,
    Severe,
}

impl GradeClass {
    /// Descents and anything under 3 % are flat
    pub fn from_grade(grade: f64) -> Self {
        match grade {
            g if g < 3.0 => Self::Flat,
            g if g < 6.0 => Self::Moderate,
            g if g < 11.0 => Self::Steep,
            g if g < 16.0 => Self::VerySteep,
            g if g < 21.0 => Self::Extreme,
            _ => Self::Severe,
        }
    }

    pub fn stroke_color(self) -> &'static str {
        match self {
            Self::Flat => "#32b8c6",
            Self::Moderate => "#CCCC00",
            Self::Steep => "#FF8C00",
            Self::VerySteep => "#FF4444",
            Self::Extreme => "#9932CC",
            Self::Severe => "#333333",
        }
    }

    pub fn fill_color(self) -> &'static str {
        match self {
            Self::Flat => "rgba(50, 184, 198, 0.12)",
            Self::Moderate => "rgba(255, 255, 150, 0.35)",
            Self::Steep => "rgba(255, 200, 150, 0.35)",
            Self::VerySteep => "rgba(255, 150, 150, 0.35)",
            Self::Extreme => "rgba(200, 150, 255, 0.35)",
            Self::Severe => "rgba(100, 100, 100, 0.35)",
        }
    }
}

/// Keep every `ceil(len / target)`-th item plus the last one
///
/// Series no longer than `target` are returned unchanged.
pub fn downsample_for_display<T: Clone>(data: &[T], target: usize) -> Vec<T> {
    if data.len() <= target || target == 0 {
        return data.to_vec();
    }

    let step = data.len().div_ceil(target);
    let mut out: Vec<T> = data.iter().step_by(step).cloned().collect();
    if (data.len() - 1) % step != 0 {
        out.extend(data.last().cloned());
    }
    out
}

/// Headline numbers of a profile
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ElevationSummary {
    pub min_elevation_m: Option<f64>,
    pub max_elevation_m: Option<f64>,
    pub distance_m: f64,
    pub gain_loss: GainLoss,
}

impl ElevationSummary {
    pub fn from_samples(samples: &[ElevationSample], gain_threshold_m: f64) -> Self {
        let resolved = samples.iter().filter_map(|s| s.elevation_m);
        let (min, max) = resolved.fold((None, None), |(min, max): (Option<f64>, Option<f64>), e| {
            (
                Some(min.map_or(e, |m| m.min(e))),
                Some(max.map_or(e, |m| m.max(e))),
            )
        });

        Self {
            min_elevation_m: min,
            max_elevation_m: max,
            distance_m: samples.last().map_or(0.0, |s| s.distance_m),
            gain_loss: compute_gain_loss(samples, gain_threshold_m),
        }
    }
}
