//! Ascent and descent totals with a hysteresis threshold

use super::ElevationSample;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Total climb and descent in whole meters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GainLoss {
    pub gain_m: u32,
    pub loss_m: u32,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GainLossConfig {
    /// Minimum change from the baseline that counts as climb or descent (default 3 m)
    pub threshold_m: f64,
}

impl Default for GainLossConfig {
    fn default() -> Self {
        Self { threshold_m: 3.0 }
    }
}

/// Hysteresis gain/loss over the resolved elevations of `samples`
///
/// Unresolved samples are skipped.
pub fn compute_gain_loss(samples: &[ElevationSample], threshold_m: f64) -> GainLoss {
    gain_loss_of(samples.iter().filter_map(|s| s.elevation_m), threshold_m)
}

/// Hysteresis gain/loss over a plain elevation series
///
/// The baseline starts at the first value and only moves once the difference to it
/// reaches the threshold, at which point the whole difference is booked.
pub fn gain_loss_of<I: IntoIterator<Item = f64>>(elevations: I, threshold_m: f64) -> GainLoss {
    let mut values = elevations.into_iter();
    let Some(mut baseline) = values.next() else {
        return GainLoss::default();
    };

    let (mut gain, mut loss) = (0.0_f64, 0.0_f64);
    for elevation in values {
        let diff = elevation - baseline;
        if diff >= threshold_m {
            gain += diff;
            baseline = elevation;
        } else if diff <= -threshold_m {
            loss -= diff;
            baseline = elevation;
        }
    }

    GainLoss {
        gain_m: gain.round() as u32,
        loss_m: loss.round() as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hysteresis_books_whole_difference() {
        let result = gain_loss_of([100.0, 102.0, 104.0, 101.0], 3.0);
        assert_eq!(result, GainLoss { gain_m: 4, loss_m: 3 });
    }

    #[test]
    fn test_noise_below_threshold_is_ignored() {
        let noisy = [200.0, 201.5, 199.0, 200.5, 198.5, 201.0];
        assert_eq!(gain_loss_of(noisy, 3.0), GainLoss::default());
    }

    #[test]
    fn test_constant_series() {
        assert_eq!(gain_loss_of([50.0; 10], 3.0), GainLoss::default());
        assert_eq!(gain_loss_of(std::iter::empty(), 3.0), GainLoss::default());
        assert_eq!(gain_loss_of([12.0], 3.0), GainLoss::default());
    }

    #[test]
    fn test_long_climb_and_descent() {
        let up: Vec<f64> = (0..=100).map(|i| i as f64).collect();
        let down: Vec<f64> = (0..=100).rev().map(|i| i as f64).collect();
        let series = up.into_iter().chain(down);
        // the last 1 m of the climb never reaches the threshold
        assert_eq!(gain_loss_of(series, 3.0), GainLoss { gain_m: 99, loss_m: 99 });
    }

    #[test]
    fn test_unresolved_samples_are_skipped() {
        let sample = |elevation_m| ElevationSample {
            lat: 0.0,
            lon: 0.0,
            distance_m: 0.0,
            elevation_m,
        };
        let samples = [
            sample(Some(10.0)),
            sample(None),
            sample(Some(20.0)),
            sample(None),
            sample(Some(14.0)),
        ];
        assert_eq!(
            compute_gain_loss(&samples, 3.0),
            GainLoss { gain_m: 10, loss_m: 6 }
        );
    }
}
