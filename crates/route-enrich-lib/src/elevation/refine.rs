//! Coarse-to-fine elevation refinement
//!
//! Elevations are fetched in passes of decreasing stride. After each pass every sample
//! that has not been measured yet gets a value interpolated between its nearest measured
//! neighbours, so a usable profile exists from the first pass on and only gets denser.

use super::RouteSample;
use crate::Result;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A route sample with its (possibly still unknown) elevation
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ElevationSample {
    pub lat: f64,
    pub lon: f64,
    pub distance_m: f64,
    pub elevation_m: Option<f64>,
}

impl From<RouteSample> for ElevationSample {
    fn from(sample: RouteSample) -> Self {
        Self {
            lat: sample.lat,
            lon: sample.lon,
            distance_m: sample.distance_m,
            elevation_m: None,
        }
    }
}

/// External elevation lookup
///
/// Answers a batch of `(lat, lon)` positions with one value per position, `None` where
/// the source has no data. A returned error fails the whole batch.
pub trait ElevationLookup {
    fn lookup(&self, points: &[(f64, f64)]) -> Result<Vec<Option<f64>>>;
}

impl<F> ElevationLookup for F
where
    F: Fn(&[(f64, f64)]) -> Result<Vec<Option<f64>>>,
{
    fn lookup(&self, points: &[(f64, f64)]) -> Result<Vec<Option<f64>>> {
        self(points)
    }
}

/// Refinement configuration
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RefineConfig {
    /// Query stride of each pass, coarsest first (default `[8, 4, 2, 1]`)
    ///
    /// The first pass also queries the last sample. A final stride other than 1 leaves
    /// samples that are only ever interpolated.
    pub strides: Vec<usize>,
    /// After the last pass, copy the nearest measured value onto unresolved samples at
    /// the ends of the route
    pub fill_edges: bool,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            strides: vec![8, 4, 2, 1],
            fill_edges: true,
        }
    }
}

/// Elevation profile after one refinement pass
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ElevationSnapshot {
    /// Zero-based pass number
    pub pass: usize,
    pub stride: usize,
    /// Positions sent to the lookup in this pass
    pub queried: usize,
    /// Samples holding a measured value after this pass
    pub measured: usize,
    pub is_final: bool,
    pub samples: Vec<ElevationSample>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SampleState {
    /// Not queried yet; may hold an interpolated value
    Pending,
    Measured,
    /// Queried, but the lookup had no value
    Missing,
}

/// Iterator over refinement passes, yielding one [`ElevationSnapshot`] per pass
pub struct ElevationRefiner<'l, L: ?Sized> {
    lookup: &'l L,
    samples: Vec<ElevationSample>,
    state: Vec<SampleState>,
    strides: Vec<usize>,
    fill_edges: bool,
    next_pass: usize,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl<'l, L: ElevationLookup + ?Sized> ElevationRefiner<'l, L> {
    pub fn new(samples: &[RouteSample], lookup: &'l L, config: &RefineConfig) -> Self {
        Self {
            lookup,
            samples: samples.iter().copied().map(ElevationSample::from).collect(),
            state: vec![SampleState::Pending; samples.len()],
            strides: config.strides.iter().map(|&s| s.max(1)).collect(),
            fill_edges: config.fill_edges,
            next_pass: 0,
        }
    }

    /// Current state of the profile
    pub fn samples(&self) -> &[ElevationSample] {
        &self.samples
    }

    pub fn is_finished(&self) -> bool {
        self.next_pass >= self.strides.len()
    }

    /// Run every remaining pass and return the final profile
    pub fn finish(mut self) -> Vec<ElevationSample> {
        while self.advance().is_some() {}
        self.samples
    }

    /// Run the next pass; returns `(pass, stride, queried)` or `None` when done
    fn advance(&mut self) -> Option<(usize, usize, usize)> {
        let pass = self.next_pass;
        let stride = *self.strides.get(pass)?;
        self.next_pass += 1;

        let n = self.samples.len();
        let mut indices: Vec<usize> = (0..n)
            .step_by(stride)
            .filter(|&i| self.state[i] == SampleState::Pending)
            .collect();
        if pass == 0
            && n > 0
            && self.state[n - 1] == SampleState::Pending
            && indices.last() != Some(&(n - 1))
        {
            indices.push(n - 1);
        }

        if !indices.is_empty() {
            self.query(&indices);
        }
        self.interpolate();
        if self.is_finished() && self.fill_edges {
            self.fill_edges();
        }

        tracing::debug!(
            "Elevation pass {} (stride {}): queried {} of {} samples",
            pass,
            stride,
            indices.len(),
            n
        );
        Some((pass, stride, indices.len()))
    }

    fn query(&mut self, indices: &[usize]) {
        let points: Vec<(f64, f64)> = indices
            .iter()
            .map(|&i| (self.samples[i].lat, self.samples[i].lon))
            .collect();

        let values = match self.lookup.lookup(&points) {
            Ok(values) => {
                if values.len() != points.len() {
                    tracing::warn!(
                        "Elevation lookup returned {} values for {} points",
                        values.len(),
                        points.len()
                    );
                }
                values
            }
            Err(err) => {
                tracing::warn!("Elevation lookup failed for {} points: {}", points.len(), err);
                Vec::new()
            }
        };

        for (k, &i) in indices.iter().enumerate() {
            match values.get(k).copied().flatten().filter(|v| v.is_finite()) {
                Some(elevation) => {
                    self.samples[i].elevation_m = Some(elevation);
                    self.state[i] = SampleState::Measured;
                }
                None => self.state[i] = SampleState::Missing,
            }
        }
    }

    /// Linear interpolation by index between the nearest measured samples on each side
    fn interpolate(&mut self) {
        let n = self.samples.len();
        let mut next_measured = vec![None; n];
        let mut upcoming = None;
        for i in (0..n).rev() {
            if self.state[i] == SampleState::Measured {
                upcoming = Some(i);
            }
            next_measured[i] = upcoming;
        }

        let mut previous: Option<usize> = None;
        for i in 0..n {
            if self.state[i] == SampleState::Measured {
                previous = Some(i);
                continue;
            }
            if let (Some(a), Some(b)) = (previous, next_measured[i]) {
                let (Some(ea), Some(eb)) = (self.samples[a].elevation_m, self.samples[b].elevation_m)
                else {
                    continue;
                };
                let t = (i - a) as f64 / (b - a) as f64;
                self.samples[i].elevation_m = Some(ea + (eb - ea) * t);
            }
        }
    }

    fn fill_edges(&mut self) {
        let first = self.state.iter().position(|&s| s == SampleState::Measured);
        let last = self.state.iter().rposition(|&s| s == SampleState::Measured);
        let (Some(first), Some(last)) = (first, last) else {
            return;
        };

        let head = self.samples[first].elevation_m;
        for sample in &mut self.samples[..first] {
            sample.elevation_m = head;
        }
        let tail = self.samples[last].elevation_m;
        for sample in &mut self.samples[last + 1..] {
            sample.elevation_m = tail;
        }
    }

    fn measured_count(&self) -> usize {
        self.state
            .iter()
            .filter(|&&s| s == SampleState::Measured)
            .count()
    }
}

impl<L: ElevationLookup + ?Sized> Iterator for ElevationRefiner<'_, L> {
    type Item = ElevationSnapshot;

    fn next(&mut self) -> Option<Self::Item> {
        let (pass, stride, queried) = self.advance()?;
        Some(ElevationSnapshot {
            pass,
            stride,
            queried,
            measured: self.measured_count(),
            is_final: self.is_finished(),
            samples: self.samples.clone(),
        })
    }
}

/// Run all refinement passes with the default configuration
pub fn refine_elevations<L: ElevationLookup + ?Sized>(
    samples: &[RouteSample],
    lookup: &L,
) -> Vec<ElevationSample> {
    ElevationRefiner::new(samples, lookup, &RefineConfig::default()).finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EnrichError;
    use std::cell::RefCell;

    fn route(n: usize) -> Vec<RouteSample> {
        (0..n)
            .map(|i| RouteSample {
                lat: 48.0,
                lon: 11.0 + i as f64 * 0.0001,
                distance_m: i as f64 * 10.0,
            })
            .collect()
    }

    /// Elevation as a function of longitude, recording every batch size
    struct Terrain {
        batches: RefCell<Vec<usize>>,
    }

    impl Terrain {
        fn new() -> Self {
            Self {
                batches: RefCell::new(Vec::new()),
            }
        }

        fn height(lon: f64) -> f64 {
            ((lon - 11.0) * 10_000.0).round() * 2.0 + 500.0
        }
    }

    impl ElevationLookup for Terrain {
        fn lookup(&self, points: &[(f64, f64)]) -> Result<Vec<Option<f64>>> {
            self.batches.borrow_mut().push(points.len());
            Ok(points.iter().map(|&(_, lon)| Some(Self::height(lon))).collect())
        }
    }

    #[test]
    fn test_first_pass_queries_stride_and_last() {
        let samples = route(20);
        let terrain = Terrain::new();
        let mut refiner = ElevationRefiner::new(&samples, &terrain, &RefineConfig::default());

        let first = refiner.next().unwrap();
        assert_eq!(first.pass, 0);
        assert_eq!(first.stride, 8);
        // 0, 8, 16 and the last index 19
        assert_eq!(first.queried, 4);
        assert_eq!(first.measured, 4);
        assert!(!first.is_final);
        // everything between measured samples is already usable
        assert!(first.samples.iter().all(|s| s.elevation_m.is_some()));
    }

    #[test]
    fn test_converges_to_measured_values() {
        let samples = route(37);
        let terrain = Terrain::new();
        let snapshots: Vec<_> =
            ElevationRefiner::new(&samples, &terrain, &RefineConfig::default()).collect();

        assert_eq!(snapshots.len(), 4);
        let last = snapshots.last().unwrap();
        assert!(last.is_final);
        assert_eq!(last.measured, 37);
        for sample in &last.samples {
            assert_eq!(sample.elevation_m, Some(Terrain::height(sample.lon)));
        }

        // no sample is queried twice
        let total: usize = terrain.batches.borrow().iter().sum();
        assert_eq!(total, 37);
    }

    #[test]
    fn test_measured_count_never_decreases() {
        let samples = route(50);
        let terrain = Terrain::new();
        let counts: Vec<usize> = ElevationRefiner::new(&samples, &terrain, &RefineConfig::default())
            .map(|s| s.measured)
            .collect();
        assert!(counts.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn test_interpolation_between_measured() {
        let samples = route(9);
        // flat line except the last sample
        let lookup = |points: &[(f64, f64)]| -> Result<Vec<Option<f64>>> {
            Ok(points
                .iter()
                .map(|&(_, lon)| Some(if lon > 11.0007 { 80.0 } else { 0.0 }))
                .collect())
        };
        let mut refiner = ElevationRefiner::new(&samples, &lookup, &RefineConfig::default());
        let first = refiner.next().unwrap();

        // only indices 0 and 8 measured
        assert_eq!(first.queried, 2);
        assert_eq!(first.samples[4].elevation_m, Some(40.0));
        assert_eq!(first.samples[2].elevation_m, Some(20.0));
    }

    #[test]
    fn test_missing_values_are_interpolated() {
        let samples = route(17);
        // no data anywhere except index multiples of 8
        let lookup = |points: &[(f64, f64)]| -> Result<Vec<Option<f64>>> {
            Ok(points
                .iter()
                .map(|&(_, lon)| {
                    let i = ((lon - 11.0) * 10_000.0).round() as i64;
                    (i % 8 == 0).then_some(i as f64)
                })
                .collect())
        };
        let result = refine_elevations(&samples, &lookup);
        assert_eq!(result.len(), 17);
        for (i, sample) in result.iter().enumerate() {
            let elevation = sample.elevation_m.unwrap();
            assert!((elevation - i as f64).abs() < 1e-9, "sample {}", i);
        }
    }

    #[test]
    fn test_edges_filled_after_final_pass() {
        let samples = route(12);
        // the first three samples have no data
        let lookup = |points: &[(f64, f64)]| -> Result<Vec<Option<f64>>> {
            Ok(points
                .iter()
                .map(|&(_, lon)| (lon > 11.00025).then_some(100.0))
                .collect())
        };
        let result = refine_elevations(&samples, &lookup);
        assert!(result.iter().all(|s| s.elevation_m == Some(100.0)));
    }

    #[test]
    fn test_lookup_failure_leaves_samples_unresolved() {
        let samples = route(10);
        let lookup = |_: &[(f64, f64)]| -> Result<Vec<Option<f64>>> {
            Err(EnrichError::ElevationLookup("service unavailable".into()))
        };
        let result = refine_elevations(&samples, &lookup);
        assert_eq!(result.len(), 10);
        assert!(result.iter().all(|s| s.elevation_m.is_none()));
    }

    #[test]
    fn test_short_response_marks_rest_missing() {
        let samples = route(4);
        let lookup = |points: &[(f64, f64)]| -> Result<Vec<Option<f64>>> {
            Ok(vec![Some(10.0); points.len().min(1)])
        };
        let result = refine_elevations(&samples, &lookup);
        // only the first point of each batch gets a value; the unanswered end is edge-filled
        assert!(result.iter().all(|s| s.elevation_m == Some(10.0)));
    }

    #[test]
    fn test_empty_and_single_sample() {
        let terrain = Terrain::new();
        assert!(refine_elevations(&[], &terrain).is_empty());
        assert!(terrain.batches.borrow().is_empty());

        let single = route(1);
        let result = refine_elevations(&single, &terrain);
        assert_eq!(result[0].elevation_m, Some(500.0));
        assert_eq!(*terrain.batches.borrow(), vec![1]);
    }
}
