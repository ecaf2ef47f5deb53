//! Snapping of route samples onto nearby road/path segments
//!
//! Every sample looks at the segments bucketed in its own grid cell and the 8 cells around
//! it, drops those further than the distance cutoff and scores the rest by road-type
//! priority, distance, continuity with the previous sample's match and a penalty for
//! grade-separated infrastructure. The winner's `highway`/`surface`/`smoothness` tags
//! become the sample's [`AttributeTag`]. A final pass removes single-sample flickers in
//! the `highway` sequence.

use crate::grid::GridIndex;
use crate::{EnrichError, Result, RouteSample, SegmentRecord, geometry, highway_priority};
use std::ops::ControlFlow;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Sentinel for an attribute that could not be determined
pub const UNKNOWN: &str = "unknown";

/// Samples matched between two progress reports
pub const DEFAULT_MATCH_BATCH: usize = 100;

/// Road attributes attached to one route sample
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AttributeTag {
    pub highway: String,
    pub surface: String,
    pub smoothness: String,
}

impl AttributeTag {
    /// The all-"unknown" tag used when nothing matched
    pub fn unknown() -> Self {
        Self {
            highway: UNKNOWN.to_string(),
            surface: UNKNOWN.to_string(),
            smoothness: UNKNOWN.to_string(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.highway == UNKNOWN && self.surface == UNKNOWN && self.smoothness == UNKNOWN
    }

    fn from_segment(segment: &SegmentRecord) -> Self {
        let field = |value: Option<&str>| value.unwrap_or(UNKNOWN).to_string();
        Self {
            highway: field(segment.tags.highway()),
            surface: field(segment.tags.surface()),
            smoothness: field(segment.tags.smoothness()),
        }
    }
}

impl Default for AttributeTag {
    fn default() -> Self {
        Self::unknown()
    }
}

/// Tuning of the matching heuristic
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MatchConfig {
    /// Grid cell size in degrees (default 0.01, about 1.1 km)
    pub cell_size_deg: f64,
    /// Candidates further than this are ignored (default 50 m)
    pub max_distance_m: f64,
    /// Score lost per meter of distance (default 35)
    pub distance_penalty_per_m: f64,
    /// Bonus for staying on the previous sample's way (default 50)
    pub same_way_bonus: f64,
    /// Bonus for keeping the previous sample's road type (default 30)
    pub same_highway_bonus: f64,
    /// Penalty for `tunnel=yes` (default 60)
    pub tunnel_penalty: f64,
    /// Penalty for a negative `layer` (default 50)
    pub underground_penalty: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            cell_size_deg: 0.01,
            max_distance_m: 50.0,
            distance_penalty_per_m: 35.0,
            same_way_bonus: 50.0,
            same_highway_bonus: 30.0,
            tunnel_penalty: 60.0,
            underground_penalty: 50.0,
        }
    }
}

/// The previous sample's match, used for continuity bonuses
#[derive(Debug, Clone, Copy)]
struct LastMatch<'a> {
    way_id: i64,
    highway: &'a str,
}

/// Matcher over one fixed set of segments
///
/// Building the matcher indexes the segments once; [`AttributeMatcher::match_samples`] can
/// then be called for any number of sample sequences. Continuity state lives only inside a
/// single call.
#[derive(Debug, Clone)]
pub struct AttributeMatcher<'a> {
    segments: &'a [SegmentRecord],
    grid: GridIndex,
    config: MatchConfig,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl<'a> AttributeMatcher<'a> {
    /// Index the line segments of `segments` by midpoint
    ///
    /// Point records and zero-length edges are left out of the index.
    pub fn new(segments: &'a [SegmentRecord], config: MatchConfig) -> Self {
        let mut grid = GridIndex::new(config.cell_size_deg);
        let mut skipped = 0usize;

        for (index, segment) in segments.iter().enumerate() {
            if segment.is_degenerate() {
                skipped += 1;
                continue;
            }
            let (lat, lon) = segment.midpoint();
            grid.insert(lat, lon, index);
        }

        tracing::debug!(
            "Indexed {} segments in {} cells ({} degenerate skipped)",
            segments.len() - skipped,
            grid.cell_count(),
            skipped
        );

        Self {
            segments,
            grid,
            config,
        }
    }

    #[inline]
    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Tag every sample, returning a sequence parallel to `samples`
    pub fn match_samples(&self, samples: &[RouteSample]) -> Vec<AttributeTag> {
        if self.segments.is_empty() {
            return vec![AttributeTag::unknown(); samples.len()];
        }

        let mut last: Option<LastMatch<'a>> = None;
        let mut tags: Vec<AttributeTag> = samples
            .iter()
            .map(|sample| self.match_one(sample, &mut last))
            .collect();

        self.finish(&mut tags);
        tags
    }

    /// [`Self::match_samples`] in batches of `batch_size` samples
    ///
    /// `on_progress` receives the fraction of samples matched after every batch. Returning
    /// [`ControlFlow::Break`] before the last batch stops matching with
    /// [`EnrichError::Cancelled`]. Continuity carries over batch boundaries, so a completed
    /// run returns exactly what [`Self::match_samples`] returns.
    pub fn match_samples_with_progress<F>(
        &self,
        samples: &[RouteSample],
        batch_size: usize,
        mut on_progress: F,
    ) -> Result<Vec<AttributeTag>>
    where
        F: FnMut(f64) -> ControlFlow<()>,
    {
        if self.segments.is_empty() {
            return Ok(vec![AttributeTag::unknown(); samples.len()]);
        }

        let mut last: Option<LastMatch<'a>> = None;
        let mut tags = Vec::with_capacity(samples.len());

        for batch in samples.chunks(batch_size.max(1)) {
            tags.extend(batch.iter().map(|sample| self.match_one(sample, &mut last)));

            let done = tags.len() == samples.len();
            if on_progress(tags.len() as f64 / samples.len() as f64).is_break() && !done {
                tracing::debug!("Matching cancelled at {}/{}", tags.len(), samples.len());
                return Err(EnrichError::Cancelled {
                    matched: tags.len(),
                    total: samples.len(),
                });
            }
        }

        self.finish(&mut tags);
        Ok(tags)
    }

    fn match_one(&self, sample: &RouteSample, last: &mut Option<LastMatch<'a>>) -> AttributeTag {
        match self.best_candidate(sample, *last) {
            Some(segment) if !segment.tags.is_empty() => {
                *last = Some(LastMatch {
                    way_id: segment.id,
                    highway: segment.tags.highway().unwrap_or(UNKNOWN),
                });
                AttributeTag::from_segment(segment)
            }
            _ => {
                *last = None;
                AttributeTag::unknown()
            }
        }
    }

    fn finish(&self, tags: &mut [AttributeTag]) {
        smooth_highway_flicker(tags);

        let matched = tags.iter().filter(|t| !t.is_unknown()).count();
        tracing::debug!("Matched {}/{} samples", matched, tags.len());
    }

    /// Highest-scoring segment within the distance cutoff; first found wins ties
    fn best_candidate(
        &self,
        sample: &RouteSample,
        last: Option<LastMatch<'_>>,
    ) -> Option<&'a SegmentRecord> {
        let segments: &'a [SegmentRecord] = self.segments;
        let mut best: Option<(&'a SegmentRecord, f64)> = None;

        for index in self.grid.neighbourhood(sample.lat, sample.lon) {
            let segment = &segments[index];
            let distance_m = geometry::point_to_segment_meters(
                sample.lat,
                sample.lon,
                segment.endpoint1.0,
                segment.endpoint1.1,
                segment.endpoint2.0,
                segment.endpoint2.1,
            );
            if distance_m > self.config.max_distance_m {
                continue;
            }

            let score = self.score(segment, distance_m, last);
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((segment, score));
            }
        }

        best.map(|(segment, _)| segment)
    }

    fn score(&self, segment: &SegmentRecord, distance_m: f64, last: Option<LastMatch<'_>>) -> f64 {
        let highway = segment.tags.highway().unwrap_or(UNKNOWN);
        let mut score = highway_priority(highway) - distance_m * self.config.distance_penalty_per_m;

        if segment.tags.is_tunnel() {
            score -= self.config.tunnel_penalty;
        }
        if segment.tags.layer().is_some_and(|layer| layer < 0) {
            score -= self.config.underground_penalty;
        }

        if let Some(last) = last {
            if segment.id == last.way_id {
                score += self.config.same_way_bonus;
            } else if highway == last.highway {
                score += self.config.same_highway_bonus;
            }
        }

        score
    }
}

/// Tag `samples` against `segments` with the default configuration
pub fn match_attributes(segments: &[SegmentRecord], samples: &[RouteSample]) -> Vec<AttributeTag> {
    AttributeMatcher::new(segments, MatchConfig::default()).match_samples(samples)
}

/// Replace isolated `highway` changes (`A, B, A`) with the preceding tag
///
/// Runs left to right in place, so a replaced tag is the `i - 1` neighbour of the next
/// position.
pub fn smooth_highway_flicker(tags: &mut [AttributeTag]) {
    for i in 1..tags.len().saturating_sub(1) {
        let prev = &tags[i - 1].highway;
        if tags[i].highway != *prev && *prev == tags[i + 1].highway {
            tags[i] = tags[i - 1].clone();
        }
    }
}
