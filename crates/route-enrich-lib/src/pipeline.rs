//! High-level enrichment pipeline
//!
//! Samples a route once and feeds the same samples to the attribute matcher and the
//! elevation refiner, which run concurrently.

use crate::speed::SpeedOverlayConfig;
use crate::{
    AttributeMatcher, AttributeTag, ElevationLookup, ElevationRefiner, ElevationSample,
    ElevationSummary, GainLoss, GainLossConfig, MatchConfig, PoolConfig, RefineConfig, Result,
    Route, RouteSample, SamplerConfig, SegmentPool, SegmentRecord, SegmentSource,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration of every engine
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PipelineConfig {
    pub sampler: SamplerConfig,
    pub matcher: MatchConfig,
    pub refine: RefineConfig,
    pub gain_loss: GainLossConfig,
    pub pool: PoolConfig,
    pub speed: SpeedOverlayConfig,
}

/// Result of enriching one route
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EnrichedRoute {
    pub samples: Vec<RouteSample>,
    /// One tag per sample
    pub tags: Vec<AttributeTag>,
    /// Final refined profile, one entry per sample
    pub elevations: Vec<ElevationSample>,
    pub gain_loss: GainLoss,
    pub summary: ElevationSummary,
}

/// Runs the engines over routes with a fixed configuration
#[derive(Debug, Clone, Default)]
pub struct Enricher {
    config: PipelineConfig,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Enricher {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    #[inline]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Resample a route at the configured interval
    pub fn sample(&self, route: &Route) -> Result<Vec<RouteSample>> {
        route.sample(self.config.sampler.interval_m)
    }

    /// Tag and profile `route` against already fetched segments
    pub fn enrich<L>(
        &self,
        route: &Route,
        segments: &[SegmentRecord],
        lookup: &L,
    ) -> Result<EnrichedRoute>
    where
        L: ElevationLookup + Sync + ?Sized,
    {
        #[cfg(feature = "profiling")]
        profiling::scope!("pipeline::enrich");

        let samples = self.sample(route)?;
        tracing::debug!(
            "Enriching {:.0} m route: {} samples, {} segments",
            route.total_distance(),
            samples.len(),
            segments.len()
        );

        let (tags, elevations) = rayon::join(
            || AttributeMatcher::new(segments, self.config.matcher.clone()).match_samples(&samples),
            || self.refine_progressively(&samples, lookup).finish(),
        );

        let threshold = self.config.gain_loss.threshold_m;
        let summary = ElevationSummary::from_samples(&elevations, threshold);

        Ok(EnrichedRoute {
            gain_loss: summary.gain_loss,
            summary,
            samples,
            tags,
            elevations,
        })
    }

    /// Like [`Enricher::enrich`], fetching the segments near the route through `pool`
    pub fn enrich_with_pool<S, L>(
        &self,
        route: &Route,
        pool: &SegmentPool<S>,
        lookup: &L,
    ) -> Result<EnrichedRoute>
    where
        S: SegmentSource,
        L: ElevationLookup + Sync + ?Sized,
    {
        let segments = pool.segments_for_route(route.coords());
        self.enrich(route, &segments, lookup)
    }

    /// Refinement passes over `samples`, one snapshot per pass
    pub fn refine_progressively<'l, L>(
        &self,
        samples: &[RouteSample],
        lookup: &'l L,
    ) -> ElevationRefiner<'l, L>
    where
        L: ElevationLookup + ?Sized,
    {
        ElevationRefiner::new(samples, lookup, &self.config.refine)
    }
}
