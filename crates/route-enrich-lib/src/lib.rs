//! Route Enrich Library - Geospatial Enrichment Engines for Route Planning
//!
//! This library turns a planned route and a handful of externally fetched data sets into
//! the overlays a route planner displays next to the map: road-speed lines decoded from
//! binary vector tiles, per-point road type / surface / smoothness tags, and a
//! progressively refined elevation profile with ascent and descent totals.
//!
//! # Architecture
//!
//! - **[`decode_tile`]**: Streaming vector-tile decoder producing [`SpeedFeature`]s
//! - **[`geometry`]**: Haversine and point-to-segment distance helpers
//! - **[`AttributeMatcher`]**: Grid-indexed snapping of route samples onto road segments
//! - **[`sample_route`] / [`ElevationRefiner`]**: Fixed-interval resampling and
//!   coarse-to-fine elevation lookup
//! - **[`SegmentPool`]**: Cached, deduplicated access to an external segment source
//! - **[`speed`]**: Speed-tile loading, statistics and the adaptive color ramp
//! - **[`Route`]**: GPX / coordinate input, plus GPX export of profiles
//! - **[`Enricher`]**: High-level pipeline running the engines over one [`Route`]
//!
//! All engines are synchronous and hold no state across calls. The only long-running
//! operation, elevation refinement, is exposed as an iterator of per-pass snapshots so the
//! caller decides whether to consume intermediate results or wait for the final one.

pub mod elevation;
pub mod geometry;
mod grid;
mod gpx_io;
mod matcher;
pub mod mvt;
mod pipeline;
mod pool;
mod route;
mod segment;
pub mod speed;

// Public API exports
pub use elevation::{
    ElevationLookup, ElevationRefiner, ElevationSample, ElevationSnapshot, ElevationSummary,
    GainLoss, GainLossConfig, GradeClass, RefineConfig, RouteSample, SamplerConfig,
    compute_gain_loss, downsample_for_display, gain_loss_of, grade_series, refine_elevations,
    sample_route,
};
pub use gpx_io::{
    DEFAULT_TRACK_LOOKUP_DISTANCE_M, TrackElevationLookup, profile_to_gpx, write_gpx,
};
pub use matcher::{
    AttributeMatcher, AttributeTag, DEFAULT_MATCH_BATCH, MatchConfig, UNKNOWN, match_attributes,
    smooth_highway_flicker,
};
pub use mvt::{SpeedFeature, TileCoord, decode_tile, decode_tiles};
pub use pipeline::{EnrichedRoute, Enricher, PipelineConfig};
pub use pool::{PoolConfig, SegmentPool, SegmentSource};
pub use route::Route;
pub use segment::{
    SegmentKind, SegmentRecord, Tags, highway_label, highway_priority, smoothness_label,
    surface_label,
};
pub use speed::{
    DirectoryTileSource, Palette, SpeedOverlayConfig, SpeedStats, SpeedTileSource,
    load_speed_tile, speed_color,
};

/// Error types for the enrichment library
#[derive(Debug, thiserror::Error)]
pub enum EnrichError {
    #[error("GPX parsing error: {0}")]
    GpxParse(#[from] gpx::errors::GpxError),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Invalid sampling interval: {0} m")]
    InvalidInterval(f64),

    #[error("Elevation lookup failed: {0}")]
    ElevationLookup(String),

    #[error("Segment source failed: {0}")]
    SegmentSource(String),

    #[error("Tile source failed for {coord}: {reason}")]
    TileSource { coord: TileCoord, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Empty route")]
    EmptyRoute,

    #[error("Matching cancelled after {matched} of {total} samples")]
    Cancelled { matched: usize, total: usize },
}

pub type Result<T> = std::result::Result<T, EnrichError>;
