//! Cached access to an external segment-data source
//!
//! The source answers radius queries. Route coordinates are bucketed into square query
//! cells; each cell is fetched once and its records are kept for the lifetime of the pool.
//! Lookups return the deduplicated records whose midpoint falls in the route's bounding
//! box, so overlapping radius queries and neighbouring routes share one record pool.

use crate::grid::{CellKey, cell_key};
use crate::{Result, SegmentRecord, geometry};
use dashmap::DashMap;
use geo::Coord;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// External segment lookup answering radius queries around a `(lat, lon)` center
pub trait SegmentSource: Sync {
    fn fetch_segments(&self, center: (f64, f64), radius_m: f64) -> Result<Vec<SegmentRecord>>;
}

impl<F> SegmentSource for F
where
    F: Fn((f64, f64), f64) -> Result<Vec<SegmentRecord>> + Sync,
{
    fn fetch_segments(&self, center: (f64, f64), radius_m: f64) -> Result<Vec<SegmentRecord>> {
        self(center, radius_m)
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PoolConfig {
    /// Query cell size in degrees (default 0.02)
    pub cell_size_deg: f64,
    /// Cells fetched concurrently per batch (default 4)
    pub batch_size: usize,
    /// Growth of the route bounding box when selecting records (default 0.005°)
    pub bbox_buffer_deg: f64,
    /// Query radius as a fraction of the cell size in meters (default 0.8)
    pub radius_factor: f64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            cell_size_deg: 0.02,
            batch_size: 4,
            bbox_buffer_deg: 0.005,
            radius_factor: 0.8,
        }
    }
}

/// Segment records shared across lookups
pub struct SegmentPool<S> {
    source: S,
    config: PoolConfig,
    cells: DashMap<CellKey, Arc<Vec<SegmentRecord>>>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl<S: SegmentSource> SegmentPool<S> {
    pub fn new(source: S, config: PoolConfig) -> Self {
        Self {
            source,
            config,
            cells: DashMap::new(),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Number of cells fetched so far
    pub fn cached_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn clear(&self) {
        self.cells.clear();
    }

    /// Records relevant to a route given as `x = lon, y = lat` coordinates
    ///
    /// Missing cells are fetched first. A failed cell is logged, contributes nothing and is
    /// fetched again on the next call. The result is ordered by way id, then endpoints.
    pub fn segments_for_route(&self, coords: &[Coord<f64>]) -> Vec<SegmentRecord> {
        #[cfg(feature = "profiling")]
        profiling::scope!("pool::segments_for_route");

        let Some(bbox) = geometry::bounding_box(coords.iter().copied(), self.config.bbox_buffer_deg)
        else {
            return Vec::new();
        };

        let mut seen = HashSet::new();
        let missing: Vec<CellKey> = coords
            .iter()
            .map(|c| cell_key(c.y, c.x, self.config.cell_size_deg))
            .filter(|key| seen.insert(*key) && !self.cells.contains_key(key))
            .collect();

        if !missing.is_empty() {
            tracing::debug!("Fetching {} segment cells", missing.len());
            for batch in missing.chunks(self.config.batch_size.max(1)) {
                batch.par_iter().for_each(|&key| self.fetch_cell(key));
            }
        }

        let (min, max) = (bbox.min(), bbox.max());
        let mut unique = BTreeMap::new();
        for cell in self.cells.iter() {
            for record in cell.value().iter() {
                let (lat, lon) = record.midpoint();
                if lat >= min.y && lat <= max.y && lon >= min.x && lon <= max.x {
                    unique
                        .entry(record.dedup_key())
                        .or_insert_with(|| record.clone());
                }
            }
        }

        tracing::debug!(
            "Segment pool: {} cells cached, {} records near route",
            self.cells.len(),
            unique.len()
        );
        unique.into_values().collect()
    }

    fn fetch_cell(&self, key: CellKey) {
        let size = self.config.cell_size_deg;
        let center = ((key.0 as f64 + 0.5) * size, (key.1 as f64 + 0.5) * size);
        let radius_m = size * geometry::METERS_PER_DEGREE * self.config.radius_factor;

        match self.source.fetch_segments(center, radius_m) {
            Ok(records) => {
                self.cells.insert(key, Arc::new(records));
            }
            Err(err) => {
                tracing::warn!(
                    "Segment fetch around ({:.4}, {:.4}) failed: {}",
                    center.0,
                    center.1,
                    err
                );
            }
        }
    }
}
