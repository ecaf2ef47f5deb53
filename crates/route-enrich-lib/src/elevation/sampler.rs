//! Fixed-interval resampling of a route polyline

use crate::{EnrichError, Result, geometry};
use geo::LineString;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A point on the route at a known distance from its start
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RouteSample {
    pub lat: f64,
    pub lon: f64,
    /// Cumulative haversine distance from the first sample in meters
    pub distance_m: f64,
}

/// Resampling configuration
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SamplerConfig {
    /// Distance between consecutive samples in meters (default 10)
    pub interval_m: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self { interval_m: 10.0 }
    }
}

/// Relative slack when comparing walked distance against the interval
const INTERVAL_EPSILON: f64 = 1e-9;

/// An interval sample closer than this fraction of the interval to the final vertex is
/// replaced by the vertex instead of being kept next to it
const END_SNAP_FRACTION: f64 = 1e-3;

/// Resample `polyline` (x = longitude, y = latitude) every `interval_m` meters
///
/// The first and last vertices are always part of the output. Intermediate samples are
/// linearly interpolated inside the polyline edge where the walked distance crosses the
/// next multiple of the interval. Cumulative distances are recomputed over the emitted
/// samples.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn sample_route(polyline: &LineString<f64>, interval_m: f64) -> Result<Vec<RouteSample>> {
    if !interval_m.is_finite() || interval_m <= 0.0 {
        return Err(EnrichError::InvalidInterval(interval_m));
    }

    let coords = &polyline.0;
    let Some(first) = coords.first() else {
        return Ok(Vec::new());
    };

    let mut positions: Vec<(f64, f64)> = vec![(first.y, first.x)];
    let mut walked = 0.0;

    for pair in coords.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let edge_len = geometry::coord_distance(a, b);
        if !edge_len.is_finite() {
            tracing::warn!("Skipping polyline edge with invalid length: {:?} -> {:?}", a, b);
            continue;
        }

        let mut t = 0.0;
        while t < edge_len {
            let step = (interval_m - walked).min(edge_len - t);
            t += step;
            walked += step;
            if walked >= interval_m * (1.0 - INTERVAL_EPSILON) {
                let (lat, lon) = geometry::lerp_position(a.y, a.x, b.y, b.x, t / edge_len);
                positions.push((lat, lon));
                walked = 0.0;
            }
        }
    }

    if coords.len() > 1 {
        let last = coords[coords.len() - 1];
        let end = (last.y, last.x);
        let snap = positions.len() > 1
            && positions.last().is_some_and(|&(lat, lon)| {
                geometry::haversine_distance(lat, lon, end.0, end.1) < interval_m * END_SNAP_FRACTION
            });
        if snap {
            positions.pop();
        }
        positions.push(end);
    }

    let mut samples = Vec::with_capacity(positions.len());
    let mut cumulative = 0.0;
    for (i, &(lat, lon)) in positions.iter().enumerate() {
        if i > 0 {
            let (prev_lat, prev_lon) = positions[i - 1];
            cumulative += geometry::haversine_distance(prev_lat, prev_lon, lat, lon);
        }
        samples.push(RouteSample {
            lat,
            lon,
            distance_m: cumulative,
        });
    }

    Ok(samples)
}
