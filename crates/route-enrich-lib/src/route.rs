//! Route storage and parsing module
//!
//! A [`Route`] is the ordered polyline the engines work on, with the metadata they need
//! precomputed once at construction.

use crate::{EnrichError, Result, RouteSample, geometry, sample_route};
use geo::{Coord, LineString, Rect};
use std::io::Read;

/// An ordered WGS84 polyline (x = longitude, y = latitude) with optional vertex elevations
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Route {
    line: LineString<f64>,
    /// Recorded elevation per vertex, `None` when the source carried none at all
    elevations: Option<Vec<Option<f64>>>,
    bounding_box: Rect<f64>,
    /// Cached total haversine distance in meters
    cached_total_distance: f64,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Route {
    /// Build a route from GPX data
    ///
    /// All track segments are concatenated in file order. Files without track points fall
    /// back to their GPX routes.
    pub fn from_gpx(gpx: &gpx::Gpx) -> Result<Self> {
        #[cfg(feature = "profiling")]
        profiling::scope!("route::from_gpx");

        let track_points: Vec<&gpx::Waypoint> = gpx
            .tracks
            .iter()
            .flat_map(|track| &track.segments)
            .flat_map(|segment| &segment.points)
            .collect();

        let waypoints = if track_points.is_empty() {
            gpx.routes.iter().flat_map(|route| &route.points).collect()
        } else {
            track_points
        };

        Self::from_vertices(
            waypoints
                .into_iter()
                .map(|w| (w.point().y(), w.point().x(), w.elevation)),
        )
    }

    /// Parse GPX from a reader and build a route from it
    pub fn read_gpx<R: Read>(reader: R) -> Result<Self> {
        let gpx = gpx::read(reader)?;
        Self::from_gpx(&gpx)
    }

    /// Build a route from GeoJSON-ordered `[lon, lat]` pairs
    pub fn from_coordinates(coordinates: &[[f64; 2]]) -> Result<Self> {
        Self::from_vertices(coordinates.iter().map(|&[lon, lat]| (lat, lon, None)))
    }

    /// Build a route from `(lat, lon, elevation)` vertices, skipping invalid positions
    fn from_vertices<I>(vertices: I) -> Result<Self>
    where
        I: IntoIterator<Item = (f64, f64, Option<f64>)>,
    {
        let mut coords = Vec::new();
        let mut elevations = Vec::new();
        let mut total_input = 0usize;

        for (lat, lon, elevation) in vertices {
            total_input += 1;
            if !geometry::is_valid_wgs84(lat, lon) {
                tracing::warn!("Skipping point outside WGS84 bounds: ({}, {})", lat, lon);
                continue;
            }
            coords.push(Coord { x: lon, y: lat });
            elevations.push(elevation.filter(|e| e.is_finite()));
        }

        if total_input == 0 {
            return Err(EnrichError::EmptyRoute);
        }
        let Some(bounding_box) = geometry::bounding_box(coords.iter().copied(), 0.0) else {
            return Err(EnrichError::InvalidGeometry(
                "No valid points in route".to_string(),
            ));
        };

        let cached_total_distance = coords
            .windows(2)
            .map(|pair| geometry::coord_distance(pair[0], pair[1]))
            .sum();

        let elevations = elevations
            .iter()
            .any(Option::is_some)
            .then_some(elevations);

        Ok(Self {
            line: LineString::new(coords),
            elevations,
            bounding_box,
            cached_total_distance,
        })
    }

    #[inline]
    pub fn line(&self) -> &LineString<f64> {
        &self.line
    }

    #[inline]
    pub fn coords(&self) -> &[Coord<f64>] {
        &self.line.0
    }

    /// Number of vertices
    #[inline]
    pub fn len(&self) -> usize {
        self.line.0.len()
    }

    /// Always false for a constructed route
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.line.0.is_empty()
    }

    /// Recorded elevation per vertex, if the source had any
    pub fn elevations(&self) -> Option<&[Option<f64>]> {
        self.elevations.as_deref()
    }

    /// WGS84 bounding box (x = longitude, y = latitude)
    #[inline]
    pub fn bounding_box(&self) -> Rect<f64> {
        self.bounding_box
    }

    /// Total haversine length in meters
    ///
    /// This is O(1) as the value is cached during construction.
    #[inline]
    pub fn total_distance(&self) -> f64 {
        self.cached_total_distance
    }

    /// Resample the route every `interval_m` meters
    pub fn sample(&self, interval_m: f64) -> Result<Vec<RouteSample>> {
        sample_route(&self.line, interval_m)
    }
}
