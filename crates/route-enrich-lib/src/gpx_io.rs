//! GPX-backed elevation lookup and GPX export of elevation profiles

use crate::grid::GridIndex;
use crate::{ElevationLookup, ElevationSample, EnrichError, Result, Route, geometry};
use gpx::{Gpx, GpxVersion, Track, TrackSegment, Waypoint};
use std::io::Write;

/// Default search radius of [`TrackElevationLookup`]
pub const DEFAULT_TRACK_LOOKUP_DISTANCE_M: f64 = 50.0;

/// Elevation lookup answering from elevations recorded along a track
///
/// Each query takes the elevation of the nearest recorded vertex within the distance limit.
#[derive(Debug, Clone)]
pub struct TrackElevationLookup {
    /// `(lat, lon, elevation)`
    points: Vec<(f64, f64, f64)>,
    grid: GridIndex,
    max_distance_m: f64,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl TrackElevationLookup {
    pub fn new(points: Vec<(f64, f64, f64)>, max_distance_m: f64) -> Result<Self> {
        if points.is_empty() {
            return Err(EnrichError::ElevationLookup(
                "no recorded elevations".to_string(),
            ));
        }

        // Cells must span at least the search radius in both directions at the highest
        // latitude present
        let max_abs_lat = points.iter().map(|p| p.0.abs()).fold(0.0_f64, f64::max);
        let lon_scale = max_abs_lat.to_radians().cos().max(0.01);
        let cell_size = (max_distance_m / (geometry::METERS_PER_DEGREE * lon_scale)).max(1e-6);

        let mut grid = GridIndex::new(cell_size);
        for (i, &(lat, lon, _)) in points.iter().enumerate() {
            grid.insert(lat, lon, i);
        }

        tracing::debug!(
            "Indexed {} recorded elevations in {} cells",
            points.len(),
            grid.cell_count()
        );

        Ok(Self {
            points,
            grid,
            max_distance_m,
        })
    }

    /// Use the elevations recorded on the vertices of `route`
    pub fn from_route(route: &Route, max_distance_m: f64) -> Result<Self> {
        let points = match route.elevations() {
            Some(elevations) => route
                .coords()
                .iter()
                .zip(elevations)
                .filter_map(|(c, e)| e.map(|e| (c.y, c.x, e)))
                .collect(),
            None => Vec::new(),
        };
        Self::new(points, max_distance_m)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    fn nearest(&self, lat: f64, lon: f64) -> Option<f64> {
        self.grid
            .neighbourhood(lat, lon)
            .map(|i| {
                let (plat, plon, elevation) = self.points[i];
                (geometry::haversine_distance(lat, lon, plat, plon), elevation)
            })
            .filter(|&(distance, _)| distance <= self.max_distance_m)
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, elevation)| elevation)
    }
}

impl ElevationLookup for TrackElevationLookup {
    fn lookup(&self, points: &[(f64, f64)]) -> Result<Vec<Option<f64>>> {
        Ok(points
            .iter()
            .map(|&(lat, lon)| self.nearest(lat, lon))
            .collect())
    }
}

/// A single-track GPX document holding the resolved part of an elevation profile
pub fn profile_to_gpx(samples: &[ElevationSample], name: Option<&str>) -> Gpx {
    let points = samples
        .iter()
        .map(|sample| {
            let mut waypoint = Waypoint::new(geo::Point::new(sample.lon, sample.lat));
            waypoint.elevation = sample.elevation_m;
            waypoint
        })
        .collect();

    let mut segment = TrackSegment::new();
    segment.points = points;

    let mut track = Track::new();
    track.name = name.map(str::to_string);
    track.segments.push(segment);

    Gpx {
        version: GpxVersion::Gpx11,
        creator: Some(format!("route-enrich {}", env!("CARGO_PKG_VERSION"))),
        tracks: vec![track],
        ..Default::default()
    }
}

/// Serialize a GPX document
pub fn write_gpx<W: Write>(gpx: &Gpx, writer: W) -> Result<()> {
    gpx::write(gpx, writer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(lat: f64, lon: f64, elevation_m: Option<f64>) -> ElevationSample {
        ElevationSample {
            lat,
            lon,
            distance_m: 0.0,
            elevation_m,
        }
    }

    #[test]
    fn test_nearest_recorded_elevation() {
        let lookup = TrackElevationLookup::new(
            vec![(47.0, 8.0, 400.0), (47.0, 8.001, 420.0), (47.0, 8.002, 440.0)],
            DEFAULT_TRACK_LOOKUP_DISTANCE_M,
        )
        .unwrap();

        let values = lookup
            .lookup(&[(47.0, 8.0001), (47.00005, 8.0019), (47.0004, 8.0005), (47.1, 8.0)])
            .unwrap();
        assert_eq!(values, vec![Some(400.0), Some(440.0), None, None]);
    }

    #[test]
    fn test_from_route_uses_recorded_vertices() {
        let route = Route::read_gpx(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test" xmlns="http://www.topografix.com/GPX/1/1">
  <trk><trkseg>
    <trkpt lat="47.0" lon="8.0"><ele>400</ele></trkpt>
    <trkpt lat="47.0003" lon="8.0"></trkpt>
    <trkpt lat="47.0006" lon="8.0"><ele>460</ele></trkpt>
  </trkseg></trk>
</gpx>"#
                .as_bytes(),
        )
        .unwrap();

        let lookup = TrackElevationLookup::from_route(&route, 20.0).unwrap();
        assert_eq!(lookup.len(), 2);
        assert_eq!(lookup.lookup(&[(47.00059, 8.0)]).unwrap(), vec![Some(460.0)]);
        assert_eq!(lookup.lookup(&[(47.0003, 8.0)]).unwrap(), vec![None]);
    }

    #[test]
    fn test_route_without_elevations() {
        let route = Route::from_coordinates(&[[8.0, 47.0], [8.001, 47.0]]).unwrap();
        assert!(matches!(
            TrackElevationLookup::from_route(&route, 50.0),
            Err(EnrichError::ElevationLookup(_))
        ));
    }

    #[test]
    fn test_export_profile() {
        let samples = vec![
            sample(47.0, 8.0, Some(400.0)),
            sample(47.0001, 8.0, None),
            sample(47.0002, 8.0, Some(402.5)),
        ];
        let gpx = profile_to_gpx(&samples, Some("Lunch ride"));
        assert_eq!(gpx.tracks.len(), 1);
        assert_eq!(gpx.tracks[0].name.as_deref(), Some("Lunch ride"));

        let mut buffer = Vec::new();
        write_gpx(&gpx, &mut buffer).unwrap();

        let route = Route::read_gpx(buffer.as_slice()).unwrap();
        assert_eq!(route.len(), 3);
        assert_eq!(route.elevations(), Some(&[Some(400.0), None, Some(402.5)][..]));
    }
}
