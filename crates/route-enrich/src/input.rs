//! Reading routes, segment records and elevation sources from disk

use crate::error::{CliError, Result};
use crate::settings::ElevationArgs;
use route_enrich_lib::{
    EnrichError, Route, SegmentKind, SegmentRecord, Tags, TrackElevationLookup,
};
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

fn open(path: &Path) -> Result<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| CliError::File {
            path: path.to_path_buf(),
            source,
        })
}

fn is_gpx(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("gpx"))
}

/// Load a route from a `.gpx` file or from JSON coordinates
pub fn load_route(path: &Path) -> Result<Route> {
    let reader = open(path)?;
    let route = if is_gpx(path) {
        Route::read_gpx(reader)?
    } else {
        let json: RouteJson = serde_json::from_reader(reader)?;
        route_from_json(json)?
    };

    tracing::info!(
        "Loaded route {} ({} points, {:.2} km)",
        path.display(),
        route.len(),
        route.total_distance() / 1000.0
    );
    Ok(route)
}

/// Accepted route JSON shapes, all with `[lon, lat, ...]` positions
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RouteJson {
    Feature { geometry: LineStringJson },
    LineString(LineStringJson),
    Coordinates(Vec<Vec<f64>>),
}

#[derive(Debug, Deserialize)]
pub struct LineStringJson {
    coordinates: Vec<Vec<f64>>,
}

pub fn route_from_json(json: RouteJson) -> Result<Route> {
    let positions = match json {
        RouteJson::Feature { geometry } => geometry.coordinates,
        RouteJson::LineString(line) => line.coordinates,
        RouteJson::Coordinates(coordinates) => coordinates,
    };

    let coordinates = positions
        .iter()
        .enumerate()
        .map(|(i, position)| match position.as_slice() {
            [lon, lat, ..] => Ok([*lon, *lat]),
            _ => Err(CliError::InvalidInput(format!(
                "position {} needs at least [lon, lat]",
                i
            ))),
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Route::from_coordinates(&coordinates)?)
}

/// Segment lookup response: `{"elements": [...]}`
#[derive(Debug, Deserialize)]
pub struct SegmentsJson {
    #[serde(default)]
    elements: Vec<ElementJson>,
}

#[derive(Debug, Deserialize)]
struct ElementJson {
    id: i64,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    lat1: f64,
    lon1: f64,
    lat2: Option<f64>,
    lon2: Option<f64>,
    #[serde(default)]
    tags: serde_json::Map<String, serde_json::Value>,
}

impl From<ElementJson> for SegmentRecord {
    fn from(element: ElementJson) -> Self {
        // Non-string tag values are kept as their JSON text
        let tags: Tags = element
            .tags
            .into_iter()
            .map(|(key, value)| match value {
                serde_json::Value::String(s) => (key, s),
                other => (key, other.to_string()),
            })
            .collect();

        let endpoint1 = (element.lat1, element.lon1);
        let endpoint2 = (
            element.lat2.unwrap_or(element.lat1),
            element.lon2.unwrap_or(element.lon1),
        );

        let mut record = SegmentRecord::new(element.id, endpoint1, endpoint2, tags);
        if element.kind.as_deref() == Some("node") {
            record.kind = SegmentKind::Node;
        }
        record
    }
}

pub fn segments_from_json(json: SegmentsJson) -> Vec<SegmentRecord> {
    json.elements.into_iter().map(SegmentRecord::from).collect()
}

/// Load segment records; no file means no segments
pub fn load_segments(path: Option<&Path>) -> Result<Vec<SegmentRecord>> {
    let Some(path) = path else {
        tracing::warn!("No segment file given, every sample will be tagged unknown");
        return Ok(Vec::new());
    };

    let json: SegmentsJson = serde_json::from_reader(open(path)?)?;
    let segments = segments_from_json(json);
    tracing::info!("Loaded {} segment records from {}", segments.len(), path.display());
    Ok(segments)
}

/// Elevation source for a route: `--elevation-gpx` if given, else the route's own elevations
pub fn elevation_lookup(route: &Route, args: &ElevationArgs) -> Result<TrackElevationLookup> {
    let lookup = match &args.elevation_gpx {
        Some(path) => {
            let recorded = Route::read_gpx(open(path)?)?;
            TrackElevationLookup::from_route(&recorded, args.lookup_distance)
        }
        None => TrackElevationLookup::from_route(route, args.lookup_distance),
    };

    match lookup {
        Ok(lookup) => {
            tracing::info!("Elevation source holds {} recorded points", lookup.len());
            Ok(lookup)
        }
        Err(EnrichError::ElevationLookup(reason)) => Err(CliError::InvalidInput(format!(
            "{}; pass --elevation-gpx with a recorded track",
            reason
        ))),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_json_shapes() {
        let raw: RouteJson = serde_json::from_str("[[11.0, 48.0], [11.001, 48.0, 512.0]]").unwrap();
        assert_eq!(route_from_json(raw).unwrap().len(), 2);

        let line: RouteJson = serde_json::from_str(
            r#"{"type": "LineString", "coordinates": [[11.0, 48.0], [11.001, 48.0]]}"#,
        )
        .unwrap();
        assert_eq!(route_from_json(line).unwrap().len(), 2);

        let feature: RouteJson = serde_json::from_str(
            r#"{"type": "Feature", "properties": {}, "geometry": {"type": "LineString", "coordinates": [[11.0, 48.0], [11.001, 48.0], [11.002, 48.0]]}}"#,
        )
        .unwrap();
        let route = route_from_json(feature).unwrap();
        assert_eq!(route.len(), 3);
        assert_eq!(route.coords()[0].x, 11.0);
        assert_eq!(route.coords()[0].y, 48.0);
    }

    #[test]
    fn test_route_json_short_position() {
        let raw: RouteJson = serde_json::from_str("[[11.0, 48.0], [11.001]]").unwrap();
        assert!(matches!(route_from_json(raw), Err(CliError::InvalidInput(_))));
    }

    #[test]
    fn test_route_json_empty() {
        let raw: RouteJson = serde_json::from_str("[]").unwrap();
        assert!(matches!(
            route_from_json(raw),
            Err(CliError::Enrich(EnrichError::EmptyRoute))
        ));
    }

    #[test]
    fn test_segments_json() {
        let json: SegmentsJson = serde_json::from_str(
            r#"{"elements": [
                {"id": 7, "type": "way", "lat1": 48.0, "lon1": 11.0, "lat2": 48.001, "lon2": 11.0,
                 "tags": {"highway": "residential", "layer": -1, "oneway": true}},
                {"id": 8, "type": "node", "lat1": 48.0, "lon1": 11.0, "tags": {"barrier": "gate"}},
                {"id": 9, "lat1": 48.0, "lon1": 11.0, "lat2": 48.0, "lon2": 11.001}
            ]}"#,
        )
        .unwrap();

        let segments = segments_from_json(json);
        assert_eq!(segments.len(), 3);

        assert_eq!(segments[0].kind, SegmentKind::Way);
        assert_eq!(segments[0].tags.highway(), Some("residential"));
        assert_eq!(segments[0].tags.layer(), Some(-1));
        assert_eq!(segments[0].tags.get("oneway"), Some("true"));

        assert_eq!(segments[1].kind, SegmentKind::Node);
        assert_eq!(segments[1].endpoint1, segments[1].endpoint2);
        assert!(segments[1].is_degenerate());

        assert_eq!(segments[2].kind, SegmentKind::Way);
        assert!(segments[2].tags.is_empty());
    }

    #[test]
    fn test_missing_elements_is_empty() {
        let json: SegmentsJson = serde_json::from_str("{}").unwrap();
        assert!(segments_from_json(json).is_empty());
    }

    #[test]
    fn test_gpx_extension() {
        assert!(is_gpx(Path::new("ride.GPX")));
        assert!(is_gpx(Path::new("dir/ride.gpx")));
        assert!(!is_gpx(Path::new("ride.json")));
        assert!(!is_gpx(Path::new("gpx")));
    }
}
