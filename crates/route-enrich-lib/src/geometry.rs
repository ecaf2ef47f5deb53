//! Distance helpers shared by the matcher and the elevation sampler

use geo::{Coord, Rect};

/// Mean Earth radius in meters used by the haversine formula
pub const EARTH_RADIUS_M: f64 = 6371000.0;

/// Approximate length of one degree of latitude in meters
pub const METERS_PER_DEGREE: f64 = 111320.0;

/// Calculate the haversine distance between two WGS84 positions in meters
///
/// # Arguments
/// * `lat1`, `lon1` - First position in degrees
/// * `lat2`, `lon2` - Second position in degrees
#[inline]
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Haversine distance between two `geo` coordinates (x = longitude, y = latitude)
#[inline]
pub fn coord_distance(a: Coord<f64>, b: Coord<f64>) -> f64 {
    haversine_distance(a.y, a.x, b.y, b.x)
}

/// Distance in degrees from a point to the segment `(lat1, lon1)-(lat2, lon2)`
///
/// Longitude differences are scaled by `cos(plat)` before the Euclidean projection so the
/// result stays comparable in both axes away from the equator. Multiply by
/// [`METERS_PER_DEGREE`] for an approximate distance in meters.
#[inline]
pub fn point_to_segment_degrees(
    plat: f64,
    plon: f64,
    lat1: f64,
    lon1: f64,
    lat2: f64,
    lon2: f64,
) -> f64 {
    let cos_lat = plat.to_radians().cos();

    let dlat = lat2 - lat1;
    let dlon = (lon2 - lon1) * cos_lat;
    let len_sq = dlat * dlat + dlon * dlon;

    let dp_lat = plat - lat1;
    let dp_lon = (plon - lon1) * cos_lat;

    if len_sq == 0.0 {
        return (dp_lat * dp_lat + dp_lon * dp_lon).sqrt();
    }

    let t = ((dp_lat * dlat + dp_lon * dlon) / len_sq).clamp(0.0, 1.0);

    let proj_lat = lat1 + t * (lat2 - lat1);
    let proj_lon = lon1 + t * (lon2 - lon1);

    let d_lat = plat - proj_lat;
    let d_lon = (plon - proj_lon) * cos_lat;

    (d_lat * d_lat + d_lon * d_lon).sqrt()
}

/// Point-to-segment distance in meters (see [`point_to_segment_degrees`])
#[inline]
pub fn point_to_segment_meters(
    plat: f64,
    plon: f64,
    lat1: f64,
    lon1: f64,
    lat2: f64,
    lon2: f64,
) -> f64 {
    point_to_segment_degrees(plat, plon, lat1, lon1, lat2, lon2) * METERS_PER_DEGREE
}

/// Linear interpolation between two positions at `fraction` in `[0, 1]`
#[inline]
pub fn lerp_position(lat1: f64, lon1: f64, lat2: f64, lon2: f64, fraction: f64) -> (f64, f64) {
    (
        lat1 + (lat2 - lat1) * fraction,
        lon1 + (lon2 - lon1) * fraction,
    )
}

/// Check if a latitude/longitude pair is a valid WGS84 position
#[inline]
pub fn is_valid_wgs84(lat: f64, lon: f64) -> bool {
    lat.is_finite() && lon.is_finite() && (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon)
}

/// Bounding box of a set of coordinates, grown by `buffer_deg` on every side
pub fn bounding_box<I>(coords: I, buffer_deg: f64) -> Option<Rect<f64>>
where
    I: IntoIterator<Item = Coord<f64>>,
{
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    let mut found = false;

    for c in coords {
        min_x = min_x.min(c.x);
        min_y = min_y.min(c.y);
        max_x = max_x.max(c.x);
        max_y = max_y.max(c.y);
        found = true;
    }

    found.then(|| {
        Rect::new(
            Coord {
                x: min_x - buffer_deg,
                y: min_y - buffer_deg,
            },
            Coord {
                x: max_x + buffer_deg,
                y: max_y + buffer_deg,
            },
        )
    })
}
