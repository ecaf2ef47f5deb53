//! Road-speed overlay support: tile loading, speed statistics, color ramp and hit-testing

use crate::mvt::{DEFAULT_EXTENT, SpeedFeature, TileCoord, decode_tile};
use crate::{EnrichError, Result};
use std::fmt;
use std::path::PathBuf;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Path of a routing-engine speed tile, relative to the service base URL
pub const ROUTING_TILE_TEMPLATE: &str = "/tile/v1/driving/tile({x},{y},{z}).mvt";

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpeedOverlayConfig {
    /// Tiles below this zoom are not loaded (default 15)
    pub min_zoom: u8,
    /// Coordinate extent assumed for features that do not carry one (default 4096)
    pub extent: u32,
    /// Maximum pixel distance for [`nearest_feature`] (default 10)
    pub hit_tolerance_px: f64,
}

impl Default for SpeedOverlayConfig {
    fn default() -> Self {
        Self {
            min_zoom: 15,
            extent: DEFAULT_EXTENT,
            hit_tolerance_px: 10.0,
        }
    }
}

/// Provider of raw speed tiles
pub trait SpeedTileSource {
    fn fetch(&self, coord: TileCoord) -> Result<Vec<u8>>;
}

impl<F> SpeedTileSource for F
where
    F: Fn(TileCoord) -> Result<Vec<u8>>,
{
    fn fetch(&self, coord: TileCoord) -> Result<Vec<u8>> {
        self(coord)
    }
}

/// Tiles stored on disk as `{root}/{z}/{x}/{y}.mvt`
#[derive(Debug, Clone)]
pub struct DirectoryTileSource {
    root: PathBuf,
}

impl DirectoryTileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn tile_path(&self, coord: TileCoord) -> PathBuf {
        self.root
            .join(coord.z.to_string())
            .join(coord.x.to_string())
            .join(format!("{}.mvt", coord.y))
    }
}

impl SpeedTileSource for DirectoryTileSource {
    fn fetch(&self, coord: TileCoord) -> Result<Vec<u8>> {
        let path = self.tile_path(coord);
        std::fs::read(&path).map_err(|err| EnrichError::TileSource {
            coord,
            reason: format!("{}: {}", path.display(), err),
        })
    }
}

/// Fetch and decode one tile for the overlay
///
/// Below the configured minimum zoom nothing is fetched. A failed fetch is logged and
/// treated like an empty tile.
pub fn load_speed_tile<S: SpeedTileSource + ?Sized>(
    source: &S,
    coord: TileCoord,
    config: &SpeedOverlayConfig,
) -> Vec<SpeedFeature> {
    if coord.z < config.min_zoom {
        tracing::debug!("Skipping tile {} below zoom {}", coord, config.min_zoom);
        return Vec::new();
    }

    match source.fetch(coord) {
        Ok(bytes) => decode_tile(&bytes),
        Err(err) => {
            tracing::warn!("Speed tile {} unavailable: {}", coord, err);
            Vec::new()
        }
    }
}

/// Running statistics over decoded speeds
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpeedStats {
    pub min: Option<u32>,
    pub max: Option<u32>,
    pub count: usize,
    sum: u64,
}

impl SpeedStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, speed: u32) {
        self.min = Some(self.min.map_or(speed, |m| m.min(speed)));
        self.max = Some(self.max.map_or(speed, |m| m.max(speed)));
        self.count += 1;
        self.sum += u64::from(speed);
    }

    pub fn record_features<'a>(&mut self, features: impl IntoIterator<Item = &'a SpeedFeature>) {
        for feature in features {
            self.record(feature.speed);
        }
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum as f64 / self.count as f64)
    }

    /// `(min, max)` once at least one speed was recorded
    pub fn range(&self) -> Option<(u32, u32)> {
        self.min.zip(self.max)
    }
}

/// An 8-bit RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn from_hex(hex: u32) -> Self {
        Self {
            r: (hex >> 16) as u8,
            g: (hex >> 8) as u8,
            b: hex as u8,
        }
    }

    fn lerp(self, other: Rgb, t: f64) -> Self {
        let channel = |a: u8, b: u8| (f64::from(a) + (f64::from(b) - f64::from(a)) * t).round() as u8;
        Self {
            r: channel(self.r, other.r),
            g: channel(self.g, other.g),
            b: channel(self.b, other.b),
        }
    }
}

/// Lowercase `#rrggbb`
impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Color scheme of the speed ramp
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Palette {
    /// Dark red for slow through green to teal for fast
    #[default]
    Light,
    /// Stops chosen to read correctly after the map's dark-mode color inversion
    Dark,
}

type ColorStop = (f64, Rgb);

const LIGHT_STOPS: [ColorStop; 10] = [
    (0.0, Rgb::from_hex(0x8B0000)),
    (0.11, Rgb::from_hex(0xFF0000)),
    (0.22, Rgb::from_hex(0xFF4500)),
    (0.33, Rgb::from_hex(0xFF8C00)),
    (0.44, Rgb::from_hex(0xFFD700)),
    (0.55, Rgb::from_hex(0xADFF2F)),
    (0.66, Rgb::from_hex(0x90EE90)),
    (0.77, Rgb::from_hex(0x32CD32)),
    (0.88, Rgb::from_hex(0x00BB00)),
    (1.0, Rgb::from_hex(0x00CC99)),
];

const DARK_STOPS: [ColorStop; 10] = [
    (0.0, Rgb::from_hex(0x74FFFF)),
    (0.11, Rgb::from_hex(0x00FFFF)),
    (0.22, Rgb::from_hex(0x00BAFF)),
    (0.33, Rgb::from_hex(0x0073FF)),
    (0.44, Rgb::from_hex(0x0028FF)),
    (0.55, Rgb::from_hex(0x5200D0)),
    (0.66, Rgb::from_hex(0x6F116F)),
    (0.77, Rgb::from_hex(0xCD32CD)),
    (0.88, Rgb::from_hex(0xFF44FF)),
    (1.0, Rgb::from_hex(0xFF3366)),
];

impl Palette {
    fn stops(self) -> &'static [ColorStop] {
        match self {
            Palette::Light => &LIGHT_STOPS,
            Palette::Dark => &DARK_STOPS,
        }
    }

    /// Used when every observed speed is the same
    fn flat(self) -> Rgb {
        match self {
            Palette::Light => Rgb::from_hex(0xFFD3B6),
            Palette::Dark => Rgb::from_hex(0x0028FF),
        }
    }
}

/// Color of `speed` relative to the observed `min..=max` range
///
/// Speeds outside the range are clamped to it.
pub fn speed_color(speed: f64, min: f64, max: f64, palette: Palette) -> Rgb {
    let range = max - min;
    if range <= 0.0 || !range.is_finite() {
        return palette.flat();
    }

    let position = ((speed - min) / range).clamp(0.0, 1.0);
    let stops = palette.stops();
    for pair in stops.windows(2) {
        let ((from_pos, from), (to_pos, to)) = (pair[0], pair[1]);
        if position >= from_pos && position <= to_pos {
            return from.lerp(to, (position - from_pos) / (to_pos - from_pos));
        }
    }

    // NaN speeds
    stops[stops.len() - 1].1
}

/// The feature with a line passing closest to pixel `(x, y)` of a `width` x `height`
/// canvas, if any is within `tolerance_px`
pub fn nearest_feature(
    features: &[SpeedFeature],
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    tolerance_px: f64,
) -> Option<&SpeedFeature> {
    if x < 0.0 || y < 0.0 || x > width || y > height {
        return None;
    }

    let mut best: Option<&SpeedFeature> = None;
    let mut best_distance = tolerance_px;

    for feature in features {
        let extent = f64::from(feature.extent.max(1));
        let to_pixel = |c: geo::Coord<i32>| {
            (
                f64::from(c.x) / extent * width,
                f64::from(c.y) / extent * height,
            )
        };

        for ring in &feature.geometry {
            for pair in ring.windows(2) {
                let (x1, y1) = to_pixel(pair[0]);
                let (x2, y2) = to_pixel(pair[1]);
                let distance = pixel_distance_to_segment(x, y, x1, y1, x2, y2);
                if distance < best_distance {
                    best_distance = distance;
                    best = Some(feature);
                }
            }
        }
    }

    best
}

fn pixel_distance_to_segment(px: f64, py: f64, x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    let (dx, dy) = (x2 - x1, y2 - y1);
    let len2 = dx * dx + dy * dy;
    if len2 == 0.0 {
        return (px - x1).hypot(py - y1);
    }
    let t = (((px - x1) * dx + (py - y1) * dy) / len2).clamp(0.0, 1.0);
    (px - (x1 + t * dx)).hypot(py - (y1 + t * dy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mvt::testing::{FeatureBuilder, LayerBuilder, TileBuilder};
    use crate::mvt::{SPEED_KEY, SPEED_LAYER, TileValue};
    use geo::Coord;
    use std::collections::BTreeMap;

    fn tile_with_speeds(speeds: &[u64]) -> Vec<u8> {
        let mut layer = LayerBuilder::new(SPEED_LAYER).key(SPEED_KEY);
        for (i, &speed) in speeds.iter().enumerate() {
            layer = layer.value(TileValue::UInt(speed)).feature(
                FeatureBuilder::new()
                    .tags(&[0, i as u32])
                    .line(&[(0, 0), (100, 0)]),
            );
        }
        TileBuilder::new().layer(layer).build()
    }

    fn feature(speed: u32, line: &[(i32, i32)]) -> SpeedFeature {
        SpeedFeature {
            speed,
            geometry: vec![line.iter().map(|&(x, y)| Coord { x, y }).collect()],
            extent: DEFAULT_EXTENT,
            properties: BTreeMap::new(),
        }
    }

    #[test]
    fn test_load_skips_low_zoom() {
        let source = |_: TileCoord| -> Result<Vec<u8>> { Ok(tile_with_speeds(&[50])) };
        let config = SpeedOverlayConfig::default();

        assert!(load_speed_tile(&source, TileCoord::new(14, 0, 0), &config).is_empty());
        assert_eq!(load_speed_tile(&source, TileCoord::new(15, 0, 0), &config).len(), 1);
    }

    #[test]
    fn test_load_failure_is_empty() {
        let source = |coord: TileCoord| -> Result<Vec<u8>> {
            Err(EnrichError::TileSource {
                coord,
                reason: "HTTP 400".to_string(),
            })
        };
        let features = load_speed_tile(&source, TileCoord::new(16, 1, 1), &SpeedOverlayConfig::default());
        assert!(features.is_empty());
    }

    #[test]
    fn test_directory_source() {
        let root = std::env::temp_dir().join(format!("route-enrich-tiles-{}", std::process::id()));
        let coord = TileCoord::new(15, 17_000, 11_000);
        let source = DirectoryTileSource::new(&root);
        let path = source.tile_path(coord);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, tile_with_speeds(&[30, 90])).unwrap();

        let features = load_speed_tile(&source, coord, &SpeedOverlayConfig::default());
        assert_eq!(features.iter().map(|f| f.speed).collect::<Vec<_>>(), vec![30, 90]);

        let missing = source.fetch(TileCoord::new(15, 0, 0));
        assert!(matches!(missing, Err(EnrichError::TileSource { .. })));

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_routing_tile_url() {
        let url = TileCoord::new(15, 17_500, 11_200).format(ROUTING_TILE_TEMPLATE);
        assert_eq!(url, "/tile/v1/driving/tile(17500,11200,15).mvt");
    }

    #[test]
    fn test_speed_stats() {
        let mut stats = SpeedStats::new();
        assert_eq!(stats.range(), None);
        assert_eq!(stats.mean(), None);

        let features = decode_tile(&tile_with_speeds(&[30, 50, 100]));
        stats.record_features(&features);
        assert_eq!(stats.range(), Some((30, 100)));
        assert_eq!(stats.count, 3);
        assert_eq!(stats.mean(), Some(60.0));
    }

    #[test]
    fn test_speed_color_endpoints() {
        assert_eq!(speed_color(10.0, 10.0, 120.0, Palette::Light).to_string(), "#8b0000");
        assert_eq!(speed_color(120.0, 10.0, 120.0, Palette::Light).to_string(), "#00cc99");
        assert_eq!(speed_color(10.0, 10.0, 120.0, Palette::Dark).to_string(), "#74ffff");
        assert_eq!(speed_color(120.0, 10.0, 120.0, Palette::Dark).to_string(), "#ff3366");
    }

    #[test]
    fn test_speed_color_interpolates() {
        // halfway between the 0.0 and 0.11 stops
        let color = speed_color(5.5, 0.0, 100.0, Palette::Light);
        assert_eq!(color, Rgb { r: 197, g: 0, b: 0 });

        // exactly on a stop
        assert_eq!(speed_color(44.0, 0.0, 100.0, Palette::Light).to_string(), "#ffd700");
    }

    #[test]
    fn test_speed_color_flat_and_clamped() {
        assert_eq!(speed_color(50.0, 50.0, 50.0, Palette::Light).to_string(), "#ffd3b6");
        assert_eq!(speed_color(50.0, 50.0, 50.0, Palette::Dark).to_string(), "#0028ff");
        assert_eq!(speed_color(-20.0, 0.0, 100.0, Palette::Light).to_string(), "#8b0000");
        assert_eq!(speed_color(500.0, 0.0, 100.0, Palette::Light).to_string(), "#00cc99");
    }

    #[test]
    fn test_nearest_feature() {
        let features = vec![
            feature(30, &[(0, 0), (4096, 0)]),
            feature(80, &[(0, 2048), (4096, 2048)]),
        ];

        // 256 px canvas: the second line is at y = 128
        let hit = nearest_feature(&features, 100.0, 125.0, 256.0, 256.0, 10.0);
        assert_eq!(hit.map(|f| f.speed), Some(80));

        let hit = nearest_feature(&features, 100.0, 4.0, 256.0, 256.0, 10.0);
        assert_eq!(hit.map(|f| f.speed), Some(30));

        assert!(nearest_feature(&features, 100.0, 60.0, 256.0, 256.0, 10.0).is_none());
        assert!(nearest_feature(&features, -1.0, 0.0, 256.0, 256.0, 10.0).is_none());
    }
}
