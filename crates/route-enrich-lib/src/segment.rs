//! Road/path segment records fetched from the external geodata source

use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Whether a record describes a way edge or a standalone point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum SegmentKind {
    #[default]
    Way,
    Node,
}

/// Open-ended tag dictionary of a segment
///
/// Unknown keys are kept as-is; the matcher only looks up a fixed set of keys and treats a
/// missing key as "unknown".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Tags(BTreeMap<String, String>);

impl Tags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn highway(&self) -> Option<&str> {
        self.get("highway")
    }

    pub fn surface(&self) -> Option<&str> {
        self.get("surface")
    }

    pub fn smoothness(&self) -> Option<&str> {
        self.get("smoothness")
    }

    /// `tunnel=yes`
    pub fn is_tunnel(&self) -> bool {
        self.get("tunnel") == Some("yes")
    }

    /// Numeric `layer` tag, if it starts with an integer
    pub fn layer(&self) -> Option<i64> {
        self.get("layer").and_then(parse_leading_int)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Tags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// One short edge of a way, as returned by the segment-data lookup
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SegmentRecord {
    /// Way id, shared by all edges of the same way
    pub id: i64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub kind: SegmentKind,
    /// First endpoint as `(lat, lon)`
    pub endpoint1: (f64, f64),
    /// Second endpoint as `(lat, lon)`
    pub endpoint2: (f64, f64),
    #[cfg_attr(feature = "serde", serde(default))]
    pub tags: Tags,
}

impl SegmentRecord {
    pub fn new(id: i64, endpoint1: (f64, f64), endpoint2: (f64, f64), tags: Tags) -> Self {
        Self {
            id,
            kind: SegmentKind::Way,
            endpoint1,
            endpoint2,
            tags,
        }
    }

    /// Midpoint as `(lat, lon)`
    #[inline]
    pub fn midpoint(&self) -> (f64, f64) {
        (
            (self.endpoint1.0 + self.endpoint2.0) / 2.0,
            (self.endpoint1.1 + self.endpoint2.1) / 2.0,
        )
    }

    /// Point records and zero-length edges cannot be snapped onto
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.kind == SegmentKind::Node || self.endpoint1 == self.endpoint2
    }

    /// Identity used to deduplicate records fetched more than once
    ///
    /// Endpoints are rounded to 1e-6 degrees.
    pub fn dedup_key(&self) -> (i64, [i64; 4]) {
        let q = |v: f64| (v * 1e6).round() as i64;
        (
            self.id,
            [
                q(self.endpoint1.0),
                q(self.endpoint1.1),
                q(self.endpoint2.0),
                q(self.endpoint2.1),
            ],
        )
    }
}

/// Ranking of road types used when several candidates are in reach
pub fn highway_priority(highway: &str) -> f64 {
    match highway {
        "motorway" => 100.0,
        "motorway_link" => 98.0,
        "trunk" => 95.0,
        "trunk_link" => 93.0,
        "primary" => 90.0,
        "primary_link" => 88.0,
        "secondary" => 85.0,
        "secondary_link" => 83.0,
        "tertiary" => 80.0,
        "tertiary_link" => 78.0,
        "unclassified" => 70.0,
        "residential" => 60.0,
        "living_street" => 50.0,
        "road" => 40.0,
        "service" => 30.0,
        "track" => 20.0,
        "path" | "footway" | "cycleway" | "bridleway" => 10.0,
        "steps" | "pedestrian" => 5.0,
        _ => 0.0,
    }
}

/// Readable label for a `highway` value, falling back to the raw value
pub fn highway_label(value: &str) -> &str {
    match value {
        "motorway" => "Motorway",
        "trunk" => "Trunk Road",
        "primary" => "Primary Road",
        "secondary" => "Secondary Road",
        "tertiary" => "Tertiary Road",
        "unclassified" => "Unclassified Road",
        "residential" => "Residential",
        "service" => "Service Road",
        "track" => "Track",
        "path" => "Path",
        "footway" => "Footway",
        "cycleway" => "Cycleway",
        "bridleway" => "Bridleway",
        "steps" => "Steps",
        "pedestrian" => "Pedestrian",
        "living_street" => "Living Street",
        "road" => "Road",
        "raceway" => "Raceway",
        "motorway_link" => "Motorway Link",
        "trunk_link" => "Trunk Road Link",
        "primary_link" => "Primary Road Link",
        "secondary_link" => "Secondary Road Link",
        "tertiary_link" => "Tertiary Road Link",
        other => other,
    }
}

/// Readable label for a `surface` value, falling back to the raw value
pub fn surface_label(value: &str) -> &str {
    match value {
        "paved" => "Paved",
        "asphalt" => "Asphalt",
        "concrete" => "Concrete",
        "paving_stones" => "Paving Stones",
        "sett" | "cobblestone" => "Cobblestone",
        "metal" => "Metal",
        "wood" => "Wood",
        "unpaved" => "Unpaved",
        "compacted" => "Compacted",
        "fine_gravel" => "Fine Gravel",
        "gravel" => "Gravel",
        "pebblestone" => "Pebblestone",
        "ground" => "Ground",
        "dirt" => "Dirt",
        "earth" => "Earth",
        "grass" => "Grass",
        "grass_paver" => "Grass Paver",
        "mud" => "Mud",
        "sand" => "Sand",
        "ice" => "Ice",
        "salt" => "Salt",
        other => other,
    }
}

/// Readable label for a `smoothness` value, falling back to the raw value
pub fn smoothness_label(value: &str) -> &str {
    match value {
        "excellent" => "Excellent",
        "good" => "Good",
        "intermediate" => "Intermediate",
        "bad" => "Bad",
        "very_bad" => "Very Bad",
        "horrible" => "Horrible",
        "very_horrible" => "Very Horrible",
        "impassable" => "Impassable",
        other => other,
    }
}

/// Parse the integer at the start of a string: `"-1;0"` gives -1, `"abc"` gives `None`
pub(crate) fn parse_leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (sign, digits) = match s.as_bytes().first() {
        Some(b'-') => (-1, &s[1..]),
        Some(b'+') => (1, &s[1..]),
        _ => (1, s),
    };
    let end = digits
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    // Saturate instead of failing on absurdly long digit runs
    let magnitude = digits[..end].parse::<i64>().unwrap_or(i64::MAX);
    Some(sign * magnitude)
}
