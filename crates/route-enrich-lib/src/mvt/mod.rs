//! Streaming decoder for road-speed vector tiles
//!
//! Tiles use the Mapbox Vector Tile layout on top of the protocol-buffer wire format:
//! a tile is a list of layers, each layer carries a key table, a value table and a list of
//! features whose `tags` reference both tables by index. Only the [`SPEED_LAYER`] layer is
//! turned into [`SpeedFeature`]s; every other field is skipped by wire type so the byte
//! position stays in sync.
//!
//! Decoding never fails. A malformed feature or value is dropped on its own, a framing
//! error (a length running past its enclosing message) ends the enclosing message and keeps
//! whatever was decoded before it.

mod commands;
#[cfg(test)]
pub(crate) mod testing;
pub mod wire;

pub use commands::{Ring, command_word, decode_geometry};
pub use wire::{WireError, WireType, zigzag_decode, zigzag_encode};

use crate::segment::parse_leading_int;
use rayon::prelude::*;
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Name of the layer that carries road-speed lines
pub const SPEED_LAYER: &str = "speeds";

/// Property key holding the speed in km/h
pub const SPEED_KEY: &str = "speed";

/// Default extent of tile-local coordinates
pub const DEFAULT_EXTENT: u32 = 4096;

// Tile message fields
const TILE_LAYERS: u32 = 3;

// Layer message fields
const LAYER_NAME: u32 = 1;
const LAYER_FEATURES: u32 = 2;
const LAYER_KEYS: u32 = 3;
const LAYER_VALUES: u32 = 4;
const LAYER_EXTENT: u32 = 5;

// Feature message fields (id and type are skipped)
const FEATURE_TAGS: u32 = 2;
const FEATURE_GEOMETRY: u32 = 4;

/// Address of a map tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TileCoord {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u8, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Expand `{z}`, `{x}` and `{y}` placeholders in a URL or path template
    pub fn format(&self, template: &str) -> String {
        template
            .replace("{z}", &self.z.to_string())
            .replace("{x}", &self.x.to_string())
            .replace("{y}", &self.y.to_string())
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// A scalar from a layer's value table
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TileValue {
    String(String),
    Float(f32),
    Double(f64),
    Int(i64),
    UInt(u64),
    SInt(i64),
    Bool(bool),
}

impl TileValue {
    /// Coerce to a non-negative integer speed
    ///
    /// Numbers are rounded, strings are parsed for a leading integer. Anything that does not
    /// yield a finite number maps to 0, negative values clamp to 0.
    pub fn as_speed(&self) -> u32 {
        let value = match self {
            TileValue::String(s) => parse_leading_int(s).map(|v| v as f64),
            TileValue::Float(v) => Some(f64::from(*v).round()),
            TileValue::Double(v) => Some(v.round()),
            TileValue::Int(v) | TileValue::SInt(v) => Some(*v as f64),
            TileValue::UInt(v) => Some(*v as f64),
            TileValue::Bool(_) => None,
        };

        match value {
            Some(v) if v.is_finite() && v > 0.0 => v.min(u32::MAX as f64) as u32,
            _ => 0,
        }
    }
}

impl fmt::Display for TileValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TileValue::String(s) => f.write_str(s),
            TileValue::Float(v) => write!(f, "{}", v),
            TileValue::Double(v) => write!(f, "{}", v),
            TileValue::Int(v) | TileValue::SInt(v) => write!(f, "{}", v),
            TileValue::UInt(v) => write!(f, "{}", v),
            TileValue::Bool(v) => write!(f, "{}", v),
        }
    }
}

/// A road-speed line decoded from a tile
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpeedFeature {
    /// Speed in km/h, 0 when absent or unusable
    pub speed: u32,
    /// Rings of tile-local coordinates
    pub geometry: Vec<Ring>,
    /// Size of the tile coordinate space the geometry refers to
    pub extent: u32,
    /// All resolved properties of the feature
    pub properties: BTreeMap<String, TileValue>,
}

/// Layer tables collected before feature extraction
#[derive(Debug, Default)]
struct RawLayer<'a> {
    name: Option<&'a str>,
    keys: Vec<Option<&'a str>>,
    values: Vec<Option<TileValue>>,
    features: Vec<&'a [u8]>,
    extent: u32,
}

/// Raw feature fields before property resolution
#[derive(Debug, Default)]
struct RawFeature {
    tags: SmallVec<[u32; 8]>,
    geometry: Vec<u32>,
}

/// Decode the speed features of one tile
///
/// Never fails: malformed input produces a partial or empty result.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn decode_tile(buffer: &[u8]) -> Vec<SpeedFeature> {
    let mut features = Vec::new();
    let mut buf = buffer;

    while !buf.is_empty() {
        if let Err(e) = read_tile_field(&mut buf, &mut features) {
            tracing::warn!("Abandoning tile after framing error: {}", e);
            break;
        }
    }

    features
}

/// Decode several tiles in parallel, preserving input order
pub fn decode_tiles<B>(buffers: &[B]) -> Vec<Vec<SpeedFeature>>
where
    B: AsRef<[u8]> + Sync,
{
    buffers
        .par_iter()
        .map(|buffer| decode_tile(buffer.as_ref()))
        .collect()
}

fn read_tile_field(buf: &mut &[u8], features: &mut Vec<SpeedFeature>) -> Result<(), WireError> {
    match wire::read_key(buf)? {
        (TILE_LAYERS, WireType::LengthDelimited) => {
            let layer = read_layer(wire::read_bytes(buf)?);
            if layer.name == Some(SPEED_LAYER) {
                extract_speed_features(&layer, features);
            }
            Ok(())
        }
        (field, wire_type) => wire::skip(wire_type, field, buf),
    }
}

/// Collect the tables of a layer, stopping at the first framing error
fn read_layer(bytes: &[u8]) -> RawLayer<'_> {
    let mut layer = RawLayer {
        extent: DEFAULT_EXTENT,
        ..Default::default()
    };
    let mut buf = bytes;

    while !buf.is_empty() {
        if let Err(e) = read_layer_field(&mut buf, &mut layer) {
            tracing::warn!(
                "Layer {:?} truncated after framing error: {}",
                layer.name.unwrap_or(""),
                e
            );
            break;
        }
    }

    layer
}

fn read_layer_field<'a>(buf: &mut &'a [u8], layer: &mut RawLayer<'a>) -> Result<(), WireError> {
    match wire::read_key(buf)? {
        (LAYER_NAME, WireType::LengthDelimited) => match wire::read_string(buf) {
            Ok(name) => layer.name = Some(name),
            Err(WireError::InvalidUtf8) => {
                tracing::warn!("Skipping layer name with invalid UTF-8");
            }
            Err(e) => return Err(e),
        },
        (LAYER_FEATURES, WireType::LengthDelimited) => {
            layer.features.push(wire::read_bytes(buf)?);
        }
        (LAYER_KEYS, WireType::LengthDelimited) => match wire::read_string(buf) {
            Ok(key) => layer.keys.push(Some(key)),
            Err(WireError::InvalidUtf8) => {
                // Keep the slot so later key indices still line up
                tracing::warn!("Skipping key {} with invalid UTF-8", layer.keys.len());
                layer.keys.push(None);
            }
            Err(e) => return Err(e),
        },
        (LAYER_VALUES, WireType::LengthDelimited) => {
            let bytes = wire::read_bytes(buf)?;
            let value = match read_value(bytes) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!("Skipping malformed value {}: {}", layer.values.len(), e);
                    None
                }
            };
            layer.values.push(value);
        }
        (LAYER_EXTENT, WireType::Varint) => {
            layer.extent = wire::read_u32(buf)?;
        }
        (field, wire_type) => wire::skip(wire_type, field, buf)?,
    }

    Ok(())
}

/// Decode a value message; the last scalar field present wins
fn read_value(bytes: &[u8]) -> Result<Option<TileValue>, WireError> {
    let mut buf = bytes;
    let mut value = None;

    while !buf.is_empty() {
        value = match wire::read_key(&mut buf)? {
            (1, WireType::LengthDelimited) => {
                Some(TileValue::String(wire::read_string(&mut buf)?.to_string()))
            }
            (2, WireType::ThirtyTwoBit) => Some(TileValue::Float(wire::read_f32(&mut buf)?)),
            (3, WireType::SixtyFourBit) => Some(TileValue::Double(wire::read_f64(&mut buf)?)),
            (4, WireType::Varint) => Some(TileValue::Int(wire::read_varint(&mut buf)? as i64)),
            (5, WireType::Varint) => Some(TileValue::UInt(wire::read_varint(&mut buf)?)),
            (6, WireType::Varint) => Some(TileValue::SInt(wire::zigzag_decode64(
                wire::read_varint(&mut buf)?,
            ))),
            (7, WireType::Varint) => Some(TileValue::Bool(wire::read_varint(&mut buf)? != 0)),
            (field, wire_type) => {
                wire::skip(wire_type, field, &mut buf)?;
                value
            }
        };
    }

    Ok(value)
}

fn read_feature(bytes: &[u8]) -> Result<RawFeature, WireError> {
    let mut buf = bytes;
    let mut feature = RawFeature::default();

    while !buf.is_empty() {
        match wire::read_key(&mut buf)? {
            (FEATURE_TAGS, WireType::LengthDelimited) => {
                wire::read_packed_u32(&mut buf, &mut feature.tags)?
            }
            (FEATURE_GEOMETRY, WireType::LengthDelimited) => {
                wire::read_packed_u32(&mut buf, &mut feature.geometry)?
            }
            (field, wire_type) => wire::skip(wire_type, field, &mut buf)?,
        }
    }

    Ok(feature)
}

/// Resolve the features of a speed layer and append them to `out`
fn extract_speed_features(layer: &RawLayer<'_>, out: &mut Vec<SpeedFeature>) {
    for (index, bytes) in layer.features.iter().enumerate() {
        let raw = match read_feature(bytes) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Skipping malformed feature {}: {}", index, e);
                continue;
            }
        };

        let properties = resolve_properties(layer, &raw.tags);
        let speed = properties.get(SPEED_KEY).map_or(0, TileValue::as_speed);

        out.push(SpeedFeature {
            speed,
            geometry: decode_geometry(&raw.geometry),
            extent: layer.extent,
            properties,
        });
    }
}

/// Zip alternating `(key_index, value_index)` pairs into a property map
///
/// Pairs pointing outside the tables are ignored, as is a trailing unpaired index.
fn resolve_properties(layer: &RawLayer<'_>, tags: &[u32]) -> BTreeMap<String, TileValue> {
    tags.chunks_exact(2)
        .filter_map(|pair| {
            let key = layer.keys.get(pair[0] as usize).copied().flatten()?;
            let value = layer.values.get(pair[1] as usize)?.as_ref()?;
            Some((key.to_string(), value.clone()))
        })
        .collect()
}
