//! Minimal tile encoder for building test fixtures

use super::TileValue;
use super::commands::command_word;
use super::wire::{WireType, zigzag_encode};
use prost::encoding::{encode_key, encode_varint};

fn write_varint(out: &mut Vec<u8>, value: u64) {
    encode_varint(value, out);
}

fn write_key(out: &mut Vec<u8>, field: u32, wire_type: WireType) {
    encode_key(field, wire_type, out);
}

fn write_bytes(out: &mut Vec<u8>, field: u32, bytes: &[u8]) {
    write_key(out, field, WireType::LengthDelimited);
    write_varint(out, bytes.len() as u64);
    out.extend_from_slice(bytes);
}

fn write_packed(out: &mut Vec<u8>, field: u32, values: &[u32]) {
    let mut packed = Vec::new();
    for &v in values {
        write_varint(&mut packed, u64::from(v));
    }
    write_bytes(out, field, &packed);
}

fn encode_value(value: &TileValue) -> Vec<u8> {
    let mut out = Vec::new();
    match value {
        TileValue::String(s) => write_bytes(&mut out, 1, s.as_bytes()),
        TileValue::Float(v) => {
            write_key(&mut out, 2, WireType::ThirtyTwoBit);
            out.extend_from_slice(&v.to_le_bytes());
        }
        TileValue::Double(v) => {
            write_key(&mut out, 3, WireType::SixtyFourBit);
            out.extend_from_slice(&v.to_le_bytes());
        }
        TileValue::Int(v) => {
            write_key(&mut out, 4, WireType::Varint);
            write_varint(&mut out, *v as u64);
        }
        TileValue::UInt(v) => {
            write_key(&mut out, 5, WireType::Varint);
            write_varint(&mut out, *v);
        }
        TileValue::SInt(v) => {
            write_key(&mut out, 6, WireType::Varint);
            write_varint(&mut out, ((v << 1) ^ (v >> 63)) as u64);
        }
        TileValue::Bool(v) => {
            write_key(&mut out, 7, WireType::Varint);
            write_varint(&mut out, u64::from(*v));
        }
    }
    out
}

#[derive(Default)]
pub(crate) struct FeatureBuilder {
    tags: Vec<u32>,
    geometry: Vec<u32>,
}

impl FeatureBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn tags(mut self, tags: &[u32]) -> Self {
        self.tags = tags.to_vec();
        self
    }

    /// A line given as deltas: the first pair is the `MoveTo`, the rest one `LineTo` run
    pub(crate) fn line(mut self, deltas: &[(i32, i32)]) -> Self {
        let Some((first, rest)) = deltas.split_first() else {
            return self;
        };
        self.geometry.push(command_word(1, 1));
        self.geometry.extend([zigzag_encode(first.0), zigzag_encode(first.1)]);
        if !rest.is_empty() {
            self.geometry.push(command_word(2, rest.len() as u32));
            for &(dx, dy) in rest {
                self.geometry.extend([zigzag_encode(dx), zigzag_encode(dy)]);
            }
        }
        self
    }

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        // id and geometry type, both skipped by the decoder
        write_key(&mut out, 1, WireType::Varint);
        write_varint(&mut out, 7);
        write_packed(&mut out, 2, &self.tags);
        write_key(&mut out, 3, WireType::Varint);
        write_varint(&mut out, 2);
        write_packed(&mut out, 4, &self.geometry);
        out
    }
}

pub(crate) struct LayerBuilder {
    name: String,
    keys: Vec<String>,
    values: Vec<Vec<u8>>,
    features: Vec<Vec<u8>>,
}

impl LayerBuilder {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            keys: Vec::new(),
            values: Vec::new(),
            features: Vec::new(),
        }
    }

    pub(crate) fn key(mut self, key: &str) -> Self {
        self.keys.push(key.to_string());
        self
    }

    pub(crate) fn value(mut self, value: TileValue) -> Self {
        self.values.push(encode_value(&value));
        self
    }

    pub(crate) fn raw_value(mut self, bytes: Vec<u8>) -> Self {
        self.values.push(bytes);
        self
    }

    pub(crate) fn feature(mut self, feature: FeatureBuilder) -> Self {
        self.features.push(feature.encode());
        self
    }

    pub(crate) fn raw_feature(mut self, bytes: Vec<u8>) -> Self {
        self.features.push(bytes);
        self
    }

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        // version
        write_key(&mut out, 15, WireType::Varint);
        write_varint(&mut out, 2);
        write_bytes(&mut out, 1, self.name.as_bytes());
        for feature in &self.features {
            write_bytes(&mut out, 2, feature);
        }
        for key in &self.keys {
            write_bytes(&mut out, 3, key.as_bytes());
        }
        for value in &self.values {
            write_bytes(&mut out, 4, value);
        }
        write_key(&mut out, 5, WireType::Varint);
        write_varint(&mut out, 4096);
        out
    }
}

#[derive(Default)]
pub(crate) struct TileBuilder {
    layers: Vec<Vec<u8>>,
}

impl TileBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn layer(mut self, layer: LayerBuilder) -> Self {
        self.layers.push(layer.encode());
        self
    }

    pub(crate) fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for layer in &self.layers {
            write_bytes(&mut out, 3, layer);
        }
        out
    }
}
