//! Protocol-buffer wire format helpers on top of `prost::encoding`
//!
//! Every helper reads from a `&mut &[u8]` and advances the slice past what it consumed.
//! After an error the slice position is unspecified; callers either skip the enclosing
//! record or abandon the enclosing message.

use prost::bytes::Buf;
use prost::encoding::{DecodeContext, decode_key, decode_varint, skip_field};

pub use prost::encoding::WireType;

/// Errors raised while reading the wire format
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error(transparent)]
    Decode(#[from] prost::DecodeError),

    #[error("length {len} runs past the end of the buffer ({remaining} bytes left)")]
    LengthOutOfBounds { len: u64, remaining: usize },

    #[error("value {0} does not fit in 32 bits")]
    Oversized(u64),

    #[error("invalid UTF-8 string")]
    InvalidUtf8,
}

/// Read a field key as `(field_number, wire_type)`
///
/// Field number 0, keys beyond 32 bits and wire types 6 and 7 are rejected.
#[inline]
pub fn read_key(buf: &mut &[u8]) -> Result<(u32, WireType), WireError> {
    Ok(decode_key(buf)?)
}

#[inline]
pub fn read_varint(buf: &mut &[u8]) -> Result<u64, WireError> {
    Ok(decode_varint(buf)?)
}

/// Read a varint that must fit in a `u32`
pub fn read_u32(buf: &mut &[u8]) -> Result<u32, WireError> {
    let value = decode_varint(buf)?;
    u32::try_from(value).map_err(|_| WireError::Oversized(value))
}

/// Read a length-prefixed byte slice
pub fn read_bytes<'a>(buf: &mut &'a [u8]) -> Result<&'a [u8], WireError> {
    let len = decode_varint(buf)?;
    let rest: &'a [u8] = *buf;
    match usize::try_from(len).ok().filter(|&n| n <= rest.len()) {
        Some(n) => {
            let (bytes, tail) = rest.split_at(n);
            *buf = tail;
            Ok(bytes)
        }
        None => Err(WireError::LengthOutOfBounds {
            len,
            remaining: rest.len(),
        }),
    }
}

/// Read a length-prefixed UTF-8 string; invalid UTF-8 is reported after the bytes were consumed
pub fn read_string<'a>(buf: &mut &'a [u8]) -> Result<&'a str, WireError> {
    let bytes = read_bytes(buf)?;
    std::str::from_utf8(bytes).map_err(|_| WireError::InvalidUtf8)
}

pub fn read_f32(buf: &mut &[u8]) -> Result<f32, WireError> {
    ensure_remaining(buf, 4)?;
    Ok(buf.get_f32_le())
}

pub fn read_f64(buf: &mut &[u8]) -> Result<f64, WireError> {
    ensure_remaining(buf, 8)?;
    Ok(buf.get_f64_le())
}

/// Read a packed run of `u32` varints into `out`
///
/// A value wider than 32 bits fails the whole run instead of being truncated.
pub fn read_packed_u32<E>(buf: &mut &[u8], out: &mut E) -> Result<(), WireError>
where
    E: Extend<u32>,
{
    let mut packed = read_bytes(buf)?;
    while packed.has_remaining() {
        let value = read_u32(&mut packed)?;
        out.extend(std::iter::once(value));
    }
    Ok(())
}

/// Skip the value of field `tag`, groups included
#[inline]
pub fn skip(wire_type: WireType, tag: u32, buf: &mut &[u8]) -> Result<(), WireError> {
    Ok(skip_field(wire_type, tag, buf, DecodeContext::default())?)
}

fn ensure_remaining(buf: &[u8], len: usize) -> Result<(), WireError> {
    if buf.len() < len {
        return Err(WireError::LengthOutOfBounds {
            len: len as u64,
            remaining: buf.len(),
        });
    }
    Ok(())
}

/// Decode a zigzag-encoded integer: `(n >> 1) ^ -(n & 1)`
#[inline]
pub fn zigzag_decode(n: u32) -> i32 {
    ((n >> 1) as i32) ^ -((n & 1) as i32)
}

/// Encode a signed integer with zigzag encoding
#[inline]
pub fn zigzag_encode(n: i32) -> u32 {
    ((n << 1) ^ (n >> 31)) as u32
}

/// Decode a 64-bit zigzag-encoded integer (used by `sint64` tile values)
#[inline]
pub fn zigzag_decode64(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}
