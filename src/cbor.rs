//! Bridge between raw CBOR bytes and [`Value`]
//!
//! Wire-level parsing is done by `ciborium`; this module enforces the size
//! and nesting bounds and the delta-SID key rules on top of it.

use std::collections::HashSet;
use std::io::Cursor;

use ciborium::value::{Integer, Value as CborValue};

use crate::error::{DecodeError, EncodeError};
use crate::value::Value;

/// Nesting bound used by [`decode`]
pub const DEFAULT_MAX_DEPTH: usize = 16;

/// Decode one CBOR item, reading at most `max_len` bytes
pub fn decode(bytes: &[u8], max_len: usize) -> Result<Value, DecodeError> {
    decode_with_depth(bytes, max_len, DEFAULT_MAX_DEPTH)
}

/// Decode one CBOR item with an explicit nesting bound.
///
/// `max_depth` counts arrays and maps: `1` admits `[1, 2]` but not `[[1]]`.
/// Bytes left over after the item are an error.
pub fn decode_with_depth(
    bytes: &[u8],
    max_len: usize,
    max_depth: usize,
) -> Result<Value, DecodeError> {
    let input = &bytes[..bytes.len().min(max_len)];
    let mut cursor = Cursor::new(input);

    // ciborium gets some slack; the exact bound is checked in `from_cbor`
    let raw: CborValue =
        ciborium::de::from_reader_with_recursion_limit(&mut cursor, max_depth + 2).map_err(
            |e| match e {
                ciborium::de::Error::Io(io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
                    DecodeError::Truncated
                }
                ciborium::de::Error::Io(io) => DecodeError::Malformed(io.to_string()),
                ciborium::de::Error::Syntax(offset) => {
                    DecodeError::Malformed(format!("syntax error at offset {}", offset))
                }
                ciborium::de::Error::Semantic(_, msg) => DecodeError::Malformed(msg),
                ciborium::de::Error::RecursionLimitExceeded => {
                    DecodeError::DepthExceeded(max_depth)
                }
            },
        )?;

    let consumed = cursor.position() as usize;
    if consumed < bytes.len() {
        return Err(DecodeError::Malformed(format!(
            "{} trailing bytes after item",
            bytes.len() - consumed
        )));
    }

    from_cbor(raw, max_depth, max_depth)
}

fn from_cbor(raw: CborValue, remaining: usize, max_depth: usize) -> Result<Value, DecodeError> {
    let value = match raw {
        CborValue::Integer(i) => integer(i)?,
        CborValue::Float(f) => Value::Float(f),
        CborValue::Bytes(b) => Value::Bytes(b),
        CborValue::Text(s) => Value::Text(s),
        CborValue::Bool(b) => Value::Bool(b),
        CborValue::Null => Value::Null,
        CborValue::Array(items) => {
            let remaining = descend(remaining, max_depth)?;
            let items = items
                .into_iter()
                .map(|item| from_cbor(item, remaining, max_depth))
                .collect::<Result<Vec<_>, _>>()?;
            Value::Array(items)
        }
        CborValue::Map(entries) => {
            let remaining = descend(remaining, max_depth)?;
            let mut seen = HashSet::with_capacity(entries.len());
            let mut out = Vec::with_capacity(entries.len());
            for (key, v) in entries {
                let delta = match key {
                    CborValue::Integer(i) => u64::try_from(i)
                        .map_err(|_| DecodeError::BadKeyType(i128::from(i).to_string()))?,
                    other => return Err(DecodeError::BadKeyType(format!("{:?}", other))),
                };
                if !seen.insert(delta) {
                    return Err(DecodeError::DuplicateKey(delta));
                }
                out.push((delta, from_cbor(v, remaining, max_depth)?));
            }
            Value::Map(out)
        }
        CborValue::Tag(tag, _) => {
            return Err(DecodeError::Malformed(format!("unsupported tag {}", tag)));
        }
        other => {
            return Err(DecodeError::Malformed(format!(
                "unsupported item {:?}",
                other
            )));
        }
    };
    Ok(value)
}

fn integer(i: Integer) -> Result<Value, DecodeError> {
    if let Ok(n) = u64::try_from(i) {
        return Ok(Value::Uint(n));
    }
    i64::try_from(i)
        .map(Value::Int)
        .map_err(|_| DecodeError::Malformed(format!("integer {} out of range", i128::from(i))))
}

fn descend(remaining: usize, max_depth: usize) -> Result<usize, DecodeError> {
    remaining
        .checked_sub(1)
        .ok_or(DecodeError::DepthExceeded(max_depth))
}

/// Encode a value; fails if the result is longer than `max_len`.
///
/// Map entries are written in construction order, so encoding is
/// deterministic.
pub fn encode(value: &Value, max_len: usize) -> Result<Vec<u8>, EncodeError> {
    let mut bytes = Vec::new();
    ciborium::into_writer(&to_cbor(value), &mut bytes)
        .map_err(|e| EncodeError::Writer(e.to_string()))?;

    if bytes.len() > max_len {
        return Err(EncodeError::BufferTooSmall {
            needed: bytes.len(),
            max: max_len,
        });
    }
    Ok(bytes)
}

/// Encode into a caller-owned buffer, returning the number of bytes written.
///
/// Nothing is written when the value does not fit.
pub fn encode_into(value: &Value, out: &mut [u8]) -> Result<usize, EncodeError> {
    let bytes = encode(value, out.len())?;
    out[..bytes.len()].copy_from_slice(&bytes);
    Ok(bytes.len())
}

fn to_cbor(value: &Value) -> CborValue {
    match value {
        Value::Uint(n) => CborValue::Integer((*n).into()),
        Value::Int(n) => CborValue::Integer((*n).into()),
        Value::Float(f) => CborValue::Float(*f),
        Value::Bytes(b) => CborValue::Bytes(b.clone()),
        Value::Text(s) => CborValue::Text(s.clone()),
        Value::Bool(b) => CborValue::Bool(*b),
        Value::Null => CborValue::Null,
        Value::Array(items) => CborValue::Array(items.iter().map(to_cbor).collect()),
        Value::Map(entries) => CborValue::Map(
            entries
                .iter()
                .map(|(key, v)| (CborValue::Integer((*key).into()), to_cbor(v)))
                .collect(),
        ),
    }
}
