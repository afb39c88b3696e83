//! Order-preserving byte encodings for index keys.
//!
//! For every supported type, comparing two encodings as unsigned bytes
//! orders them the same way as the values themselves:
//!
//! | type     | encoding                                               |
//! |----------|--------------------------------------------------------|
//! | String   | raw UTF-8                                              |
//! | Int64    | big-endian of `value ^ (1 << 63)`                      |
//! | Float64  | IEEE-754 bits, sign set if positive, all flipped if negative |
//! | Bool     | `0x00` / `0x01`                                        |
//! | DateTime | RFC 3339, UTC, 9 fractional digits, `Z` suffix         |

use super::definition::IndexType;
use super::value::IndexValue;
use crate::id::Identifier;
use chrono::{DateTime, Datelike, SecondsFormat, Utc};

/// Upper bound on an encoded timestamp.
pub const DATETIME_MAX_LEN: usize = 35;

/// Separates the value from the identifier in non-unique keys.
pub const NON_UNIQUE_SEPARATOR: u8 = 0x00;

const SIGN_BIT: u64 = 1 << 63;

/// Encodes a signed integer.
#[must_use]
pub fn encode_i64(value: i64) -> [u8; 8] {
    ((value as u64) ^ SIGN_BIT).to_be_bytes()
}

/// Encodes a float. `-0.0` sorts just below `+0.0`; NaNs sort at the ends.
#[must_use]
pub fn encode_f64(value: f64) -> [u8; 8] {
    let bits = value.to_bits();
    let ordered = if bits & SIGN_BIT == 0 {
        bits | SIGN_BIT
    } else {
        !bits
    };
    ordered.to_be_bytes()
}

/// Encodes a boolean.
#[must_use]
pub const fn encode_bool(value: bool) -> [u8; 1] {
    [value as u8]
}

/// Encodes a timestamp, or `None` if its year is outside 0000..=9999.
#[must_use]
pub fn encode_datetime(value: &DateTime<Utc>) -> Option<Vec<u8>> {
    if !(0..=9999).contains(&value.year()) {
        return None;
    }
    let text = value.to_rfc3339_opts(SecondsFormat::Nanos, true);
    (text.len() <= DATETIME_MAX_LEN).then(|| text.into_bytes())
}

/// Encodes any index value. `None` means the value cannot be indexed.
#[must_use]
pub fn encode_value(value: &IndexValue) -> Option<Vec<u8>> {
    match value {
        IndexValue::String(s) => Some(s.as_bytes().to_vec()),
        IndexValue::Int64(v) => Some(encode_i64(*v).to_vec()),
        IndexValue::Float64(v) => Some(encode_f64(*v).to_vec()),
        IndexValue::Bool(v) => Some(encode_bool(*v).to_vec()),
        IndexValue::DateTime(v) => encode_datetime(v),
    }
}

/// Builds the key under which a record is filed in an index bucket.
#[must_use]
pub fn index_key(index_type: IndexType, encoded: &[u8], id: &Identifier) -> Vec<u8> {
    match index_type {
        IndexType::Unique => encoded.to_vec(),
        IndexType::NonUnique => {
            let id = id.to_string();
            let mut key = Vec::with_capacity(encoded.len() + 1 + id.len());
            key.extend_from_slice(encoded);
            key.push(NON_UNIQUE_SEPARATOR);
            key.extend_from_slice(id.as_bytes());
            key
        }
    }
}


