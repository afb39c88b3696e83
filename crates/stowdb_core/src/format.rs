//! Serialization helpers for [`Storable`](crate::Storable) implementations.
//!
//! JSON is used for the registry meta-records; CBOR is available for
//! record types that prefer a compact binary form.

use crate::error::{CoreError, CoreResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes `value` as JSON.
///
/// # Errors
///
/// Returns [`CoreError::SerializationFailed`] if encoding fails.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> CoreResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| CoreError::serialization(e.to_string()))
}

/// Decodes JSON bytes.
///
/// # Errors
///
/// Returns [`CoreError::DeserializationFailed`] if decoding fails.
pub fn from_json<T: DeserializeOwned>(data: &[u8]) -> CoreResult<T> {
    serde_json::from_slice(data).map_err(|e| CoreError::deserialization(e.to_string()))
}

/// Encodes `value` as CBOR.
///
/// # Errors
///
/// Returns [`CoreError::SerializationFailed`] if encoding fails.
pub fn to_cbor<T: Serialize + ?Sized>(value: &T) -> CoreResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| CoreError::serialization(e.to_string()))?;
    Ok(buf)
}

/// Decodes CBOR bytes.
///
/// # Errors
///
/// Returns [`CoreError::DeserializationFailed`] if decoding fails.
pub fn from_cbor<T: DeserializeOwned>(data: &[u8]) -> CoreResult<T> {
    ciborium::from_reader(data).map_err(|e| CoreError::deserialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: i64,
    }

    #[test]
    fn json_and_cbor_agree() {
        let sample = Sample {
            name: "gear".into(),
            count: 3,
        };
        let from_json: Sample = from_json(&to_json(&sample).unwrap()).unwrap();
        let from_cbor: Sample = from_cbor(&to_cbor(&sample).unwrap()).unwrap();
        assert_eq!(from_json, sample);
        assert_eq!(from_cbor, sample);
    }

    #[test]
    fn garbage_is_deserialization_error() {
        assert!(matches!(
            from_json::<Sample>(b"{not json"),
            Err(CoreError::DeserializationFailed { .. })
        ));
        assert!(matches!(
            from_cbor::<Sample>(&[0xff, 0x00]),
            Err(CoreError::DeserializationFailed { .. })
        ));
    }
}
