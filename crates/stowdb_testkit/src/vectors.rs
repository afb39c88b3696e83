//! Index key test vectors.
//!
//! Fixed encodings that every build must reproduce byte for byte, so
//! index buckets written by one version stay readable by the next.

use chrono::{TimeZone, Utc};
use stowdb_core::index::codec;
use stowdb_core::{Identifier, IndexType, IndexValue};

/// An index value together with its expected key encoding.
#[derive(Debug, Clone)]
pub struct IndexKeyVector {
    /// Short description.
    pub name: &'static str,
    /// Value to encode.
    pub value: IndexValue,
    /// Index kind.
    pub index_type: IndexType,
    /// Record the key is built for.
    pub id: Identifier,
    /// Expected key as lowercase hex.
    pub expected_hex: &'static str,
}

impl IndexKeyVector {
    /// Encodes the value into a full index key.
    ///
    /// Returns `None` for values the codec refuses.
    pub fn encode(&self) -> Option<Vec<u8>> {
        let encoded = codec::encode_value(&self.value)?;
        Some(codec::index_key(self.index_type, &encoded, &self.id))
    }

    /// Asserts that the encoding matches the expected bytes.
    ///
    /// # Panics
    ///
    /// Panics with both encodings in hex on mismatch.
    pub fn verify(&self) {
        let actual = self.encode().map(|key| hex_encode(&key));
        assert_eq!(
            actual.as_deref(),
            Some(self.expected_hex),
            "Index key vector '{}' failed",
            self.name
        );
    }
}

/// Encodes bytes as lowercase hex.
pub fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Returns the standard index key vectors.
pub fn standard_vectors() -> Vec<IndexKeyVector> {
    let id = Identifier::new(1001, 1);
    let unique = |name, value, expected_hex| IndexKeyVector {
        name,
        value,
        index_type: IndexType::Unique,
        id,
        expected_hex,
    };

    vec![
        unique("string", IndexValue::from("Sku"), "536b75"),
        unique("empty string", IndexValue::from(""), ""),
        unique("int zero", IndexValue::Int64(0), "8000000000000000"),
        unique("int minus one", IndexValue::Int64(-1), "7fffffffffffffff"),
        unique("int min", IndexValue::Int64(i64::MIN), "0000000000000000"),
        unique("float one", IndexValue::Float64(1.0), "bff0000000000000"),
        unique("float minus one", IndexValue::Float64(-1.0), "400fffffffffffff"),
        unique("float zero", IndexValue::Float64(0.0), "8000000000000000"),
        unique("float negative zero", IndexValue::Float64(-0.0), "7fffffffffffffff"),
        unique("bool false", IndexValue::Bool(false), "00"),
        unique("bool true", IndexValue::Bool(true), "01"),
        unique(
            "epoch",
            IndexValue::DateTime(Utc.timestamp_opt(0, 0).single().unwrap_or_default()),
            "313937302d30312d30315430303a30303a30302e3030303030303030305a",
        ),
        IndexKeyVector {
            name: "non-unique int",
            value: IndexValue::Int64(5),
            index_type: IndexType::NonUnique,
            id,
            expected_hex: "8000000000000005003365392d31",
        },
    ]
}


