//! Index declarations.

use serde::de::{self, Unexpected};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Whether an index admits more than one record per value.
///
/// Serialized by name. Deserialization also accepts the numeric codes
/// `0` (unique) and `1` (non-unique) found in older registry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum IndexType {
    /// At most one record per value; the key is the encoded value.
    Unique,
    /// Many records per value; the key is the encoded value, a `0x00`
    /// separator and the record's identifier text.
    NonUnique,
}

impl fmt::Display for IndexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unique => f.write_str("Unique"),
            Self::NonUnique => f.write_str("NonUnique"),
        }
    }
}

impl IndexType {
    const NAMES: &'static [&'static str] = &["Unique", "NonUnique"];
}

impl<'de> Deserialize<'de> for IndexType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Name(String),
            Code(u64),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Name(name) => match name.as_str() {
                "Unique" => Ok(Self::Unique),
                "NonUnique" => Ok(Self::NonUnique),
                other => Err(de::Error::unknown_variant(other, Self::NAMES)),
            },
            Repr::Code(0) => Ok(Self::Unique),
            Repr::Code(1) => Ok(Self::NonUnique),
            Repr::Code(code) => Err(de::Error::invalid_value(
                Unexpected::Unsigned(code),
                &"index type 0 or 1",
            )),
        }
    }
}

/// The value type an index expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DataType {
    /// UTF-8 text.
    #[default]
    String,
    /// Signed 64-bit integer.
    Int64,
    /// 64-bit float.
    Float64,
    /// Boolean.
    Bool,
    /// UTC timestamp.
    DateTime,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "String",
            Self::Int64 => "Int64",
            Self::Float64 => "Float64",
            Self::Bool => "Bool",
            Self::DateTime => "DateTime",
        };
        f.write_str(name)
    }
}

/// Declares that a property of a type is indexed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDefinition {
    /// Name of the indexed property.
    pub property_name: String,
    /// Unique or non-unique.
    #[serde(rename = "type")]
    pub index_type: IndexType,
    /// Expected value type.
    #[serde(default)]
    pub data_type: DataType,
}

impl IndexDefinition {
    /// Creates an index definition.
    pub fn new(property_name: impl Into<String>, index_type: IndexType, data_type: DataType) -> Self {
        Self {
            property_name: property_name.into(),
            index_type,
            data_type,
        }
    }

    /// Shorthand for a unique index.
    pub fn unique(property_name: impl Into<String>, data_type: DataType) -> Self {
        Self::new(property_name, IndexType::Unique, data_type)
    }

    /// Shorthand for a non-unique index.
    pub fn non_unique(property_name: impl Into<String>, data_type: DataType) -> Self {
        Self::new(property_name, IndexType::NonUnique, data_type)
    }
}


