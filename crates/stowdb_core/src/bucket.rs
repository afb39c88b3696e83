//! Bucket naming.

/// Prefix of primary buckets.
pub const TYPE_PREFIX: &str = "Type.";

/// Prefix of index buckets.
pub const INDEX_PREFIX: &str = "Index.";

/// Name of the bucket holding records of `type_name`.
#[must_use]
pub fn primary(type_name: &str) -> Vec<u8> {
    format!("{TYPE_PREFIX}{type_name}").into_bytes()
}

/// Name of the bucket holding the `property` index of `type_name`.
#[must_use]
pub fn index(type_name: &str, property: &str) -> Vec<u8> {
    format!("{INDEX_PREFIX}{type_name}.{property}").into_bytes()
}


