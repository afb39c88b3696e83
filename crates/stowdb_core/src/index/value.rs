//! Typed index values and per-type property accessors.

use super::definition::DataType;
use crate::storable::Storable;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

/// A value produced by a record for one of its indexed properties.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexValue {
    /// UTF-8 text.
    String(String),
    /// Signed 64-bit integer.
    Int64(i64),
    /// 64-bit float.
    Float64(f64),
    /// Boolean.
    Bool(bool),
    /// UTC timestamp.
    DateTime(DateTime<Utc>),
}

impl IndexValue {
    /// Returns the data type of this value.
    #[must_use]
    pub const fn data_type(&self) -> DataType {
        match self {
            Self::String(_) => DataType::String,
            Self::Int64(_) => DataType::Int64,
            Self::Float64(_) => DataType::Float64,
            Self::Bool(_) => DataType::Bool,
            Self::DateTime(_) => DataType::DateTime,
        }
    }
}

impl From<String> for IndexValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for IndexValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<i64> for IndexValue {
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

impl From<f64> for IndexValue {
    fn from(value: f64) -> Self {
        Self::Float64(value)
    }
}

impl From<bool> for IndexValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<DateTime<Utc>> for IndexValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::DateTime(value)
    }
}

/// Property accessor for a concrete record type.
pub type Accessor<T> = fn(&T) -> Option<IndexValue>;

/// Compile-time-checked property accessors for a record type.
///
/// ```rust
/// # use stowdb_core::{IndexAccessors, IndexValue, DynamicObject};
/// let accessors = IndexAccessors::<DynamicObject>::new()
///     .with("Kind", |o| Some(IndexValue::from(o.dynamic_type.as_str())));
/// assert_eq!(accessors.len(), 1);
/// ```
pub struct IndexAccessors<T> {
    entries: Vec<(String, Accessor<T>)>,
}

impl<T> Default for IndexAccessors<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> IndexAccessors<T> {
    /// Creates an empty accessor set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an accessor for `property`.
    #[must_use]
    pub fn with(mut self, property: impl Into<String>, accessor: Accessor<T>) -> Self {
        self.entries.push((property.into(), accessor));
        self
    }

    /// Number of accessors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no accessor is defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Accessor over type-erased records.
pub(crate) type ErasedAccessor = Arc<dyn Fn(&dyn Storable) -> Option<IndexValue> + Send + Sync>;

/// Property name to accessor dispatch table of one registered type.
#[derive(Clone, Default)]
pub(crate) struct PropertyTable {
    accessors: HashMap<String, ErasedAccessor>,
}

impl PropertyTable {
    /// Resolves `property` on `record`, falling back to
    /// [`Storable::index_value`].
    pub(crate) fn value(&self, record: &dyn Storable, property: &str) -> Option<IndexValue> {
        match self.accessors.get(property) {
            Some(accessor) => accessor(record),
            None => record.index_value(property),
        }
    }
}

impl<T: Storable> From<IndexAccessors<T>> for PropertyTable {
    fn from(accessors: IndexAccessors<T>) -> Self {
        let accessors = accessors
            .entries
            .into_iter()
            .map(|(property, accessor)| {
                let erased: ErasedAccessor = Arc::new(move |record: &dyn Storable| {
                    record.as_any().downcast_ref::<T>().and_then(accessor)
                });
                (property, erased)
            })
            .collect();
        Self { accessors }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamic::DynamicObject;

    #[test]
    fn data_types_match_variants() {
        assert_eq!(IndexValue::from("a").data_type(), DataType::String);
        assert_eq!(IndexValue::from(1i64).data_type(), DataType::Int64);
        assert_eq!(IndexValue::from(1.5).data_type(), DataType::Float64);
        assert_eq!(IndexValue::from(true).data_type(), DataType::Bool);
        assert_eq!(IndexValue::from(Utc::now()).data_type(), DataType::DateTime);
    }

    #[test]
    fn table_prefers_accessor_over_fallback() {
        let table = PropertyTable::from(
            IndexAccessors::<DynamicObject>::new().with("name", |_| Some(IndexValue::from("accessor"))),
        );
        let mut object = DynamicObject::new("Thing");
        object.set_property("name", "fallback");
        object.set_property("size", 3);

        assert_eq!(table.value(&object, "name"), Some(IndexValue::from("accessor")));
        assert_eq!(table.value(&object, "size"), Some(IndexValue::Int64(3)));
        assert_eq!(table.value(&object, "missing"), None);
    }
}
