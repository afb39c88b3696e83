//! The contract a record type satisfies to be persisted.

use crate::error::{CoreError, CoreResult};
use crate::id::Identifier;
use crate::index::{IndexAccessors, IndexValue};
use std::any::Any;

/// Upcast to [`Any`] for records handled as trait objects.
///
/// Implemented for every `'static` type; record types never implement it
/// by hand.
pub trait AsAny: Any {
    /// Borrows `self` as `Any`.
    fn as_any(&self) -> &dyn Any;

    /// Converts a boxed `self` into a boxed `Any`.
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// A record that can be stored.
///
/// # Example
///
/// ```rust
/// use serde::{Deserialize, Serialize};
/// use stowdb_core::{format, CoreResult, Identifier, Storable};
///
/// #[derive(Debug, Default, Serialize, Deserialize)]
/// struct Note {
///     id: Option<Identifier>,
///     text: String,
/// }
///
/// impl Storable for Note {
///     fn id(&self) -> Option<Identifier> {
///         self.id
///     }
///     fn set_id(&mut self, id: Identifier) {
///         self.id = Some(id);
///     }
///     fn type_name(&self) -> &str {
///         "Note"
///     }
///     fn serialize(&self) -> CoreResult<Vec<u8>> {
///         format::to_json(self)
///     }
///     fn deserialize(&mut self, data: &[u8]) -> CoreResult<()> {
///         *self = format::from_json(data)?;
///         Ok(())
///     }
/// }
/// ```
pub trait Storable: AsAny + Send + Sync {
    /// The record's identifier, `None` until one is allocated.
    fn id(&self) -> Option<Identifier>;

    /// Stamps the record with an identifier.
    fn set_id(&mut self, id: Identifier);

    /// Stable type name. Must match the name the type is registered under.
    fn type_name(&self) -> &str;

    /// Encodes the record.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SerializationFailed`] if encoding fails.
    fn serialize(&self) -> CoreResult<Vec<u8>>;

    /// Replaces the record's contents with decoded `data`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DeserializationFailed`] if decoding fails.
    fn deserialize(&mut self, data: &[u8]) -> CoreResult<()>;

    /// Fallback lookup for indexed property values.
    ///
    /// Consulted only when the type's registered accessors have no entry
    /// for `property`.
    fn index_value(&self, _property: &str) -> Option<IndexValue> {
        None
    }
}

/// A record type with a zero value and compile-time index accessors.
///
/// Types implementing this can be registered with
/// [`Registry::register_type`](crate::Registry::register_type).
pub trait Indexable: Storable + Default {
    /// Property accessors used to extract indexed values.
    fn index_accessors() -> IndexAccessors<Self> {
        IndexAccessors::new()
    }
}

/// Converts a boxed record into its concrete type.
///
/// # Errors
///
/// Returns [`CoreError::TypeMismatch`] if the record is not a `T`.
pub fn downcast<T: Storable>(record: Box<dyn Storable>) -> CoreResult<T> {
    let actual = record.type_name().to_owned();
    record
        .into_any()
        .downcast::<T>()
        .map(|boxed| *boxed)
        .map_err(|_| CoreError::TypeMismatch {
            expected: std::any::type_name::<T>().to_owned(),
            actual,
        })
}


