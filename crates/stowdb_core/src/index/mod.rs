//! Secondary index declarations, values and key encodings.
//!
//! Each indexed property of a type owns one bucket,
//! `Index.<TypeName>.<PropertyName>`, mapping an encoded key to the
//! identifier text of the record it was derived from.

pub mod codec;
mod definition;
mod value;

pub use definition::{DataType, IndexDefinition, IndexType};
pub use value::{Accessor, IndexAccessors, IndexValue};

pub(crate) use value::PropertyTable;
