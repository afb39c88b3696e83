//! Resolved per-type metadata.

use crate::bucket;
use crate::error::{CoreError, CoreResult};
use crate::index::{IndexDefinition, IndexValue, PropertyTable};
use crate::storable::Storable;
use std::fmt;
use std::sync::Arc;

/// Zero-argument constructor of a registered type.
pub type TypeFactory = Arc<dyn Fn() -> Box<dyn Storable> + Send + Sync>;

/// A snapshot of everything the store needs to read and write one type.
///
/// Detached from the registry: holding a schema does not hold any
/// registry lock.
#[derive(Clone)]
pub struct TypeSchema {
    type_id: i64,
    type_name: String,
    indexes: Vec<IndexDefinition>,
    factory: TypeFactory,
    properties: Arc<PropertyTable>,
}

impl TypeSchema {
    pub(crate) fn new(
        type_id: i64,
        type_name: String,
        indexes: Vec<IndexDefinition>,
        factory: TypeFactory,
        properties: Arc<PropertyTable>,
    ) -> Self {
        Self {
            type_id,
            type_name,
            indexes,
            factory,
            properties,
        }
    }

    /// Type id.
    #[must_use]
    pub fn type_id(&self) -> i64 {
        self.type_id
    }

    /// Type name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Declared indexes.
    #[must_use]
    pub fn indexes(&self) -> &[IndexDefinition] {
        &self.indexes
    }

    /// Creates a zero-value record of this type.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TypeNotCreated`] if the factory returns a record
    /// of a different type.
    pub fn instance(&self) -> CoreResult<Box<dyn Storable>> {
        let record = (self.factory)();
        if record.type_name() != self.type_name {
            return Err(CoreError::type_not_created(
                &self.type_name,
                format!("factory produced a {}", record.type_name()),
            ));
        }
        Ok(record)
    }

    /// Extracts the value of an indexed property from `record`.
    #[must_use]
    pub fn index_value(&self, record: &dyn Storable, property: &str) -> Option<IndexValue> {
        self.properties.value(record, property)
    }

    /// Name of the primary bucket.
    #[must_use]
    pub fn primary_bucket(&self) -> Vec<u8> {
        bucket::primary(&self.type_name)
    }

    /// Name of the index bucket for `property`.
    #[must_use]
    pub fn index_bucket(&self, property: &str) -> Vec<u8> {
        bucket::index(&self.type_name, property)
    }
}

impl fmt::Debug for TypeSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeSchema")
            .field("type_id", &self.type_id)
            .field("type_name", &self.type_name)
            .field("indexes", &self.indexes)
            .finish_non_exhaustive()
    }
}
