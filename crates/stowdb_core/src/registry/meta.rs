//! Registry meta-records.

use crate::error::CoreResult;
use crate::format;
use crate::id::Identifier;
use crate::index::IndexDefinition;
use crate::storable::Storable;
use serde::{Deserialize, Serialize};

/// Type name of [`RegistryInfo`].
pub const REGISTRY_INFO_TYPE_NAME: &str = "RegistryInfo";
/// Type name of [`RegistryItem`].
pub const REGISTRY_ITEM_TYPE_NAME: &str = "RegistryItem";
/// Reserved type id of [`RegistryInfo`].
pub const REGISTRY_INFO_TYPE_ID: i64 = 1;
/// Object id of the singleton [`RegistryInfo`].
pub const REGISTRY_INFO_OBJECT_ID: i64 = 1;
/// Reserved type id of [`RegistryItem`].
pub const REGISTRY_ITEM_TYPE_ID: i64 = 2;
/// First type id and registry object id handed out; lower ids are reserved.
pub const FIRST_ALLOCATED_ID: i64 = 1001;

/// Identifier of the singleton [`RegistryInfo`].
pub const REGISTRY_INFO_ID: Identifier = Identifier::new(REGISTRY_INFO_TYPE_ID, REGISTRY_INFO_OBJECT_ID);

/// Returns true for the two meta-type names.
#[must_use]
pub fn is_reserved_name(type_name: &str) -> bool {
    type_name == REGISTRY_INFO_TYPE_NAME || type_name == REGISTRY_ITEM_TYPE_NAME
}

/// Global allocation counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryInfo {
    /// Always [`REGISTRY_INFO_ID`].
    pub id: Identifier,
    /// Next type id to hand out.
    pub next_type_id: i64,
    /// Next object id for a [`RegistryItem`].
    pub next_object_id: i64,
}

impl Default for RegistryInfo {
    fn default() -> Self {
        Self {
            id: REGISTRY_INFO_ID,
            next_type_id: FIRST_ALLOCATED_ID,
            next_object_id: FIRST_ALLOCATED_ID,
        }
    }
}

impl Storable for RegistryInfo {
    fn id(&self) -> Option<Identifier> {
        Some(self.id)
    }

    fn set_id(&mut self, id: Identifier) {
        self.id = id;
    }

    fn type_name(&self) -> &str {
        REGISTRY_INFO_TYPE_NAME
    }

    fn serialize(&self) -> CoreResult<Vec<u8>> {
        format::to_json(self)
    }

    fn deserialize(&mut self, data: &[u8]) -> CoreResult<()> {
        *self = format::from_json(data)?;
        Ok(())
    }
}

/// Persisted metadata of one registered type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryItem {
    /// Storage identifier `(2, n)`, `None` until the type is allocated.
    pub id: Option<Identifier>,
    /// Registered type name.
    pub type_name: String,
    /// Allocated type id, `0` until allocated.
    pub type_id: i64,
    /// Next object id for records of this type.
    pub next_object_id: i64,
    /// Declared indexes.
    #[serde(default)]
    pub indexes: Vec<IndexDefinition>,
}

impl RegistryItem {
    /// Creates an unallocated item.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            ..Self::default()
        }
    }

    /// Returns true once a type id has been assigned.
    #[must_use]
    pub const fn is_allocated(&self) -> bool {
        self.type_id != 0
    }

    /// Returns the definition for `property`, if declared.
    #[must_use]
    pub fn index(&self, property: &str) -> Option<&IndexDefinition> {
        self.indexes.iter().find(|d| d.property_name == property)
    }
}

impl Storable for RegistryItem {
    fn id(&self) -> Option<Identifier> {
        self.id
    }

    fn set_id(&mut self, id: Identifier) {
        self.id = Some(id);
    }

    fn type_name(&self) -> &str {
        REGISTRY_ITEM_TYPE_NAME
    }

    fn serialize(&self) -> CoreResult<Vec<u8>> {
        format::to_json(self)
    }

    fn deserialize(&mut self, data: &[u8]) -> CoreResult<()> {
        *self = format::from_json(data)?;
        Ok(())
    }
}


