//! A schemaless record type.

use crate::error::CoreResult;
use crate::format;
use crate::id::Identifier;
use crate::index::IndexValue;
use crate::storable::{Indexable, Storable};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Type name under which [`DynamicObject`] is registered.
pub const DYNAMIC_OBJECT_TYPE_NAME: &str = "DynamicObject";

/// A record whose properties are a free-form JSON map.
///
/// Indexed properties are looked up in the map; JSON strings, integers,
/// floats and booleans are indexable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicObject {
    /// Identifier, `None` until allocated.
    pub id: Option<Identifier>,
    /// Application-level type label.
    pub dynamic_type: String,
    /// Property values.
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl DynamicObject {
    /// Creates an empty object with the given application-level type.
    pub fn new(dynamic_type: impl Into<String>) -> Self {
        Self {
            id: None,
            dynamic_type: dynamic_type.into(),
            properties: Map::new(),
        }
    }

    /// Sets a property, replacing any previous value.
    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.properties.insert(name.into(), value.into());
    }

    /// Returns a property value.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }
}

impl Storable for DynamicObject {
    fn id(&self) -> Option<Identifier> {
        self.id
    }

    fn set_id(&mut self, id: Identifier) {
        self.id = Some(id);
    }

    fn type_name(&self) -> &str {
        DYNAMIC_OBJECT_TYPE_NAME
    }

    fn serialize(&self) -> CoreResult<Vec<u8>> {
        format::to_json(self)
    }

    fn deserialize(&mut self, data: &[u8]) -> CoreResult<()> {
        *self = format::from_json(data)?;
        Ok(())
    }

    fn index_value(&self, property: &str) -> Option<IndexValue> {
        match self.properties.get(property)? {
            Value::String(s) => Some(IndexValue::String(s.clone())),
            Value::Bool(b) => Some(IndexValue::Bool(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(IndexValue::Int64)
                .or_else(|| n.as_f64().map(IndexValue::Float64)),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }
}

impl Indexable for DynamicObject {}


