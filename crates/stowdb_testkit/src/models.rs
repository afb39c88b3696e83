//! Sample record types covering every index data type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stowdb_core::{
    format, CoreResult, DataType, Identifier, IndexAccessors, IndexDefinition, IndexValue,
    Indexable, Registry, Storable,
};

/// Catalog item with a unique `Sku` (JSON encoded).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Widget {
    /// Identifier.
    pub id: Option<Identifier>,
    /// Stock keeping unit, unique per widget.
    pub sku: String,
    /// Display name.
    pub name: String,
    /// Unit price.
    pub price: f64,
}

impl Widget {
    /// Type name.
    pub const TYPE_NAME: &'static str = "Widget";

    /// Creates an unsaved widget.
    pub fn new(sku: impl Into<String>, name: impl Into<String>, price: f64) -> Self {
        Self {
            id: None,
            sku: sku.into(),
            name: name.into(),
            price,
        }
    }
}

impl Storable for Widget {
    fn id(&self) -> Option<Identifier> {
        self.id
    }

    fn set_id(&mut self, id: Identifier) {
        self.id = Some(id);
    }

    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn serialize(&self) -> CoreResult<Vec<u8>> {
        format::to_json(self)
    }

    fn deserialize(&mut self, data: &[u8]) -> CoreResult<()> {
        *self = format::from_json(data)?;
        Ok(())
    }
}

impl Indexable for Widget {
    fn index_accessors() -> IndexAccessors<Self> {
        IndexAccessors::new().with("Sku", |w| Some(IndexValue::from(w.sku.as_str())))
    }
}

/// Customer order with non-unique `Total` and `Customer` (CBOR encoded).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Identifier.
    pub id: Option<Identifier>,
    /// Customer name.
    pub customer: String,
    /// Order total; may be negative for refunds.
    pub total: f64,
}

impl Order {
    /// Type name.
    pub const TYPE_NAME: &'static str = "Order";

    /// Creates an unsaved order.
    pub fn new(customer: impl Into<String>, total: f64) -> Self {
        Self {
            id: None,
            customer: customer.into(),
            total,
        }
    }
}

impl Storable for Order {
    fn id(&self) -> Option<Identifier> {
        self.id
    }

    fn set_id(&mut self, id: Identifier) {
        self.id = Some(id);
    }

    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn serialize(&self) -> CoreResult<Vec<u8>> {
        format::to_cbor(self)
    }

    fn deserialize(&mut self, data: &[u8]) -> CoreResult<()> {
        *self = format::from_cbor(data)?;
        Ok(())
    }
}

impl Indexable for Order {
    fn index_accessors() -> IndexAccessors<Self> {
        IndexAccessors::new()
            .with("Total", |o: &Order| Some(IndexValue::Float64(o.total)))
            .with("Customer", |o: &Order| Some(IndexValue::from(o.customer.as_str())))
    }
}

/// Scheduled event with `At`, `Priority` and `Urgent` indexes.
///
/// `Priority` has no accessor; it is served by the
/// [`Storable::index_value`] fallback.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Identifier.
    pub id: Option<Identifier>,
    /// Event title.
    pub title: String,
    /// Start time; unscheduled events are not indexed by time.
    pub at: Option<DateTime<Utc>>,
    /// Priority, lower first.
    pub priority: i64,
    /// Urgency flag.
    pub urgent: bool,
}

impl Event {
    /// Type name.
    pub const TYPE_NAME: &'static str = "Event";

    /// Creates an unsaved event.
    pub fn new(title: impl Into<String>, at: Option<DateTime<Utc>>, priority: i64, urgent: bool) -> Self {
        Self {
            id: None,
            title: title.into(),
            at,
            priority,
            urgent,
        }
    }
}

impl Storable for Event {
    fn id(&self) -> Option<Identifier> {
        self.id
    }

    fn set_id(&mut self, id: Identifier) {
        self.id = Some(id);
    }

    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn serialize(&self) -> CoreResult<Vec<u8>> {
        format::to_json(self)
    }

    fn deserialize(&mut self, data: &[u8]) -> CoreResult<()> {
        *self = format::from_json(data)?;
        Ok(())
    }

    fn index_value(&self, property: &str) -> Option<IndexValue> {
        match property {
            "Priority" => Some(IndexValue::Int64(self.priority)),
            _ => None,
        }
    }
}

impl Indexable for Event {
    fn index_accessors() -> IndexAccessors<Self> {
        IndexAccessors::new()
            .with("At", |e: &Event| e.at.map(IndexValue::DateTime))
            .with("Urgent", |e: &Event| Some(IndexValue::Bool(e.urgent)))
    }
}

/// Registers the sample types and their indexes.
///
/// # Errors
///
/// Returns a registry error, e.g. if the types are already registered.
pub fn register_models(registry: &Registry) -> CoreResult<()> {
    registry.register_type::<Widget>()?;
    registry.declare_index(Widget::TYPE_NAME, IndexDefinition::unique("Sku", DataType::String))?;

    registry.register_type::<Order>()?;
    registry.declare_index(Order::TYPE_NAME, IndexDefinition::non_unique("Total", DataType::Float64))?;
    registry.declare_index(Order::TYPE_NAME, IndexDefinition::non_unique("Customer", DataType::String))?;

    registry.register_type::<Event>()?;
    registry.declare_index(Event::TYPE_NAME, IndexDefinition::non_unique("At", DataType::DateTime))?;
    registry.declare_index(Event::TYPE_NAME, IndexDefinition::non_unique("Priority", DataType::Int64))?;
    registry.declare_index(Event::TYPE_NAME, IndexDefinition::non_unique("Urgent", DataType::Bool))?;
    Ok(())
}
