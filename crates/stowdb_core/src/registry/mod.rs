//! Type registry.
//!
//! The registry maps type names to stable type ids, hands out object ids,
//! and keeps each type's index declarations and property accessors. Its
//! own state is persisted as two meta-types in the same engine as user
//! records:
//!
//! - a singleton [`RegistryInfo`] at `(1, 1)` with the global counters
//! - one [`RegistryItem`] per type at `(2, n)`
//!
//! ## Lifecycle
//!
//! 1. Register every record type (and declare its indexes).
//! 2. [`Registry::load`] reconciles with what is persisted and allocates
//!    ids for types seen for the first time.
//! 3. Allocate ids and resolve schemas for store operations.
//!
//! ## Locking
//!
//! In-memory state sits behind one mutex. A second mutex owns the engine
//! handle and serializes writes of meta-records. The state mutex is never
//! held while the engine is entered, so store transactions and registry
//! persistence cannot wait on each other.

mod meta;
mod schema;

pub use meta::{
    is_reserved_name, RegistryInfo, RegistryItem, FIRST_ALLOCATED_ID, REGISTRY_INFO_ID,
    REGISTRY_INFO_OBJECT_ID, REGISTRY_INFO_TYPE_ID, REGISTRY_INFO_TYPE_NAME, REGISTRY_ITEM_TYPE_ID,
    REGISTRY_ITEM_TYPE_NAME,
};
pub use schema::{TypeFactory, TypeSchema};

use crate::bucket;
use crate::error::{CoreError, CoreResult};
use crate::format;
use crate::id::Identifier;
use crate::index::{IndexDefinition, IndexValue, PropertyTable};
use crate::storable::{Indexable, Storable};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use stowdb_storage::Engine;
use tracing::{debug, error, info, warn};

struct TypeEntry {
    item: RegistryItem,
    factory: TypeFactory,
    properties: Arc<PropertyTable>,
}

#[derive(Default)]
struct RegistryState {
    info: Option<RegistryInfo>,
    /// Registration order.
    entries: Vec<TypeEntry>,
    /// Allocated entries only.
    by_id: HashMap<i64, usize>,
    by_name: HashMap<String, usize>,
    failure: Option<String>,
}

impl RegistryState {
    fn check(&self) -> CoreResult<()> {
        match &self.failure {
            Some(message) => Err(CoreError::bootstrap(message.clone())),
            None => Ok(()),
        }
    }

    fn position(&self, type_name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.item.type_name == type_name)
    }

    fn reindex(&mut self) {
        self.by_id.clear();
        self.by_name.clear();
        for (idx, entry) in self.entries.iter().enumerate() {
            if entry.item.is_allocated() {
                self.by_id.insert(entry.item.type_id, idx);
                self.by_name.insert(entry.item.type_name.clone(), idx);
            }
        }
    }

    fn schema_at(&self, idx: usize) -> TypeSchema {
        let entry = &self.entries[idx];
        TypeSchema::new(
            entry.item.type_id,
            entry.item.type_name.clone(),
            entry.item.indexes.clone(),
            Arc::clone(&entry.factory),
            Arc::clone(&entry.properties),
        )
    }
}

/// Copies persisted metadata onto a registered item.
///
/// Returns true if the item now differs from what is persisted.
fn merge_persisted(item: &mut RegistryItem, persisted: RegistryItem) -> bool {
    let declared = std::mem::replace(&mut item.indexes, persisted.indexes);
    item.id = persisted.id;
    item.type_id = persisted.type_id;

    let mut dirty = item.next_object_id > persisted.next_object_id;
    item.next_object_id = item.next_object_id.max(persisted.next_object_id);

    for definition in declared {
        if item.index(&definition.property_name).is_none() {
            item.indexes.push(definition);
            dirty = true;
        }
    }
    dirty
}

fn meta_schema(type_id: i64) -> Option<TypeSchema> {
    let (name, factory): (&str, TypeFactory) = match type_id {
        REGISTRY_INFO_TYPE_ID => (
            REGISTRY_INFO_TYPE_NAME,
            Arc::new(|| Box::new(RegistryInfo::default()) as Box<dyn Storable>),
        ),
        REGISTRY_ITEM_TYPE_ID => (
            REGISTRY_ITEM_TYPE_NAME,
            Arc::new(|| Box::new(RegistryItem::default()) as Box<dyn Storable>),
        ),
        _ => return None,
    };
    Some(TypeSchema::new(
        type_id,
        name.to_owned(),
        Vec::new(),
        factory,
        Arc::new(PropertyTable::default()),
    ))
}

/// Registry of record types.
///
/// Shared between the host and its [`Store`](crate::Store) through an
/// `Arc`. A registry persists its meta-records into the engine passed to
/// the most recent [`load`](Registry::load).
#[derive(Default)]
pub struct Registry {
    state: Mutex<RegistryState>,
    engine: Mutex<Option<Arc<Engine>>>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a type name with a zero-argument constructor.
    ///
    /// No id is allocated until the next [`load`](Registry::load).
    ///
    /// # Errors
    ///
    /// - [`CoreError::ReservedType`] for the meta-type names
    /// - [`CoreError::DuplicateType`] if the name is already registered
    /// - [`CoreError::Bootstrap`] if a previous load failed
    pub fn register<F>(&self, type_name: impl Into<String>, factory: F) -> CoreResult<()>
    where
        F: Fn() -> Box<dyn Storable> + Send + Sync + 'static,
    {
        self.insert(type_name.into(), Arc::new(factory), PropertyTable::default())
    }

    /// Registers `T` under the name its zero value reports, with its
    /// [`IndexAccessors`](crate::IndexAccessors) as the property table.
    ///
    /// # Errors
    ///
    /// Same as [`register`](Registry::register).
    pub fn register_type<T: Indexable>(&self) -> CoreResult<()> {
        let type_name = T::default().type_name().to_owned();
        let factory: TypeFactory = Arc::new(|| Box::new(T::default()) as Box<dyn Storable>);
        self.insert(type_name, factory, PropertyTable::from(T::index_accessors()))
    }

    fn insert(&self, type_name: String, factory: TypeFactory, properties: PropertyTable) -> CoreResult<()> {
        let mut state = self.state.lock();
        state.check()?;

        if is_reserved_name(&type_name) {
            return Err(CoreError::ReservedType { name: type_name });
        }
        if state.position(&type_name).is_some() {
            return Err(CoreError::DuplicateType { name: type_name });
        }

        debug!(type_name = %type_name, "registered type");
        state.entries.push(TypeEntry {
            item: RegistryItem::new(type_name),
            factory,
            properties: Arc::new(properties),
        });
        Ok(())
    }

    /// Declares an index on a registered type.
    ///
    /// Declarations are additive. Declaring on an unknown type is ignored
    /// with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Bootstrap`] if a previous load failed.
    pub fn declare_index(&self, type_name: &str, definition: IndexDefinition) -> CoreResult<()> {
        let mut state = self.state.lock();
        state.check()?;

        match state.position(type_name) {
            Some(idx) => {
                debug!(
                    type_name,
                    property = %definition.property_name,
                    index_type = %definition.index_type,
                    "declared index"
                );
                state.entries[idx].item.indexes.push(definition);
            }
            None => warn!(
                type_name,
                property = %definition.property_name,
                "index declared on unregistered type; ignored"
            ),
        }
        Ok(())
    }

    /// Reconciles registered types with the metadata persisted in `engine`.
    ///
    /// Types seen for the first time get a new type id, and everything new
    /// is written in one transaction. Can be called again to pick up types
    /// registered after an earlier load.
    ///
    /// # Errors
    ///
    /// Returns engine or decoding errors. If writing the new metadata
    /// fails, the registry is left unchanged, latched into a failed state,
    /// and this and every later call returns [`CoreError::Bootstrap`].
    pub fn load(&self, engine: &Arc<Engine>) -> CoreResult<()> {
        self.state.lock().check()?;

        let mut handle = self.engine.lock();
        *handle = Some(Arc::clone(engine));

        let info_bucket = bucket::primary(REGISTRY_INFO_TYPE_NAME);
        let item_bucket = bucket::primary(REGISTRY_ITEM_TYPE_NAME);
        let info_key = REGISTRY_INFO_ID.to_string();

        engine.update(|tx| {
            for name in [&info_bucket, &item_bucket] {
                tx.create_bucket_if_not_exists(name)
                    .map_err(|e| CoreError::bucket_create_failed(name, e))?;
            }
            Ok::<_, CoreError>(())
        })?;

        let (stored_info, stored_items) = engine.view(|tx| {
            let info = tx
                .bucket(&info_bucket)
                .and_then(|b| b.get(info_key.as_bytes()))
                .map(<[u8]>::to_vec);
            let items: Vec<Vec<u8>> = tx
                .bucket(&item_bucket)
                .map(|b| b.cursor().map(|(_, value)| value.to_vec()).collect())
                .unwrap_or_default();
            Ok::<_, CoreError>((info, items))
        })?;

        let persisted_info = stored_info
            .map(|data| format::from_json::<RegistryInfo>(&data))
            .transpose()?;
        let persisted_items = stored_items
            .iter()
            .map(|data| format::from_json::<RegistryItem>(data))
            .collect::<CoreResult<Vec<_>>>()?;

        // Plan under the state lock, write without it.
        let fresh = persisted_info.is_none();
        let (next_info, allocated, writes) = {
            let mut state = self.state.lock();
            state.check()?;

            let mut next_info = persisted_info.unwrap_or_default();
            if let Some(current) = &state.info {
                next_info.next_type_id = next_info.next_type_id.max(current.next_type_id);
                next_info.next_object_id = next_info.next_object_id.max(current.next_object_id);
            }

            let mut writes = Vec::new();
            for persisted in persisted_items {
                let Some(idx) = state.position(&persisted.type_name) else {
                    debug!(type_name = %persisted.type_name, "persisted type not registered");
                    continue;
                };
                if merge_persisted(&mut state.entries[idx].item, persisted) {
                    writes.push(state.entries[idx].item.clone());
                }
            }

            let mut allocated = Vec::new();
            for (idx, entry) in state.entries.iter().enumerate() {
                if entry.item.is_allocated() {
                    continue;
                }
                let mut item = entry.item.clone();
                item.type_id = next_info.next_type_id;
                item.id = Some(Identifier::new(REGISTRY_ITEM_TYPE_ID, next_info.next_object_id));
                item.next_object_id = 1;
                next_info.next_type_id += 1;
                next_info.next_object_id += 1;
                writes.push(item.clone());
                allocated.push((idx, item));
            }
            (next_info, allocated, writes)
        };

        if fresh || !writes.is_empty() {
            let written = engine.update(|tx| {
                for item in &writes {
                    let id = item.id.ok_or_else(|| CoreError::RecordHasNoIdentifier {
                        type_name: REGISTRY_ITEM_TYPE_NAME.to_owned(),
                    })?;
                    tx.put(&item_bucket, id.to_string().as_bytes(), &format::to_json(item)?)
                        .map_err(CoreError::write_failed)?;
                }
                tx.put(&info_bucket, info_key.as_bytes(), &format::to_json(&next_info)?)
                    .map_err(CoreError::write_failed)?;
                Ok::<_, CoreError>(())
            });

            if let Err(err) = written {
                let message = err.to_string();
                error!(error = %message, "registry bootstrap failed");
                self.state.lock().failure = Some(message.clone());
                return Err(CoreError::bootstrap(message));
            }
        }

        let mut state = self.state.lock();
        for (idx, item) in allocated {
            info!(type_name = %item.type_name, type_id = item.type_id, "allocated type id");
            let entry = &mut state.entries[idx].item;
            entry.id = item.id;
            entry.type_id = item.type_id;
            entry.next_object_id = item.next_object_id;
        }
        state.info = Some(next_info);
        state.reindex();
        debug!(types = state.by_id.len(), "registry loaded");
        Ok(())
    }

    /// Stamps `record` with the next identifier of its type and persists
    /// the type's counter.
    ///
    /// If persisting fails the id is discarded, never handed out again,
    /// and the record stays unstamped.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TypeNotFound`] if the record's type is not
    /// registered and loaded, or an engine error.
    pub fn allocate_id(&self, record: &mut dyn Storable) -> CoreResult<Identifier> {
        let (idx, id) = {
            let mut state = self.state.lock();
            state.check()?;
            let idx = *state
                .by_name
                .get(record.type_name())
                .ok_or_else(|| CoreError::type_not_found(record.type_name()))?;
            let item = &mut state.entries[idx].item;
            let id = Identifier::new(item.type_id, item.next_object_id);
            item.next_object_id += 1;
            (idx, id)
        };

        self.persist_item(idx)?;
        debug!(type_name = record.type_name(), %id, "allocated id");
        record.set_id(id);
        Ok(id)
    }

    fn persist_item(&self, idx: usize) -> CoreResult<()> {
        let handle = self.engine.lock();
        let engine = handle
            .as_ref()
            .ok_or_else(|| CoreError::bootstrap("registry has not been loaded"))?;

        // Snapshot under the persistence lock so stored counters never regress.
        let item = self.state.lock().entries[idx].item.clone();
        let id = item.id.ok_or_else(|| CoreError::RecordHasNoIdentifier {
            type_name: REGISTRY_ITEM_TYPE_NAME.to_owned(),
        })?;
        let data = format::to_json(&item)?;
        let item_bucket = bucket::primary(REGISTRY_ITEM_TYPE_NAME);

        engine.update(|tx| {
            tx.put(&item_bucket, id.to_string().as_bytes(), &data)
                .map_err(CoreError::write_failed)
        })
    }

    /// Resolves the schema of a type id, meta-types included.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TypeNotFound`] for an unknown id.
    pub fn schema(&self, type_id: i64) -> CoreResult<TypeSchema> {
        let state = self.state.lock();
        state.check()?;
        if let Some(schema) = meta_schema(type_id) {
            return Ok(schema);
        }
        let idx = *state
            .by_id
            .get(&type_id)
            .ok_or_else(|| CoreError::type_id_not_found(type_id))?;
        Ok(state.schema_at(idx))
    }

    /// Resolves the schema of a type name, meta-types included.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TypeNotFound`] for an unknown name.
    pub fn schema_by_name(&self, type_name: &str) -> CoreResult<TypeSchema> {
        let type_id = self.type_id_for(type_name)?;
        self.schema(type_id)
    }

    /// Creates a zero-value record of the given type.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TypeNotFound`] for an unknown id or
    /// [`CoreError::TypeNotCreated`] if the factory misbehaves.
    pub fn instance(&self, type_id: i64) -> CoreResult<Box<dyn Storable>> {
        self.schema(type_id)?.instance()
    }

    /// Looks up the id of a type name.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TypeNotFound`] if the name is unknown or not
    /// yet loaded.
    pub fn type_id_for(&self, type_name: &str) -> CoreResult<i64> {
        let state = self.state.lock();
        state.check()?;
        match type_name {
            REGISTRY_INFO_TYPE_NAME => Ok(REGISTRY_INFO_TYPE_ID),
            REGISTRY_ITEM_TYPE_NAME => Ok(REGISTRY_ITEM_TYPE_ID),
            _ => state
                .by_name
                .get(type_name)
                .map(|&idx| state.entries[idx].item.type_id)
                .ok_or_else(|| CoreError::type_not_found(type_name)),
        }
    }

    /// Looks up the name of a type id.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TypeNotFound`] if the id is unknown.
    pub fn type_name_for(&self, type_id: i64) -> CoreResult<String> {
        let state = self.state.lock();
        state.check()?;
        match type_id {
            REGISTRY_INFO_TYPE_ID => Ok(REGISTRY_INFO_TYPE_NAME.to_owned()),
            REGISTRY_ITEM_TYPE_ID => Ok(REGISTRY_ITEM_TYPE_NAME.to_owned()),
            _ => state
                .by_id
                .get(&type_id)
                .map(|&idx| state.entries[idx].item.type_name.clone())
                .ok_or_else(|| CoreError::type_id_not_found(type_id)),
        }
    }

    /// Declared indexes of a type; empty for unknown ids.
    #[must_use]
    pub fn indexes_for(&self, type_id: i64) -> Vec<IndexDefinition> {
        let state = self.state.lock();
        state
            .by_id
            .get(&type_id)
            .map(|&idx| state.entries[idx].item.indexes.clone())
            .unwrap_or_default()
    }

    /// Extracts an indexed property value through the type's accessors,
    /// falling back to [`Storable::index_value`].
    #[must_use]
    pub fn index_value(&self, type_id: i64, record: &dyn Storable, property: &str) -> Option<IndexValue> {
        match self.schema(type_id) {
            Ok(schema) => schema.index_value(record, property),
            Err(_) => record.index_value(property),
        }
    }

    /// Snapshot of every registered type's metadata, in registration order.
    #[must_use]
    pub fn items(&self) -> Vec<RegistryItem> {
        self.state
            .lock()
            .entries
            .iter()
            .map(|entry| entry.item.clone())
            .collect()
    }

    /// The global counters, once loaded.
    #[must_use]
    pub fn info(&self) -> Option<RegistryInfo> {
        self.state.lock().info.clone()
    }

    /// Returns true after a successful [`load`](Registry::load).
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.state.lock().info.is_some()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Registry")
            .field("types", &state.entries.len())
            .field("loaded", &state.info.is_some())
            .field("failed", &state.failure.is_some())
            .finish_non_exhaustive()
    }
}


