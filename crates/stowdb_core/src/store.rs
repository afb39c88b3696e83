//! The object store.
//!
//! Records live in one primary bucket per type, keyed by identifier text.
//! Every declared index has its own bucket, and every mutation updates the
//! record and all of its index entries in a single engine transaction.

use crate::bucket;
use crate::config::StoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::id::Identifier;
use crate::index::{codec, IndexDefinition, IndexType, IndexValue};
use crate::registry::{Registry, TypeSchema};
use crate::storable::{downcast, Storable};
use std::collections::HashMap;
use std::sync::Arc;
use stowdb_storage::{Engine, WriteTxn};
use tracing::{debug, info, warn};

/// A record resolved and encoded ahead of its transaction.
struct PreparedWrite<'r> {
    schema: TypeSchema,
    id: Identifier,
    record: &'r dyn Storable,
    data: Vec<u8>,
}

/// Typed object store with secondary indexes.
///
/// Registry lookups happen before a transaction starts; inside a
/// transaction the store only touches the engine.
#[derive(Debug)]
pub struct Store {
    engine: Arc<Engine>,
    registry: Arc<Registry>,
}

impl Store {
    /// Opens the engine described by `config` and loads `registry` from it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] if the file is missing and may
    /// not be created, or any engine or registry error.
    pub fn open(config: &StoreConfig, registry: Arc<Registry>) -> CoreResult<Self> {
        let engine = match &config.path {
            None => Engine::in_memory(),
            Some(path) => {
                if !config.create_if_missing && !path.exists() {
                    return Err(CoreError::invalid_config(format!(
                        "store file {} does not exist",
                        path.display()
                    )));
                }
                Engine::open_path(path, config.engine_options())?
            }
        };
        let store = Self::with_engine(Arc::new(engine), registry)?;
        info!(path = ?config.path, "store opened");
        Ok(store)
    }

    /// Wraps an already open engine and loads `registry` from it.
    ///
    /// # Errors
    ///
    /// Returns any error from [`Registry::load`].
    pub fn with_engine(engine: Arc<Engine>, registry: Arc<Registry>) -> CoreResult<Self> {
        registry.load(&engine)?;
        Ok(Self { engine, registry })
    }

    /// The registry this store resolves types with.
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// The underlying engine.
    #[must_use]
    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Stamps `record` with a fresh identifier.
    ///
    /// # Errors
    ///
    /// See [`Registry::allocate_id`].
    pub fn allocate_id(&self, record: &mut dyn Storable) -> CoreResult<Identifier> {
        self.registry.allocate_id(record)
    }

    /// Creates the primary bucket of `type_name` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::BucketCreateFailed`] if the engine refuses.
    pub fn allocate_bucket_if_needed(&self, type_name: &str) -> CoreResult<()> {
        let name = bucket::primary(type_name);
        self.engine.update(|tx| {
            tx.create_bucket_if_not_exists(&name)
                .map_err(|e| CoreError::bucket_create_failed(&name, e))
        })
    }

    fn prepare<'r>(
        &self,
        record: &'r dyn Storable,
        schemas: &mut HashMap<i64, TypeSchema>,
    ) -> CoreResult<PreparedWrite<'r>> {
        let id = record.id().ok_or_else(|| CoreError::RecordHasNoIdentifier {
            type_name: record.type_name().to_owned(),
        })?;

        let schema = match schemas.get(&id.type_id) {
            Some(schema) => schema.clone(),
            None => {
                let schema = self.registry.schema(id.type_id)?;
                schemas.insert(id.type_id, schema.clone());
                schema
            }
        };
        if schema.type_name() != record.type_name() {
            return Err(CoreError::TypeMismatch {
                expected: schema.type_name().to_owned(),
                actual: record.type_name().to_owned(),
            });
        }

        let data = record.serialize()?;
        Ok(PreparedWrite {
            schema,
            id,
            record,
            data,
        })
    }

    /// Writes a record and its index entries.
    ///
    /// Index entries derived from the previously stored version are
    /// removed first, so changing an indexed property frees the old value.
    ///
    /// # Errors
    ///
    /// - [`CoreError::RecordHasNoIdentifier`] if the record has no id
    /// - [`CoreError::UniqueIndexViolation`] if a unique value is taken;
    ///   nothing is written in that case
    pub fn put(&self, record: &dyn Storable) -> CoreResult<()> {
        let write = self.prepare(record, &mut HashMap::new())?;
        self.engine.update(|tx| self.write_record(tx, &write))?;
        debug!(id = %write.id, type_name = write.schema.type_name(), "put record");
        Ok(())
    }

    /// Writes several records in one transaction; any failure writes none.
    ///
    /// # Errors
    ///
    /// Same as [`put`](Store::put).
    pub fn put_all(&self, records: &[&dyn Storable]) -> CoreResult<()> {
        let mut schemas = HashMap::new();
        let writes = records
            .iter()
            .map(|record| self.prepare(*record, &mut schemas))
            .collect::<CoreResult<Vec<_>>>()?;

        self.engine.update(|tx| {
            for write in &writes {
                self.write_record(tx, write)?;
            }
            Ok::<_, CoreError>(())
        })?;
        debug!(count = writes.len(), "put records");
        Ok(())
    }

    fn write_record(&self, tx: &mut WriteTxn<'_>, write: &PreparedWrite<'_>) -> CoreResult<()> {
        let schema = &write.schema;
        let primary = schema.primary_bucket();
        let key = write.id.to_string();

        tx.create_bucket_if_not_exists(&primary)
            .map_err(|e| CoreError::bucket_create_failed(&primary, e))?;

        if let Some(previous) = tx.get(&primary, key.as_bytes()) {
            match self.decode(schema, key.as_bytes(), &previous) {
                Ok(old) => self.remove_index_entries(tx, schema, write.id, old.as_ref())?,
                Err(err) => warn!(
                    id = %write.id,
                    error = %err,
                    "previous version unreadable; its index entries are kept"
                ),
            }
        }

        tx.put(&primary, key.as_bytes(), &write.data)
            .map_err(CoreError::write_failed)?;
        self.add_index_entries(tx, schema, write.id, write.record)
    }

    fn add_index_entries(
        &self,
        tx: &mut WriteTxn<'_>,
        schema: &TypeSchema,
        id: Identifier,
        record: &dyn Storable,
    ) -> CoreResult<()> {
        let id_text = id.to_string();
        for definition in schema.indexes() {
            let Some(encoded) = encode_property(schema, definition, record) else {
                continue;
            };
            let index = schema.index_bucket(&definition.property_name);
            tx.create_bucket_if_not_exists(&index)
                .map_err(|e| CoreError::bucket_create_failed(&index, e))?;

            let key = codec::index_key(definition.index_type, &encoded, &id);
            if definition.index_type == IndexType::Unique {
                if let Some(existing) = tx.get(&index, &key) {
                    if existing != id_text.as_bytes() {
                        return Err(CoreError::UniqueIndexViolation {
                            index: String::from_utf8_lossy(&index).into_owned(),
                            existing: String::from_utf8_lossy(&existing).into_owned(),
                            id,
                        });
                    }
                }
            }
            tx.put(&index, &key, id_text.as_bytes())
                .map_err(CoreError::write_failed)?;
        }
        Ok(())
    }

    fn remove_index_entries(
        &self,
        tx: &mut WriteTxn<'_>,
        schema: &TypeSchema,
        id: Identifier,
        record: &dyn Storable,
    ) -> CoreResult<()> {
        let id_text = id.to_string();
        for definition in schema.indexes() {
            let index = schema.index_bucket(&definition.property_name);
            if !tx.bucket_exists(&index) {
                continue;
            }
            let Some(encoded) = encode_property(schema, definition, record) else {
                continue;
            };

            let key = codec::index_key(definition.index_type, &encoded, &id);
            // A unique key owned by another record is not ours to remove.
            if definition.index_type == IndexType::Unique
                && tx.get(&index, &key).as_deref() != Some(id_text.as_bytes())
            {
                continue;
            }
            tx.delete(&index, &key).map_err(CoreError::write_failed)?;
        }
        Ok(())
    }

    fn decode(&self, schema: &TypeSchema, key: &[u8], data: &[u8]) -> CoreResult<Box<dyn Storable>> {
        let mut record = schema.instance()?;
        record.deserialize(data)?;
        if record.id().is_none() {
            if let Ok(id) = Identifier::parse(&String::from_utf8_lossy(key)) {
                record.set_id(id);
            }
        }
        Ok(record)
    }

    /// Reads a record.
    ///
    /// # Errors
    ///
    /// - [`CoreError::TypeNotFound`] for an unknown type id
    /// - [`CoreError::BucketNotFound`] / [`CoreError::KeyNotFound`] if absent
    /// - [`CoreError::TypeNotCreated`] / [`CoreError::DeserializationFailed`]
    ///   if the record cannot be rebuilt
    pub fn get(&self, id: Identifier) -> CoreResult<Box<dyn Storable>> {
        let schema = self.registry.schema(id.type_id)?;
        let key = id.to_string();
        let data = self.read_raw(&schema, &key)?;

        debug!(%id, "get record");
        self.decode(&schema, key.as_bytes(), &data)
    }

    fn read_raw(&self, schema: &TypeSchema, key: &str) -> CoreResult<Vec<u8>> {
        let primary = schema.primary_bucket();
        self.engine.view(|tx| {
            let bucket = tx
                .bucket(&primary)
                .ok_or_else(|| CoreError::bucket_not_found(&primary))?;
            bucket
                .get(key.as_bytes())
                .map(<[u8]>::to_vec)
                .ok_or_else(|| CoreError::key_not_found(key))
        })
    }

    /// Reads a record as its concrete type.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Store::get), plus [`CoreError::TypeMismatch`].
    pub fn get_as<T: Storable>(&self, id: Identifier) -> CoreResult<T> {
        downcast(self.get(id)?)
    }

    /// Returns true if a record with this identifier is stored.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TypeNotFound`] for an unknown type id.
    pub fn exists(&self, id: Identifier) -> CoreResult<bool> {
        let schema = self.registry.schema(id.type_id)?;
        match self.read_raw(&schema, &id.to_string()) {
            Ok(_) => Ok(true),
            Err(err) if err.is_absent() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Reads every record of a type, in key order.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TypeNotFound`] for an unknown type id, or any
    /// decoding error.
    pub fn get_all(&self, type_id: i64) -> CoreResult<Vec<Box<dyn Storable>>> {
        let schema = self.registry.schema(type_id)?;
        self.scan(&schema)
    }

    /// Reads every record of a named type, in key order.
    ///
    /// # Errors
    ///
    /// Same as [`get_all`](Store::get_all).
    pub fn get_all_by_type_name(&self, type_name: &str) -> CoreResult<Vec<Box<dyn Storable>>> {
        let schema = self.registry.schema_by_name(type_name)?;
        self.scan(&schema)
    }

    /// Reads every record of a named type as its concrete type.
    ///
    /// # Errors
    ///
    /// Same as [`get_all`](Store::get_all), plus [`CoreError::TypeMismatch`].
    pub fn get_all_as<T: Storable>(&self, type_name: &str) -> CoreResult<Vec<T>> {
        self.get_all_by_type_name(type_name)?
            .into_iter()
            .map(downcast)
            .collect()
    }

    fn scan(&self, schema: &TypeSchema) -> CoreResult<Vec<Box<dyn Storable>>> {
        let primary = schema.primary_bucket();
        let rows: Vec<(Vec<u8>, Vec<u8>)> = self.engine.view(|tx| {
            Ok::<_, CoreError>(
                tx.bucket(&primary)
                    .map(|bucket| {
                        bucket
                            .cursor()
                            .map(|(key, value)| (key.to_vec(), value.to_vec()))
                            .collect()
                    })
                    .unwrap_or_default(),
            )
        })?;

        rows.iter()
            .map(|(key, data)| self.decode(schema, key, data))
            .collect()
    }

    /// Deletes a record and its index entries.
    ///
    /// Deleting a record that is not stored succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TypeNotFound`] for an unknown type id, or an
    /// engine error.
    pub fn delete(&self, id: Identifier) -> CoreResult<()> {
        let schema = self.registry.schema(id.type_id)?;
        let primary = schema.primary_bucket();
        let key = id.to_string();

        let deleted = self.engine.update(|tx| {
            if !tx.bucket_exists(&primary) {
                return Ok(false);
            }
            let Some(data) = tx.get(&primary, key.as_bytes()) else {
                return Ok(false);
            };

            let record = self.decode(&schema, key.as_bytes(), &data)?;
            tx.delete(&primary, key.as_bytes())
                .map_err(CoreError::write_failed)?;
            self.remove_index_entries(tx, &schema, id, record.as_ref())?;
            Ok::<_, CoreError>(true)
        })?;

        if deleted {
            debug!(%id, "deleted record");
        } else {
            debug!(%id, "delete of absent record ignored");
        }
        Ok(())
    }

    /// Deletes the stored version of `record`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IdentifierIsNil`] if the record has no id,
    /// otherwise the same as [`delete`](Store::delete).
    pub fn delete_record(&self, record: &dyn Storable) -> CoreResult<()> {
        let id = record.id().ok_or(CoreError::IdentifierIsNil)?;
        self.delete(id)
    }

    /// Lists the `(key, id)` pairs of an index bucket in key order.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TypeNotFound`] for an unknown type or
    /// [`CoreError::MalformedIdentifier`] if an entry is corrupted.
    pub fn index_entries(&self, type_name: &str, property: &str) -> CoreResult<Vec<(Vec<u8>, Identifier)>> {
        let index = self.registry.schema_by_name(type_name)?.index_bucket(property);
        self.engine.view(|tx| {
            let Some(bucket) = tx.bucket(&index) else {
                return Ok(Vec::new());
            };
            bucket
                .cursor()
                .map(|(key, value)| -> CoreResult<(Vec<u8>, Identifier)> {
                    let id = Identifier::parse(&String::from_utf8_lossy(value))?;
                    Ok((key.to_vec(), id))
                })
                .collect()
        })
    }

    /// Clears every index bucket of a type and re-derives the entries from
    /// the stored records. Returns the number of records indexed.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UniqueIndexViolation`] if stored records
    /// collide on a unique index; nothing changes in that case.
    pub fn rebuild_indexes(&self, type_name: &str) -> CoreResult<usize> {
        let schema = self.registry.schema_by_name(type_name)?;
        let primary = schema.primary_bucket();

        let count = self.engine.update(|tx| {
            for definition in schema.indexes() {
                let index = schema.index_bucket(&definition.property_name);
                tx.create_bucket_if_not_exists(&index)
                    .map_err(|e| CoreError::bucket_create_failed(&index, e))?;
                tx.clear_bucket(&index).map_err(CoreError::write_failed)?;
            }

            let rows = tx.scan(&primary);
            for (key, data) in &rows {
                let record = self.decode(&schema, key, data)?;
                let id = record.id().ok_or_else(|| CoreError::RecordHasNoIdentifier {
                    type_name: schema.type_name().to_owned(),
                })?;
                self.add_index_entries(tx, &schema, id, record.as_ref())?;
            }
            Ok::<_, CoreError>(rows.len())
        })?;

        info!(type_name, records = count, "rebuilt indexes");
        Ok(count)
    }

    /// Exact-match lookup through an index. Not implemented.
    ///
    /// # Errors
    ///
    /// Always returns [`CoreError::NotImplemented`].
    pub fn match_index(&self, _index_name: &str, _value: &IndexValue) -> CoreResult<Vec<Identifier>> {
        Err(CoreError::NotImplemented {
            operation: "match_index",
        })
    }

    /// Pattern lookup through an index. Not implemented.
    ///
    /// # Errors
    ///
    /// Always returns [`CoreError::NotImplemented`].
    pub fn wildcard_match(&self, _index_name: &str, _pattern: &str) -> CoreResult<Vec<Identifier>> {
        Err(CoreError::NotImplemented {
            operation: "wildcard_match",
        })
    }

    /// Flushes and syncs the commit log.
    ///
    /// # Errors
    ///
    /// Returns an engine error if the sync fails.
    pub fn sync(&self) -> CoreResult<()> {
        Ok(self.engine.sync()?)
    }

    /// Syncs and closes the store.
    ///
    /// The engine file stays locked while the registry still holds it.
    ///
    /// # Errors
    ///
    /// Returns an engine error if the final sync fails.
    pub fn close(self) -> CoreResult<()> {
        self.sync()
    }
}

/// Extracts and encodes one indexed property, or `None` with a warning if
/// the value is missing, of the wrong type, or out of range.
fn encode_property(schema: &TypeSchema, definition: &IndexDefinition, record: &dyn Storable) -> Option<Vec<u8>> {
    let property = definition.property_name.as_str();
    let Some(value) = schema.index_value(record, property) else {
        warn!(type_name = schema.type_name(), property, "indexed property has no value; skipped");
        return None;
    };
    if value.data_type() != definition.data_type {
        warn!(
            type_name = schema.type_name(),
            property,
            expected = %definition.data_type,
            actual = %value.data_type(),
            "indexed property has the wrong type; skipped"
        );
        return None;
    }
    let encoded = codec::encode_value(&value);
    if encoded.is_none() {
        warn!(type_name = schema.type_name(), property, "indexed value out of range; skipped");
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamic::{DynamicObject, DYNAMIC_OBJECT_TYPE_NAME};
    use crate::index::DataType;
    use tempfile::tempdir;

    fn registry() -> Arc<Registry> {
        let registry = Arc::new(Registry::new());
        registry.register_type::<DynamicObject>().unwrap();
        registry
            .declare_index(DYNAMIC_OBJECT_TYPE_NAME, IndexDefinition::unique("email", DataType::String))
            .unwrap();
        registry
            .declare_index(DYNAMIC_OBJECT_TYPE_NAME, IndexDefinition::non_unique("age", DataType::Int64))
            .unwrap();
        registry
    }

    fn store() -> Store {
        Store::open(&StoreConfig::in_memory(), registry()).unwrap()
    }

    fn person(store: &Store, email: &str, age: i64) -> DynamicObject {
        let mut person = DynamicObject::new("Person");
        person.set_property("email", email);
        person.set_property("age", age);
        store.allocate_id(&mut person).unwrap();
        person
    }

    fn index_ids(store: &Store, property: &str) -> Vec<Identifier> {
        store
            .index_entries(DYNAMIC_OBJECT_TYPE_NAME, property)
            .unwrap()
            .into_iter()
            .map(|(_, id)| id)
            .collect()
    }

    #[test]
    fn put_then_get() {
        let store = store();
        let ada = person(&store, "ada@example.com", 36);
        store.put(&ada).unwrap();

        let loaded: DynamicObject = store.get_as(ada.id.unwrap()).unwrap();
        assert_eq!(loaded, ada);
        assert!(store.exists(ada.id.unwrap()).unwrap());
    }

    #[test]
    fn put_without_id_fails() {
        let store = store();
        let object = DynamicObject::new("Person");
        assert!(matches!(store.put(&object), Err(CoreError::RecordHasNoIdentifier { .. })));
    }

    #[test]
    fn get_reports_absence() {
        let store = store();
        let id = Identifier::new(1001, 1);
        assert!(matches!(store.get(id), Err(CoreError::BucketNotFound { .. })));
        assert!(!store.exists(id).unwrap());

        store.put(&person(&store, "a@example.com", 1)).unwrap();
        assert!(matches!(store.get(Identifier::new(1001, 99)), Err(CoreError::KeyNotFound { .. })));
        assert!(matches!(store.get(Identifier::new(4242, 1)), Err(CoreError::TypeNotFound { .. })));
    }

    #[test]
    fn exists_swallows_only_absence() {
        let store = store();
        let stored = person(&store, "a@example.com", 1);
        store.put(&stored).unwrap();

        assert!(store.exists(stored.id.unwrap()).unwrap());
        assert!(!store.exists(Identifier::new(1001, 99)).unwrap());
        assert!(matches!(store.exists(Identifier::new(4242, 1)), Err(CoreError::TypeNotFound { .. })));
    }

    #[test]
    fn unique_violation_writes_nothing() {
        let store = store();
        let first = person(&store, "same@example.com", 20);
        let second = person(&store, "same@example.com", 30);
        store.put(&first).unwrap();

        let err = store.put(&second).unwrap_err();
        assert!(matches!(err, CoreError::UniqueIndexViolation { .. }));
        assert!(!store.exists(second.id.unwrap()).unwrap());
        assert_eq!(index_ids(&store, "age"), vec![first.id.unwrap()]);
    }

    #[test]
    fn put_all_is_atomic() {
        let store = store();
        let first = person(&store, "a@example.com", 1);
        store.put(&first).unwrap();

        let fresh = person(&store, "b@example.com", 2);
        let clash = person(&store, "a@example.com", 3);
        assert!(store.put_all(&[&fresh, &clash]).is_err());
        assert!(!store.exists(fresh.id.unwrap()).unwrap());

        store.put_all(&[&fresh]).unwrap();
        assert_eq!(store.get_all(1001).unwrap().len(), 2);
    }

    #[test]
    fn update_frees_old_unique_value() {
        let store = store();
        let mut first = person(&store, "old@example.com", 1);
        store.put(&first).unwrap();

        first.set_property("email", "new@example.com");
        store.put(&first).unwrap();

        let second = person(&store, "old@example.com", 2);
        store.put(&second).unwrap();

        let entries = store.index_entries(DYNAMIC_OBJECT_TYPE_NAME, "email").unwrap();
        assert_eq!(
            entries,
            vec![
                (b"new@example.com".to_vec(), first.id.unwrap()),
                (b"old@example.com".to_vec(), second.id.unwrap()),
            ]
        );
    }

    #[test]
    fn rewriting_same_record_keeps_one_entry() {
        let store = store();
        let ada = person(&store, "ada@example.com", 36);
        store.put(&ada).unwrap();
        store.put(&ada).unwrap();

        assert_eq!(index_ids(&store, "email"), vec![ada.id.unwrap()]);
        assert_eq!(index_ids(&store, "age"), vec![ada.id.unwrap()]);
    }

    #[test]
    fn non_unique_index_orders_by_value() {
        let store = store();
        let old = person(&store, "old@example.com", 70);
        let young = person(&store, "young@example.com", -5);
        let mid = person(&store, "mid@example.com", 12);
        let twin = person(&store, "twin@example.com", 12);
        store.put_all(&[&old, &young, &mid, &twin]).unwrap();

        assert_eq!(
            index_ids(&store, "age"),
            vec![young.id.unwrap(), mid.id.unwrap(), twin.id.unwrap(), old.id.unwrap()]
        );
    }

    #[test]
    fn wrongly_typed_value_is_skipped() {
        let store = store();
        let mut odd = person(&store, "odd@example.com", 0);
        odd.set_property("age", "unknown");
        store.put(&odd).unwrap();

        assert!(index_ids(&store, "age").is_empty());
        assert_eq!(index_ids(&store, "email"), vec![odd.id.unwrap()]);
    }

    #[test]
    fn delete_removes_record_and_entries() {
        let store = store();
        let ada = person(&store, "ada@example.com", 36);
        let bob = person(&store, "bob@example.com", 36);
        store.put_all(&[&ada, &bob]).unwrap();

        store.delete(ada.id.unwrap()).unwrap();

        assert!(!store.exists(ada.id.unwrap()).unwrap());
        assert_eq!(index_ids(&store, "email"), vec![bob.id.unwrap()]);
        assert_eq!(index_ids(&store, "age"), vec![bob.id.unwrap()]);
    }

    #[test]
    fn delete_is_idempotent() {
        let store = store();
        let ada = person(&store, "ada@example.com", 36);
        store.delete(ada.id.unwrap()).unwrap();

        store.put(&ada).unwrap();
        store.delete_record(&ada).unwrap();
        store.delete_record(&ada).unwrap();
        assert!(!store.exists(ada.id.unwrap()).unwrap());
    }

    #[test]
    fn delete_record_without_id_fails() {
        let store = store();
        let object = DynamicObject::new("Person");
        assert!(matches!(store.delete_record(&object), Err(CoreError::IdentifierIsNil)));
    }

    #[test]
    fn rebuild_picks_up_new_index() {
        let store = store();
        for (email, city) in [("a@x", "Oslo"), ("b@x", "Lima"), ("c@x", "Oslo")] {
            let mut p = person(&store, email, 1);
            p.set_property("city", city);
            store.put(&p).unwrap();
        }

        store
            .registry()
            .declare_index(DYNAMIC_OBJECT_TYPE_NAME, IndexDefinition::non_unique("city", DataType::String))
            .unwrap();
        assert_eq!(store.rebuild_indexes(DYNAMIC_OBJECT_TYPE_NAME).unwrap(), 3);

        let keys: Vec<_> = store
            .index_entries(DYNAMIC_OBJECT_TYPE_NAME, "city")
            .unwrap()
            .into_iter()
            .map(|(key, _)| key)
            .collect();
        assert_eq!(keys.len(), 3);
        assert!(keys[0].starts_with(b"Lima\x00"));
        assert!(keys[2].starts_with(b"Oslo\x00"));
    }

    #[test]
    fn lookups_are_not_implemented() {
        let store = store();
        assert!(matches!(
            store.match_index("Index.DynamicObject.email", &IndexValue::from("a")),
            Err(CoreError::NotImplemented { .. })
        ));
        assert!(matches!(
            store.wildcard_match("Index.DynamicObject.email", "a*"),
            Err(CoreError::NotImplemented { .. })
        ));
    }

    #[test]
    fn get_all_by_type_name_returns_every_record() {
        let store = store();
        assert!(store.get_all_by_type_name(DYNAMIC_OBJECT_TYPE_NAME).unwrap().is_empty());

        store.put(&person(&store, "a@x", 1)).unwrap();
        store.put(&person(&store, "b@x", 2)).unwrap();

        let all: Vec<DynamicObject> = store.get_all_as(DYNAMIC_OBJECT_TYPE_NAME).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn meta_records_are_readable() {
        let store = store();
        let info = store.get(crate::registry::REGISTRY_INFO_ID).unwrap();
        assert_eq!(info.type_name(), "RegistryInfo");
        assert_eq!(store.get_all(2).unwrap().len(), 1);
    }

    #[test]
    fn allocate_bucket_is_idempotent() {
        let store = store();
        store.allocate_bucket_if_needed("Scratch").unwrap();
        store.allocate_bucket_if_needed("Scratch").unwrap();
        assert!(store.engine().bucket_names().contains(&b"Type.Scratch".to_vec()));
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("people.stow");

        let id = {
            let store = Store::open(&StoreConfig::at(&path), registry()).unwrap();
            let ada = person(&store, "ada@example.com", 36);
            store.put(&ada).unwrap();
            store.close().unwrap();
            ada.id.unwrap()
        };

        let store = Store::open(&StoreConfig::at(&path), registry()).unwrap();
        let ada: DynamicObject = store.get_as(id).unwrap();
        assert_eq!(ada.property("email"), Some(&serde_json::Value::from("ada@example.com")));

        let next = person(&store, "bob@example.com", 1);
        assert_eq!(next.id.unwrap(), Identifier::new(1001, 2));
    }

    #[test]
    fn missing_file_without_create_is_rejected() {
        let dir = tempdir().unwrap();
        let config = StoreConfig::at(dir.path().join("absent.stow")).create_if_missing(false);
        assert!(matches!(
            Store::open(&config, registry()),
            Err(CoreError::InvalidConfig { .. })
        ));
    }
}
