//! Cross-crate integration test helpers.
//!
//! [`IndexHarness`] mirrors every successful write in a plain in-memory
//! model and checks that the store's records and index buckets agree
//! with it.

use crate::fixtures::TestStore;
use crate::models::{Order, Widget};
use std::collections::BTreeMap;
use stowdb_core::index::codec;
use stowdb_core::{CoreResult, Identifier};

/// A test harness that tracks expected records and index contents.
pub struct IndexHarness {
    /// The store under test.
    pub store: TestStore,
    widgets: BTreeMap<Identifier, Widget>,
    orders: BTreeMap<Identifier, Order>,
}

impl IndexHarness {
    /// Creates a harness over an in-memory store.
    pub fn new() -> Self {
        Self::with_store(TestStore::memory())
    }

    /// Creates a harness over the given store.
    pub fn with_store(store: TestStore) -> Self {
        Self {
            store,
            widgets: BTreeMap::new(),
            orders: BTreeMap::new(),
        }
    }

    /// Writes a widget, allocating an id if needed, and tracks it on success.
    pub fn put_widget(&mut self, mut widget: Widget) -> CoreResult<Identifier> {
        let id = match widget.id {
            Some(id) => id,
            None => self.store.allocate_id(&mut widget)?,
        };
        self.store.put(&widget)?;
        self.widgets.insert(id, widget);
        Ok(id)
    }

    /// Writes an order, allocating an id if needed, and tracks it on success.
    pub fn put_order(&mut self, mut order: Order) -> CoreResult<Identifier> {
        let id = match order.id {
            Some(id) => id,
            None => self.store.allocate_id(&mut order)?,
        };
        self.store.put(&order)?;
        self.orders.insert(id, order);
        Ok(id)
    }

    /// Deletes a record of either type and stops tracking it.
    pub fn delete(&mut self, id: Identifier) {
        self.store.delete(id).expect("Failed to delete record");
        self.widgets.remove(&id);
        self.orders.remove(&id);
    }

    /// Tracked widget by id.
    pub fn widget(&self, id: Identifier) -> Option<&Widget> {
        self.widgets.get(&id)
    }

    /// Identifiers of all tracked widgets.
    pub fn widget_ids(&self) -> Vec<Identifier> {
        self.widgets.keys().copied().collect()
    }

    /// Returns the count of tracked records.
    pub fn tracked_count(&self) -> usize {
        self.widgets.len() + self.orders.len()
    }

    /// Asserts that records and index buckets match the tracked model.
    pub fn verify_all(&self) {
        for (id, expected) in &self.widgets {
            let actual: Widget = self.store.get_as(*id).expect("Failed to get widget");
            assert_eq!(&actual, expected, "Widget mismatch for {id}");
        }
        for (id, expected) in &self.orders {
            let actual: Order = self.store.get_as(*id).expect("Failed to get order");
            assert_eq!(&actual, expected, "Order mismatch for {id}");
        }

        let stored_widgets = self
            .store
            .get_all_by_type_name(Widget::TYPE_NAME)
            .expect("Failed to scan widgets");
        assert_eq!(stored_widgets.len(), self.widgets.len(), "Widget count mismatch");

        let mut expected_skus: Vec<(Vec<u8>, Identifier)> = self
            .widgets
            .iter()
            .map(|(id, w)| (w.sku.as_bytes().to_vec(), *id))
            .collect();
        expected_skus.sort();
        let actual_skus = self
            .store
            .index_entries(Widget::TYPE_NAME, "Sku")
            .expect("Failed to read Sku index");
        assert_eq!(actual_skus, expected_skus, "Sku index mismatch");

        let mut expected_totals: Vec<(Vec<u8>, Identifier)> = self
            .orders
            .iter()
            .map(|(id, o)| {
                let encoded = codec::encode_f64(o.total);
                let key = codec::index_key(stowdb_core::IndexType::NonUnique, &encoded, id);
                (key, *id)
            })
            .collect();
        expected_totals.sort();
        let actual_totals = self
            .store
            .index_entries(Order::TYPE_NAME, "Total")
            .expect("Failed to read Total index");
        assert_eq!(actual_totals, expected_totals, "Total index mismatch");
    }
}

impl Default for IndexHarness {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{model_registry, TestStore};
    use crate::generators::{order_strategy, sku_strategy, widget_strategy};
    use crate::models::{register_models, Event};
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use std::sync::Arc;
    use stowdb_core::bucket::primary;
    use stowdb_core::{
        CoreError, Registry, Storable, Store, StoreConfig, REGISTRY_ITEM_TYPE_ID,
        REGISTRY_ITEM_TYPE_NAME,
    };
    use stowdb_storage::StorageError;

    #[test]
    fn widget_sku_is_unique() {
        let mut harness = IndexHarness::new();
        harness.put_widget(Widget::new("W-1", "Sprocket", 1.0)).unwrap();

        let err = harness
            .put_widget(Widget::new("W-1", "Imposter", 2.0))
            .unwrap_err();
        assert!(matches!(err, CoreError::UniqueIndexViolation { .. }));
        assert_eq!(harness.tracked_count(), 1);
        harness.verify_all();
    }

    #[test]
    fn changing_sku_frees_old_value() {
        let mut harness = IndexHarness::new();
        let id = harness.put_widget(Widget::new("W-1", "Sprocket", 1.0)).unwrap();

        let mut renamed = harness.widget(id).cloned().unwrap();
        renamed.sku = "W-2".into();
        harness.put_widget(renamed).unwrap();
        harness.put_widget(Widget::new("W-1", "Cog", 3.0)).unwrap();

        harness.verify_all();
    }

    #[test]
    fn orders_scan_in_total_order() {
        let mut harness = IndexHarness::new();
        let totals = [12.5, -3.0, 0.0, -0.0, 7.25, 12.5];
        for total in totals {
            harness.put_order(Order::new("ann", total)).unwrap();
        }
        harness.verify_all();

        let ordered: Vec<f64> = harness
            .store
            .index_entries(Order::TYPE_NAME, "Total")
            .unwrap()
            .into_iter()
            .map(|(_, id)| harness.store.get_as::<Order>(id).unwrap().total)
            .collect();
        assert_eq!(ordered.len(), totals.len());
        assert!(ordered.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(ordered[0], -3.0);
        assert!(ordered[1].is_sign_negative());
        assert!(ordered[2].is_sign_positive());
    }

    #[test]
    fn delete_removes_index_entries() {
        let mut harness = IndexHarness::new();
        let keep = harness.put_widget(Widget::new("A-1", "Keep", 1.0)).unwrap();
        let drop = harness.put_widget(Widget::new("B-1", "Drop", 1.0)).unwrap();
        let order = harness.put_order(Order::new("bo", 9.0)).unwrap();

        harness.delete(drop);
        harness.delete(order);
        harness.delete(order);
        harness.verify_all();

        assert!(harness.store.exists(keep).unwrap());
        assert!(!harness.store.exists(drop).unwrap());
    }

    #[test]
    fn event_indexes_cover_datetime_bool_and_fallback() {
        let store = TestStore::memory();
        let early = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 1, 1, 17, 30, 0).unwrap();

        let mut events = vec![
            Event::new("standup", Some(late), 2, false),
            Event::new("deploy", Some(early), -1, true),
            Event::new("someday", None, 5, false),
        ];
        for event in &mut events {
            store.allocate_id(event).unwrap();
        }
        let refs: Vec<&dyn Storable> = events.iter().map(|e| e as &dyn Storable).collect();
        store.put_all(&refs).unwrap();

        let at = store.index_entries(Event::TYPE_NAME, "At").unwrap();
        assert_eq!(at.len(), 2);
        assert!(at[0].0.starts_with(b"2024-01-01T09:00:00.000000000Z\x00"));
        assert_eq!(at[0].1, events[1].id.unwrap());

        let priority: Vec<_> = store
            .index_entries(Event::TYPE_NAME, "Priority")
            .unwrap()
            .into_iter()
            .map(|(_, id)| id)
            .collect();
        assert_eq!(
            priority,
            vec![events[1].id.unwrap(), events[0].id.unwrap(), events[2].id.unwrap()]
        );

        let urgent = store.index_entries(Event::TYPE_NAME, "Urgent").unwrap();
        assert_eq!(urgent.len(), 3);
        assert_eq!(urgent[2].1, events[1].id.unwrap());
    }

    #[test]
    fn duplicate_registration_keeps_single_type_id() {
        let registry = Registry::new();
        register_models(&registry).unwrap();
        assert!(matches!(
            registry.register_type::<Widget>(),
            Err(CoreError::DuplicateType { .. })
        ));

        let store = Store::open(&StoreConfig::in_memory(), Arc::new(registry)).unwrap();
        let widget_items = store
            .registry()
            .items()
            .into_iter()
            .filter(|item| item.type_name == Widget::TYPE_NAME)
            .count();
        assert_eq!(widget_items, 1);
    }

    #[test]
    fn allocated_ids_increase() {
        let store = TestStore::memory();
        let mut previous = None;
        for n in 0..20 {
            let mut widget = Widget::new(format!("W-{n}"), "w", 1.0);
            let id = store.allocate_id(&mut widget).unwrap();
            if let Some(prev) = previous {
                assert!(id > prev);
            }
            previous = Some(id);
        }
    }

    #[test]
    fn data_and_type_ids_survive_reopen() {
        let mut harness = IndexHarness::with_store(TestStore::file());
        harness.put_widget(Widget::new("W-1", "Sprocket", 1.0)).unwrap();
        harness.put_order(Order::new("ann", 4.5)).unwrap();
        let widget_type = harness.store.registry().type_id_for(Widget::TYPE_NAME).unwrap();

        let IndexHarness {
            store,
            widgets,
            orders,
        } = harness;
        let harness = IndexHarness {
            store: store.reopen(),
            widgets,
            orders,
        };

        assert_eq!(
            harness.store.registry().type_id_for(Widget::TYPE_NAME).unwrap(),
            widget_type
        );
        harness.verify_all();
    }

    #[test]
    fn registry_items_are_stored_as_json() {
        let store = TestStore::memory();
        let raw = store
            .engine()
            .view(|tx| {
                let bucket = tx
                    .bucket(&primary(REGISTRY_ITEM_TYPE_NAME))
                    .ok_or(StorageError::InvalidBucketName)?;
                Ok::<_, StorageError>(bucket.get(b"2-3e9").map(<[u8]>::to_vec))
            })
            .unwrap()
            .unwrap();

        let json: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(json["typeName"], "Widget");
        assert_eq!(json["typeId"], 1001);
        assert_eq!(json["id"]["type_id"], REGISTRY_ITEM_TYPE_ID);
        assert_eq!(json["indexes"][0]["propertyName"], "Sku");
        assert_eq!(json["indexes"][0]["type"], "Unique");
    }

    #[test]
    fn shared_registry_serves_two_types() {
        let store = Store::open(&StoreConfig::in_memory(), model_registry()).unwrap();
        assert_eq!(store.registry().type_name_for(1002).unwrap(), Order::TYPE_NAME);
        assert_eq!(store.registry().type_name_for(1003).unwrap(), Event::TYPE_NAME);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Insert(Widget),
        Resku(usize, String),
        Delete(usize),
        Order(Order),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            widget_strategy().prop_map(Op::Insert),
            (any::<usize>(), sku_strategy()).prop_map(|(i, sku)| Op::Resku(i, sku)),
            any::<usize>().prop_map(Op::Delete),
            order_strategy().prop_map(Op::Order),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn indexes_track_random_operations(ops in prop::collection::vec(op_strategy(), 1..40)) {
            let mut harness = IndexHarness::new();
            for op in ops {
                match op {
                    Op::Insert(widget) => {
                        let _ = harness.put_widget(widget);
                    }
                    Op::Resku(i, sku) => {
                        let ids = harness.widget_ids();
                        if !ids.is_empty() {
                            let mut widget = harness.widget(ids[i % ids.len()]).cloned().unwrap();
                            widget.sku = sku;
                            let _ = harness.put_widget(widget);
                        }
                    }
                    Op::Delete(i) => {
                        let ids = harness.widget_ids();
                        if !ids.is_empty() {
                            harness.delete(ids[i % ids.len()]);
                        }
                    }
                    Op::Order(order) => {
                        harness.put_order(order).unwrap();
                    }
                }
            }
            harness.verify_all();
        }
    }
}
