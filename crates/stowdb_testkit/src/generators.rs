//! Property-based test generators using proptest.

use crate::models::{Event, Order, Widget};
use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;
use stowdb_core::{Identifier, IndexValue};

/// Last second of year 9999.
const MAX_INDEXABLE_SECS: i64 = 253_402_300_799;

/// Strategy for identifiers with non-negative components.
pub fn identifier_strategy() -> impl Strategy<Value = Identifier> {
    (0i64.., 0i64..).prop_map(|(type_id, object_id)| Identifier::new(type_id, object_id))
}

/// Strategy for SKU strings.
pub fn sku_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z]{1,3}-[0-9]{1,5}").expect("Invalid regex")
}

/// Strategy for finite floats of either sign, zeros included.
pub fn finite_f64_strategy() -> impl Strategy<Value = f64> {
    prop::num::f64::NORMAL | prop::num::f64::SUBNORMAL | prop::num::f64::ZERO
}

/// Strategy for timestamps in the indexable range.
pub fn datetime_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..=MAX_INDEXABLE_SECS, 0u32..1_000_000_000).prop_map(|(secs, nanos)| {
        Utc.timestamp_opt(secs, nanos).single().unwrap_or_default()
    })
}

/// Strategy for index values of every type.
pub fn index_value_strategy() -> impl Strategy<Value = IndexValue> {
    prop_oneof![
        ".{0,16}".prop_map(IndexValue::String),
        any::<i64>().prop_map(IndexValue::Int64),
        finite_f64_strategy().prop_map(IndexValue::Float64),
        any::<bool>().prop_map(IndexValue::Bool),
        datetime_strategy().prop_map(IndexValue::DateTime),
    ]
}

/// Strategy for unsaved widgets.
pub fn widget_strategy() -> impl Strategy<Value = Widget> {
    (sku_strategy(), "[a-z]{1,12}", 0.0f64..10_000.0)
        .prop_map(|(sku, name, price)| Widget::new(sku, name, price))
}

/// Strategy for unsaved orders.
pub fn order_strategy() -> impl Strategy<Value = Order> {
    ("[a-z]{1,8}", finite_f64_strategy()).prop_map(|(customer, total)| Order::new(customer, total))
}

/// Strategy for unsaved events.
pub fn event_strategy() -> impl Strategy<Value = Event> {
    (
        "[a-z ]{1,16}",
        prop::option::of(datetime_strategy()),
        any::<i64>(),
        any::<bool>(),
    )
        .prop_map(|(title, at, priority, urgent)| Event::new(title, at, priority, urgent))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stowdb_core::index::codec;

    proptest! {
        #[test]
        fn identifiers_round_trip(id in identifier_strategy()) {
            prop_assert_eq!(Identifier::parse(&id.to_string()).unwrap(), id);
        }

        #[test]
        fn generated_values_are_encodable(value in index_value_strategy()) {
            prop_assert!(codec::encode_value(&value).is_some());
        }

        #[test]
        fn skus_match_pattern(sku in sku_strategy()) {
            prop_assert!(sku.contains('-'));
        }
    }
}
