//! Registry command implementation.

use serde::Serialize;
use stowdb_core::bucket::primary;
use stowdb_core::{
    format, CoreResult, RegistryInfo, RegistryItem, REGISTRY_INFO_ID, REGISTRY_INFO_TYPE_NAME,
    REGISTRY_ITEM_TYPE_NAME,
};
use stowdb_storage::{Engine, StorageError};

/// Persisted registry contents.
#[derive(Debug, Serialize)]
pub struct RegistryDump {
    /// Global counters, absent in a store that was never opened by a registry.
    pub info: Option<RegistryInfo>,
    /// Registered types ordered by type id.
    pub items: Vec<RegistryItem>,
}

/// Runs the registry command.
pub fn run(engine: &Engine, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let dump = collect(engine)?;
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&dump)?);
        }
        _ => print_text_output(&dump),
    }
    Ok(())
}

/// Reads the registry meta-records straight from their buckets.
pub fn collect(engine: &Engine) -> CoreResult<RegistryDump> {
    let info_key = REGISTRY_INFO_ID.to_string();
    let (info, items) = engine.view(|tx| {
        let info = tx
            .bucket(&primary(REGISTRY_INFO_TYPE_NAME))
            .and_then(|b| b.get(info_key.as_bytes()))
            .map(<[u8]>::to_vec);
        let items: Vec<Vec<u8>> = tx
            .bucket(&primary(REGISTRY_ITEM_TYPE_NAME))
            .map(|b| b.cursor().map(|(_, value)| value.to_vec()).collect())
            .unwrap_or_default();
        Ok::<_, StorageError>((info, items))
    })?;

    let info = info.map(|data| format::from_json::<RegistryInfo>(&data)).transpose()?;
    let mut items = items
        .iter()
        .map(|data| format::from_json::<RegistryItem>(data))
        .collect::<CoreResult<Vec<_>>>()?;
    items.sort_by_key(|item| item.type_id);

    Ok(RegistryDump { info, items })
}

fn print_text_output(dump: &RegistryDump) {
    match &dump.info {
        Some(info) => println!(
            "Next type id: {}  Next item id: {}",
            info.next_type_id, info.next_object_id
        ),
        None => println!("Registry not initialized"),
    }
    println!();

    for item in &dump.items {
        let id = item.id.map_or_else(|| "-".to_string(), |id| id.to_string());
        println!(
            "{:>6}  {:<24}  next object {:<8}  item {}",
            item.type_id, item.type_name, item.next_object_id, id
        );
        for index in &item.indexes {
            println!(
                "        index {} ({}, {})",
                index.property_name, index.index_type, index.data_type
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stowdb_storage::Engine;
    use stowdb_testkit::{TestStore, Widget};

    #[test]
    fn empty_engine_has_no_registry() {
        let dump = collect(&Engine::in_memory()).unwrap();
        assert!(dump.info.is_none());
        assert!(dump.items.is_empty());
    }

    #[test]
    fn reads_types_in_id_order() {
        let store = TestStore::memory();
        let mut widget = Widget::new("W-1", "Sprocket", 2.5);
        store.allocate_id(&mut widget).unwrap();

        let dump = collect(store.engine()).unwrap();
        assert_eq!(dump.info.unwrap().next_type_id, 1004);

        let names: Vec<_> = dump.items.iter().map(|i| i.type_name.as_str()).collect();
        assert_eq!(names, ["Widget", "Order", "Event"]);
        assert_eq!(dump.items[0].next_object_id, 2);
        assert_eq!(dump.items[0].indexes[0].property_name, "Sku");
    }
}
