//! # StowDB Core
//!
//! A typed object store with order-preserving secondary indexes, built on
//! the [`stowdb_storage`] bucket engine.
//!
//! This crate provides:
//! - [`Identifier`]: `(type id, object id)` record identifiers
//! - [`Registry`]: type registration, id allocation, index declarations
//! - [`Store`]: CRUD that keeps index buckets consistent with records
//! - [`index::codec`]: byte encodings whose order matches value order
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use stowdb_core::{
//!     DataType, DynamicObject, IndexDefinition, Registry, Store, StoreConfig,
//!     DYNAMIC_OBJECT_TYPE_NAME,
//! };
//!
//! let registry = Arc::new(Registry::new());
//! registry.register_type::<DynamicObject>().unwrap();
//! registry
//!     .declare_index(DYNAMIC_OBJECT_TYPE_NAME, IndexDefinition::unique("email", DataType::String))
//!     .unwrap();
//!
//! let store = Store::open(&StoreConfig::in_memory(), registry).unwrap();
//!
//! let mut person = DynamicObject::new("Person");
//! person.set_property("email", "ada@example.com");
//! let id = store.allocate_id(&mut person).unwrap();
//! store.put(&person).unwrap();
//!
//! let loaded: DynamicObject = store.get_as(id).unwrap();
//! assert_eq!(loaded, person);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod bucket;
mod config;
mod dynamic;
mod error;
pub mod format;
mod id;
pub mod index;
mod registry;
mod storable;
mod store;

pub use config::StoreConfig;
pub use dynamic::{DynamicObject, DYNAMIC_OBJECT_TYPE_NAME};
pub use error::{CoreError, CoreResult};
pub use id::Identifier;
pub use index::{DataType, IndexAccessors, IndexDefinition, IndexType, IndexValue};
pub use registry::{
    is_reserved_name, Registry, RegistryInfo, RegistryItem, TypeFactory, TypeSchema,
    FIRST_ALLOCATED_ID, REGISTRY_INFO_ID, REGISTRY_INFO_OBJECT_ID, REGISTRY_INFO_TYPE_ID,
    REGISTRY_INFO_TYPE_NAME, REGISTRY_ITEM_TYPE_ID, REGISTRY_ITEM_TYPE_NAME,
};
pub use storable::{downcast, AsAny, Indexable, Storable};
pub use store::Store;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
