//! Test fixtures and store helpers.
//!
//! Provides stores preloaded with the sample [`models`](crate::models),
//! in memory or in a temporary directory.

use crate::models::register_models;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stowdb_core::{Registry, Store, StoreConfig};
use tempfile::TempDir;

/// A test store with automatic cleanup.
pub struct TestStore {
    /// The store instance.
    pub store: Store,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: Option<TempDir>,
}

/// Creates a registry with the sample models registered.
pub fn model_registry() -> Arc<Registry> {
    let registry = Arc::new(Registry::new());
    register_models(&registry).expect("Failed to register models");
    registry
}

impl TestStore {
    /// Creates an in-memory store with the sample models.
    pub fn memory() -> Self {
        Self {
            store: Store::open(&StoreConfig::in_memory(), model_registry())
                .expect("Failed to open in-memory store"),
            temp_dir: None,
        }
    }

    /// Creates a file-backed store with the sample models.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = Self::open_at(&temp_dir.path().join("test.stow"));
        Self {
            store,
            temp_dir: Some(temp_dir),
        }
    }

    fn open_at(path: &Path) -> Store {
        let config = StoreConfig::at(path).sync_on_commit(false);
        Store::open(&config, model_registry()).expect("Failed to open file store")
    }

    /// Returns the store file if file-based, None if in-memory.
    pub fn path(&self) -> Option<PathBuf> {
        self.temp_dir.as_ref().map(|d| d.path().join("test.stow"))
    }

    /// Closes and reopens a file-based store with a fresh registry.
    ///
    /// # Panics
    ///
    /// Panics for in-memory stores, which do not survive closing.
    pub fn reopen(self) -> Self {
        let path = self.path().expect("Only file stores can be reopened");
        let temp_dir = self.temp_dir;
        self.store.close().expect("Failed to close store");
        Self {
            store: Self::open_at(&path),
            temp_dir,
        }
    }
}

impl std::ops::Deref for TestStore {
    type Target = Store;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Runs a test with a temporary in-memory store.
///
/// # Example
///
/// ```rust
/// use stowdb_testkit::{with_temp_store, Widget};
///
/// with_temp_store(|store| {
///     let mut widget = Widget::new("W-1", "Sprocket", 2.5);
///     store.allocate_id(&mut widget).unwrap();
///     store.put(&widget).unwrap();
/// });
/// ```
pub fn with_temp_store<F, R>(f: F) -> R
where
    F: FnOnce(&Store) -> R,
{
    let store = TestStore::memory();
    f(&store)
}

/// Runs a test with a temporary file-backed store.
pub fn with_file_store<F, R>(f: F) -> R
where
    F: FnOnce(&Store) -> R,
{
    let store = TestStore::file();
    f(&store)
}


