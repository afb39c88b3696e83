//! # StowDB Storage
//!
//! The ordered, transactional bucket engine underneath StowDB.
//!
//! Keys and values are opaque bytes grouped into named buckets. Within a
//! bucket, keys iterate in ascending lexicographic byte order. Every write
//! transaction is all-or-nothing and becomes a single checksummed record in
//! a commit log kept by a [`StorageBackend`].
//!
//! ## Layers
//!
//! - [`StorageBackend`]: an append-only byte store ([`MemoryBackend`],
//!   [`FileBackend`])
//! - commit log framing (`log` module, private)
//! - [`Engine`]: in-memory bucket maps rebuilt from the log on open,
//!   with [`Engine::view`] and [`Engine::update`] transactions
//!
//! ## Example
//!
//! ```rust
//! use stowdb_storage::{Engine, StorageError};
//!
//! let engine = Engine::in_memory();
//! engine
//!     .update(|tx| {
//!         tx.create_bucket_if_not_exists(b"users")?;
//!         tx.put(b"users", b"1", b"alice")
//!     })
//!     .unwrap();
//!
//! let name = engine
//!     .view(|tx| {
//!         let users = tx.bucket(b"users").ok_or(StorageError::InvalidBucketName)?;
//!         Ok::<_, StorageError>(users.get(b"1").map(<[u8]>::to_vec))
//!     })
//!     .unwrap();
//! assert_eq!(name.as_deref(), Some(&b"alice"[..]));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod engine;
mod error;
mod file;
mod log;
mod memory;
mod txn;

pub use backend::StorageBackend;
pub use engine::{Engine, EngineOptions};
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use log::{LOG_MAGIC, LOG_VERSION};
pub use memory::MemoryBackend;
pub use txn::{Bucket, Cursor, ReadTxn, WriteTxn};
