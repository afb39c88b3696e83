//! The bucket engine.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use crate::file::FileBackend;
use crate::log::{self, Mutation};
use crate::memory::MemoryBackend;
use crate::txn::{ReadTxn, WriteTxn};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, error, warn};

/// Ordered contents of one bucket.
pub(crate) type BucketMap = BTreeMap<Vec<u8>, Vec<u8>>;

/// All buckets, ordered by name.
pub(crate) type Buckets = BTreeMap<Vec<u8>, BucketMap>;

/// Options for opening an [`Engine`].
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Whether to `sync` the commit log after every commit.
    pub sync_on_commit: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            sync_on_commit: true,
        }
    }
}

impl EngineOptions {
    /// Creates default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether each commit is synced to durable storage.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }
}

/// An ordered byte-key store with named buckets and atomic transactions.
///
/// The whole data set lives in memory; durability comes from the commit
/// log, which is replayed on open.
///
/// ## Concurrency
///
/// - One write transaction at a time (`update` holds the writer lock).
/// - Any number of read transactions; each sees a consistent snapshot
///   because commits are applied under the exclusive state lock.
/// - A read transaction must not start a write transaction on the same
///   engine from inside its closure.
///
/// If a failed commit leaves a partial record that cannot be cut off, the
/// engine refuses every later write and stays readable.
pub struct Engine {
    pub(crate) state: RwLock<Buckets>,
    log: Mutex<Box<dyn StorageBackend>>,
    writer: Mutex<()>,
    /// Offset of a partial record that could not be removed.
    poisoned_at: Mutex<Option<u64>>,
    options: EngineOptions,
}

impl Engine {
    /// Opens an engine over `backend`, replaying its commit log.
    ///
    /// A partially written record at the end of the log is cut off.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Corrupted`] if the log fails validation, or an
    /// I/O error from the backend.
    pub fn open(mut backend: Box<dyn StorageBackend>, options: EngineOptions) -> StorageResult<Self> {
        let data = backend.read_all()?;
        let replay = log::replay(&data)?;

        if replay.has_torn_tail(data.len() as u64) {
            warn!(
                valid_len = replay.valid_len,
                log_len = data.len(),
                "discarding torn commit at end of log"
            );
            backend.truncate(replay.valid_len)?;
        }

        let mut state = Buckets::new();
        let commits = replay.commits.len();
        for commit in replay.commits {
            apply(&mut state, commit);
        }
        debug!(commits, buckets = state.len(), "engine opened");

        Ok(Self::from_parts(backend, state, options))
    }

    /// Opens (or creates) a file-backed engine at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Locked`] if another handle owns the file, or
    /// any error from [`Engine::open`].
    pub fn open_path(path: &Path, options: EngineOptions) -> StorageResult<Self> {
        let backend = FileBackend::open_with_create_dirs(path)?;
        Self::open(Box::new(backend), options)
    }

    /// Creates an empty engine with no durable storage.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_parts(
            Box::new(MemoryBackend::new()),
            Buckets::new(),
            EngineOptions::default(),
        )
    }

    fn from_parts(backend: Box<dyn StorageBackend>, state: Buckets, options: EngineOptions) -> Self {
        Self {
            state: RwLock::new(state),
            log: Mutex::new(backend),
            writer: Mutex::new(()),
            poisoned_at: Mutex::new(None),
            options,
        }
    }

    /// Runs `f` inside a read transaction.
    ///
    /// # Errors
    ///
    /// Returns whatever `f` returns.
    pub fn view<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&ReadTxn<'_>) -> Result<T, E>,
    {
        let txn = ReadTxn::new(self.state.read());
        f(&txn)
    }

    /// Runs `f` inside a write transaction.
    ///
    /// If `f` returns `Ok`, every staged mutation is logged and applied
    /// atomically. If it returns `Err`, nothing is applied.
    ///
    /// # Errors
    ///
    /// Returns the closure's error, or a storage error if the commit
    /// cannot be written to the log. Once the engine is poisoned every
    /// call returns [`StorageError::Corrupted`] without running `f`.
    pub fn update<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut WriteTxn<'_>) -> Result<T, E>,
        E: From<StorageError>,
    {
        let _writer = self.writer.lock();
        self.check_writable()?;
        let mut txn = WriteTxn::new(self);
        let result = f(&mut txn)?;
        self.commit(txn.into_mutations())?;
        Ok(result)
    }

    /// Returns true if a failed commit left the log unwritable.
    #[must_use]
    pub fn is_poisoned(&self) -> bool {
        self.poisoned_at.lock().is_some()
    }

    fn check_writable(&self) -> StorageResult<()> {
        match *self.poisoned_at.lock() {
            Some(offset) => Err(StorageError::corrupted(
                offset,
                "partial commit could not be removed; engine is read-only",
            )),
            None => Ok(()),
        }
    }

    fn commit(&self, mutations: Vec<Mutation>) -> StorageResult<()> {
        if mutations.is_empty() {
            return Ok(());
        }
        self.check_writable()?;

        let record = log::encode_commit(&mutations)?;
        {
            let mut log = self.log.lock();
            let start = log.len();
            let written = log
                .append(&record)
                .and_then(|_| log.flush())
                .and_then(|()| {
                    if self.options.sync_on_commit {
                        log.sync()
                    } else {
                        Ok(())
                    }
                });
            if let Err(err) = written {
                // Cut whatever part of the record landed.
                if let Err(truncate_err) = log.truncate(start) {
                    error!(
                        offset = start,
                        error = %truncate_err,
                        "could not remove partial commit; refusing further writes"
                    );
                    *self.poisoned_at.lock() = Some(start);
                }
                return Err(err);
            }
        }

        let ops = mutations.len();
        let mut state = self.state.write();
        for mutation in mutations {
            apply_one(&mut state, mutation);
        }
        debug!(ops, "commit applied");
        Ok(())
    }

    /// Returns the names of all buckets in key order.
    #[must_use]
    pub fn bucket_names(&self) -> Vec<Vec<u8>> {
        self.state.read().keys().cloned().collect()
    }

    /// Returns the size of the commit log in bytes.
    #[must_use]
    pub fn log_len(&self) -> u64 {
        self.log.lock().len()
    }

    /// Flushes and syncs the commit log.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be synced.
    pub fn sync(&self) -> StorageResult<()> {
        let mut log = self.log.lock();
        log.flush()?;
        log.sync()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("buckets", &self.state.read().len())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

fn apply(state: &mut Buckets, commit: Vec<Mutation>) {
    for mutation in commit {
        apply_one(state, mutation);
    }
}

fn apply_one(state: &mut Buckets, mutation: Mutation) {
    match mutation {
        Mutation::CreateBucket { bucket } => {
            state.entry(bucket).or_default();
        }
        Mutation::Put { bucket, key, value } => {
            state.entry(bucket).or_default().insert(key, value);
        }
        Mutation::Delete { bucket, key } => {
            if let Some(entries) = state.get_mut(&bucket) {
                entries.remove(&key);
            }
        }
        Mutation::ClearBucket { bucket } => {
            if let Some(entries) = state.get_mut(&bucket) {
                entries.clear();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn put(engine: &Engine, bucket: &[u8], key: &[u8], value: &[u8]) {
        engine
            .update(|tx| {
                tx.create_bucket_if_not_exists(bucket)?;
                tx.put(bucket, key, value)?;
                Ok::<_, StorageError>(())
            })
            .unwrap();
    }

    #[test]
    fn committed_writes_are_visible() {
        let engine = Engine::in_memory();
        put(&engine, b"users", b"1", b"alice");

        let value = engine
            .view(|tx| {
                Ok::<_, StorageError>(
                    tx.bucket(b"users")
                        .and_then(|b| b.get(b"1"))
                        .map(<[u8]>::to_vec),
                )
            })
            .unwrap();
        assert_eq!(value.as_deref(), Some(&b"alice"[..]));
    }

    #[test]
    fn failed_update_applies_nothing() {
        let engine = Engine::in_memory();
        let result: Result<(), StorageError> = engine.update(|tx| {
            tx.create_bucket_if_not_exists(b"users")?;
            tx.put(b"users", b"1", b"alice")?;
            Err(StorageError::InvalidBucketName)
        });

        assert!(result.is_err());
        assert!(engine.bucket_names().is_empty());
        assert_eq!(engine.log_len(), 0);
    }

    #[test]
    fn put_into_missing_bucket_fails() {
        let engine = Engine::in_memory();
        let result = engine.update(|tx| tx.put(b"missing", b"k", b"v"));
        assert!(matches!(result, Err(StorageError::BucketNotFound { .. })));
    }

    #[test]
    fn cursor_iterates_in_key_order() {
        let engine = Engine::in_memory();
        put(&engine, b"b", b"c", b"3");
        put(&engine, b"b", b"a", b"1");
        put(&engine, b"b", b"b", b"2");

        let keys = engine
            .view(|tx| {
                let bucket = tx.bucket(b"b").ok_or(StorageError::InvalidBucketName)?;
                Ok::<_, StorageError>(bucket.cursor().map(|(k, _)| k.to_vec()).collect::<Vec<_>>())
            })
            .unwrap();
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn reopen_replays_log() {
        let backend = MemoryBackend::new();
        {
            let engine = Engine::open(Box::new(backend.clone()), EngineOptions::default()).unwrap();
            put(&engine, b"users", b"1", b"alice");
            put(&engine, b"users", b"2", b"bob");
            engine
                .update(|tx| tx.delete(b"users", b"1"))
                .unwrap();
        }

        let engine = Engine::open(Box::new(backend), EngineOptions::default()).unwrap();
        let entries = engine
            .view(|tx| {
                let bucket = tx.bucket(b"users").ok_or(StorageError::InvalidBucketName)?;
                Ok::<_, StorageError>(bucket.len())
            })
            .unwrap();
        assert_eq!(entries, 1);
    }

    #[test]
    fn reopen_cuts_torn_tail() {
        let backend = MemoryBackend::new();
        {
            let engine = Engine::open(Box::new(backend.clone()), EngineOptions::default()).unwrap();
            put(&engine, b"users", b"1", b"alice");
        }
        let complete = backend.snapshot();
        let mut torn = complete.clone();
        torn.extend_from_slice(b"SKVB\x01\x00\xff");
        backend.overwrite(torn);

        let engine = Engine::open(Box::new(backend.clone()), EngineOptions::default()).unwrap();
        assert_eq!(engine.bucket_names(), vec![b"users".to_vec()]);
        assert_eq!(backend.snapshot(), complete);
    }

    #[test]
    fn reopen_rejects_corruption() {
        let backend = MemoryBackend::new();
        {
            let engine = Engine::open(Box::new(backend.clone()), EngineOptions::default()).unwrap();
            put(&engine, b"users", b"1", b"alice");
        }
        let mut data = backend.snapshot();
        let last = data.len() - 6;
        data[last] ^= 0x55;
        backend.overwrite(data);

        let result = Engine::open(Box::new(backend), EngineOptions::default());
        assert!(matches!(result, Err(StorageError::Corrupted { .. })));
    }

    #[test]
    fn reopen_rejects_damaged_length_ahead_of_commits() {
        let backend = MemoryBackend::new();
        {
            let engine = Engine::open(Box::new(backend.clone()), EngineOptions::default()).unwrap();
            put(&engine, b"users", b"1", b"alice");
            put(&engine, b"users", b"2", b"bob");
            put(&engine, b"users", b"3", b"carol");
        }
        let mut data = backend.snapshot();
        data[9] = 0x7f;
        backend.overwrite(data.clone());

        let result = Engine::open(Box::new(backend.clone()), EngineOptions::default());
        assert!(matches!(result, Err(StorageError::Corrupted { offset: 0, .. })));
        assert_eq!(backend.snapshot(), data);
    }

    /// Writes half of the next record, then fails; truncation fails too.
    struct HalfAppendBackend {
        inner: MemoryBackend,
        fail_writes: Arc<AtomicBool>,
    }

    impl StorageBackend for HalfAppendBackend {
        fn read_all(&self) -> StorageResult<Vec<u8>> {
            self.inner.read_all()
        }

        fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
            if self.fail_writes.load(Ordering::SeqCst) {
                self.inner.append(&data[..data.len() / 2])?;
                return Err(StorageError::Io(io::Error::new(io::ErrorKind::Other, "disk full")));
            }
            self.inner.append(data)
        }

        fn flush(&mut self) -> StorageResult<()> {
            self.inner.flush()
        }

        fn sync(&mut self) -> StorageResult<()> {
            self.inner.sync()
        }

        fn len(&self) -> u64 {
            self.inner.len()
        }

        fn truncate(&mut self, new_len: u64) -> StorageResult<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StorageError::Io(io::Error::new(io::ErrorKind::Other, "read-only device")));
            }
            self.inner.truncate(new_len)
        }
    }

    #[test]
    fn unremovable_partial_commit_poisons_engine() {
        let inner = MemoryBackend::new();
        let fail_writes = Arc::new(AtomicBool::new(false));
        let backend = HalfAppendBackend {
            inner: inner.clone(),
            fail_writes: Arc::clone(&fail_writes),
        };
        let engine = Engine::open(Box::new(backend), EngineOptions::default()).unwrap();
        put(&engine, b"users", b"1", b"alice");

        fail_writes.store(true, Ordering::SeqCst);
        let second = engine.update(|tx| tx.put(b"users", b"2", b"bob"));
        assert!(matches!(second, Err(StorageError::Io(_))));
        assert!(engine.is_poisoned());

        fail_writes.store(false, Ordering::SeqCst);
        let log_len = inner.snapshot().len();
        let third = engine.update(|tx| tx.put(b"users", b"3", b"carol"));
        assert!(matches!(third, Err(StorageError::Corrupted { .. })));
        assert_eq!(inner.snapshot().len(), log_len);

        let entries = engine
            .view(|tx| {
                let bucket = tx.bucket(b"users").ok_or(StorageError::InvalidBucketName)?;
                Ok::<_, StorageError>(bucket.len())
            })
            .unwrap();
        assert_eq!(entries, 1);
    }

    #[test]
    fn file_engine_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.db");

        {
            let engine = Engine::open_path(&path, EngineOptions::default()).unwrap();
            put(&engine, b"users", b"1", b"alice");
        }

        let engine = Engine::open_path(&path, EngineOptions::new().sync_on_commit(false)).unwrap();
        let value = engine
            .view(|tx| {
                Ok::<_, StorageError>(tx.bucket(b"users").and_then(|b| b.get(b"1")).map(<[u8]>::to_vec))
            })
            .unwrap();
        assert_eq!(value, Some(b"alice".to_vec()));
    }

    #[test]
    fn empty_update_writes_no_log() {
        let engine = Engine::in_memory();
        engine.update(|_tx| Ok::<_, StorageError>(())).unwrap();
        assert_eq!(engine.log_len(), 0);
    }
}
