//! Read and write transactions.

use crate::engine::{BucketMap, Buckets, Engine};
use crate::error::{StorageError, StorageResult};
use crate::log::Mutation;
use parking_lot::RwLockReadGuard;
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::ops::Bound;

/// A consistent read-only view of the engine.
///
/// Commits wait until every open read transaction has finished.
pub struct ReadTxn<'e> {
    buckets: RwLockReadGuard<'e, Buckets>,
}

impl<'e> ReadTxn<'e> {
    pub(crate) fn new(buckets: RwLockReadGuard<'e, Buckets>) -> Self {
        Self { buckets }
    }

    /// Returns the named bucket, or `None` if it does not exist.
    #[must_use]
    pub fn bucket(&self, name: &[u8]) -> Option<Bucket<'_>> {
        self.buckets.get(name).map(|entries| Bucket { entries })
    }

    /// Iterates bucket names in key order.
    pub fn bucket_names(&self) -> impl Iterator<Item = &[u8]> {
        self.buckets.keys().map(Vec::as_slice)
    }
}

/// A bucket inside a read transaction.
#[derive(Clone, Copy)]
pub struct Bucket<'t> {
    entries: &'t BucketMap,
}

impl<'t> Bucket<'t> {
    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<&'t [u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Number of keys in the bucket.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the bucket holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns a cursor over every entry in ascending key order.
    #[must_use]
    pub fn cursor(&self) -> Cursor<'t> {
        Cursor {
            inner: self
                .entries
                .range::<[u8], _>((Bound::Unbounded, Bound::Unbounded)),
        }
    }

    /// Returns a cursor positioned at the first key `>= start`.
    #[must_use]
    pub fn seek(&self, start: &[u8]) -> Cursor<'t> {
        Cursor {
            inner: self
                .entries
                .range::<[u8], _>((Bound::Included(start), Bound::Unbounded)),
        }
    }
}

/// Forward iterator over `(key, value)` pairs of a bucket.
pub struct Cursor<'t> {
    inner: btree_map::Range<'t, Vec<u8>, Vec<u8>>,
}

impl<'t> Iterator for Cursor<'t> {
    type Item = (&'t [u8], &'t [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|(key, value)| (key.as_slice(), value.as_slice()))
    }
}

/// Uncommitted changes to one bucket.
#[derive(Default)]
struct BucketOverlay {
    created: bool,
    cleared: bool,
    /// `None` marks a deleted key.
    entries: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

/// A write transaction.
///
/// Changes are staged in memory and only reach the engine when the
/// closure passed to [`Engine::update`] returns `Ok`. Reads see the
/// transaction's own staged writes.
pub struct WriteTxn<'e> {
    engine: &'e Engine,
    overlay: BTreeMap<Vec<u8>, BucketOverlay>,
    mutations: Vec<Mutation>,
}

impl<'e> WriteTxn<'e> {
    pub(crate) fn new(engine: &'e Engine) -> Self {
        Self {
            engine,
            overlay: BTreeMap::new(),
            mutations: Vec::new(),
        }
    }

    pub(crate) fn into_mutations(self) -> Vec<Mutation> {
        self.mutations
    }

    /// Returns true if any change has been staged.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        !self.mutations.is_empty()
    }

    /// Returns true if the bucket exists, committed or staged.
    #[must_use]
    pub fn bucket_exists(&self, name: &[u8]) -> bool {
        self.overlay.get(name).is_some_and(|o| o.created) || self.engine.state.read().contains_key(name)
    }

    /// Creates a bucket unless it already exists.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidBucketName`] for an empty name.
    pub fn create_bucket_if_not_exists(&mut self, name: &[u8]) -> StorageResult<()> {
        if name.is_empty() {
            return Err(StorageError::InvalidBucketName);
        }
        if self.bucket_exists(name) {
            return Ok(());
        }
        self.overlay.entry(name.to_vec()).or_default().created = true;
        self.mutations.push(Mutation::CreateBucket {
            bucket: name.to_vec(),
        });
        Ok(())
    }

    fn require_bucket(&self, name: &[u8]) -> StorageResult<()> {
        if self.bucket_exists(name) {
            Ok(())
        } else {
            Err(StorageError::bucket_not_found(name))
        }
    }

    /// Reads a key, seeing this transaction's staged writes.
    #[must_use]
    pub fn get(&self, bucket: &[u8], key: &[u8]) -> Option<Vec<u8>> {
        if let Some(overlay) = self.overlay.get(bucket) {
            if let Some(staged) = overlay.entries.get(key) {
                return staged.clone();
            }
            if overlay.cleared {
                return None;
            }
        }
        self.engine
            .state
            .read()
            .get(bucket)
            .and_then(|entries| entries.get(key).cloned())
    }

    /// Stages an insert or overwrite.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`] if the bucket does not exist.
    pub fn put(&mut self, bucket: &[u8], key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.require_bucket(bucket)?;
        self.overlay
            .entry(bucket.to_vec())
            .or_default()
            .entries
            .insert(key.to_vec(), Some(value.to_vec()));
        self.mutations.push(Mutation::Put {
            bucket: bucket.to_vec(),
            key: key.to_vec(),
            value: value.to_vec(),
        });
        Ok(())
    }

    /// Stages removal of a key. Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`] if the bucket does not exist.
    pub fn delete(&mut self, bucket: &[u8], key: &[u8]) -> StorageResult<()> {
        self.require_bucket(bucket)?;
        self.overlay
            .entry(bucket.to_vec())
            .or_default()
            .entries
            .insert(key.to_vec(), None);
        self.mutations.push(Mutation::Delete {
            bucket: bucket.to_vec(),
            key: key.to_vec(),
        });
        Ok(())
    }

    /// Stages removal of every key in a bucket.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`] if the bucket does not exist.
    pub fn clear_bucket(&mut self, bucket: &[u8]) -> StorageResult<()> {
        self.require_bucket(bucket)?;
        let overlay = self.overlay.entry(bucket.to_vec()).or_default();
        overlay.cleared = true;
        overlay.entries.clear();
        self.mutations.push(Mutation::ClearBucket {
            bucket: bucket.to_vec(),
        });
        Ok(())
    }

    /// Returns every entry of a bucket in key order, staged writes included.
    ///
    /// A missing bucket yields an empty list.
    #[must_use]
    pub fn scan(&self, bucket: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        let overlay = self.overlay.get(bucket);
        let mut merged: BucketMap = if overlay.is_some_and(|o| o.cleared) {
            BucketMap::new()
        } else {
            self.engine
                .state
                .read()
                .get(bucket)
                .cloned()
                .unwrap_or_default()
        };

        if let Some(overlay) = overlay {
            for (key, staged) in &overlay.entries {
                match staged {
                    Some(value) => {
                        merged.insert(key.clone(), value.clone());
                    }
                    None => {
                        merged.remove(key);
                    }
                }
            }
        }
        merged.into_iter().collect()
    }
}


