//! Byte backend trait for the commit log.

use crate::error::StorageResult;

/// An append-only byte store holding the engine's commit log.
///
/// Backends do not interpret the bytes they hold. The engine frames,
/// checksums, and replays commit records itself.
///
/// # Invariants
///
/// - `append` writes after all previously appended bytes
/// - `read_all` returns every byte appended and not truncated
/// - after `sync` returns, appended bytes survive process termination
pub trait StorageBackend: Send + Sync {
    /// Returns the whole contents of the log.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying medium cannot be read.
    fn read_all(&self) -> StorageResult<Vec<u8>>;

    /// Appends bytes and returns the offset they were written at.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Pushes buffered writes to the operating system.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    fn flush(&mut self) -> StorageResult<()>;

    /// Forces data and metadata to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Returns the current log length in bytes.
    fn len(&self) -> u64;

    /// Returns true if nothing has been appended.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every byte after `new_len`.
    ///
    /// Used by recovery to cut a partially written tail record.
    ///
    /// # Errors
    ///
    /// Returns an error if `new_len` exceeds the current length or the
    /// truncation fails.
    fn truncate(&mut self, new_len: u64) -> StorageResult<()>;
}
