//! Key-value persistence primitive for `bountyhub`.
//!
//! This crate defines the [`StorageBackend`] trait, a plain key-value store
//! that knows nothing about services, credentials or validation. The key
//! registry in `bountyhub-core` serializes its whole credential map into a
//! single entry and writes it through this trait.
//!
//! Two implementations are provided:
//!
//! - [`RedbBackend`]: on-disk, pure Rust, backed by redb (feature `redb-backend`)
//! - [`MemoryBackend`]: in-memory, for tests and throwaway sessions

mod error;
mod memory;
#[cfg(feature = "redb-backend")]
mod redb_backend;

pub use error::StorageError;
pub use memory::MemoryBackend;
#[cfg(feature = "redb-backend")]
pub use redb_backend::RedbBackend;

/// A pluggable key-value storage backend.
///
/// Keys are UTF-8 strings (e.g. `api_keys`). Values are opaque byte arrays.
///
/// Implementations must be safe to share across async tasks (`Send + Sync`).
#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Retrieve a value by key.
    ///
    /// Returns `Ok(None)` if the key does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Read`] if the underlying backend fails.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Store a key-value pair, overwriting any existing value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Write`] if the underlying backend fails.
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;

    /// Atomically replace the value at `key` if it still equals `expected`.
    ///
    /// `expected = None` means "the key must not exist". Returns `Ok(true)`
    /// when the swap happened and `Ok(false)` when the stored value had
    /// changed underneath the caller, in which case nothing is written.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Write`] or [`StorageError::Transaction`] if the
    /// underlying backend fails.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: &[u8],
    ) -> Result<bool, StorageError>;
}
