//! Pure-Rust redb storage backend.
//!
//! The on-disk default for the `bountyhub` binary. redb is transactional,
//! which gives [`StorageBackend::compare_and_swap`] its atomicity for free:
//! the read and the conditional write happen inside one write transaction.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition};

use crate::{StorageBackend, StorageError};

/// The single table used for all key-value data.
const DATA_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("data");

/// A storage backend backed by redb (pure Rust, B-tree based).
///
/// Thread-safe via `Arc<Database>`. Blocking redb calls are offloaded to the
/// Tokio blocking thread pool.
///
/// # Examples
///
/// ```no_run
/// # use bountyhub_storage::RedbBackend;
/// let backend = RedbBackend::open("./bountyhub.redb").unwrap();
/// ```
#[derive(Clone)]
pub struct RedbBackend {
    db: Arc<Database>,
    path: PathBuf,
}

impl std::fmt::Debug for RedbBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbBackend")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

fn txn_err(e: impl std::fmt::Display) -> StorageError {
    StorageError::Transaction {
        reason: e.to_string(),
    }
}

fn table_err(e: impl std::fmt::Display) -> StorageError {
    StorageError::MissingTable {
        name: format!("data: {e}"),
    }
}

fn panicked(key: &str, e: &tokio::task::JoinError) -> StorageError {
    StorageError::Transaction {
        reason: format!("blocking task for key '{key}' panicked: {e}"),
    }
}

impl RedbBackend {
    /// Open or create a redb database at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Open`] if redb fails to open or create the
    /// database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let db = Database::create(path).map_err(|e| StorageError::Open {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        // Opening the table in a write txn creates it if missing.
        let txn = db.begin_write().map_err(txn_err)?;
        {
            let _table = txn.open_table(DATA_TABLE).map_err(table_err)?;
        }
        txn.commit().map_err(txn_err)?;

        Ok(Self {
            db: Arc::new(db),
            path: path.to_path_buf(),
        })
    }

    /// Return the filesystem path of this database.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl StorageBackend for RedbBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let db = Arc::clone(&self.db);
        let owned = key.to_owned();
        tokio::task::spawn_blocking(move || {
            let txn = db.begin_read().map_err(txn_err)?;
            let table = txn.open_table(DATA_TABLE).map_err(table_err)?;
            let value = table
                .get(owned.as_str())
                .map_err(|e| StorageError::Read {
                    key: owned.clone(),
                    reason: e.to_string(),
                })?
                .map(|v| v.value().to_vec());
            Ok(value)
        })
        .await
        .map_err(|e| panicked(key, &e))?
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let db = Arc::clone(&self.db);
        let owned = key.to_owned();
        let value = value.to_vec();
        tokio::task::spawn_blocking(move || {
            let txn = db.begin_write().map_err(txn_err)?;
            {
                let mut table = txn.open_table(DATA_TABLE).map_err(table_err)?;
                table
                    .insert(owned.as_str(), value.as_slice())
                    .map_err(|e| StorageError::Write {
                        key: owned.clone(),
                        reason: e.to_string(),
                    })?;
            }
            txn.commit().map_err(txn_err)
        })
        .await
        .map_err(|e| panicked(key, &e))?
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: &[u8],
    ) -> Result<bool, StorageError> {
        let db = Arc::clone(&self.db);
        let owned = key.to_owned();
        let expected = expected.map(<[u8]>::to_vec);
        let new = new.to_vec();
        tokio::task::spawn_blocking(move || {
            // redb serializes write transactions, so the read below cannot be
            // invalidated before commit.
            let txn = db.begin_write().map_err(txn_err)?;
            let swapped = {
                let mut table = txn.open_table(DATA_TABLE).map_err(table_err)?;
                let current = table
                    .get(owned.as_str())
                    .map_err(|e| StorageError::Read {
                        key: owned.clone(),
                        reason: e.to_string(),
                    })?
                    .map(|v| v.value().to_vec());
                if current == expected {
                    table
                        .insert(owned.as_str(), new.as_slice())
                        .map_err(|e| StorageError::Write {
                            key: owned.clone(),
                            reason: e.to_string(),
                        })?;
                    true
                } else {
                    false
                }
            };
            if swapped {
                txn.commit().map_err(txn_err)?;
            } else {
                txn.abort().map_err(txn_err)?;
            }
            Ok(swapped)
        })
        .await
        .map_err(|e| panicked(key, &e))?
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, RedbBackend) {
        let dir = tempfile::tempdir().unwrap();
        let backend = RedbBackend::open(dir.path().join("store.redb")).unwrap();
        (dir, backend)
    }

    #[tokio::test]
    async fn put_then_get() {
        let (_dir, backend) = open_temp();
        assert_eq!(backend.get("api_keys").await.unwrap(), None);
        backend.put("api_keys", b"{}").await.unwrap();
        assert_eq!(backend.get("api_keys").await.unwrap(), Some(b"{}".to_vec()));
    }

    #[tokio::test]
    async fn cas_follows_stored_value() {
        let (_dir, backend) = open_temp();
        assert!(backend.compare_and_swap("k", None, b"v1").await.unwrap());
        assert!(!backend.compare_and_swap("k", None, b"v2").await.unwrap());
        assert!(backend.compare_and_swap("k", Some(b"v1"), b"v2").await.unwrap());
        assert_eq!(backend.get("k").await.unwrap(), Some(b"v2".to_vec()));
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.redb");
        {
            let backend = RedbBackend::open(&path).unwrap();
            backend.put("api_keys", b"persisted").await.unwrap();
        }
        let reopened = RedbBackend::open(&path).unwrap();
        assert_eq!(
            reopened.get("api_keys").await.unwrap(),
            Some(b"persisted".to_vec())
        );
    }
}
