//! Key registry: the credential lifecycle and its persistence.
//!
//! All credentials live in one storage entry, [`API_KEYS_STORAGE_KEY`], as a
//! JSON map from service id to [`KeyConfig`]. Every mutation re-reads that
//! entry, applies the change and writes it back with
//! [`StorageBackend::compare_and_swap`]; if another writer got there first
//! the mutation is replayed on the fresh map. Local writers are additionally
//! serialized so the in-memory view always matches the last committed map.
//!
//! Entries this build cannot read (a service it does not know, or a record
//! that fails to decode) are left out of the in-memory view but written back
//! byte-for-byte on every update.

use std::collections::BTreeMap;
use std::sync::Arc;

use bountyhub_storage::StorageBackend;
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::RegistryError;
use crate::model::{KeyConfig, ValidationResult};
use crate::service::ServiceId;

/// Storage key holding the serialized credential map.
pub const API_KEYS_STORAGE_KEY: &str = "api_keys";

/// Compare-and-swap attempts before a mutation gives up.
const MAX_CAS_ATTEMPTS: u32 = 8;

type KeyMap = BTreeMap<ServiceId, KeyConfig>;

/// Owner of every [`KeyConfig`].
///
/// Constructed once at startup and shared by `Arc`; tests build a fresh one
/// per case.
pub struct KeyRegistry {
    storage: Arc<dyn StorageBackend>,
    keys: RwLock<KeyMap>,
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for KeyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRegistry").finish_non_exhaustive()
    }
}

impl KeyRegistry {
    /// Create an empty registry over `storage`. Call [`load`](Self::load)
    /// to pick up persisted keys.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            storage,
            keys: RwLock::new(BTreeMap::new()),
            write_lock: Mutex::new(()),
        }
    }

    /// Read the persisted map into memory.
    ///
    /// Fails open: an unreadable or undecodable entry is logged and the
    /// registry starts empty. Returns the number of services loaded.
    pub async fn load(&self) -> usize {
        let _guard = self.write_lock.lock().await;

        let stored = match self.storage.get(API_KEYS_STORAGE_KEY).await {
            Ok(raw) => StoredKeys::decode(raw.as_deref()),
            Err(e) => Err(e.into()),
        };
        let map = match stored {
            Ok(stored) => stored.known,
            Err(e) => {
                warn!(error = %e, "failed to read stored API keys, starting empty");
                KeyMap::new()
            }
        };
        let count = map.len();
        *self.keys.write().await = map;
        info!(services = count, "key registry loaded");
        count
    }

    /// Store a new credential for `service`, enabled and stamped now.
    ///
    /// Replaces any existing entry. Validation is the caller's job.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::EmptyKey`] for a blank key, or a storage error.
    pub async fn save(&self, service: ServiceId, raw_key: &str) -> Result<KeyConfig, RegistryError> {
        let key = raw_key.trim();
        if key.is_empty() {
            return Err(RegistryError::EmptyKey { service });
        }
        let config = self
            .mutate(|stored| {
                let config = KeyConfig::new(key);
                stored.known.insert(service, config.clone());
                Ok(config)
            })
            .await?;
        info!(service = %service, key = %config.key_hint(), "API key saved");
        Ok(config)
    }

    /// Delete the credential for `service`, including a stored record that
    /// could not be decoded. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the map cannot be written.
    pub async fn remove(&self, service: ServiceId) -> Result<bool, RegistryError> {
        let existed = self
            .mutate(|stored| {
                let unreadable = stored.opaque.remove(service.as_str()).is_some();
                Ok(stored.known.remove(&service).is_some() || unreadable)
            })
            .await?;
        if existed {
            info!(service = %service, "API key removed");
        }
        Ok(existed)
    }

    /// Enable or disable a stored credential without re-validating it.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotConfigured`] if nothing is stored for
    /// `service`.
    pub async fn set_enabled(
        &self,
        service: ServiceId,
        enabled: bool,
    ) -> Result<KeyConfig, RegistryError> {
        let config = self
            .mutate(|stored| {
                let config = stored
                    .known
                    .get_mut(&service)
                    .ok_or(RegistryError::NotConfigured { service })?;
                config.enabled = enabled;
                Ok(config.clone())
            })
            .await?;
        info!(service = %service, enabled, "API key toggled");
        Ok(config)
    }

    /// Fold a validation outcome into the stored record: stamp
    /// `last_validated` and keep whatever rate-limit and metadata the probe
    /// produced. A credential removed in the meantime is left removed.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the map cannot be written.
    pub async fn record_validation(
        &self,
        service: ServiceId,
        result: &ValidationResult,
    ) -> Result<(), RegistryError> {
        self.mutate(|stored| {
            if let Some(config) = stored.known.get_mut(&service) {
                config.last_validated = chrono::Utc::now();
                if result.rate_limit.is_some() {
                    config.rate_limit.clone_from(&result.rate_limit);
                }
                if result.metadata.is_some() {
                    config.metadata.clone_from(&result.metadata);
                }
            }
            Ok(())
        })
        .await
    }

    pub async fn get(&self, service: ServiceId) -> Option<KeyConfig> {
        self.keys.read().await.get(&service).cloned()
    }

    /// A copy of every stored record.
    pub async fn get_all(&self) -> BTreeMap<ServiceId, KeyConfig> {
        self.keys.read().await.clone()
    }

    /// True iff a record exists, is enabled, and holds a non-empty key.
    pub async fn is_enabled(&self, service: ServiceId) -> bool {
        self.keys
            .read()
            .await
            .get(&service)
            .is_some_and(KeyConfig::is_usable)
    }

    /// The raw key for `service`, whether or not it is enabled.
    pub async fn api_key(&self, service: ServiceId) -> Option<String> {
        self.keys
            .read()
            .await
            .get(&service)
            .map(|c| c.key.clone())
            .filter(|k| !k.is_empty())
    }

    /// The raw key for `service` only if it is schedulable.
    pub async fn enabled_key(&self, service: ServiceId) -> Option<String> {
        self.keys
            .read()
            .await
            .get(&service)
            .filter(|c| c.is_usable())
            .map(|c| c.key.clone())
    }

    /// Services with a schedulable key, in catalog order.
    pub async fn enabled_services(&self) -> Vec<ServiceId> {
        let keys = self.keys.read().await;
        ServiceId::ALL
            .into_iter()
            .filter(|id| keys.get(id).is_some_and(KeyConfig::is_usable))
            .collect()
    }

    /// Read-modify-write the persisted map under compare-and-swap.
    ///
    /// `apply` may run more than once; it must only touch the map it is given.
    /// A stored entry that is not a JSON object is never overwritten.
    async fn mutate<T, F>(&self, mut apply: F) -> Result<T, RegistryError>
    where
        F: FnMut(&mut StoredKeys) -> Result<T, RegistryError>,
    {
        let _guard = self.write_lock.lock().await;

        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let current = self.storage.get(API_KEYS_STORAGE_KEY).await?;
            let mut stored = StoredKeys::decode(current.as_deref())?;
            let out = apply(&mut stored)?;
            let encoded = stored.encode()?;

            if self
                .storage
                .compare_and_swap(API_KEYS_STORAGE_KEY, current.as_deref(), &encoded)
                .await?
            {
                *self.keys.write().await = stored.known;
                return Ok(out);
            }
            debug!(attempt, "stored API keys changed underneath us, retrying");
        }

        warn!(attempts = MAX_CAS_ATTEMPTS, "giving up on API key update");
        Err(RegistryError::Contention {
            attempts: MAX_CAS_ATTEMPTS,
        })
    }
}

/// The decoded `api_keys` entry.
#[derive(Default)]
struct StoredKeys {
    known: KeyMap,
    /// Raw entries that did not decode, keyed by their stored name.
    opaque: Map<String, Value>,
}

impl StoredKeys {
    /// Split the stored object into readable records and opaque leftovers.
    ///
    /// Fails only when the entry as a whole is not a JSON object.
    fn decode(raw: Option<&[u8]>) -> Result<Self, RegistryError> {
        let mut stored = Self::default();
        let Some(bytes) = raw else {
            return Ok(stored);
        };
        let entries: Map<String, Value> =
            serde_json::from_slice(bytes).map_err(|e| RegistryError::Corrupt {
                reason: e.to_string(),
            })?;

        for (name, value) in entries {
            let Some(service) = ServiceId::ALL.into_iter().find(|id| id.as_str() == name) else {
                warn!(entry = %name, "unknown service in stored API keys, leaving it untouched");
                stored.opaque.insert(name, value);
                continue;
            };
            match KeyConfig::deserialize(&value) {
                Ok(config) => {
                    stored.known.insert(service, config);
                }
                Err(e) => {
                    warn!(service = %service, error = %e, "stored API key record is malformed, leaving it untouched");
                    stored.opaque.insert(name, value);
                }
            }
        }
        Ok(stored)
    }

    /// Re-encode, putting opaque entries back unless a readable record for
    /// the same service replaced them.
    fn encode(&self) -> Result<Vec<u8>, RegistryError> {
        let serialization = |e: serde_json::Error| RegistryError::Serialization {
            reason: e.to_string(),
        };
        let mut out = self.opaque.clone();
        for (service, config) in &self.known {
            let value = serde_json::to_value(config).map_err(serialization)?;
            out.insert(service.as_str().to_owned(), value);
        }
        serde_json::to_vec(&out).map_err(serialization)
    }
}
