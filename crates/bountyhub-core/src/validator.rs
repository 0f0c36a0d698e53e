//! Credential validator.
//!
//! Probes a service's "who am I" endpoint with the candidate key and turns
//! whatever happens into a [`ValidationResult`]: transport failures, non-2xx
//! answers and bodies that fail the adapter's acceptance check all become
//! `valid: false` with a message. There is exactly one attempt per probe.
//!
//! Results are cached per service and key suffix (the last eight characters,
//! so raw secrets never become cache keys) for the configured TTL.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::adapters::AdapterTable;
use crate::http::{rate_limit_from_headers, read_json, status_error, ServiceClient};
use crate::model::{key_hint, ValidationResult};
use crate::service::ServiceId;

/// Characters of the key that identify a cache entry.
const CACHE_SUFFIX_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    service: ServiceId,
    suffix: String,
}

impl CacheKey {
    fn new(service: ServiceId, key: &str) -> Self {
        let count = key.chars().count();
        let suffix = key
            .chars()
            .skip(count.saturating_sub(CACHE_SUFFIX_LEN))
            .collect();
        Self { service, suffix }
    }
}

struct CachedValidation {
    result: ValidationResult,
    /// `None` when the TTL reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl CachedValidation {
    fn is_fresh(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

/// Probes credentials and caches the outcome.
pub struct Validator {
    client: Arc<ServiceClient>,
    adapters: Arc<AdapterTable>,
    ttl: Duration,
    cache: RwLock<HashMap<CacheKey, CachedValidation>>,
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl Validator {
    #[must_use]
    pub fn new(client: Arc<ServiceClient>, adapters: Arc<AdapterTable>, ttl: Duration) -> Self {
        Self {
            client,
            adapters,
            ttl,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Validate `key` for `service`, reusing a cached result if it is still
    /// fresh.
    pub async fn validate(&self, service: ServiceId, key: &str) -> ValidationResult {
        let cache_key = CacheKey::new(service, key);
        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get(&cache_key) {
                if entry.is_fresh(Instant::now()) {
                    debug!(service = %service, "validation cache hit");
                    return entry.result.clone();
                }
            }
        }

        let result = self.probe(service, key).await;

        let now = Instant::now();
        let mut cache = self.cache.write().await;
        cache.retain(|_, entry| entry.is_fresh(now));
        cache.insert(
            cache_key,
            CachedValidation {
                result: result.clone(),
                expires_at: now.checked_add(self.ttl),
            },
        );
        result
    }

    /// Drop any cached result for this key and probe again.
    pub async fn revalidate(&self, service: ServiceId, key: &str) -> ValidationResult {
        self.cache
            .write()
            .await
            .remove(&CacheKey::new(service, key));
        self.validate(service, key).await
    }

    /// Forget every cached result.
    pub async fn clear_cache(&self) {
        self.cache.write().await.clear();
    }

    /// One live request against the probe endpoint.
    async fn probe(&self, service: ServiceId, key: &str) -> ValidationResult {
        if key.is_empty() {
            return ValidationResult::rejected("no API key provided");
        }
        let Some(adapter) = self.adapters.get(service) else {
            return ValidationResult::rejected(format!("no adapter registered for {service}"));
        };

        let descriptor = service.descriptor();
        let resp = match self.client.get(service, descriptor.probe_path, key).await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(service = %service, error = %e, "validation request failed");
                return ValidationResult::rejected(e.to_string());
            }
        };

        let status = resp.status();
        if !status.is_success() {
            let err = status_error(status);
            info!(service = %service, key = %key_hint(key), status = status.as_u16(), "API key rejected");
            return ValidationResult::rejected(err.to_string());
        }

        let rate_limit = rate_limit_from_headers(resp.headers());
        let body = match read_json(service, resp).await {
            Ok(body) => body,
            Err(e) => {
                warn!(service = %service, error = %e, "validation response unreadable");
                return ValidationResult::rejected(e.to_string());
            }
        };

        match adapter.parse_identity(&body) {
            Ok(metadata) => {
                info!(service = %service, key = %key_hint(key), "API key validated");
                ValidationResult::accepted(metadata, rate_limit)
            }
            Err(rejected) => {
                info!(service = %service, reason = %rejected.reason, "API key response not accepted");
                ValidationResult {
                    rate_limit,
                    ..ValidationResult::rejected(rejected.to_string())
                }
            }
        }
    }
}
