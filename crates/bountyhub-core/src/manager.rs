//! Application-facing facade over the registry and the validator.
//!
//! Front ends call these operations and never touch the registry directly.
//! Every save is followed by a probe; the key is kept even when the probe
//! rejects it, and the outcome is reported through the [`Notifier`].

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::RegistryError;
use crate::model::{KeyConfig, KeyMetadata, ValidationResult};
use crate::notify::{Notification, Notifier};
use crate::registry::KeyRegistry;
use crate::service::ServiceId;
use crate::validator::Validator;

/// Where a service stands, from the user's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    /// No usable key stored.
    Unconfigured,
    /// Enabled and the last probe accepted the key.
    Valid,
    /// Enabled but the last probe rejected the key.
    Invalid,
    /// Enabled, not probed since this process started.
    Unvalidated,
    /// Key stored but switched off.
    Disabled,
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Unconfigured => "unconfigured",
            Self::Valid => "valid",
            Self::Invalid => "invalid",
            Self::Unvalidated => "unvalidated",
            Self::Disabled => "disabled",
        })
    }
}

/// One row of [`ServiceStats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRow {
    pub service: ServiceId,
    pub name: &'static str,
    pub status: ServiceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_validated: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<KeyMetadata>,
}

/// Counts across the whole catalog plus a row per service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStats {
    pub total: usize,
    pub configured: usize,
    pub enabled: usize,
    pub valid: usize,
    pub invalid: usize,
    pub services: Vec<ServiceRow>,
}

/// Key lifecycle operations with validation and notifications wired in.
pub struct KeyManager {
    registry: Arc<KeyRegistry>,
    validator: Arc<Validator>,
    notifier: Arc<dyn Notifier>,
    outcomes: RwLock<HashMap<ServiceId, ValidationResult>>,
}

impl std::fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyManager")
            .field("notifier", &self.notifier.name())
            .finish_non_exhaustive()
    }
}

impl KeyManager {
    #[must_use]
    pub fn new(
        registry: Arc<KeyRegistry>,
        validator: Arc<Validator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            registry,
            validator,
            notifier,
            outcomes: RwLock::new(HashMap::new()),
        }
    }

    /// Store `key` for `service`, then probe it. A cached result for the
    /// same key suffix is not trusted here.
    ///
    /// The key stays stored whatever the probe says; a rejected key simply
    /// shows up as [`ServiceStatus::Invalid`].
    ///
    /// # Errors
    ///
    /// Returns a [`RegistryError`] if the key is blank or cannot be persisted.
    /// Probe failures are not errors; they are in the returned result.
    pub async fn save_api_key(
        &self,
        service: ServiceId,
        key: &str,
    ) -> Result<ValidationResult, RegistryError> {
        let config = match self.registry.save(service, key).await {
            Ok(config) => config,
            Err(e) => {
                self.notifier
                    .notify(Notification::service_error(service, &e.to_string()));
                return Err(e);
            }
        };

        let result = self.validator.revalidate(service, &config.key).await;
        self.settle(service, &result).await;

        if result.valid {
            self.notifier.notify(Notification::success(
                service,
                format!("{} API key saved and validated", service.display_name()),
            ));
        } else {
            let error = result.error.as_deref().unwrap_or("validation failed");
            self.notifier
                .notify(Notification::service_error(service, error));
        }
        Ok(result)
    }

    /// Forget the key for `service`. Returns whether one was stored.
    ///
    /// # Errors
    ///
    /// Returns a [`RegistryError`] if the registry cannot be written.
    pub async fn remove_api_key(&self, service: ServiceId) -> Result<bool, RegistryError> {
        let existed = self.registry.remove(service).await?;
        self.outcomes.write().await.remove(&service);
        if existed {
            self.notifier.notify(Notification::info(format!(
                "{} API key removed",
                service.display_name()
            )));
        }
        Ok(existed)
    }

    /// Flip the enabled flag. Returns the new state.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotConfigured`] if nothing is stored.
    pub async fn toggle_api_key(&self, service: ServiceId) -> Result<bool, RegistryError> {
        let current = self
            .registry
            .get(service)
            .await
            .ok_or(RegistryError::NotConfigured { service })?;
        self.set_api_key_enabled(service, !current.enabled).await
    }

    /// Set the enabled flag explicitly. Returns the new state.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotConfigured`] if nothing is stored.
    pub async fn set_api_key_enabled(
        &self,
        service: ServiceId,
        enabled: bool,
    ) -> Result<bool, RegistryError> {
        let config = self.registry.set_enabled(service, enabled).await?;
        let verb = if config.enabled { "enabled" } else { "disabled" };
        self.notifier.notify(Notification::info(format!(
            "{} API key {verb}",
            service.display_name()
        )));
        Ok(config.enabled)
    }

    /// Probe the stored key, reusing a fresh cached result if there is one.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotConfigured`] if no key is stored.
    pub async fn validate_api_key(
        &self,
        service: ServiceId,
    ) -> Result<ValidationResult, RegistryError> {
        let key = self
            .registry
            .api_key(service)
            .await
            .ok_or(RegistryError::NotConfigured { service })?;
        let result = self.validator.validate(service, &key).await;
        self.settle(service, &result).await;
        Ok(result)
    }

    /// Drop every cached result and re-probe each enabled key. Disabled and
    /// unconfigured services are skipped. Results come back in catalog order.
    pub async fn refresh_all_keys(&self) -> Vec<(ServiceId, ValidationResult)> {
        let services = self.registry.enabled_services().await;
        info!(services = services.len(), "refreshing API keys");
        self.validator.clear_cache().await;

        let probes = services.into_iter().map(|service| async move {
            let key = self.registry.enabled_key(service).await?;
            let result = self.validator.validate(service, &key).await;
            Some((service, result))
        });
        let results: Vec<_> = join_all(probes).await.into_iter().flatten().collect();

        for (service, result) in &results {
            self.settle(*service, result).await;
        }
        let valid = results.iter().filter(|(_, r)| r.valid).count();
        self.notifier.notify(Notification::info(format!(
            "Refreshed {} API keys, {valid} valid",
            results.len()
        )));
        results
    }

    pub async fn service_status(&self, service: ServiceId) -> ServiceStatus {
        let config = self.registry.get(service).await;
        let outcomes = self.outcomes.read().await;
        status_of(config.as_ref(), outcomes.get(&service))
    }

    /// Status of every service in the catalog, with totals.
    pub async fn service_stats(&self) -> ServiceStats {
        let all = self.registry.get_all().await;
        let outcomes = self.outcomes.read().await;

        let mut stats = ServiceStats {
            total: ServiceId::ALL.len(),
            ..ServiceStats::default()
        };
        for service in ServiceId::ALL {
            let config = all.get(&service);
            let outcome = outcomes.get(&service);
            let status = status_of(config, outcome);

            if config.is_some_and(|c| !c.key.is_empty()) {
                stats.configured += 1;
            }
            if config.is_some_and(KeyConfig::is_usable) {
                stats.enabled += 1;
            }
            match status {
                ServiceStatus::Valid => stats.valid += 1,
                ServiceStatus::Invalid => stats.invalid += 1,
                _ => {}
            }

            stats.services.push(ServiceRow {
                service,
                name: service.display_name(),
                status,
                key_hint: config.map(KeyConfig::key_hint),
                last_validated: config.map(|c| c.last_validated),
                error: outcome.and_then(|o| o.error.clone()),
                metadata: config.and_then(|c| c.metadata.clone()),
            });
        }
        stats
    }

    /// Remember the outcome and fold it into the stored record.
    async fn settle(&self, service: ServiceId, result: &ValidationResult) {
        if let Err(e) = self.registry.record_validation(service, result).await {
            warn!(service = %service, error = %e, "failed to record validation outcome");
        }
        self.outcomes.write().await.insert(service, result.clone());
    }
}

fn status_of(config: Option<&KeyConfig>, outcome: Option<&ValidationResult>) -> ServiceStatus {
    let Some(config) = config.filter(|c| !c.key.is_empty()) else {
        return ServiceStatus::Unconfigured;
    };
    if !config.enabled {
        return ServiceStatus::Disabled;
    }
    match outcome {
        Some(r) if r.valid => ServiceStatus::Valid,
        Some(_) => ServiceStatus::Invalid,
        None => ServiceStatus::Unvalidated,
    }
}
