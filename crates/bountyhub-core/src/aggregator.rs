//! Settle-all fan-out across every service offering a capability.
//!
//! Each source is queried concurrently. A failing source (no key, transport
//! error, bad status, bad JSON) is logged and dropped; the rest are merged
//! and sorted newest first. Only when no source succeeds does the caller see
//! an error.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::adapters::AdapterTable;
use crate::error::{AggregateError, FetchError, SourceFailure};
use crate::http::ServiceClient;
use crate::model::AggregatedItem;
use crate::registry::KeyRegistry;
use crate::service::{Capability, ServiceId};

/// Queries all enabled services for one capability and merges the results.
pub struct Aggregator {
    registry: Arc<KeyRegistry>,
    client: Arc<ServiceClient>,
    adapters: Arc<AdapterTable>,
}

impl std::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator")
            .field("adapters", &self.adapters)
            .finish_non_exhaustive()
    }
}

impl Aggregator {
    #[must_use]
    pub fn new(
        registry: Arc<KeyRegistry>,
        client: Arc<ServiceClient>,
        adapters: Arc<AdapterTable>,
    ) -> Self {
        Self {
            registry,
            client,
            adapters,
        }
    }

    /// Bug-bounty programs from every configured platform.
    ///
    /// # Errors
    ///
    /// Returns [`AggregateError::AllSourcesFailed`] if no platform answered.
    pub async fn programs(&self) -> Result<Vec<AggregatedItem>, AggregateError> {
        self.aggregate(Capability::Programs).await
    }

    /// Recent CVEs, advisories and pulses from every configured feed.
    ///
    /// # Errors
    ///
    /// Returns [`AggregateError::AllSourcesFailed`] if no feed answered.
    pub async fn threat_feed(&self) -> Result<Vec<AggregatedItem>, AggregateError> {
        self.aggregate(Capability::ThreatFeed).await
    }

    /// Fan out `capability` to every supporting service and merge.
    ///
    /// Items are ordered by timestamp, newest first. Items from different
    /// sources with equal timestamps keep catalog order; items without a
    /// timestamp go last.
    ///
    /// # Errors
    ///
    /// Returns [`AggregateError::AllSourcesFailed`] if every source failed,
    /// including when no source is configured at all.
    pub async fn aggregate(
        &self,
        capability: Capability,
    ) -> Result<Vec<AggregatedItem>, AggregateError> {
        let services = self.adapters.supporting(capability);
        debug!(capability = %capability, sources = services.len(), "starting fan-out");

        let settled = join_all(
            services
                .iter()
                .map(|&service| async move { (service, self.fetch_one(service, capability).await) }),
        )
        .await;

        let mut merged = Vec::new();
        let mut failures = Vec::new();
        let mut succeeded = 0usize;
        for (service, outcome) in settled {
            match outcome {
                Ok(items) => {
                    debug!(service = %service, items = items.len(), "source answered");
                    succeeded += 1;
                    merged.extend(items);
                }
                Err(e) => {
                    match &e {
                        FetchError::NotConfigured { .. } => {
                            debug!(service = %service, "source skipped, not configured");
                        }
                        _ => warn!(service = %service, error = %e, "source failed, dropping it"),
                    }
                    failures.push(SourceFailure {
                        service,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if succeeded == 0 {
            warn!(capability = %capability, "every source failed");
            return Err(AggregateError::AllSourcesFailed {
                capability,
                failures,
            });
        }

        // Stable sort: equal timestamps keep per-source call order.
        merged.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        info!(
            capability = %capability,
            items = merged.len(),
            succeeded,
            failed = failures.len(),
            "aggregation finished"
        );
        Ok(merged)
    }

    async fn fetch_one(
        &self,
        service: ServiceId,
        capability: Capability,
    ) -> Result<Vec<AggregatedItem>, FetchError> {
        let adapter = self
            .adapters
            .get(service)
            .ok_or(FetchError::Unsupported {
                service,
                capability,
            })?;
        let path = adapter.feed_path(capability).ok_or(FetchError::Unsupported {
            service,
            capability,
        })?;
        let key = self
            .registry
            .enabled_key(service)
            .await
            .ok_or(FetchError::NotConfigured { service })?;

        let body = self.client.get_json(service, path, &key).await?;
        Ok(adapter.map_items(capability, &body))
    }
}
