//! GitHub global security advisories.

use serde_json::Value;

use super::{array_at, str_at, time_at, Rejected, ServiceAdapter};
use crate::model::{AggregatedItem, KeyMetadata};
use crate::service::{Capability, ServiceId};

#[derive(Debug, Clone, Copy, Default)]
pub struct GitHubAdapter;

impl ServiceAdapter for GitHubAdapter {
    fn service(&self) -> ServiceId {
        ServiceId::GitHub
    }

    fn parse_identity(&self, body: &Value) -> Result<KeyMetadata, Rejected> {
        let Some(login) = str_at(body, "/login") else {
            return Err(Rejected::missing(self.service(), "login"));
        };
        Ok(KeyMetadata {
            username: Some(login),
            tier: str_at(body, "/plan/name"),
            ..KeyMetadata::default()
        })
    }

    fn feed_path(&self, capability: Capability) -> Option<&'static str> {
        match capability {
            Capability::ThreatFeed => Some("/advisories?per_page=10"),
            Capability::Programs => None,
        }
    }

    fn map_items(&self, capability: Capability, body: &Value) -> Vec<AggregatedItem> {
        if capability != Capability::ThreatFeed {
            return Vec::new();
        }
        // The advisories endpoint answers with a bare array.
        let advisories = body.as_array().map_or(&[][..], Vec::as_slice);
        advisories
            .iter()
            .map(|advisory| {
                let mut tags: Vec<String> = str_at(advisory, "/cve_id").into_iter().collect();
                tags.extend(
                    array_at(advisory, "/vulnerabilities")
                        .iter()
                        .filter_map(|v| str_at(v, "/package/ecosystem")),
                );
                tags.dedup();
                AggregatedItem {
                    id: str_at(advisory, "/ghsa_id"),
                    title: str_at(advisory, "/summary"),
                    severity: str_at(advisory, "/severity"),
                    url: str_at(advisory, "/html_url"),
                    timestamp: time_at(advisory, "/published_at"),
                    tags,
                    ..AggregatedItem::from_source(ServiceId::GitHub)
                }
            })
            .collect()
    }
}
