//! HackerOne hacker API.

use serde_json::Value;

use super::{array_at, bool_at, i64_at, str_at, time_at, Rejected, ServiceAdapter};
use crate::model::{AggregatedItem, KeyMetadata};
use crate::service::{Capability, ServiceId};

#[derive(Debug, Clone, Copy, Default)]
pub struct HackerOneAdapter;

impl ServiceAdapter for HackerOneAdapter {
    fn service(&self) -> ServiceId {
        ServiceId::HackerOne
    }

    /// `/hackers/me` must carry an `id`.
    fn parse_identity(&self, body: &Value) -> Result<KeyMetadata, Rejected> {
        if body.get("id").is_none() {
            return Err(Rejected::missing(self.service(), "id"));
        }
        Ok(KeyMetadata {
            username: str_at(body, "/attributes/username"),
            reputation: i64_at(body, "/attributes/reputation"),
            ..KeyMetadata::default()
        })
    }

    fn feed_path(&self, capability: Capability) -> Option<&'static str> {
        match capability {
            Capability::Programs => Some("/hackers/programs?page[size]=10"),
            Capability::ThreatFeed => None,
        }
    }

    fn map_items(&self, capability: Capability, body: &Value) -> Vec<AggregatedItem> {
        if capability != Capability::Programs {
            return Vec::new();
        }
        array_at(body, "/data")
            .iter()
            .map(|program| {
                let handle = str_at(program, "/attributes/handle");
                let offers_bounties = bool_at(program, "/attributes/offers_bounties");
                let mut tags = Vec::new();
                if offers_bounties {
                    tags.push("bounty".to_owned());
                }
                if let Some(state) = str_at(program, "/attributes/submission_state") {
                    tags.push(state);
                }
                AggregatedItem {
                    id: str_at(program, "/id"),
                    title: str_at(program, "/attributes/name"),
                    bounty_range: offers_bounties.then(|| "bounties offered".to_owned()),
                    url: handle.map(|h| format!("https://hackerone.com/{h}")),
                    timestamp: time_at(program, "/attributes/started_accepting_at"),
                    tags,
                    ..AggregatedItem::from_source(ServiceId::HackerOne)
                }
            })
            .collect()
    }
}
