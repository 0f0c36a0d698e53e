//! Bugcrowd researcher API.

use serde_json::Value;

use super::{array_at, i64_at, str_at, time_at, Rejected, ServiceAdapter};
use crate::model::{AggregatedItem, KeyMetadata};
use crate::service::{Capability, ServiceId};

#[derive(Debug, Clone, Copy, Default)]
pub struct BugcrowdAdapter;

impl ServiceAdapter for BugcrowdAdapter {
    fn service(&self) -> ServiceId {
        ServiceId::Bugcrowd
    }

    fn parse_identity(&self, body: &Value) -> Result<KeyMetadata, Rejected> {
        let Some(data) = body.get("data") else {
            return Err(Rejected::missing(self.service(), "data"));
        };
        Ok(KeyMetadata {
            username: str_at(data, "/attributes/username"),
            reputation: i64_at(data, "/attributes/points"),
            ..KeyMetadata::default()
        })
    }

    fn feed_path(&self, capability: Capability) -> Option<&'static str> {
        match capability {
            Capability::Programs => Some("/programs?page[limit]=10"),
            Capability::ThreatFeed => None,
        }
    }

    fn map_items(&self, capability: Capability, body: &Value) -> Vec<AggregatedItem> {
        if capability != Capability::Programs {
            return Vec::new();
        }
        array_at(body, "/data")
            .iter()
            .map(|program| AggregatedItem {
                id: str_at(program, "/id"),
                title: str_at(program, "/attributes/name"),
                bounty_range: bounty_range(
                    i64_at(program, "/attributes/min_rewards"),
                    i64_at(program, "/attributes/max_rewards"),
                ),
                url: str_at(program, "/attributes/code")
                    .map(|code| format!("https://bugcrowd.com/{code}")),
                timestamp: time_at(program, "/attributes/updated_at"),
                tags: str_at(program, "/attributes/industry").into_iter().collect(),
                ..AggregatedItem::from_source(ServiceId::Bugcrowd)
            })
            .collect()
    }
}

fn bounty_range(min: Option<i64>, max: Option<i64>) -> Option<String> {
    match (min, max) {
        (Some(min), Some(max)) => Some(format!("${min} - ${max}")),
        (None, Some(max)) => Some(format!("up to ${max}")),
        (Some(min), None) => Some(format!("from ${min}")),
        (None, None) => None,
    }
}
