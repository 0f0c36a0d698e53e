//! AlienVault Open Threat Exchange.

use serde_json::Value;

use super::{array_at, str_at, strings_at, time_at, Rejected, ServiceAdapter};
use crate::model::{AggregatedItem, KeyMetadata};
use crate::service::{Capability, ServiceId};

#[derive(Debug, Clone, Copy, Default)]
pub struct OtxAdapter;

impl ServiceAdapter for OtxAdapter {
    fn service(&self) -> ServiceId {
        ServiceId::AlienVaultOtx
    }

    fn parse_identity(&self, body: &Value) -> Result<KeyMetadata, Rejected> {
        let Some(username) = str_at(body, "/username") else {
            return Err(Rejected::missing(self.service(), "username"));
        };
        Ok(KeyMetadata {
            username: Some(username),
            ..KeyMetadata::default()
        })
    }

    fn feed_path(&self, capability: Capability) -> Option<&'static str> {
        match capability {
            Capability::ThreatFeed => Some("/pulses/subscribed?limit=10"),
            Capability::Programs => None,
        }
    }

    fn map_items(&self, capability: Capability, body: &Value) -> Vec<AggregatedItem> {
        if capability != Capability::ThreatFeed {
            return Vec::new();
        }
        array_at(body, "/results")
            .iter()
            .map(|pulse| {
                let id = str_at(pulse, "/id");
                let mut tags = strings_at(pulse, "/tags");
                if let Some(tlp) = str_at(pulse, "/TLP").or_else(|| str_at(pulse, "/tlp")) {
                    tags.push(format!("tlp:{tlp}"));
                }
                AggregatedItem {
                    url: id
                        .as_ref()
                        .map(|id| format!("https://otx.alienvault.com/pulse/{id}")),
                    title: str_at(pulse, "/name"),
                    timestamp: time_at(pulse, "/modified").or_else(|| time_at(pulse, "/created")),
                    tags,
                    id,
                    ..AggregatedItem::from_source(ServiceId::AlienVaultOtx)
                }
            })
            .collect()
    }
}
