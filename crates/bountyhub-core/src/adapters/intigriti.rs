//! Intigriti external researcher API.

use serde_json::Value;

use super::{array_at, str_at, time_at, Rejected, ServiceAdapter};
use crate::model::{AggregatedItem, KeyMetadata};
use crate::service::{Capability, ServiceId};

#[derive(Debug, Clone, Copy, Default)]
pub struct IntigritiAdapter;

impl ServiceAdapter for IntigritiAdapter {
    fn service(&self) -> ServiceId {
        ServiceId::Intigriti
    }

    /// The researcher API has no "me" endpoint; a readable program page is
    /// the proof.
    fn parse_identity(&self, body: &Value) -> Result<KeyMetadata, Rejected> {
        if body.get("records").and_then(Value::as_array).is_none() {
            return Err(Rejected::missing(self.service(), "records"));
        }
        Ok(KeyMetadata {
            features: vec!["programs".to_owned()],
            ..KeyMetadata::default()
        })
    }

    fn feed_path(&self, capability: Capability) -> Option<&'static str> {
        match capability {
            Capability::Programs => Some("/programs?limit=10"),
            Capability::ThreatFeed => None,
        }
    }

    fn map_items(&self, capability: Capability, body: &Value) -> Vec<AggregatedItem> {
        if capability != Capability::Programs {
            return Vec::new();
        }
        array_at(body, "/records")
            .iter()
            .map(|program| {
                let min = money(program, "/minBounty");
                let max = money(program, "/maxBounty");
                AggregatedItem {
                    id: str_at(program, "/id"),
                    title: str_at(program, "/name"),
                    bounty_range: match (min, max) {
                        (Some(min), Some(max)) => Some(format!("{min} - {max}")),
                        (min, max) => min.or(max),
                    },
                    url: str_at(program, "/webLinks/detail"),
                    timestamp: time_at(program, "/lastUpdatedAt"),
                    tags: [
                        str_at(program, "/confidentialityLevel/value"),
                        str_at(program, "/status/value"),
                    ]
                    .into_iter()
                    .flatten()
                    .collect(),
                    ..AggregatedItem::from_source(ServiceId::Intigriti)
                }
            })
            .collect()
    }
}

/// `{ "value": 500, "currency": "EUR" }` → `500 EUR`.
fn money(v: &Value, pointer: &str) -> Option<String> {
    let amount = v.pointer(pointer)?;
    let value = str_at(amount, "/value")?;
    Some(match str_at(amount, "/currency") {
        Some(currency) => format!("{value} {currency}"),
        None => value,
    })
}
