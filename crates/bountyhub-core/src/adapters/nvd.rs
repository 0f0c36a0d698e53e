//! NIST National Vulnerability Database, CVE API 2.0.

use serde_json::Value;

use super::{array_at, str_at, time_at, Rejected, ServiceAdapter};
use crate::model::{AggregatedItem, KeyMetadata};
use crate::service::{Capability, ServiceId};

/// Newest CVSS version first.
const CVSS_METRICS: [&str; 3] = ["cvssMetricV31", "cvssMetricV30", "cvssMetricV2"];

#[derive(Debug, Clone, Copy, Default)]
pub struct NvdAdapter;

impl ServiceAdapter for NvdAdapter {
    fn service(&self) -> ServiceId {
        ServiceId::Nvd
    }

    /// Anonymous requests also succeed, so the key counts as accepted when
    /// the search envelope comes back.
    fn parse_identity(&self, body: &Value) -> Result<KeyMetadata, Rejected> {
        if body.get("totalResults").is_none() {
            return Err(Rejected::missing(self.service(), "totalResults"));
        }
        Ok(KeyMetadata {
            features: vec!["cves".to_owned()],
            ..KeyMetadata::default()
        })
    }

    fn feed_path(&self, capability: Capability) -> Option<&'static str> {
        match capability {
            Capability::ThreatFeed => Some("/cves/2.0?resultsPerPage=10&startIndex=0&noRejected"),
            Capability::Programs => None,
        }
    }

    fn map_items(&self, capability: Capability, body: &Value) -> Vec<AggregatedItem> {
        if capability != Capability::ThreatFeed {
            return Vec::new();
        }
        array_at(body, "/vulnerabilities")
            .iter()
            .filter_map(|entry| entry.get("cve"))
            .map(|cve| {
                let id = str_at(cve, "/id");
                AggregatedItem {
                    url: id
                        .as_ref()
                        .map(|id| format!("https://nvd.nist.gov/vuln/detail/{id}")),
                    title: english_description(cve),
                    severity: severity(cve),
                    timestamp: time_at(cve, "/published"),
                    tags: weaknesses(cve),
                    id,
                    ..AggregatedItem::from_source(ServiceId::Nvd)
                }
            })
            .collect()
    }
}

fn english_description(cve: &Value) -> Option<String> {
    let descriptions = array_at(cve, "/descriptions");
    descriptions
        .iter()
        .find(|d| d.get("lang").and_then(Value::as_str) == Some("en"))
        .or_else(|| descriptions.first())
        .and_then(|d| str_at(d, "/value"))
}

fn severity(cve: &Value) -> Option<String> {
    CVSS_METRICS.iter().find_map(|metric| {
        let first = array_at(cve, &format!("/metrics/{metric}")).first()?;
        // v3.x keeps severity inside cvssData, v2 beside it.
        str_at(first, "/cvssData/baseSeverity").or_else(|| str_at(first, "/baseSeverity"))
    })
}

fn weaknesses(cve: &Value) -> Vec<String> {
    array_at(cve, "/weaknesses")
        .iter()
        .flat_map(|w| array_at(w, "/description"))
        .filter_map(|d| str_at(d, "/value"))
        .collect()
}
