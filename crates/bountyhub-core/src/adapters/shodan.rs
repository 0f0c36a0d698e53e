//! Shodan. Validation only; no list capability.

use serde_json::Value;

use super::{bool_at, str_at, Rejected, ServiceAdapter};
use crate::model::KeyMetadata;
use crate::service::ServiceId;

#[derive(Debug, Clone, Copy, Default)]
pub struct ShodanAdapter;

impl ServiceAdapter for ShodanAdapter {
    fn service(&self) -> ServiceId {
        ServiceId::Shodan
    }

    /// `/api-info` must carry a `plan`.
    fn parse_identity(&self, body: &Value) -> Result<KeyMetadata, Rejected> {
        let Some(plan) = str_at(body, "/plan") else {
            return Err(Rejected::missing(self.service(), "plan"));
        };
        let features = ["unlocked", "https", "telnet"]
            .into_iter()
            .filter(|flag| bool_at(body, &format!("/{flag}")))
            .map(str::to_owned)
            .collect();
        Ok(KeyMetadata {
            tier: Some(plan),
            features,
            ..KeyMetadata::default()
        })
    }
}
