//! VirusTotal v3. Validation only; no list capability.

use serde_json::Value;

use super::{i64_at, str_at, strings_at, Rejected, ServiceAdapter};
use crate::model::KeyMetadata;
use crate::service::ServiceId;

#[derive(Debug, Clone, Copy, Default)]
pub struct VirusTotalAdapter;

impl ServiceAdapter for VirusTotalAdapter {
    fn service(&self) -> ServiceId {
        ServiceId::VirusTotal
    }

    fn parse_identity(&self, body: &Value) -> Result<KeyMetadata, Rejected> {
        let Some(user) = str_at(body, "/data/id") else {
            return Err(Rejected::missing(self.service(), "data.id"));
        };
        Ok(KeyMetadata {
            username: Some(user),
            reputation: i64_at(body, "/data/attributes/reputation"),
            tier: str_at(body, "/data/attributes/status"),
            features: strings_at(body, "/data/attributes/privileges_list"),
            ..KeyMetadata::default()
        })
    }
}
