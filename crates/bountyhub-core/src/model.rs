//! Data model shared by the registry, validator and aggregator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::service::ServiceId;

/// Rate-limit state reported by a service in its response headers.
///
/// Each field is present only if the matching header was sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests_per_hour: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_time: Option<DateTime<Utc>>,
}

/// Identity and account details harvested from a service's probe endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reputation: Option<i64>,
    /// Plan or account tier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// The stored credential record for one service.
///
/// Persisted as part of the `api_keys` map. `Debug` never prints the key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyConfig {
    pub key: String,
    pub enabled: bool,
    pub last_validated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<KeyMetadata>,
}

impl KeyConfig {
    /// A fresh, enabled record for a newly submitted key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            enabled: true,
            last_validated: Utc::now(),
            rate_limit: None,
            metadata: None,
        }
    }

    /// Enabled and holding a non-empty key. Only these are schedulable.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.enabled && !self.key.is_empty()
    }

    /// Last four characters of the key, for display and logs.
    #[must_use]
    pub fn key_hint(&self) -> String {
        key_hint(&self.key)
    }
}

impl std::fmt::Debug for KeyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyConfig")
            .field("key", &self.key_hint())
            .field("enabled", &self.enabled)
            .field("last_validated", &self.last_validated)
            .field("rate_limit", &self.rate_limit)
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// `***` followed by the last four characters, or just `***` for short keys.
#[must_use]
pub fn key_hint(key: &str) -> String {
    let count = key.chars().count();
    if count <= 8 {
        return "***".to_owned();
    }
    let tail: String = key.chars().skip(count - 4).collect();
    format!("***{tail}")
}

/// Outcome of probing one credential. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<KeyMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitSnapshot>,
}

impl ValidationResult {
    #[must_use]
    pub fn accepted(metadata: KeyMetadata, rate_limit: Option<RateLimitSnapshot>) -> Self {
        Self {
            valid: true,
            error: None,
            metadata: Some(metadata),
            rate_limit,
        }
    }

    #[must_use]
    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
            metadata: None,
            rate_limit: None,
        }
    }
}

/// One normalized entry of an aggregated listing (a program or a threat item).
///
/// Upstream payloads are mapped field by field without a schema check, so any
/// field other than `source` may be missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedItem {
    pub id: Option<String>,
    pub title: Option<String>,
    pub severity: Option<String>,
    pub bounty_range: Option<String>,
    pub source: ServiceId,
    pub url: Option<String>,
    /// Published or last-updated time, whichever the source reports.
    pub timestamp: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
}

impl AggregatedItem {
    /// An empty item attributed to `source`; adapters fill in what they find.
    #[must_use]
    pub fn from_source(source: ServiceId) -> Self {
        Self {
            id: None,
            title: None,
            severity: None,
            bounty_range: None,
            source,
            url: None,
            timestamp: None,
            tags: Vec::new(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn usable_requires_enabled_and_key() {
        let mut cfg = KeyConfig::new("h1-abcdef123");
        assert!(cfg.is_usable());
        cfg.enabled = false;
        assert!(!cfg.is_usable());
        cfg.enabled = true;
        cfg.key.clear();
        assert!(!cfg.is_usable());
    }

    #[test]
    fn debug_redacts_key() {
        let cfg = KeyConfig::new("h1-abcdef123");
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("h1-abcdef123"));
        assert!(rendered.contains("***f123"));
    }

    #[test]
    fn short_keys_are_fully_hidden() {
        assert_eq!(key_hint("abc"), "***");
    }

    #[test]
    fn key_config_uses_camel_case_fields() {
        let mut cfg = KeyConfig::new("k");
        cfg.rate_limit = Some(RateLimitSnapshot {
            requests_per_hour: Some(600),
            remaining: Some(599),
            reset_time: None,
        });
        let json = serde_json::to_value(&cfg).unwrap();
        assert!(json.get("lastValidated").is_some());
        assert_eq!(json["rateLimit"]["requestsPerHour"], 600);
        assert!(json["rateLimit"].get("resetTime").is_none());
    }
}
