//! Per-service response adapters.
//!
//! Each external API gets one [`ServiceAdapter`]: it decides whether a probe
//! response proves the credential works, and it flattens the service's list
//! payloads into [`AggregatedItem`]s. Adding a service means adding one
//! adapter and registering it in [`AdapterTable::builtin`].

mod bugcrowd;
mod github;
mod hackerone;
mod intigriti;
mod nvd;
mod otx;
mod shodan;
mod virustotal;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

use crate::model::{AggregatedItem, KeyMetadata};
use crate::service::{Capability, ServiceId};

pub use bugcrowd::BugcrowdAdapter;
pub use github::GitHubAdapter;
pub use hackerone::HackerOneAdapter;
pub use intigriti::IntigritiAdapter;
pub use nvd::NvdAdapter;
pub use otx::OtxAdapter;
pub use shodan::ShodanAdapter;
pub use virustotal::VirusTotalAdapter;

/// Page size requested from every list endpoint.
pub const PAGE_SIZE: usize = 10;

/// A 2xx probe response that does not look like an authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{service} rejected the credential: {reason}")]
pub struct Rejected {
    pub service: ServiceId,
    pub reason: String,
}

impl Rejected {
    fn missing(service: ServiceId, field: &str) -> Self {
        Self {
            service,
            reason: format!("response has no `{field}` field"),
        }
    }
}

/// Service-specific knowledge of response shapes.
pub trait ServiceAdapter: Send + Sync {
    /// The service this adapter understands.
    fn service(&self) -> ServiceId;

    /// Apply the acceptance predicate to a 2xx probe body and harvest
    /// identity metadata.
    ///
    /// # Errors
    ///
    /// Returns [`Rejected`] if the body lacks the field that proves the
    /// credential was accepted.
    fn parse_identity(&self, body: &Value) -> Result<KeyMetadata, Rejected>;

    /// Path (relative to the base URL) serving `capability`, if offered.
    fn feed_path(&self, _capability: Capability) -> Option<&'static str> {
        None
    }

    /// Flatten a list response into items. Malformed entries yield items with
    /// missing fields rather than errors.
    fn map_items(&self, _capability: Capability, _body: &Value) -> Vec<AggregatedItem> {
        Vec::new()
    }
}

/// Lookup table from service to adapter.
#[derive(Clone, Default)]
pub struct AdapterTable {
    adapters: HashMap<ServiceId, Arc<dyn ServiceAdapter>>,
}

impl AdapterTable {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A table with an adapter for every service in the catalog.
    #[must_use]
    pub fn builtin() -> Self {
        let mut table = Self::new();
        table.register(Arc::new(HackerOneAdapter));
        table.register(Arc::new(BugcrowdAdapter));
        table.register(Arc::new(IntigritiAdapter));
        table.register(Arc::new(ShodanAdapter));
        table.register(Arc::new(VirusTotalAdapter));
        table.register(Arc::new(NvdAdapter));
        table.register(Arc::new(OtxAdapter));
        table.register(Arc::new(GitHubAdapter));
        table
    }

    /// Add or replace the adapter for its service.
    pub fn register(&mut self, adapter: Arc<dyn ServiceAdapter>) {
        self.adapters.insert(adapter.service(), adapter);
    }

    #[must_use]
    pub fn get(&self, service: ServiceId) -> Option<&Arc<dyn ServiceAdapter>> {
        self.adapters.get(&service)
    }

    /// Services that serve `capability`, in catalog order.
    #[must_use]
    pub fn supporting(&self, capability: Capability) -> Vec<ServiceId> {
        ServiceId::ALL
            .into_iter()
            .filter(|id| {
                self.get(*id)
                    .is_some_and(|a| a.feed_path(capability).is_some())
            })
            .collect()
    }
}

impl std::fmt::Debug for AdapterTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut services: Vec<_> = self.adapters.keys().collect();
        services.sort();
        f.debug_struct("AdapterTable")
            .field("services", &services)
            .finish()
    }
}

// ── JSON helpers shared by the adapters ──────────────────────────────

/// String at a JSON pointer; numbers are rendered as strings.
fn str_at(v: &Value, pointer: &str) -> Option<String> {
    match v.pointer(pointer)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn i64_at(v: &Value, pointer: &str) -> Option<i64> {
    v.pointer(pointer).and_then(Value::as_i64)
}

fn bool_at(v: &Value, pointer: &str) -> bool {
    v.pointer(pointer).and_then(Value::as_bool).unwrap_or(false)
}

/// Array at a JSON pointer, or an empty slice.
fn array_at<'a>(v: &'a Value, pointer: &str) -> &'a [Value] {
    v.pointer(pointer)
        .and_then(Value::as_array)
        .map_or(&[], Vec::as_slice)
}

/// Strings of an array at a JSON pointer, skipping non-strings.
fn strings_at(v: &Value, pointer: &str) -> Vec<String> {
    array_at(v, pointer)
        .iter()
        .filter_map(|t| t.as_str().map(str::to_owned))
        .collect()
}

/// Timestamp at a JSON pointer.
///
/// Accepts RFC 3339, offset-less ISO 8601 (read as UTC), and Unix seconds.
fn time_at(v: &Value, pointer: &str) -> Option<DateTime<Utc>> {
    match v.pointer(pointer)? {
        Value::String(s) => parse_time(s),
        Value::Number(n) => DateTime::from_timestamp(n.as_i64()?, 0),
        _ => None,
    }
}

fn parse_time(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|t| t.and_utc())
}
