//! Error types for `bountyhub-core`.
//!
//! Each variant names the service or storage key involved. Credential values
//! never appear in error messages.

use bountyhub_storage::StorageError;

use crate::service::{Capability, ServiceId};

/// Errors from key registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// No credential is stored for the service.
    #[error("no API key configured for {service}")]
    NotConfigured { service: ServiceId },

    /// The submitted key was empty after trimming.
    #[error("empty API key submitted for {service}")]
    EmptyKey { service: ServiceId },

    /// The credential map could not be encoded.
    #[error("failed to encode key registry: {reason}")]
    Serialization { reason: String },

    /// The stored entry is not a JSON object, so it is left as is.
    #[error("stored key registry is unreadable, refusing to overwrite it: {reason}")]
    Corrupt { reason: String },

    /// Concurrent writers kept changing the stored map.
    #[error("key registry update lost the race {attempts} times, giving up")]
    Contention { attempts: u32 },

    /// The storage backend returned an error.
    #[error("key registry storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Errors from a single request to one external service.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The service has no enabled, non-empty key.
    #[error("{service} is not configured")]
    NotConfigured { service: ServiceId },

    /// The service has no endpoint for the requested capability.
    #[error("{service} does not provide {capability}")]
    Unsupported {
        service: ServiceId,
        capability: Capability,
    },

    /// The service answered with a non-2xx status.
    #[error("HTTP {status}: {reason}")]
    Status { status: u16, reason: String },

    /// Connection, TLS or timeout failure.
    #[error("request to {service} failed: {source}")]
    Network {
        service: ServiceId,
        #[source]
        source: reqwest::Error,
    },

    /// The response body was not the JSON we expected.
    #[error("invalid JSON from {service}: {reason}")]
    Json { service: ServiceId, reason: String },

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// One dropped source in an aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    pub service: ServiceId,
    pub reason: String,
}

/// Errors from an aggregated fan-out.
#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    /// Every source failed; there is nothing to merge.
    #[error("Failed to fetch {capability} from all platforms ({} attempted)", .failures.len())]
    AllSourcesFailed {
        capability: Capability,
        failures: Vec<SourceFailure>,
    },
}
