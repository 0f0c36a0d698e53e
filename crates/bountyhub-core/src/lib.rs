//! Core library for `bountyhub`.
//!
//! Contains the static service catalog, the per-service adapters, the key
//! registry (credential lifecycle and persistence), the credential validator
//! with its short-lived result cache, the settle-all aggregator, and the
//! [`manager::KeyManager`] facade that ties them together. Persistence goes
//! through the `bountyhub-storage` trait; nothing here knows which backend is
//! behind it.

pub mod adapters;
pub mod aggregator;
pub mod auth;
pub mod error;
pub mod http;
pub mod manager;
pub mod model;
pub mod notify;
pub mod registry;
pub mod service;
pub mod validator;

pub use aggregator::Aggregator;
pub use error::{AggregateError, FetchError, RegistryError};
pub use http::{HttpSettings, ServiceClient};
pub use manager::{KeyManager, ServiceStats, ServiceStatus};
pub use model::{AggregatedItem, KeyConfig, KeyMetadata, RateLimitSnapshot, ValidationResult};
pub use notify::{MemoryNotifier, Notification, NotificationLevel, Notifier, TracingNotifier};
pub use registry::KeyRegistry;
pub use service::{Capability, ServiceId};
pub use validator::Validator;
