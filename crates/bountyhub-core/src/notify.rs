//! User-facing notifications raised by the key manager.
//!
//! The manager does not know how messages reach the user. A front end plugs
//! in a [`Notifier`]; [`TracingNotifier`] forwards to the log and
//! [`MemoryNotifier`] keeps everything for later inspection.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use tracing::{error, info};

use crate::service::ServiceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Success,
    Error,
    Info,
}

/// A message for the user, optionally tied to one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceId>,
    pub message: String,
}

impl Notification {
    #[must_use]
    pub fn success(service: ServiceId, message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            service: Some(service),
            message: message.into(),
        }
    }

    /// `"<Service>: <error>"`, with the error text passed through untouched.
    #[must_use]
    pub fn service_error(service: ServiceId, error: &str) -> Self {
        Self {
            level: NotificationLevel::Error,
            service: Some(service),
            message: format!("{}: {error}", service.display_name()),
        }
    }

    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            service: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Sink for notifications. Implementations must be safe to share across
/// async tasks and must not block.
pub trait Notifier: Send + Sync {
    /// The sink's name, for diagnostics.
    fn name(&self) -> &str;

    fn notify(&self, notification: Notification);
}

/// Forwards notifications to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn name(&self) -> &str {
        "tracing"
    }

    fn notify(&self, notification: Notification) {
        let service = notification.service.map(ServiceId::as_str);
        match notification.level {
            NotificationLevel::Error => {
                error!(service, message = %notification.message, "notification");
            }
            NotificationLevel::Success | NotificationLevel::Info => {
                info!(service, message = %notification.message, "notification");
            }
        }
    }
}

/// Collects notifications in memory.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    seen: Mutex<Vec<Notification>>,
}

impl MemoryNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything received so far, oldest first.
    pub fn notifications(&self) -> Vec<Notification> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Remove and return everything received so far.
    pub fn drain(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.seen.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Notifier for MemoryNotifier {
    fn name(&self) -> &str {
        "memory"
    }

    fn notify(&self, notification: Notification) {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
    }
}
