//! Configuration for the `bountyhub` binary.
//!
//! Loaded from `BOUNTYHUB_*` environment variables with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use bountyhub_core::{HttpSettings, ServiceId};

/// Where API keys are kept between runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageKind {
    /// In-memory; everything is forgotten when the process exits.
    Memory,
    /// Redb file on disk.
    Redb { path: PathBuf },
}

#[derive(Debug, Clone)]
pub struct HubConfig {
    pub storage: StorageKind,
    /// Log level filter used when `RUST_LOG` is unset.
    pub log_level: String,
    pub http: HttpSettings,
}

impl HubConfig {
    /// Load configuration from the process environment.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `BOUNTYHUB_STORAGE` | `redb` (`memory` also accepted) |
    /// | `BOUNTYHUB_STORAGE_PATH` | `./bountyhub.redb` |
    /// | `BOUNTYHUB_LOG_LEVEL` | `warn` |
    /// | `BOUNTYHUB_HTTP_TIMEOUT_SECS` | `10` |
    /// | `BOUNTYHUB_VALIDATION_TTL_SECS` | `300` |
    /// | `BOUNTYHUB_<SERVICE>_URL` | the service's public API |
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let storage_path = var("BOUNTYHUB_STORAGE_PATH")
            .map_or_else(|| PathBuf::from("./bountyhub.redb"), PathBuf::from);

        let storage = match var("BOUNTYHUB_STORAGE")
            .unwrap_or_else(|| "redb".to_owned())
            .to_lowercase()
            .as_str()
        {
            "memory" => StorageKind::Memory,
            _ => StorageKind::Redb { path: storage_path },
        };

        let log_level = var("BOUNTYHUB_LOG_LEVEL").unwrap_or_else(|| "warn".to_owned());

        let secs = |name: &str, default: u64| {
            var(name)
                .and_then(|v| v.trim().parse().ok())
                .map_or(Duration::from_secs(default), Duration::from_secs)
        };

        let mut http = HttpSettings {
            timeout: secs("BOUNTYHUB_HTTP_TIMEOUT_SECS", 10),
            validation_ttl: secs("BOUNTYHUB_VALIDATION_TTL_SECS", 300),
            ..HttpSettings::default()
        };
        for service in ServiceId::ALL {
            if let Some(url) = var(&format!("BOUNTYHUB_{}_URL", service.as_str())) {
                http = http.with_base_url(service, url);
            }
        }

        Self {
            storage,
            log_level,
            http,
        }
    }
}
