//! Shared HTTP plumbing for every outbound call.
//!
//! One `reqwest::Client` carries the fixed `User-Agent`, the
//! `Accept: application/json` header and the request timeout, so every
//! validator probe and aggregator fetch gets the same treatment.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;

use crate::auth::AuthStrategy;
use crate::error::FetchError;
use crate::model::RateLimitSnapshot;
use crate::service::ServiceId;

pub const DEFAULT_USER_AGENT: &str = concat!("bountyhub/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_VALIDATION_TTL: Duration = Duration::from_secs(300);

/// Reset headers below this are relative seconds, above it Unix timestamps.
const RELATIVE_RESET_CUTOFF: i64 = 1_000_000_000;

/// HTTP-level settings for the validator and the aggregator.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Sent on every request.
    pub user_agent: String,
    /// Applied to every request. Default: 10 seconds.
    pub timeout: Duration,
    /// How long a validation result is reused. Default: 5 minutes.
    pub validation_ttl: Duration,
    /// Per-service replacements for the descriptor base URL.
    pub base_urls: HashMap<ServiceId, String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            timeout: DEFAULT_TIMEOUT,
            validation_ttl: DEFAULT_VALIDATION_TTL,
            base_urls: HashMap::new(),
        }
    }
}

impl HttpSettings {
    /// Point one service at a different base URL (mirrors, proxies, tests).
    #[must_use]
    pub fn with_base_url(mut self, service: ServiceId, url: impl Into<String>) -> Self {
        self.base_urls.insert(service, url.into());
        self
    }
}

/// HTTP client that knows how to address and authenticate each service.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    http: reqwest::Client,
    base_urls: HashMap<ServiceId, String>,
}

impl ServiceClient {
    /// Build the shared client.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] if the TLS backend cannot be initialized.
    pub fn new(settings: &HttpSettings) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .user_agent(settings.user_agent.as_str())
            .default_headers(headers)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            http,
            base_urls: settings.base_urls.clone(),
        })
    }

    /// Effective base URL for a service, without a trailing slash.
    #[must_use]
    pub fn base_url(&self, service: ServiceId) -> &str {
        self.base_urls
            .get(&service)
            .map_or(service.descriptor().base_url, String::as_str)
            .trim_end_matches('/')
    }

    /// Issue an authenticated GET and hand back the raw response.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Network`] if the request could not be completed.
    pub async fn get(
        &self,
        service: ServiceId,
        path: &str,
        key: &str,
    ) -> Result<reqwest::Response, FetchError> {
        let url = format!("{}{}", self.base_url(service), path);
        let auth = AuthStrategy::for_scheme(service.descriptor().auth, key);
        debug!(service = %service, url = %url, auth = ?auth, "sending request");

        auth.apply(self.http.get(&url))
            .send()
            .await
            .map_err(|source| FetchError::Network { service, source })
    }

    /// GET a path and parse the 2xx body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Status`] on a non-2xx answer,
    /// [`FetchError::Json`] if the body is not JSON, or
    /// [`FetchError::Network`] on transport failure.
    pub async fn get_json(
        &self,
        service: ServiceId,
        path: &str,
        key: &str,
    ) -> Result<Value, FetchError> {
        let resp = self.get(service, path, key).await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(status_error(status));
        }
        read_json(service, resp).await
    }
}

/// `HTTP <code>: <reason>` as shown to the user.
pub(crate) fn status_error(status: StatusCode) -> FetchError {
    FetchError::Status {
        status: status.as_u16(),
        reason: status
            .canonical_reason()
            .unwrap_or("Unknown Status")
            .to_owned(),
    }
}

pub(crate) async fn read_json(
    service: ServiceId,
    resp: reqwest::Response,
) -> Result<Value, FetchError> {
    let text = resp
        .text()
        .await
        .map_err(|source| FetchError::Network { service, source })?;
    serde_json::from_str(&text).map_err(|e| FetchError::Json {
        service,
        reason: e.to_string(),
    })
}

/// Read `X-RateLimit-*` (or `X-Rate-Limit-*`) headers.
///
/// Returns `None` when none of the three headers is present; missing
/// individual headers stay `None` rather than defaulting.
#[must_use]
pub fn rate_limit_from_headers(headers: &HeaderMap) -> Option<RateLimitSnapshot> {
    let snapshot = RateLimitSnapshot {
        requests_per_hour: header_number(headers, "limit").and_then(|v| u64::try_from(v).ok()),
        remaining: header_number(headers, "remaining").and_then(|v| u64::try_from(v).ok()),
        reset_time: header_number(headers, "reset").and_then(reset_to_time),
    };
    if snapshot == RateLimitSnapshot::default() {
        None
    } else {
        Some(snapshot)
    }
}

// Some services send fractional seconds.
#[allow(clippy::cast_possible_truncation)]
fn header_number(headers: &HeaderMap, suffix: &str) -> Option<i64> {
    [
        format!("x-ratelimit-{suffix}"),
        format!("x-rate-limit-{suffix}"),
    ]
    .iter()
    .find_map(|name| headers.get(name.as_str()))
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.trim().parse::<f64>().ok())
    .map(|v| v.trunc() as i64)
}

fn reset_to_time(value: i64) -> Option<DateTime<Utc>> {
    if value < RELATIVE_RESET_CUTOFF {
        Utc::now().checked_add_signed(chrono::TimeDelta::try_seconds(value)?)
    } else {
        DateTime::from_timestamp(value, 0)
    }
}
