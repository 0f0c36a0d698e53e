#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use bountyhub_core::adapters::AdapterTable;
use bountyhub_core::notify::NotificationLevel;
use bountyhub_core::{
    HttpSettings, KeyManager, KeyRegistry, MemoryNotifier, ServiceClient, ServiceId,
    ServiceStatus, Validator,
};
use bountyhub_storage::MemoryBackend;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Hub {
    registry: Arc<KeyRegistry>,
    notifier: Arc<MemoryNotifier>,
    manager: KeyManager,
}

fn validator(settings: &HttpSettings, ttl: Duration) -> Arc<Validator> {
    let client = Arc::new(ServiceClient::new(settings).unwrap());
    Arc::new(Validator::new(client, Arc::new(AdapterTable::builtin()), ttl))
}

fn hub(settings: &HttpSettings) -> Hub {
    let registry = Arc::new(KeyRegistry::new(Arc::new(MemoryBackend::new())));
    let notifier = Arc::new(MemoryNotifier::new());
    let manager = KeyManager::new(
        Arc::clone(&registry),
        validator(settings, Duration::from_secs(300)),
        notifier.clone(),
    );
    Hub {
        registry,
        notifier,
        manager,
    }
}

#[tokio::test]
async fn test_hackerone_key_is_saved_and_validated() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/hackers/me"))
        .and(header("Authorization", "Bearer h1-abcdef123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "u1",
            "attributes": { "username": "alice", "reputation": 42 }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let settings = HttpSettings::default().with_base_url(ServiceId::HackerOne, mock_server.uri());
    let hub = hub(&settings);

    let result = hub
        .manager
        .save_api_key(ServiceId::HackerOne, "h1-abcdef123")
        .await
        .unwrap();

    assert!(result.valid);
    assert_eq!(result.error, None);
    let metadata = result.metadata.unwrap();
    assert_eq!(metadata.username.as_deref(), Some("alice"));
    assert_eq!(metadata.reputation, Some(42));

    assert!(hub.registry.is_enabled(ServiceId::HackerOne).await);
    assert_eq!(
        hub.manager.service_status(ServiceId::HackerOne).await,
        ServiceStatus::Valid
    );

    let stored = hub.registry.get(ServiceId::HackerOne).await.unwrap();
    assert_eq!(stored.metadata.unwrap().username.as_deref(), Some("alice"));

    let seen = hub.notifier.notifications();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].level, NotificationLevel::Success);
    assert_eq!(seen[0].message, "HackerOne API key saved and validated");
}

#[tokio::test]
async fn test_rejected_key_is_kept_and_flagged() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api-info"))
        .and(header("X-API-Key", "shodan-bad-key"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&mock_server)
        .await;

    let settings = HttpSettings::default().with_base_url(ServiceId::Shodan, mock_server.uri());
    let hub = hub(&settings);

    let result = hub
        .manager
        .save_api_key(ServiceId::Shodan, "shodan-bad-key")
        .await
        .unwrap();

    assert!(!result.valid);
    assert_eq!(result.error.as_deref(), Some("HTTP 401: Unauthorized"));

    // The key stays stored and enabled; only its status says it is bad.
    assert!(hub.registry.is_enabled(ServiceId::Shodan).await);
    assert_eq!(
        hub.manager.service_status(ServiceId::Shodan).await,
        ServiceStatus::Invalid
    );

    let seen = hub.notifier.notifications();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].level, NotificationLevel::Error);
    assert!(seen[0].message.contains("Shodan"));
    assert!(seen[0].message.contains("HTTP 401: Unauthorized"));
}

#[tokio::test]
async fn test_blank_key_is_refused_with_notification() {
    let hub = hub(&HttpSettings::default());

    let err = hub
        .manager
        .save_api_key(ServiceId::GitHub, "   ")
        .await
        .unwrap_err();

    assert!(err.to_string().contains("empty API key"));
    assert!(hub.registry.get(ServiceId::GitHub).await.is_none());
    assert_eq!(hub.notifier.notifications()[0].level, NotificationLevel::Error);
}

#[tokio::test]
async fn test_unaccepted_body_is_invalid() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "hi" })))
        .mount(&mock_server)
        .await;

    let settings = HttpSettings::default().with_base_url(ServiceId::GitHub, mock_server.uri());
    let validator = validator(&settings, Duration::from_secs(300));

    let result = validator.validate(ServiceId::GitHub, "ghp_0123456789").await;
    assert!(!result.valid);
    assert!(result.error.unwrap().contains("login"));
}

#[tokio::test]
async fn test_non_json_body_is_invalid() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/me"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&mock_server)
        .await;

    let settings =
        HttpSettings::default().with_base_url(ServiceId::VirusTotal, mock_server.uri());
    let validator = validator(&settings, Duration::from_secs(300));

    let result = validator.validate(ServiceId::VirusTotal, "vt-key-0123456789").await;
    assert!(!result.valid);
    assert!(result.error.unwrap().contains("invalid JSON"));
}

#[tokio::test]
async fn test_unreachable_service_is_invalid() {
    let settings = HttpSettings {
        timeout: Duration::from_secs(2),
        ..HttpSettings::default()
    }
    .with_base_url(ServiceId::Nvd, "http://127.0.0.1:9");
    let validator = validator(&settings, Duration::from_secs(300));

    let result = validator.validate(ServiceId::Nvd, "nvd-key-0001").await;
    assert!(!result.valid);
    assert!(result.error.unwrap().contains("NVD"));
}

#[tokio::test]
async fn test_rate_limit_headers_are_captured() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/user"))
        .and(header("Authorization", "Bearer ghp_0123456789"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-ratelimit-limit", "5000")
                .insert_header("x-ratelimit-remaining", "4321")
                .set_body_json(json!({ "login": "octocat" })),
        )
        .mount(&mock_server)
        .await;

    let settings = HttpSettings::default().with_base_url(ServiceId::GitHub, mock_server.uri());
    let validator = validator(&settings, Duration::from_secs(300));

    let result = validator.validate(ServiceId::GitHub, "ghp_0123456789").await;
    assert!(result.valid);
    let limits = result.rate_limit.unwrap();
    assert_eq!(limits.requests_per_hour, Some(5000));
    assert_eq!(limits.remaining, Some(4321));
    assert_eq!(limits.reset_time, None);
}

#[tokio::test]
async fn test_cached_result_skips_network() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/me"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "username": "analyst" })),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let settings =
        HttpSettings::default().with_base_url(ServiceId::AlienVaultOtx, mock_server.uri());
    let validator = validator(&settings, Duration::from_secs(300));

    let first = validator.validate(ServiceId::AlienVaultOtx, "otx-key-abcdef12").await;
    // Same service, same last eight characters.
    let second = validator.validate(ServiceId::AlienVaultOtx, "other-abcdef12").await;

    assert!(first.valid);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_expired_cache_is_checked_again() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/me"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "username": "analyst" })),
        )
        .expect(2)
        .mount(&mock_server)
        .await;

    let settings =
        HttpSettings::default().with_base_url(ServiceId::AlienVaultOtx, mock_server.uri());
    let validator = validator(&settings, Duration::ZERO);

    validator.validate(ServiceId::AlienVaultOtx, "otx-key-abcdef12").await;
    validator.validate(ServiceId::AlienVaultOtx, "otx-key-abcdef12").await;
}

#[tokio::test]
async fn test_resaving_a_key_checks_it_again() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/me"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "username": "analyst" })),
        )
        .expect(2)
        .mount(&mock_server)
        .await;

    let settings =
        HttpSettings::default().with_base_url(ServiceId::AlienVaultOtx, mock_server.uri());
    let hub = hub(&settings);

    for _ in 0..2 {
        let result = hub
            .manager
            .save_api_key(ServiceId::AlienVaultOtx, "otx-key-abcdef12")
            .await
            .unwrap();
        assert!(result.valid);
    }
}

#[tokio::test]
async fn test_refresh_drops_cached_results() {
    let mock_server = MockServer::start().await;

    // Save and refresh go to the network; both validate calls hit the cache.
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "username": "analyst" })),
        )
        .expect(2)
        .mount(&mock_server)
        .await;

    let settings =
        HttpSettings::default().with_base_url(ServiceId::AlienVaultOtx, mock_server.uri());
    let hub = hub(&settings);

    hub.manager
        .save_api_key(ServiceId::AlienVaultOtx, "otx-key-abcdef12")
        .await
        .unwrap();
    assert!(hub
        .manager
        .validate_api_key(ServiceId::AlienVaultOtx)
        .await
        .unwrap()
        .valid);

    let refreshed = hub.manager.refresh_all_keys().await;
    assert_eq!(refreshed.len(), 1);
    assert!(refreshed[0].1.valid);

    assert!(hub
        .manager
        .validate_api_key(ServiceId::AlienVaultOtx)
        .await
        .unwrap()
        .valid);
}

#[tokio::test]
async fn test_refresh_skips_disabled_services() {
    let github = MockServer::start().await;
    let otx = MockServer::start().await;

    // One probe on save, one more on refresh.
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "login": "octocat" })))
        .expect(2)
        .mount(&github)
        .await;
    // Only the probe on save.
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "username": "analyst" })),
        )
        .expect(1)
        .mount(&otx)
        .await;

    let settings = HttpSettings::default()
        .with_base_url(ServiceId::GitHub, github.uri())
        .with_base_url(ServiceId::AlienVaultOtx, otx.uri());
    let hub = hub(&settings);

    hub.manager
        .save_api_key(ServiceId::GitHub, "ghp_0123456789")
        .await
        .unwrap();
    hub.manager
        .save_api_key(ServiceId::AlienVaultOtx, "otx-key-abcdef12")
        .await
        .unwrap();
    assert!(!hub
        .manager
        .toggle_api_key(ServiceId::AlienVaultOtx)
        .await
        .unwrap());

    let refreshed = hub.manager.refresh_all_keys().await;
    assert_eq!(refreshed.len(), 1);
    assert_eq!(refreshed[0].0, ServiceId::GitHub);
    assert!(refreshed[0].1.valid);

    let stats = hub.manager.service_stats().await;
    assert_eq!(stats.total, 8);
    assert_eq!(stats.configured, 2);
    assert_eq!(stats.enabled, 1);
    assert_eq!(stats.valid, 1);
    assert_eq!(
        hub.manager.service_status(ServiceId::AlienVaultOtx).await,
        ServiceStatus::Disabled
    );
}

#[tokio::test]
async fn test_remove_forgets_key_and_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "id": "b1" } })))
        .mount(&mock_server)
        .await;

    let settings = HttpSettings::default().with_base_url(ServiceId::Bugcrowd, mock_server.uri());
    let hub = hub(&settings);

    hub.manager
        .save_api_key(ServiceId::Bugcrowd, "bc-token-0123456")
        .await
        .unwrap();
    assert!(hub.manager.remove_api_key(ServiceId::Bugcrowd).await.unwrap());

    assert_eq!(hub.registry.api_key(ServiceId::Bugcrowd).await, None);
    assert_eq!(
        hub.manager.service_status(ServiceId::Bugcrowd).await,
        ServiceStatus::Unconfigured
    );
    assert!(hub
        .manager
        .validate_api_key(ServiceId::Bugcrowd)
        .await
        .is_err());
}
