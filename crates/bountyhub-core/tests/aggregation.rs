#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use bountyhub_core::adapters::AdapterTable;
use bountyhub_core::{
    AggregateError, Aggregator, Capability, HttpSettings, KeyRegistry, ServiceClient, ServiceId,
};
use bountyhub_storage::MemoryBackend;
use serde_json::{Value, json};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn aggregator(settings: &HttpSettings, keys: &[(ServiceId, &str)]) -> Aggregator {
    let registry = Arc::new(KeyRegistry::new(Arc::new(MemoryBackend::new())));
    for (service, key) in keys {
        registry.save(*service, key).await.unwrap();
    }
    let client = Arc::new(ServiceClient::new(settings).unwrap());
    Aggregator::new(registry, client, Arc::new(AdapterTable::builtin()))
}

fn hackerone_programs() -> Value {
    json!({ "data": [
        {
            "id": "10",
            "attributes": {
                "handle": "acme",
                "name": "Acme",
                "offers_bounties": true,
                "started_accepting_at": "2024-03-01T00:00:00Z"
            }
        },
        {
            "id": "11",
            "attributes": {
                "handle": "globex",
                "name": "Globex",
                "started_accepting_at": "2024-01-01T00:00:00Z"
            }
        },
        {
            "id": "12",
            "attributes": { "handle": "initech", "name": "Initech" }
        }
    ]})
}

fn bugcrowd_programs() -> Value {
    json!({ "data": [
        {
            "id": "bc-1",
            "attributes": {
                "name": "Umbrella",
                "code": "umbrella",
                "min_rewards": 100,
                "max_rewards": 5000,
                "updated_at": "2024-02-01T00:00:00Z"
            }
        }
    ]})
}

fn ids(items: &[bountyhub_core::AggregatedItem]) -> Vec<&str> {
    items.iter().map(|i| i.id.as_deref().unwrap()).collect()
}

#[tokio::test]
async fn test_programs_merge_newest_first() {
    let hackerone = MockServer::start().await;
    let bugcrowd = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/hackers/programs"))
        .and(header("Authorization", "Bearer h1-abcdef123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(hackerone_programs()))
        .expect(1)
        .mount(&hackerone)
        .await;
    Mock::given(method("GET"))
        .and(path("/programs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(bugcrowd_programs()))
        .expect(1)
        .mount(&bugcrowd)
        .await;

    let settings = HttpSettings::default()
        .with_base_url(ServiceId::HackerOne, hackerone.uri())
        .with_base_url(ServiceId::Bugcrowd, bugcrowd.uri());
    let aggregator = aggregator(
        &settings,
        &[
            (ServiceId::HackerOne, "h1-abcdef123"),
            (ServiceId::Bugcrowd, "bc-token-0123456"),
        ],
    )
    .await;

    let items = aggregator.programs().await.unwrap();

    // Undated items go last.
    assert_eq!(ids(&items), vec!["10", "bc-1", "11", "12"]);
    assert_eq!(items[1].source, ServiceId::Bugcrowd);
    assert_eq!(items[1].bounty_range.as_deref(), Some("$100 - $5000"));
    assert_eq!(items[0].url.as_deref(), Some("https://hackerone.com/acme"));
}

#[tokio::test]
async fn test_equal_timestamps_keep_catalog_order() {
    let hackerone = MockServer::start().await;
    let bugcrowd = MockServer::start().await;

    // HackerOne answers last but still comes first on a tie.
    Mock::given(method("GET"))
        .and(path("/hackers/programs"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(200))
                .set_body_json(json!({ "data": [
                    {
                        "id": "20",
                        "attributes": {
                            "handle": "acme",
                            "name": "Acme",
                            "started_accepting_at": "2024-04-01T00:00:00Z"
                        }
                    },
                    {
                        "id": "21",
                        "attributes": {
                            "handle": "globex",
                            "name": "Globex",
                            "started_accepting_at": "2024-04-01T00:00:00Z"
                        }
                    }
                ]})),
        )
        .mount(&hackerone)
        .await;
    Mock::given(method("GET"))
        .and(path("/programs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [
            {
                "id": "bc-20",
                "attributes": {
                    "name": "Umbrella",
                    "code": "umbrella",
                    "updated_at": "2024-04-01T00:00:00Z"
                }
            }
        ]})))
        .mount(&bugcrowd)
        .await;

    let settings = HttpSettings::default()
        .with_base_url(ServiceId::HackerOne, hackerone.uri())
        .with_base_url(ServiceId::Bugcrowd, bugcrowd.uri());
    let aggregator = aggregator(
        &settings,
        &[
            (ServiceId::Bugcrowd, "bc-token-0123456"),
            (ServiceId::HackerOne, "h1-abcdef123"),
        ],
    )
    .await;

    let items = aggregator.programs().await.unwrap();
    assert_eq!(ids(&items), vec!["20", "21", "bc-20"]);
    assert_eq!(items[0].timestamp, items[2].timestamp);
    assert_eq!(items[2].source, ServiceId::Bugcrowd);
}

#[tokio::test]
async fn test_failed_source_is_dropped() {
    let hackerone = MockServer::start().await;
    let bugcrowd = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/hackers/programs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(hackerone_programs()))
        .mount(&hackerone)
        .await;
    Mock::given(method("GET"))
        .and(path("/programs"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&bugcrowd)
        .await;

    let settings = HttpSettings::default()
        .with_base_url(ServiceId::HackerOne, hackerone.uri())
        .with_base_url(ServiceId::Bugcrowd, bugcrowd.uri());
    let aggregator = aggregator(
        &settings,
        &[
            (ServiceId::HackerOne, "h1-abcdef123"),
            (ServiceId::Bugcrowd, "bc-token-0123456"),
        ],
    )
    .await;

    // Intigriti has no key and Bugcrowd errors; HackerOne alone still answers.
    let items = aggregator.programs().await.unwrap();
    assert_eq!(ids(&items), vec!["10", "11", "12"]);
    assert!(items.iter().all(|i| i.source == ServiceId::HackerOne));
}

#[tokio::test]
async fn test_all_sources_failing_is_an_error() {
    let nvd = MockServer::start().await;
    let github = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/cves/2.0"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&nvd)
        .await;
    Mock::given(method("GET"))
        .and(path("/advisories"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&github)
        .await;

    let settings = HttpSettings::default()
        .with_base_url(ServiceId::Nvd, nvd.uri())
        .with_base_url(ServiceId::GitHub, github.uri());
    let aggregator = aggregator(
        &settings,
        &[
            (ServiceId::Nvd, "nvd-key-0001"),
            (ServiceId::GitHub, "ghp_0123456789"),
        ],
    )
    .await;

    let err = aggregator.threat_feed().await.unwrap_err();
    assert!(err
        .to_string()
        .starts_with("Failed to fetch threat feed from all platforms"));

    let AggregateError::AllSourcesFailed {
        capability,
        failures,
    } = err;
    assert_eq!(capability, Capability::ThreatFeed);
    assert_eq!(failures.len(), 3);
    assert_eq!(failures[0].service, ServiceId::Nvd);
    assert_eq!(failures[0].reason, "HTTP 403: Forbidden");
    assert!(failures[2].reason.contains("invalid JSON"));
}

#[tokio::test]
async fn test_threat_feed_uses_api_key_headers() {
    let nvd = MockServer::start().await;
    let otx = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/cves/2.0"))
        .and(header("apiKey", "nvd-key-0001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "totalResults": 1,
            "vulnerabilities": [{ "cve": {
                "id": "CVE-2024-0001",
                "published": "2024-05-01T10:00:00.000",
                "descriptions": [{ "lang": "en", "value": "Heap overflow" }]
            }}]
        })))
        .expect(1)
        .mount(&nvd)
        .await;
    Mock::given(method("GET"))
        .and(path("/pulses/subscribed"))
        .and(header("X-OTX-API-KEY", "otx-key-abcdef12"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{
                "id": "p1",
                "name": "Botnet C2",
                "modified": "2024-06-01T00:00:00"
            }]
        })))
        .expect(1)
        .mount(&otx)
        .await;

    let settings = HttpSettings::default()
        .with_base_url(ServiceId::Nvd, nvd.uri())
        .with_base_url(ServiceId::AlienVaultOtx, otx.uri());
    let aggregator = aggregator(
        &settings,
        &[
            (ServiceId::Nvd, "nvd-key-0001"),
            (ServiceId::AlienVaultOtx, "otx-key-abcdef12"),
        ],
    )
    .await;

    let items = aggregator.aggregate(Capability::ThreatFeed).await.unwrap();
    assert_eq!(ids(&items), vec!["p1", "CVE-2024-0001"]);
    assert_eq!(items[1].source, ServiceId::Nvd);
}
