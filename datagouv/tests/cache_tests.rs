use datagouv::ExceptionCache;
use serde_json::json;
use std::collections::HashSet;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client() -> reqwest::Client {
    reqwest::Client::new()
}

fn base_url(server: &MockServer) -> String {
    format!("{}/", server.uri())
}

fn ids(values: &[&str]) -> HashSet<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[tokio::test]
async fn fetch_uses_cache_within_ttl() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/resources-exceptions/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{"resource_id": "res-1"}])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let cache = ExceptionCache::new(Duration::from_secs(300));
    let first = cache.fetch(&client(), &base_url(&server), false).await.unwrap();
    let second = cache.fetch(&client(), &base_url(&server), false).await.unwrap();

    assert_eq!(first, ids(&["res-1"]));
    assert_eq!(second, ids(&["res-1"]));
    // the expect(1) on the mock verifies no second upstream call happened
}

#[tokio::test]
async fn fetch_refetches_after_expiry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/resources-exceptions/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{"resource_id": "res-1"}])),
        )
        .expect(2)
        .mount(&server)
        .await;

    let cache = ExceptionCache::new(Duration::ZERO);
    cache.fetch(&client(), &base_url(&server), false).await.unwrap();
    cache.fetch(&client(), &base_url(&server), false).await.unwrap();
}

#[tokio::test]
async fn force_refresh_bypasses_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/resources-exceptions/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{"resource_id": "res-1"}])),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/resources-exceptions/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{"resource_id": "res-2"}])),
        )
        .mount(&server)
        .await;

    let cache = ExceptionCache::new(Duration::from_secs(300));
    let first = cache.fetch(&client(), &base_url(&server), false).await.unwrap();
    let refreshed = cache.fetch(&client(), &base_url(&server), true).await.unwrap();

    assert_eq!(first, ids(&["res-1"]));
    assert_eq!(refreshed, ids(&["res-2"]));
}

#[tokio::test]
async fn failed_refresh_returns_stale_value() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/resources-exceptions/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{"resource_id": "res-1"}])),
        )
        .mount(&server)
        .await;

    let cache = ExceptionCache::new(Duration::from_secs(300));
    let cached = cache.fetch(&client(), &base_url(&server), false).await.unwrap();
    assert_eq!(cached, ids(&["res-1"]));

    // nothing listens on port 1; the forced refresh cannot succeed
    let stale = cache
        .fetch(&client(), "http://127.0.0.1:1/", true)
        .await
        .unwrap();
    assert_eq!(stale, ids(&["res-1"]));
}

#[tokio::test]
async fn failed_fetch_without_prior_value_propagates() {
    let cache = ExceptionCache::new(Duration::from_secs(300));
    let result = cache.fetch(&client(), "http://127.0.0.1:1/", false).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn upstream_http_error_also_falls_back_to_stale() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/resources-exceptions/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{"resource_id": "res-1"}])),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/resources-exceptions/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let cache = ExceptionCache::new(Duration::from_secs(300));
    let cached = cache.fetch(&client(), &base_url(&server), false).await.unwrap();
    let stale = cache.fetch(&client(), &base_url(&server), true).await.unwrap();

    assert_eq!(cached, stale);
}

#[tokio::test]
async fn clear_resets_to_uninitialized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/resources-exceptions/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{"resource_id": "res-1"}])),
        )
        .expect(2)
        .mount(&server)
        .await;

    let cache = ExceptionCache::new(Duration::from_secs(300));
    cache.fetch(&client(), &base_url(&server), false).await.unwrap();
    cache.clear();
    cache.fetch(&client(), &base_url(&server), false).await.unwrap();
}

#[tokio::test]
async fn records_without_resource_id_are_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/resources-exceptions/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"resource_id": "res-1", "reason": "too wide"},
            {"table_name": "not-a-resource"},
        ])))
        .mount(&server)
        .await;

    let cache = ExceptionCache::new(Duration::from_secs(300));
    let result = cache.fetch(&client(), &base_url(&server), false).await.unwrap();
    assert_eq!(result, ids(&["res-1"]));
}
