use datagouv::{DatagouvError, tabular};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client() -> reqwest::Client {
    reqwest::Client::new()
}

fn base_url(server: &MockServer) -> String {
    format!("{}/", server.uri())
}

#[tokio::test]
async fn fetch_resource_data_clamps_pagination_values() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/resources/resource-id/data/"))
        .and(query_param("page", "1"))
        .and(query_param("page_size", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [],
            "meta": {"page": 1, "page_size": 1, "total": 0},
            "links": {},
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result =
        tabular::fetch_resource_data(&client(), &base_url(&server), "resource-id", 0, 0)
            .await
            .unwrap();

    assert_eq!(result.page, 1);
    assert_eq!(result.page_size, 1);
    assert_eq!(result.total, Some(0));
    assert!(!result.has_next);
}

#[tokio::test]
async fn fetch_resource_data_caps_page_size_at_upstream_ceiling() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/resources/resource-id/data/"))
        .and(query_param("page_size", "200"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [],
            "meta": {"page": 1, "page_size": 200, "total": 0},
            "links": {},
        })))
        .expect(1)
        .mount(&server)
        .await;

    tabular::fetch_resource_data(&client(), &base_url(&server), "resource-id", 1, 5000)
        .await
        .unwrap();
}

#[tokio::test]
async fn fetch_resource_data_maps_rows_and_next_link() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/resources/resource-id/data/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"city": "Paris", "population": 2133111},
                {"city": "Lyon", "population": 522228},
            ],
            "meta": {"page": 1, "page_size": 2, "total": 34945},
            "links": {"next": "https://tabular-api.example/next"},
        })))
        .mount(&server)
        .await;

    let result =
        tabular::fetch_resource_data(&client(), &base_url(&server), "resource-id", 1, 2)
            .await
            .unwrap();

    assert_eq!(result.rows.len(), 2);
    assert_eq!(result.rows[0].get("city"), Some(&json!("Paris")));
    assert_eq!(result.total, Some(34945));
    assert!(result.has_next);
}

#[tokio::test]
async fn fetch_resource_data_distinguishes_not_available_from_http_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/resources/resource-id/data/"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "not found"})))
        .mount(&server)
        .await;

    let err = tabular::fetch_resource_data(&client(), &base_url(&server), "resource-id", 1, 10)
        .await
        .unwrap_err();

    assert!(matches!(err, DatagouvError::ResourceNotAvailable(_)));
}

#[tokio::test]
async fn fetch_resource_data_propagates_other_statuses() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/resources/resource-id/data/"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let err = tabular::fetch_resource_data(&client(), &base_url(&server), "resource-id", 1, 10)
        .await
        .unwrap_err();

    assert!(matches!(err, DatagouvError::Http { status: 502, .. }));
}

#[tokio::test]
async fn fetch_resource_profile_cleans_quoted_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/resources/resource-id/profile/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "profile": {
                "header": ["\"city\"", "population", "\"postal_code\""],
                "columns": {},
            }
        })))
        .mount(&server)
        .await;

    let profile = tabular::fetch_resource_profile(&client(), &base_url(&server), "resource-id")
        .await
        .unwrap();

    assert_eq!(profile.header, vec!["city", "population", "postal_code"]);
}

#[tokio::test]
async fn fetch_resource_profile_maps_404_to_not_available() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/resources/resource-id/profile/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = tabular::fetch_resource_profile(&client(), &base_url(&server), "resource-id")
        .await
        .unwrap_err();

    assert!(matches!(err, DatagouvError::ResourceNotAvailable(_)));
}
