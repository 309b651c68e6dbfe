use datagouv_api::{ApiError, CatalogClient, Configuration, CreateDatasetRequest};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(server: &MockServer) -> CatalogClient {
    test_client_with_key(server, None)
}

fn test_client_with_key(server: &MockServer, api_key: Option<&str>) -> CatalogClient {
    let config = Arc::new(Configuration {
        api_base: format!("{}/api/", server.uri()),
        site_base: format!("{}/", server.uri()),
        user_agent: Some("datagouv-api-test/1.0".to_string()),
        client: reqwest::Client::new(),
        api_key: api_key.map(String::from),
    });
    CatalogClient::new(config)
}

#[tokio::test]
async fn resource_metadata_flattens_the_nested_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/2/datasets/resources/res-1/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resource": {
                "id": "res-1",
                "name": "legacy name",
                "description": "a file",
                "url": "https://static.example/res.csv",
                "format": "csv",
                "filesize": 1024,
                "mime": "text/csv",
            },
            "dataset_id": "dataset-1",
        })))
        .mount(&server)
        .await;

    let meta = test_client(&server).resource_metadata("res-1").await.unwrap();

    assert_eq!(meta.id, "res-1");
    // no title field: falls back to the legacy name
    assert_eq!(meta.title.as_deref(), Some("legacy name"));
    assert_eq!(meta.url.as_deref(), Some("https://static.example/res.csv"));
    assert_eq!(meta.dataset_id.as_deref(), Some("dataset-1"));
}

#[tokio::test]
async fn resource_metadata_keeps_requested_id_when_record_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/2/datasets/resources/res-9/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"dataset_id": null})))
        .mount(&server)
        .await;

    let meta = test_client(&server).resource_metadata("res-9").await.unwrap();

    assert_eq!(meta.id, "res-9");
    assert!(meta.title.is_none());
}

#[tokio::test]
async fn dataset_returns_metadata_and_resources_in_one_call() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/1/datasets/dataset-1/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "dataset-1",
            "title": "Dataset title",
            "resources": [
                {
                    "id": "res-1",
                    "title": "Resource title",
                    "format": "csv",
                    "filesize": 1024,
                    "mime": "text/csv",
                    "type": "main",
                    "url": "https://example.com/res.csv",
                }
            ],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dataset = test_client(&server).dataset("dataset-1").await.unwrap();

    assert_eq!(dataset.id.as_deref(), Some("dataset-1"));
    assert_eq!(dataset.display_title(), Some("Dataset title"));
    assert_eq!(dataset.resources.len(), 1);
    let resource = &dataset.resources[0];
    assert_eq!(resource.id.as_deref(), Some("res-1"));
    assert_eq!(resource.kind.as_deref(), Some("main"));
    assert_eq!(resource.filesize, Some(1024));
}

#[tokio::test]
async fn dataset_maps_404_to_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/1/datasets/nope/"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&server)
        .await;

    let err = test_client(&server).dataset("nope").await.unwrap_err();

    assert!(matches!(err, ApiError::Api { status: 404, .. }));
}

#[tokio::test]
async fn search_datasets_sends_query_and_caps_page_size() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/1/datasets/"))
        .and(query_param("q", "transports"))
        .and(query_param("page", "1"))
        .and(query_param("page_size", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {
                    "id": "dataset-1",
                    "title": "Transports",
                    "slug": "transports",
                    "tags": ["mobilité", {"name": "bus"}],
                    "organization": {"name": "Ministère"},
                    "resources": [],
                }
            ],
            "total": 1,
            "page": 1,
            "page_size": 100,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = test_client(&server)
        .search_datasets("transports", 1, 500)
        .await
        .unwrap();

    assert_eq!(page.total, Some(1));
    assert_eq!(page.data.len(), 1);
    assert_eq!(
        datagouv_api::tag_names(&page.data[0].tags),
        vec!["mobilité", "bus"]
    );
}

#[tokio::test]
async fn search_dataservices_parses_api_fields() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/1/dataservices/"))
        .and(query_param("q", "adresse"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {
                    "id": "ds-1",
                    "title": "API Adresse",
                    "base_api_url": "https://api-adresse.example/",
                    "machine_documentation_url": "https://api-adresse.example/openapi.json",
                }
            ],
            "total": 1,
            "page": 1,
        })))
        .mount(&server)
        .await;

    let page = test_client(&server)
        .search_dataservices("adresse", 1, 20)
        .await
        .unwrap();

    assert_eq!(page.data[0].display_title(), "API Adresse");
    assert_eq!(
        page.data[0].base_api_url.as_deref(),
        Some("https://api-adresse.example/")
    );
}

#[tokio::test]
async fn fetch_openapi_spec_accepts_json_mapping() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/openapi.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"openapi":"3.1.0","paths":{}}"#))
        .mount(&server)
        .await;

    let spec = test_client(&server)
        .fetch_openapi_spec(&format!("{}/openapi.json", server.uri()))
        .await
        .unwrap();

    assert_eq!(spec.get("openapi").and_then(|v| v.as_str()), Some("3.1.0"));
}

#[tokio::test]
async fn fetch_openapi_spec_accepts_yaml_mapping() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/openapi.yaml"))
        .respond_with(ResponseTemplate::new(200).set_body_string("openapi: 3.0.0\npaths: {}\n"))
        .mount(&server)
        .await;

    let spec = test_client(&server)
        .fetch_openapi_spec(&format!("{}/openapi.yaml", server.uri()))
        .await
        .unwrap();

    assert_eq!(spec.get("openapi").and_then(|v| v.as_str()), Some("3.0.0"));
}

#[tokio::test]
async fn fetch_openapi_spec_rejects_non_mapping_payload() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/openapi.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"["not-a-mapping"]"#))
        .mount(&server)
        .await;

    let err = test_client(&server)
        .fetch_openapi_spec(&format!("{}/openapi.json", server.uri()))
        .await
        .unwrap_err();

    match err {
        ApiError::Payload(message) => assert!(message.contains("Could not parse OpenAPI spec")),
        other => panic!("expected Payload error, got {other:?}"),
    }
}

#[tokio::test]
async fn create_dataset_sends_api_key_and_payload() {
    let server = MockServer::start().await;
    let expected_body = json!({
        "title": "My dataset",
        "description": "A description",
        "frequency": "unknown",
        "license": "fr-lo",
        "private": true,
    });
    Mock::given(method("POST"))
        .and(path("/api/1/datasets/"))
        .and(header("X-API-KEY", "secret"))
        .and(body_json(&expected_body))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "dataset-1",
            "slug": "my-dataset",
            "title": "My dataset",
            "private": true,
            "license": "fr-lo",
            "frequency": "unknown",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = CreateDatasetRequest {
        title: "My dataset".to_string(),
        description: "A description".to_string(),
        frequency: "unknown".to_string(),
        organization: None,
        license: "fr-lo".to_string(),
        tags: None,
        private: true,
    };

    let created = test_client_with_key(&server, Some("secret"))
        .create_dataset(&request)
        .await
        .unwrap();

    assert_eq!(created.id.as_deref(), Some("dataset-1"));
    assert_eq!(created.slug.as_deref(), Some("my-dataset"));
    assert_eq!(created.private, Some(true));
}

#[tokio::test]
async fn create_dataset_without_key_fails_before_any_request() {
    let server = MockServer::start().await;
    // no mock mounted: a request would 404 and fail differently

    let request = CreateDatasetRequest {
        title: "My dataset".to_string(),
        description: "A description".to_string(),
        frequency: "unknown".to_string(),
        organization: None,
        license: "fr-lo".to_string(),
        tags: None,
        private: true,
    };

    let err = test_client(&server).create_dataset(&request).await.unwrap_err();

    assert!(matches!(err, ApiError::Payload(_)));
}

#[tokio::test]
async fn create_dataset_extracts_upstream_error_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/1/datasets/"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"message": "title is missing"})),
        )
        .mount(&server)
        .await;

    let request = CreateDatasetRequest {
        title: String::new(),
        description: "A description".to_string(),
        frequency: "unknown".to_string(),
        organization: None,
        license: "fr-lo".to_string(),
        tags: None,
        private: true,
    };

    let err = test_client_with_key(&server, Some("secret"))
        .create_dataset(&request)
        .await
        .unwrap_err();

    match err {
        ApiError::Api { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "title is missing");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}
