use datagouv_api::{ApiError, CatalogClient, Configuration, Tag, tag_names};
use serde_json::json;
use std::sync::Arc;

/// Test that we can create a client and it has expected debug output
#[test]
fn test_client_creation() {
    let config = Arc::new(Configuration {
        api_base: "https://www.data.gouv.fr/api/".to_string(),
        site_base: "https://www.data.gouv.fr/".to_string(),
        user_agent: Some("test-client/1.0".to_string()),
        client: reqwest::Client::new(),
        api_key: None,
    });

    let client = CatalogClient::new(config);

    let debug_str = format!("{:?}", client);
    assert!(debug_str.contains("CatalogClient"));
    assert!(debug_str.contains("data.gouv.fr"));
}

/// Test that we can create a client with authentication
#[test]
fn test_authenticated_client_creation() {
    let config = Arc::new(Configuration {
        api_base: "https://demo.data.gouv.fr/api/".to_string(),
        site_base: "https://demo.data.gouv.fr/".to_string(),
        user_agent: Some("test-client/1.0".to_string()),
        client: reqwest::Client::new(),
        api_key: Some("test-api-key".to_string()),
    });

    let client = CatalogClient::new(config);
    assert_eq!(
        client.configuration().api_key.as_deref(),
        Some("test-api-key")
    );
}

/// Test error types implement expected traits
#[test]
fn test_error_types() {
    let req_error = ApiError::Request(Box::new(std::io::Error::other("test error")));
    let _display = format!("{}", req_error);
    let _debug = format!("{:?}", req_error);

    let parse_error = ApiError::Parse(
        serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err(),
    );
    let _display = format!("{}", parse_error);
    let _debug = format!("{:?}", parse_error);

    let api_error = ApiError::Api {
        status: 404,
        message: "Not Found".to_string(),
    };
    let _display = format!("{}", api_error);
    let _debug = format!("{:?}", api_error);

    fn check_error_trait<T: std::error::Error>(_: T) {}
    check_error_trait(req_error);
}

/// Test that error messages are meaningful
#[test]
fn test_error_messages() {
    let api_error = ApiError::Api {
        status: 404,
        message: "Dataset not found".to_string(),
    };

    let message = format!("{}", api_error);
    assert!(message.contains("404"));
    assert!(message.contains("Dataset not found"));
}

/// Tags arrive as bare strings, objects, or junk; only real names survive
#[test]
fn test_tag_normalization() {
    let tags: Vec<Tag> = serde_json::from_value(json!([
        "  transport  ",
        {"name": "mobility"},
        {"name": ""},
        123,
        null,
    ]))
    .unwrap();

    assert_eq!(tag_names(&tags), vec!["transport", "mobility"]);
}
