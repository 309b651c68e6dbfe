use crate::models;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;
use std::sync::Arc;

/// Configuration for the catalog client
#[derive(Debug, Clone)]
pub struct Configuration {
    /// Base URL for the catalog API (e.g., "https://www.data.gouv.fr/api/")
    pub api_base: String,
    /// Base URL of the public website, used to build result links
    pub site_base: String,
    /// User agent string for HTTP requests
    pub user_agent: Option<String>,
    /// HTTP client instance
    pub client: reqwest::Client,
    /// API key for authenticated (write) calls, sent as `X-API-KEY`
    pub api_key: Option<String>,
}

impl Configuration {
    /// Create a new configuration with default values
    pub fn new() -> Configuration {
        Configuration::default()
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            api_base: "https://demo.data.gouv.fr/api/".to_owned(),
            site_base: "https://demo.data.gouv.fr/".to_owned(),
            user_agent: Some("datagouv-rs/0.1".to_owned()),
            client: reqwest::Client::new(),
            api_key: None,
        }
    }
}

/// Errors that can occur when talking to the catalog API
#[derive(Debug)]
pub enum ApiError {
    /// Network, HTTP, or other request-level errors
    Request(Box<dyn std::error::Error + Send + Sync>),

    /// JSON deserialization errors: the API returned data that does not
    /// match the expected shape
    Parse(serde_json::Error),

    /// Catalog API errors with status codes (404 dataset not found,
    /// 401/403 authentication and permission failures, 400 bad input)
    Api {
        /// HTTP status code from the catalog API
        status: u16,
        /// Error body returned by the catalog
        message: String,
    },

    /// A syntactically valid response whose content is unusable
    /// (e.g. an OpenAPI document that is not a mapping)
    Payload(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Request(e) => write!(f, "Request error: {}", e),
            ApiError::Parse(e) => write!(f, "Parse error: {}", e),
            ApiError::Api { status, message } => {
                write!(f, "Catalog API error ({}): {}", status, message)
            }
            ApiError::Payload(message) => write!(f, "Invalid payload: {}", message),
        }
    }
}

impl std::error::Error for ApiError {}

/// # Catalog Client
///
/// Async client for the data.gouv.fr catalog API.
///
/// The catalog exposes two generations of endpoints: v1 for datasets,
/// dataservices and search, v2 for resource lookups. This client wraps
/// both behind typed methods and normalizes the duck-typed corners of
/// the payloads (tags, title/name fallbacks) into the `models` types.
///
/// ```rust,no_run
/// use datagouv_api::{CatalogClient, Configuration};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = CatalogClient::new(Arc::new(Configuration::default()));
/// let page = client.search_datasets("transports", 1, 10).await?;
/// for dataset in &page.data {
///     println!("{}", dataset.display_title().unwrap_or("Untitled"));
/// }
/// # Ok(())
/// # }
/// ```
pub struct CatalogClient {
    configuration: Arc<Configuration>,
}

impl std::fmt::Debug for CatalogClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogClient")
            .field("api_base", &self.configuration.api_base)
            .finish()
    }
}

/// Maximum page size accepted by the catalog search endpoints.
pub const MAX_SEARCH_PAGE_SIZE: i64 = 100;

#[derive(Debug, Default, Deserialize)]
struct ResourceRecord {
    id: Option<String>,
    title: Option<String>,
    name: Option<String>,
    description: Option<String>,
    url: Option<String>,
    format: Option<String>,
    filesize: Option<i64>,
    mime: Option<String>,
}

impl CatalogClient {
    /// Create a new catalog client instance
    pub fn new(configuration: Arc<Configuration>) -> Self {
        Self { configuration }
    }

    /// The configuration this client was built with
    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let mut builder = self.configuration.client.get(url);
        if let Some(ua) = &self.configuration.user_agent {
            builder = builder.header(reqwest::header::USER_AGENT, ua);
        }
        builder
    }

    async fn get_json<T>(&self, url: &str) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let response = self
            .get(url)
            .send()
            .await
            .map_err(|e| ApiError::Request(Box::new(e)))?;

        if response.status().is_success() {
            let value: Value = response
                .json()
                .await
                .map_err(|e| ApiError::Request(Box::new(e)))?;
            serde_json::from_value(value).map_err(ApiError::Parse)
        } else {
            let status = response.status().as_u16();
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            Err(ApiError::Api { status, message })
        }
    }

    /// Fetch metadata for a single resource (file) by its id.
    ///
    /// Uses the v2 endpoint, which nests the record under a `resource`
    /// key; the flattened [`models::ResourceMetadata`] is returned
    /// instead. The `title` field falls back to the legacy `name`.
    pub async fn resource_metadata(
        &self,
        resource_id: &str,
    ) -> Result<models::ResourceMetadata, ApiError> {
        let url = format!(
            "{}2/datasets/resources/{}/",
            self.configuration.api_base,
            urlencoding::encode(resource_id)
        );

        #[derive(Debug, Deserialize)]
        struct Envelope {
            #[serde(default)]
            resource: Option<ResourceRecord>,
            dataset_id: Option<String>,
        }

        let envelope: Envelope = self.get_json(&url).await?;
        let record = envelope.resource.unwrap_or_default();

        Ok(models::ResourceMetadata {
            id: record.id.unwrap_or_else(|| resource_id.to_string()),
            title: record.title.or(record.name),
            description: record.description,
            url: record.url,
            format: record.format,
            filesize: record.filesize,
            mime: record.mime,
            dataset_id: envelope.dataset_id,
        })
    }

    /// Fetch the full dataset record, including its resource list.
    ///
    /// A single request serves both the dataset metadata and the
    /// resources, so callers listing resources do not pay one request
    /// per file.
    pub async fn dataset(&self, dataset_id: &str) -> Result<models::Dataset, ApiError> {
        let url = format!(
            "{}1/datasets/{}/",
            self.configuration.api_base,
            urlencoding::encode(dataset_id)
        );
        self.get_json(&url).await
    }

    /// Full-text dataset search.
    ///
    /// `page_size` is capped at [`MAX_SEARCH_PAGE_SIZE`] before the
    /// request is sent; the catalog rejects larger values.
    pub async fn search_datasets(
        &self,
        query: &str,
        page: i64,
        page_size: i64,
    ) -> Result<models::ListPage<models::Dataset>, ApiError> {
        let url = self.search_url("1/datasets/", query, page, page_size);
        self.get_json(&url).await
    }

    /// Full-text dataservice search (third-party APIs in the catalog).
    pub async fn search_dataservices(
        &self,
        query: &str,
        page: i64,
        page_size: i64,
    ) -> Result<models::ListPage<models::Dataservice>, ApiError> {
        let url = self.search_url("1/dataservices/", query, page, page_size);
        self.get_json(&url).await
    }

    fn search_url(&self, path: &str, query: &str, page: i64, page_size: i64) -> String {
        let page = page.max(1);
        let page_size = page_size.clamp(1, MAX_SEARCH_PAGE_SIZE);
        format!(
            "{}{}?q={}&page={}&page_size={}",
            self.configuration.api_base,
            path,
            urlencoding::encode(query),
            page,
            page_size
        )
    }

    /// Fetch a dataservice record by id.
    pub async fn dataservice(
        &self,
        dataservice_id: &str,
    ) -> Result<models::Dataservice, ApiError> {
        let url = format!(
            "{}1/dataservices/{}/",
            self.configuration.api_base,
            urlencoding::encode(dataservice_id)
        );
        self.get_json(&url).await
    }

    /// Download and parse an OpenAPI/Swagger document.
    ///
    /// Dataservices publish their spec at an arbitrary URL
    /// (`machine_documentation_url`), as either JSON or YAML. Both are
    /// accepted; anything that does not decode to a mapping is rejected.
    pub async fn fetch_openapi_spec(
        &self,
        url: &str,
    ) -> Result<serde_json::Map<String, Value>, ApiError> {
        let response = self
            .get(url)
            .send()
            .await
            .map_err(|e| ApiError::Request(Box::new(e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ApiError::Api { status, message });
        }

        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Request(Box::new(e)))?;

        let value = serde_json::from_str::<Value>(&text)
            .ok()
            .or_else(|| serde_yaml::from_str::<Value>(&text).ok());

        match value {
            Some(Value::Object(map)) => Ok(map),
            _ => Err(ApiError::Payload(format!(
                "Could not parse OpenAPI spec from {}",
                url
            ))),
        }
    }

    /// Create a dataset (write operation, requires an API key).
    ///
    /// The key configured on [`Configuration::api_key`] is forwarded in
    /// the `X-API-KEY` header. Datasets are created private by default;
    /// publication is an explicit caller decision.
    pub async fn create_dataset(
        &self,
        request: &models::CreateDatasetRequest,
    ) -> Result<models::CreatedDataset, ApiError> {
        let api_key = self
            .configuration
            .api_key
            .as_deref()
            .ok_or_else(|| ApiError::Payload("no API key configured".to_string()))?;

        let url = format!("{}1/datasets/", self.configuration.api_base);
        let mut builder = self
            .configuration
            .client
            .post(&url)
            .header("X-API-KEY", api_key)
            .json(request);
        if let Some(ua) = &self.configuration.user_agent {
            builder = builder.header(reqwest::header::USER_AGENT, ua);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::Request(Box::new(e)))?;

        if response.status().is_success() {
            let value: Value = response
                .json()
                .await
                .map_err(|e| ApiError::Request(Box::new(e)))?;
            serde_json::from_value(value).map_err(ApiError::Parse)
        } else {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            // The API wraps error details in {"message": ...} when it can
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(String::from))
                .unwrap_or(body);
            Err(ApiError::Api { status, message })
        }
    }
}
