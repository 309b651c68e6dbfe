use datagouv_api::Configuration as CatalogConfiguration;
use std::sync::Arc;

/// Which data.gouv.fr deployment the client talks to.
///
/// The platform runs a demo environment for experimentation and the
/// production site. The tabular API follows the same split (its demo
/// flavor lives on the preprod domain). Metrics and crawler APIs only
/// exist in production.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Demo,
    Prod,
}

impl Environment {
    /// Parse an environment name, case-insensitively.
    ///
    /// Anything that is not recognized falls back to demo, so a typo in
    /// deployment config can never point tools at production by
    /// accident.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" => Environment::Prod,
            _ => Environment::Demo,
        }
    }

    /// Resolve the environment from the `DATAGOUV_ENV` variable.
    pub fn from_env() -> Self {
        std::env::var("DATAGOUV_ENV")
            .map(|value| Self::parse(&value))
            .unwrap_or_default()
    }

    pub fn api_base_url(self) -> &'static str {
        match self {
            Environment::Demo => "https://demo.data.gouv.fr/api/",
            Environment::Prod => "https://www.data.gouv.fr/api/",
        }
    }

    pub fn site_base_url(self) -> &'static str {
        match self {
            Environment::Demo => "https://demo.data.gouv.fr/",
            Environment::Prod => "https://www.data.gouv.fr/",
        }
    }

    pub fn tabular_api_base_url(self) -> &'static str {
        match self {
            Environment::Demo => "https://tabular-api.preprod.data.gouv.fr/api/",
            Environment::Prod => "https://tabular-api.data.gouv.fr/api/",
        }
    }
}

/// The metrics API has no demo deployment.
pub const DEFAULT_METRICS_BASE_URL: &str = "https://metric-api.data.gouv.fr/api/";

/// Crawler API serving the tabular-exception list.
pub const DEFAULT_CRAWLER_BASE_URL: &str = "https://crawler.data.gouv.fr/api/";

/// Download ceiling for raw resource files.
pub const DEFAULT_MAX_DOWNLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Resource files can be large; give downloads a generous timeout.
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 300;

/// The exception list changes rarely; 15 minutes bounds staleness.
pub const DEFAULT_EXCEPTION_TTL_SECS: u64 = 900;

/// Configuration for the data.gouv.fr client
#[derive(Debug, Clone)]
pub struct Config {
    /// Catalog API client configuration
    pub catalog: Arc<CatalogConfiguration>,
    /// Selected deployment
    pub environment: Environment,
    /// Base URL of the tabular API
    pub tabular_base_url: String,
    /// Base URL of the metrics API
    pub metrics_base_url: String,
    /// Base URL of the crawler API (exception list)
    pub crawler_base_url: String,
    /// User agent for HTTP requests
    pub user_agent: String,
    /// Timeout for downloads in seconds
    pub download_timeout_secs: u64,
    /// Size ceiling for downloaded resource files, in bytes
    pub max_download_bytes: u64,
    /// Freshness window of the resource-exception cache, in seconds
    pub exception_ttl_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        let environment = Environment::default();
        Self {
            catalog: Arc::new(catalog_configuration(environment, None, None)),
            environment,
            tabular_base_url: environment.tabular_api_base_url().to_string(),
            metrics_base_url: DEFAULT_METRICS_BASE_URL.to_string(),
            crawler_base_url: DEFAULT_CRAWLER_BASE_URL.to_string(),
            user_agent: "datagouv-rs/0.1".to_string(),
            download_timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
            max_download_bytes: DEFAULT_MAX_DOWNLOAD_BYTES,
            exception_ttl_secs: DEFAULT_EXCEPTION_TTL_SECS,
        }
    }
}

fn catalog_configuration(
    environment: Environment,
    api_key: Option<String>,
    user_agent: Option<String>,
) -> CatalogConfiguration {
    CatalogConfiguration {
        api_base: environment.api_base_url().to_string(),
        site_base: environment.site_base_url().to_string(),
        user_agent: user_agent.or_else(|| Some("datagouv-rs/0.1".to_string())),
        client: reqwest::Client::new(),
        api_key,
    }
}

/// Normalize a base-URL override to exactly one trailing slash.
fn normalize_base_url(url: &str) -> String {
    format!("{}/", url.trim_end_matches('/'))
}

impl Config {
    /// Create a new configuration for the default (demo) environment
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from the process environment:
    /// `DATAGOUV_ENV`, `DATAGOUV_API_KEY`, `METRIC_API_BASE_URL` and
    /// `CRAWLER_API_BASE_URL`.
    pub fn from_env() -> Self {
        let mut config = Self::new().with_environment(Environment::from_env());
        if let Ok(api_key) = std::env::var("DATAGOUV_API_KEY") {
            if !api_key.trim().is_empty() {
                config = config.with_api_key(api_key);
            }
        }
        if let Ok(url) = std::env::var("METRIC_API_BASE_URL") {
            if !url.trim().is_empty() {
                config.metrics_base_url = normalize_base_url(&url);
            }
        }
        if let Ok(url) = std::env::var("CRAWLER_API_BASE_URL") {
            if !url.trim().is_empty() {
                config.crawler_base_url = normalize_base_url(&url);
            }
        }
        config
    }

    /// Point the configuration at a deployment, rebinding the catalog
    /// and tabular base URLs accordingly
    pub fn with_environment(mut self, environment: Environment) -> Self {
        let catalog = (*self.catalog).clone();
        self.catalog = Arc::new(CatalogConfiguration {
            api_base: environment.api_base_url().to_string(),
            site_base: environment.site_base_url().to_string(),
            ..catalog
        });
        self.tabular_base_url = environment.tabular_api_base_url().to_string();
        self.environment = environment;
        self
    }

    /// Add an API key for the write path
    pub fn with_api_key<S: Into<String>>(mut self, api_key: S) -> Self {
        let mut catalog = (*self.catalog).clone();
        catalog.api_key = Some(api_key.into());
        self.catalog = Arc::new(catalog);
        self
    }

    /// Set custom user agent
    pub fn with_user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.user_agent = user_agent.into();
        let mut catalog = (*self.catalog).clone();
        catalog.user_agent = Some(self.user_agent.clone());
        self.catalog = Arc::new(catalog);
        self
    }

    /// Set the download size ceiling
    pub fn with_max_download_bytes(mut self, max: u64) -> Self {
        self.max_download_bytes = max.max(1);
        self
    }

    /// Set download timeout
    pub fn with_download_timeout(mut self, timeout_secs: u64) -> Self {
        self.download_timeout_secs = timeout_secs;
        self
    }

    /// Set the exception-cache freshness window
    pub fn with_exception_ttl(mut self, ttl_secs: u64) -> Self {
        self.exception_ttl_secs = ttl_secs;
        self
    }
}
