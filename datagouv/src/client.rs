use std::collections::HashSet;
use std::time::Duration;

use datagouv_api::CatalogClient;

use crate::config::Config;
use crate::download::{self, DownloadedPayload};
use crate::error::Result;
use crate::exceptions::ExceptionCache;
use crate::metrics::{self, MetricsOptions};
use crate::parse::Row;
use crate::tabular::{self, TabularPage, TabularProfile};

/// High-level client for data.gouv.fr
///
/// Wraps the catalog client and adds the services around it: bounded
/// resource downloads, tabular API queries, the metrics API, and the
/// crawler's resource-exception list behind its cache. One instance is
/// meant to live for the process and be shared across tool invocations;
/// the only mutable state it carries is the exception cache.
#[derive(Debug)]
pub struct DatagouvClient {
    catalog: CatalogClient,
    config: Config,
    http_client: reqwest::Client,
    exceptions: ExceptionCache,
}

impl DatagouvClient {
    /// Create a new client with default (demo) configuration
    pub fn new() -> Result<Self> {
        Self::with_config(Config::new())
    }

    /// Create a new client with custom configuration
    pub fn with_config(config: Config) -> Result<Self> {
        let catalog = CatalogClient::new(config.catalog.clone());

        // One HTTP client for all non-catalog calls; the long timeout is
        // sized for downloads, shorter per-request timeouts apply to the
        // tabular and metrics endpoints.
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.download_timeout_secs))
            .user_agent(&config.user_agent)
            .build()?;

        let exceptions = ExceptionCache::new(Duration::from_secs(config.exception_ttl_secs));

        Ok(Self {
            catalog,
            config,
            http_client,
            exceptions,
        })
    }

    /// The underlying catalog client for metadata and search calls
    pub fn catalog(&self) -> &CatalogClient {
        &self.catalog
    }

    /// The configuration this client was built with
    pub fn config(&self) -> &Config {
        &self.config
    }

    // === Resource downloads ===

    /// Download a resource file into memory, bounded by the configured
    /// size ceiling
    pub async fn download_resource(&self, url: &str) -> Result<DownloadedPayload> {
        download::download(&self.http_client, url, self.config.max_download_bytes).await
    }

    // === Tabular API ===

    /// Fetch one page of parsed rows for a resource via the tabular API
    pub async fn fetch_resource_data(
        &self,
        resource_id: &str,
        page: i64,
        page_size: i64,
    ) -> Result<TabularPage> {
        tabular::fetch_resource_data(
            &self.http_client,
            &self.config.tabular_base_url,
            resource_id,
            page,
            page_size,
        )
        .await
    }

    /// Fetch the tabular API's column profile for a resource
    pub async fn fetch_resource_profile(&self, resource_id: &str) -> Result<TabularProfile> {
        tabular::fetch_resource_profile(
            &self.http_client,
            &self.config.tabular_base_url,
            resource_id,
        )
        .await
    }

    // === Metrics API ===

    /// Fetch metric records for one object of a model
    pub async fn get_metrics(
        &self,
        model: &str,
        id_value: &str,
        options: &MetricsOptions,
    ) -> Result<Vec<Row>> {
        metrics::get_metrics(
            &self.http_client,
            &self.config.metrics_base_url,
            model,
            id_value,
            options,
        )
        .await
    }

    /// Fetch metrics as raw CSV text
    pub async fn get_metrics_csv(
        &self,
        model: &str,
        id_value: &str,
        options: &MetricsOptions,
    ) -> Result<String> {
        metrics::get_metrics_csv(
            &self.http_client,
            &self.config.metrics_base_url,
            model,
            id_value,
            options,
        )
        .await
    }

    // === Resource exceptions ===

    /// IDs of resources the tabular API refuses to parse, served from
    /// the TTL cache with stale-on-error fallback
    pub async fn resource_exceptions(&self, force_refresh: bool) -> Result<HashSet<String>> {
        self.exceptions
            .fetch(&self.http_client, &self.config.crawler_base_url, force_refresh)
            .await
    }

    /// Reset the exception cache to its uninitialized state
    pub fn clear_exception_cache(&self) {
        self.exceptions.clear();
    }
}
