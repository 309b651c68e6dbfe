use crate::error::{DatagouvError, Result};
use crate::parse::Row;
use serde::Deserialize;
use std::time::Duration;

/// Models served by the metrics API.
pub const METRIC_MODELS: &[&str] = &["datasets", "resources", "organizations", "reuses"];

/// Metrics page size ceiling.
pub const MAX_METRICS_PAGE_SIZE: i64 = 100;

const DATA_TIMEOUT: Duration = Duration::from_secs(20);
const CSV_TIMEOUT: Duration = Duration::from_secs(30);

/// Tuning knobs for a metrics query.
///
/// `id_field` defaults to the singular-ized model name plus `_id`
/// (`datasets` filters on `dataset_id`). The API currently only serves
/// monthly figures, so `time_granularity` stays `month` unless the
/// upstream grows new ones.
#[derive(Clone, Debug)]
pub struct MetricsOptions {
    pub id_field: Option<String>,
    pub time_granularity: String,
    pub limit: i64,
    pub sort_order: String,
}

impl Default for MetricsOptions {
    fn default() -> Self {
        Self {
            id_field: None,
            time_granularity: "month".to_string(),
            limit: 12,
            sort_order: "desc".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MetricsResponse {
    #[serde(default)]
    data: Vec<Row>,
}

fn default_id_field(model: &str) -> String {
    match model.strip_suffix('s') {
        Some(singular) => format!("{singular}_id"),
        None => format!("{model}_id"),
    }
}

fn validated_id(id_value: &str) -> Result<&str> {
    let trimmed = id_value.trim();
    if trimmed.is_empty() {
        return Err(DatagouvError::validation("id_value cannot be empty"));
    }
    Ok(trimmed)
}

/// Fetch metric records for one object of a model, most recent first by
/// default.
pub async fn get_metrics(
    client: &reqwest::Client,
    base_url: &str,
    model: &str,
    id_value: &str,
    options: &MetricsOptions,
) -> Result<Vec<Row>> {
    let id_value = validated_id(id_value)?;
    let id_field = options
        .id_field
        .clone()
        .unwrap_or_else(|| default_id_field(model));
    let time_field = format!("metric_{}", options.time_granularity);
    let page_size = options.limit.clamp(1, MAX_METRICS_PAGE_SIZE);

    let url = format!("{base_url}{model}/data/");
    let response = client
        .get(&url)
        .query(&[
            (format!("{id_field}__exact"), id_value.to_string()),
            (format!("{time_field}__sort"), options.sort_order.clone()),
            ("page_size".to_string(), page_size.to_string()),
        ])
        .timeout(DATA_TIMEOUT)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(DatagouvError::Http {
            status: status.as_u16(),
            message,
        });
    }

    let body: MetricsResponse = response.json().await?;
    Ok(body.data)
}

/// Fetch metrics as raw CSV text, header row included.
///
/// The CSV endpoint ignores pagination and returns every matching
/// record; the exact-match id filter is what keeps the result bounded.
pub async fn get_metrics_csv(
    client: &reqwest::Client,
    base_url: &str,
    model: &str,
    id_value: &str,
    options: &MetricsOptions,
) -> Result<String> {
    let id_value = validated_id(id_value)?;
    let id_field = options
        .id_field
        .clone()
        .unwrap_or_else(|| default_id_field(model));
    let time_field = format!("metric_{}", options.time_granularity);

    let url = format!("{base_url}{model}/data/csv/");
    let response = client
        .get(&url)
        .query(&[
            (format!("{id_field}__exact"), id_value.to_string()),
            (format!("{time_field}__sort"), options.sort_order.clone()),
        ])
        .timeout(CSV_TIMEOUT)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(DatagouvError::Http {
            status: status.as_u16(),
            message,
        });
    }

    Ok(response.text().await?)
}
