use crate::error::{DatagouvError, Result};
use crate::parse::Row;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Documented upstream ceiling for `page_size`.
pub const MAX_PAGE_SIZE: i64 = 200;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One page of rows from the tabular API.
#[derive(Clone, Debug)]
pub struct TabularPage {
    pub rows: Vec<Row>,
    pub total: Option<i64>,
    pub page: i64,
    pub page_size: i64,
    pub has_next: bool,
}

/// Column metadata for a resource the tabular API has profiled.
#[derive(Clone, Debug)]
pub struct TabularProfile {
    pub header: Vec<String>,
    pub columns: Value,
}

#[derive(Debug, Deserialize)]
struct DataResponse {
    #[serde(default)]
    data: Vec<Row>,
    #[serde(default)]
    meta: Meta,
    #[serde(default)]
    links: Links,
}

#[derive(Debug, Default, Deserialize)]
struct Meta {
    page: Option<i64>,
    page_size: Option<i64>,
    total: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct Links {
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    #[serde(default)]
    profile: ProfileBody,
}

#[derive(Debug, Default, Deserialize)]
struct ProfileBody {
    #[serde(default)]
    header: Vec<String>,
    #[serde(default)]
    columns: Value,
}

/// Fetch one page of parsed rows for a resource.
///
/// `page` is clamped to at least 1 and `page_size` to `[1, 200]` before
/// anything is sent; out-of-range values never reach the upstream. A
/// 404 means the resource is not indexed by the tabular service (not an
/// error in the data, just not this access path) and is reported as the
/// distinct [`DatagouvError::ResourceNotAvailable`] so callers can fall
/// back to a raw download.
pub async fn fetch_resource_data(
    client: &reqwest::Client,
    base_url: &str,
    resource_id: &str,
    page: i64,
    page_size: i64,
) -> Result<TabularPage> {
    let page = page.max(1);
    let page_size = page_size.clamp(1, MAX_PAGE_SIZE);

    let url = format!(
        "{base_url}resources/{}/data/",
        urlencoding::encode(resource_id)
    );
    let response = client
        .get(&url)
        .query(&[("page", page.to_string()), ("page_size", page_size.to_string())])
        .timeout(REQUEST_TIMEOUT)
        .send()
        .await?;

    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(DatagouvError::ResourceNotAvailable(format!(
            "Resource {resource_id} is not available via the tabular API \
             (not indexed as a tabular file)"
        )));
    }
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

    let body: DataResponse = response.json().await?;
    Ok(TabularPage {
        rows: body.data,
        total: body.meta.total,
        page: body.meta.page.unwrap_or(page),
        page_size: body.meta.page_size.unwrap_or(page_size),
        has_next: body.links.next.is_some(),
    })
}

/// Fetch the tabular API's column profile for a resource.
///
/// Header names sometimes come back wrapped in literal double quotes;
/// they are stripped here so callers see clean column names.
pub async fn fetch_resource_profile(
    client: &reqwest::Client,
    base_url: &str,
    resource_id: &str,
) -> Result<TabularProfile> {
    let url = format!(
        "{base_url}resources/{}/profile/",
        urlencoding::encode(resource_id)
    );
    let response = client.get(&url).timeout(REQUEST_TIMEOUT).send().await?;

    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(DatagouvError::ResourceNotAvailable(format!(
            "Resource {resource_id} is not available via the tabular API \
             (not indexed as a tabular file)"
        )));
    }
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

    let body: ProfileResponse = response.json().await?;
    Ok(TabularProfile {
        header: body
            .profile
            .header
            .into_iter()
            .map(|name| name.trim_matches('"').to_string())
            .collect(),
        columns: body.profile.columns,
    })
}
