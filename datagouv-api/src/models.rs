use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A dataset tag as returned by the catalog API.
///
/// Older catalog records carry tags as bare strings, newer ones as
/// `{"name": "..."}` objects; the occasional record contains neither.
/// `into_name` is the single place where all three shapes collapse into
/// an optional plain string.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Tag {
    Text(String),
    Object {
        #[serde(default)]
        name: Option<String>,
    },
    Other(Value),
}

impl Tag {
    /// Coerce the tag into a trimmed, non-empty name if it has one.
    pub fn into_name(self) -> Option<String> {
        let raw = match self {
            Tag::Text(text) => Some(text),
            Tag::Object { name } => name,
            Tag::Other(_) => None,
        }?;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

/// Normalize a raw tag list into plain names, dropping malformed entries.
pub fn tag_names(tags: &[Tag]) -> Vec<String> {
    tags.iter().cloned().filter_map(Tag::into_name).collect()
}

/// Publishing organization attached to a dataset or dataservice.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Organization {
    pub id: Option<String>,
    pub name: Option<String>,
    pub title: Option<String>,
}

/// One file (resource) attached to a dataset, as listed by the v1
/// dataset endpoint.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ResourceSummary {
    pub id: Option<String>,
    pub title: Option<String>,
    pub name: Option<String>,
    pub format: Option<String>,
    pub filesize: Option<i64>,
    pub mime: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub url: Option<String>,
}

impl ResourceSummary {
    /// Display title, falling back to the legacy `name` field.
    pub fn display_title(&self) -> Option<&str> {
        self.title.as_deref().or(self.name.as_deref())
    }
}

/// Full dataset record from `GET /1/datasets/{id}/`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Dataset {
    pub id: Option<String>,
    pub title: Option<String>,
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub description_short: Option<String>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    pub organization: Option<Organization>,
    #[serde(default)]
    pub resources: Vec<ResourceSummary>,
}

impl Dataset {
    pub fn display_title(&self) -> Option<&str> {
        self.title.as_deref().or(self.name.as_deref())
    }
}

/// Flattened view of `GET /2/datasets/resources/{id}/`, which nests the
/// resource record under a `resource` key and carries the parent dataset
/// id at the top level.
#[derive(Clone, Debug)]
pub struct ResourceMetadata {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub format: Option<String>,
    pub filesize: Option<i64>,
    pub mime: Option<String>,
    pub dataset_id: Option<String>,
}

/// Dataservice record (a third-party API registered in the catalog).
///
/// `datasets` is a link object with a `total` count, not an inline list.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Dataservice {
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub base_api_url: Option<String>,
    pub machine_documentation_url: Option<String>,
    pub organization: Option<Organization>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    pub created_at: Option<String>,
    pub last_update: Option<String>,
    pub license: Option<String>,
    pub datasets: Option<DatasetsLink>,
}

impl Dataservice {
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("Unknown")
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct DatasetsLink {
    pub total: Option<i64>,
}

/// One page of search results, shared by the dataset and dataservice
/// search endpoints (`{"data": [...], "total": ..., "page": ...}`).
#[derive(Clone, Debug, Deserialize)]
pub struct ListPage<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    pub total: Option<i64>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// Payload for the dataset-creation write endpoint.
#[derive(Clone, Debug, Serialize)]
pub struct CreateDatasetRequest {
    pub title: String,
    pub description: String,
    pub frequency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    pub license: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    pub private: bool,
}

/// The dataset record echoed back by a successful creation.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CreatedDataset {
    pub id: Option<String>,
    pub slug: Option<String>,
    pub title: Option<String>,
    pub private: Option<bool>,
    pub license: Option<String>,
    pub frequency: Option<String>,
    pub organization: Option<Organization>,
}
