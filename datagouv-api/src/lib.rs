pub mod client;
pub mod models;

pub use client::{ApiError, CatalogClient, Configuration, MAX_SEARCH_PAGE_SIZE};
pub use models::{
    CreateDatasetRequest, CreatedDataset, Dataservice, Dataset, ListPage, Organization,
    ResourceMetadata, ResourceSummary, Tag, tag_names,
};
