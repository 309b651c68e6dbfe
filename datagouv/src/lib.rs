pub use datagouv_api as api;

pub mod client;
pub mod config;
pub mod download;
pub mod error;
pub mod exceptions;
pub mod format;
pub mod metrics;
pub mod parse;
pub mod present;
pub mod tabular;

pub use client::DatagouvClient;
pub use config::{Config, Environment};
pub use download::{DownloadedPayload, download};
pub use error::{DatagouvError, Result};
pub use exceptions::ExceptionCache;
pub use format::{FileFormat, detect_format, is_gzipped};
pub use metrics::{METRIC_MODELS, MetricsOptions};
pub use parse::{Row, parse_csv, parse_json, parse_zip};
pub use tabular::{MAX_PAGE_SIZE, TabularPage, TabularProfile};
