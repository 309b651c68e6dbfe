use datagouv_api::ApiError;
use thiserror::Error;

/// Errors that can occur when using the data.gouv.fr client
#[derive(Error, Debug)]
pub enum DatagouvError {
    /// Error from the underlying catalog API client
    #[error("catalog API error: {0}")]
    Catalog(#[from] ApiError),

    /// HTTP transport error (connection, timeout, body read)
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Non-2xx response from an upstream service
    #[error("HTTP {status} - {message}")]
    Http { status: u16, message: String },

    /// A download exceeded the configured size ceiling, either announced
    /// via Content-Length or measured while streaming
    #[error("file too large: {size} bytes exceeds the {limit} byte limit")]
    FileTooLarge { size: u64, limit: u64 },

    /// Payload could not be decoded or parsed in its detected format
    #[error("parse error: {0}")]
    Parse(String),

    /// A ZIP archive with no CSV/JSON entry to extract
    #[error("ZIP contains no supported file (csv, json, jsonl)")]
    NoSupportedFile,

    /// The tabular API does not serve this resource (404). Recoverable:
    /// callers can fall back to downloading and parsing the raw file.
    #[error("{0}")]
    ResourceNotAvailable(String),

    /// Input rejected before any network call
    #[error("validation error: {0}")]
    Validation(String),
}

impl DatagouvError {
    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    /// Create a new parse error
    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse(message.into())
    }
}

/// Type alias for Results using DatagouvError
pub type Result<T> = std::result::Result<T, DatagouvError>;
