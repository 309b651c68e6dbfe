use crate::error::{DatagouvError, Result};
use futures::StreamExt;
use url::Url;

/// A fully buffered download, sized within the configured ceiling.
#[derive(Clone, Debug)]
pub struct DownloadedPayload {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: Option<String>,
}

/// Download a URL into memory, refusing to exceed `max_bytes`.
///
/// When the server announces a `Content-Length` above the ceiling the
/// request fails before any body byte is read. Otherwise the body is
/// accumulated chunk by chunk and the download aborts the moment the
/// running total would pass the ceiling; a truncated payload is never
/// returned.
pub async fn download(
    client: &reqwest::Client,
    url: &str,
    max_bytes: u64,
) -> Result<DownloadedPayload> {
    let response = client.get(url).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(DatagouvError::Http {
            status: status.as_u16(),
            message: format!("while downloading {url}"),
        });
    }

    if let Some(length) = response.content_length() {
        if length > max_bytes {
            return Err(DatagouvError::FileTooLarge {
                size: length,
                limit: max_bytes,
            });
        }
    }

    let filename = filename_from_response(&response, url);
    let content_type = content_type_from_response(&response);

    let mut bytes: Vec<u8> = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        let total = bytes.len() as u64 + chunk.len() as u64;
        if total > max_bytes {
            return Err(DatagouvError::FileTooLarge {
                size: total,
                limit: max_bytes,
            });
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(DownloadedPayload {
        bytes,
        filename,
        content_type,
    })
}

/// Resolve a filename for the payload: `Content-Disposition` first, then
/// the last path segment of the URL, then a literal fallback.
fn filename_from_response(response: &reqwest::Response, url: &str) -> String {
    if let Some(value) = response
        .headers()
        .get(reqwest::header::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
    {
        if let Some(name) = filename_from_content_disposition(value) {
            return name;
        }
    }
    filename_from_url(url).unwrap_or_else(|| "resource".to_string())
}

fn filename_from_content_disposition(value: &str) -> Option<String> {
    value.split(';').map(str::trim).find_map(|part| {
        let rest = part.strip_prefix("filename=")?;
        let name = rest.trim().trim_matches('"').trim_matches('\'');
        if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        }
    })
}

fn filename_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segment = parsed
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .next_back()?;
    Some(segment.to_string())
}

/// The `Content-Type` header without any `;charset=...` suffix.
fn content_type_from_response(response: &reqwest::Response) -> Option<String> {
    let value = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)?
        .to_str()
        .ok()?;
    let media_type = value.split(';').next().unwrap_or("").trim();
    if media_type.is_empty() {
        None
    } else {
        Some(media_type.to_string())
    }
}
