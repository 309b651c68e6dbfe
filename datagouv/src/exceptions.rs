use crate::error::{DatagouvError, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Records served by the crawler's exception-list endpoint.
#[derive(Debug, Deserialize)]
struct ExceptionRecord {
    resource_id: Option<String>,
}

#[derive(Clone)]
struct CacheEntry {
    ids: HashSet<String>,
    fetched_at: Instant,
}

/// TTL cache over the crawler's resource-exception list.
///
/// The exception list names resources the tabular API refuses to parse.
/// It is a single upstream list, so the cache is a single slot: a value
/// younger than the TTL is served without a network call, a refresh
/// replaces it, and a failed refresh returns the previous value no
/// matter how old it is. The error only propagates when there has never
/// been a successful fetch.
pub struct ExceptionCache {
    ttl: Duration,
    slot: Mutex<Option<CacheEntry>>,
}

impl std::fmt::Debug for ExceptionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExceptionCache")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl ExceptionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(None),
        }
    }

    /// Fetch the exception set, honoring the cache unless
    /// `force_refresh` is set.
    pub async fn fetch(
        &self,
        client: &reqwest::Client,
        base_url: &str,
        force_refresh: bool,
    ) -> Result<HashSet<String>> {
        if !force_refresh {
            if let Some(ids) = self.fresh_value() {
                return Ok(ids);
            }
        }

        let url = format!("{base_url}resources-exceptions/");
        match fetch_upstream(client, &url).await {
            Ok(ids) => {
                let mut slot = self.slot.lock().unwrap();
                *slot = Some(CacheEntry {
                    ids: ids.clone(),
                    fetched_at: Instant::now(),
                });
                Ok(ids)
            }
            Err(err) => {
                // Stale fallback: any previous value beats the error.
                let slot = self.slot.lock().unwrap();
                match slot.as_ref() {
                    Some(entry) => {
                        tracing::warn!("exception list refresh failed, serving stale value: {err}");
                        Ok(entry.ids.clone())
                    }
                    None => Err(err),
                }
            }
        }
    }

    /// Forget the cached value (used for test isolation).
    pub fn clear(&self) {
        *self.slot.lock().unwrap() = None;
    }

    fn fresh_value(&self) -> Option<HashSet<String>> {
        let slot = self.slot.lock().unwrap();
        slot.as_ref()
            .filter(|entry| entry.fetched_at.elapsed() < self.ttl)
            .map(|entry| entry.ids.clone())
    }
}

async fn fetch_upstream(client: &reqwest::Client, url: &str) -> Result<HashSet<String>> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(DatagouvError::Http {
            status: status.as_u16(),
            message: format!("while fetching {url}"),
        });
    }
    let records: Vec<ExceptionRecord> = response.json().await?;
    Ok(records
        .into_iter()
        .filter_map(|record| record.resource_id)
        .collect())
}
