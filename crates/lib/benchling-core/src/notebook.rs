//! Benchling REST client for notebook entries.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::settings::ApiSettings;

const USER_AGENT: &str = concat!("benchling-mcp/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, thiserror::Error)]
pub enum NotebookError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Benchling API returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("invalid Benchling base URL `{0}`")]
    InvalidBaseUrl(String),
}

/// Outcome of looking up a single notebook entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EntryLookup {
    Found { id: String, entry: Value },
    NotFound { id: String },
    Failed { id: String, error: String },
}

impl EntryLookup {
    #[must_use]
    pub const fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }
}

/// Returns true when `id` is a non-empty run of ASCII letters, digits, `_` or `-`.
#[must_use]
pub fn is_valid_entry_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Thin client over `GET /entries/{id}`.
#[derive(Debug, Clone)]
pub struct BenchlingClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
}

impl BenchlingClient {
    /// Builds a client for the normalized API base URL.
    ///
    /// # Errors
    /// Returns an error if the base URL does not parse or the HTTP client cannot be built.
    pub fn new(settings: &ApiSettings) -> Result<Self, NotebookError> {
        Self::with_timeout(&settings.base_url, &settings.api_key, settings.http_timeout)
    }

    /// # Errors
    /// Returns an error if the base URL does not parse or the HTTP client cannot be built.
    pub fn with_timeout(
        base_url: &str,
        api_key: &str,
        timeout: Duration,
    ) -> Result<Self, NotebookError> {
        // a trailing slash keeps `join` from dropping the last path segment
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url =
            Url::parse(&normalized).map_err(|_| NotebookError::InvalidBaseUrl(base_url.to_string()))?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            http,
            base_url,
            api_key: api_key.to_string(),
        })
    }

    /// Fetches one entry; `Ok(None)` when Benchling answers 404.
    ///
    /// # Errors
    /// Returns an error on transport failures and non-success statuses other than 404.
    pub async fn get_entry(&self, id: &str) -> Result<Option<Value>, NotebookError> {
        let url = self
            .base_url
            .join(&format!("entries/{id}"))
            .map_err(|_| NotebookError::InvalidBaseUrl(self.base_url.to_string()))?;
        debug!(%url, "fetching notebook entry");

        let response = self
            .http
            .get(url)
            .basic_auth(&self.api_key, None::<&str>)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotebookError::Status { status, body });
        }

        let payload: Value = response.json().await?;
        let entry = match payload {
            Value::Object(mut map) => match map.remove("entry") {
                Some(entry) => entry,
                None => Value::Object(map),
            },
            other => other,
        };
        Ok(Some(entry))
    }

    /// Looks up each id in order; one failing id never hides the others.
    pub async fn lookup_entries(&self, ids: &[String]) -> Vec<EntryLookup> {
        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            let lookup = match self.get_entry(id).await {
                Ok(Some(entry)) => EntryLookup::Found {
                    id: id.clone(),
                    entry,
                },
                Ok(None) => EntryLookup::NotFound { id: id.clone() },
                Err(err) => {
                    warn!(entry_id = %id, error = %err, "notebook entry lookup failed");
                    EntryLookup::Failed {
                        id: id.clone(),
                        error: err.to_string(),
                    }
                }
            };
            results.push(lookup);
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_ids_are_validated() {
        assert!(is_valid_entry_id("etr_1a2B"));
        assert!(is_valid_entry_id("etr-abc"));
        assert!(!is_valid_entry_id(""));
        assert!(!is_valid_entry_id("etr_1/../x"));
        assert!(!is_valid_entry_id("etr 1"));
    }

    #[test]
    fn lookups_serialize_with_status_tag() {
        let found = EntryLookup::Found {
            id: "etr_1".to_string(),
            entry: serde_json::json!({"name": "Day 1"}),
        };
        let missing = EntryLookup::NotFound {
            id: "etr_2".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&found).unwrap(),
            serde_json::json!({"status": "found", "id": "etr_1", "entry": {"name": "Day 1"}})
        );
        assert_eq!(
            serde_json::to_value(&missing).unwrap(),
            serde_json::json!({"status": "not_found", "id": "etr_2"})
        );
    }

    #[test]
    fn rejects_unparseable_base_url() {
        let err = BenchlingClient::with_timeout("not a url", "key", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, NotebookError::InvalidBaseUrl(_)));
    }
}
