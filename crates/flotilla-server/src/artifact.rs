//! Artifact repository proxy
//!
//! `GET /applications/{id}/artifacts` proxies the artifact repository with
//! server-side paging. The repository is expected to answer
//! `GET {base}/{app_name}/?format=json` with a JSON array of entries.

use std::time::Duration;

use serde::Deserialize;

use flotilla_api::operator::Artifact;
use flotilla_common::FlotillaError;

#[derive(Debug, Deserialize)]
struct RepoEntry {
    name: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    last_modified: Option<String>,
    #[serde(default)]
    size: Option<i64>,
}

#[derive(Clone)]
pub struct ArtifactClient {
    http: reqwest::Client,
    base_url: Option<String>,
    /// Hard cap regardless of the requested limit
    max_items: u64,
}

impl ArtifactClient {
    pub fn new(base_url: Option<String>, max_items: u64) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build artifact HTTP client");
        Self {
            http,
            base_url,
            max_items,
        }
    }

    /// List artifacts for an application, newest first as the repository
    /// returns them, optionally filtered by extension.
    pub async fn list(
        &self,
        app_name: &str,
        extension: Option<&str>,
        limit: Option<u64>,
    ) -> Result<Vec<Artifact>, FlotillaError> {
        let Some(base) = self.base_url.as_deref() else {
            return Err(FlotillaError::PreconditionFailed(
                "artifact repository is not configured".into(),
            ));
        };
        let endpoint = format!("{}/{}/?format=json", base.trim_end_matches('/'), app_name);
        let response = self.http.get(&endpoint).send().await.map_err(|e| {
            if e.is_timeout() {
                FlotillaError::Timeout(format!("{}: {}", endpoint, e))
            } else {
                FlotillaError::RemoteUnavailable(format!("{}: {}", endpoint, e))
            }
        })?;
        if !response.status().is_success() {
            return Err(FlotillaError::RemoteUnavailable(format!(
                "{}: {}",
                endpoint,
                response.status()
            )));
        }
        let entries: Vec<RepoEntry> = response
            .json()
            .await
            .map_err(|e| FlotillaError::RemoteMalformed(format!("{}: {}", endpoint, e)))?;

        let cap = limit.unwrap_or(self.max_items).min(self.max_items) as usize;
        let artifacts = entries
            .into_iter()
            .filter(|entry| {
                extension
                    .map(|ext| entry.name.ends_with(ext))
                    .unwrap_or(true)
            })
            .take(cap)
            .map(|entry| {
                let url = entry
                    .url
                    .unwrap_or_else(|| format!("{}/{}/{}", base, app_name, entry.name));
                Artifact {
                    name: entry.name,
                    url,
                    updated_at: entry.last_modified,
                    size_bytes: entry.size,
                }
            })
            .collect();
        Ok(artifacts)
    }
}
