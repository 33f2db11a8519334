//! Package search collaborator used by the compose-extension query.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SearchError;

/// One search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResultItem {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Returns a ranked list of items for a search term.
#[async_trait]
pub trait SearchClient: Send + Sync {
    async fn search(&self, text: &str, size: usize) -> Result<Vec<SearchResultItem>, SearchError>;
}

#[derive(Debug, Deserialize)]
struct RegistryResponse {
    #[serde(default)]
    objects: Vec<RegistryObject>,
}

#[derive(Debug, Deserialize)]
struct RegistryObject {
    package: RegistryPackage,
}

#[derive(Debug, Deserialize)]
struct RegistryPackage {
    name: String,
    #[serde(default)]
    description: Option<String>,
}

/// npm registry search (`GET <endpoint>?text=..&size=..`).
pub struct NpmSearchClient {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl NpmSearchClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            timeout,
        }
    }
}

#[async_trait]
impl SearchClient for NpmSearchClient {
    async fn search(&self, text: &str, size: usize) -> Result<Vec<SearchResultItem>, SearchError> {
        debug!(endpoint = %self.endpoint, text = text, size, "Searching packages");

        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[("text", text.to_string()), ("size", size.to_string())])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SearchError::Timeout(self.timeout)
                } else {
                    SearchError::RequestFailed(e.to_string())
                }
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(SearchError::Status { status, body });
        }

        let data: RegistryResponse = resp
            .json()
            .await
            .map_err(|e| SearchError::InvalidResponse(e.to_string()))?;

        Ok(data
            .objects
            .into_iter()
            .map(|obj| SearchResultItem {
                name: obj.package.name,
                description: obj.package.description.unwrap_or_default(),
            })
            .collect())
    }
}
