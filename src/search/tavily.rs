//! Tavily keyword search.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SearchError;
use crate::search::{SearchHit, WebSearch, http_client};

const PROVIDER: &str = "tavily";
const DEFAULT_ENDPOINT: &str = "https://api.tavily.com/search";

#[derive(Serialize)]
struct SearchBody<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

pub struct TavilyClient {
    api_key: SecretString,
    endpoint: String,
    client: reqwest::Client,
}

impl TavilyClient {
    pub fn new(api_key: SecretString, timeout: Duration) -> Result<Self, SearchError> {
        Ok(Self {
            api_key,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            client: http_client(PROVIDER, timeout)?,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl WebSearch for TavilyClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError> {
        let body = SearchBody {
            api_key: self.api_key.expose_secret(),
            query,
            max_results,
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| SearchError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(SearchError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: format!("status {status}: {text}"),
            });
        }

        let parsed: SearchResponse = resp.json().await.map_err(|e| SearchError::InvalidResponse {
            provider: PROVIDER.to_string(),
            reason: e.to_string(),
        })?;

        debug!(query, hits = parsed.results.len(), "Tavily search complete");
        Ok(parsed.results)
    }
}
