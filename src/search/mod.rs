//! Web lookups used by the company research handler.

pub mod serpapi;
pub mod tavily;

pub use serpapi::SerpApiClient;
pub use tavily::TavilyClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SearchError;

/// One keyword search result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    /// Text excerpt for the page.
    #[serde(default, alias = "content")]
    pub snippet: String,
}

/// Keyword web search collaborator.
#[async_trait]
pub trait WebSearch: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError>;
}

/// Knowledge-graph collaborator. Returns the entity's key/value facts,
/// empty when the engine has no panel for the query.
#[async_trait]
pub trait KnowledgeGraph: Send + Sync {
    fn name(&self) -> &str;

    async fn lookup(
        &self,
        query: &str,
    ) -> Result<serde_json::Map<String, serde_json::Value>, SearchError>;
}

/// Shared reqwest client construction for the search backends.
pub(crate) fn http_client(
    provider: &str,
    timeout: std::time::Duration,
) -> Result<reqwest::Client, SearchError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| SearchError::RequestFailed {
            provider: provider.to_string(),
            reason: format!("Failed to build HTTP client: {e}"),
        })
}
