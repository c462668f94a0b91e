//! SerpApi Google knowledge-graph lookup.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::SearchError;
use crate::search::{KnowledgeGraph, http_client};

const PROVIDER: &str = "serpapi";
const DEFAULT_ENDPOINT: &str = "https://serpapi.com/search.json";

pub struct SerpApiClient {
    api_key: SecretString,
    endpoint: String,
    client: reqwest::Client,
}

impl SerpApiClient {
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

/// Pull the `knowledge_graph` object out of a search response.
fn knowledge_graph_of(response: Value) -> Result<Map<String, Value>, SearchError> {
    let Value::Object(mut root) = response else {
        return Err(SearchError::InvalidResponse {
            provider: PROVIDER.to_string(),
            reason: "response is not a JSON object".to_string(),
        });
    };
    if let Some(Value::String(error)) = root.get("error") {
        return Err(SearchError::RequestFailed {
            provider: PROVIDER.to_string(),
            reason: error.clone(),
        });
    }
    match root.remove("knowledge_graph") {
        Some(Value::Object(graph)) => Ok(graph),
        _ => Ok(Map::new()),
    }
}

#[async_trait]
impl KnowledgeGraph for SerpApiClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn lookup(&self, query: &str) -> Result<Map<String, Value>, SearchError> {
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("engine", "google"),
                ("q", query),
                ("api_key", self.api_key.expose_secret()),
            ])
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

        let body: Value = resp.json().await.map_err(|e| SearchError::InvalidResponse {
            provider: PROVIDER.to_string(),
            reason: e.to_string(),
        })?;

        let graph = knowledge_graph_of(body)?;
        debug!(query, facts = graph.len(), "Knowledge graph lookup complete");
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_knowledge_graph() {
        let graph = knowledge_graph_of(json!({
            "search_metadata": {"status": "Success"},
            "knowledge_graph": {"title": "Acme", "headquarters": "Springfield"}
        }))
        .unwrap();
        assert_eq!(graph["headquarters"], "Springfield");
    }

    #[test]
    fn missing_graph_is_empty() {
        let graph = knowledge_graph_of(json!({"organic_results": []})).unwrap();
        assert!(graph.is_empty());
    }

    fn client(server: &mockito::ServerGuard) -> SerpApiClient {
        SerpApiClient::new(SecretString::from("serp-test"), Duration::from_secs(2))
            .unwrap()
            .with_endpoint(format!("{}/search.json", server.url()))
    }

    #[tokio::test]
    async fn lookup_sends_query_and_returns_graph() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/search.json")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("engine".into(), "google".into()),
                mockito::Matcher::UrlEncoded("q".into(), "Acme Corp".into()),
                mockito::Matcher::UrlEncoded("api_key".into(), "serp-test".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"search_metadata": {"status": "Success"},
                    "knowledge_graph": {"title": "Acme Corp", "headquarters": "Springfield", "employees": "1,200"},
                    "organic_results": []}"#,
            )
            .create_async()
            .await;

        let graph = client(&server).lookup("Acme Corp").await.unwrap();

        mock.assert_async().await;
        assert_eq!(graph["title"], "Acme Corp");
        assert_eq!(graph["employees"], "1,200");
    }

    #[tokio::test]
    async fn error_body_with_success_status_is_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/search.json")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error": "Invalid API key. Your API key should be here: https://serpapi.com/manage-api-key"}"#)
            .create_async()
            .await;

        assert!(matches!(
            client(&server).lookup("Acme").await,
            Err(SearchError::RequestFailed { .. })
        ));
    }

    #[test]
    fn api_error_field_is_failure() {
        let result = knowledge_graph_of(json!({"error": "Invalid API key."}));
        assert!(matches!(result, Err(SearchError::RequestFailed { .. })));
    }
}
