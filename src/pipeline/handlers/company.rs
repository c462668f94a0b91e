//! Company research: web search plus knowledge graph, summarized by the LLM.

use std::sync::Arc;

use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use crate::error::HandlerError;
use crate::llm::parse_json_object;
use crate::llm::provider::{ChatMessage, CompletionRequest, FinishReason, LlmProvider};
use crate::pipeline::types::{EnrichedResult, HandlerOutcome, IntentLabel};
use crate::search::{KnowledgeGraph, SearchHit, WebSearch};

/// Search results requested per company.
const MAX_SEARCH_RESULTS: usize = 5;

const SUMMARY_MAX_TOKENS: u32 = 1024;
const SUMMARY_TEMPERATURE: f32 = 0.2;

const SUMMARY_SYSTEM_PROMPT: &str =
    "You are a research assistant extracting structured company details.";

/// Sentinel `error` value when the summary is not JSON.
pub const NOT_JSON_ERROR: &str = "LLM output not JSON";

pub struct CompanyResearchHandler {
    llm: Arc<dyn LlmProvider>,
    search: Option<Arc<dyn WebSearch>>,
    knowledge_graph: Option<Arc<dyn KnowledgeGraph>>,
}

impl CompanyResearchHandler {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        search: Option<Arc<dyn WebSearch>>,
        knowledge_graph: Option<Arc<dyn KnowledgeGraph>>,
    ) -> Self {
        Self {
            llm,
            search,
            knowledge_graph,
        }
    }

    /// Research `company` and summarize what was found.
    ///
    /// Lookup failures are logged and contribute nothing. Only a failed
    /// summarization call is an error.
    pub async fn handle(&self, company: &str) -> Result<HandlerOutcome, HandlerError> {
        info!(company, "Researching company");

        let hits = self.search_hits(company).await;
        let graph = self.graph_facts(company).await;

        let summary_snippet = join_snippets(&hits);
        let graph_summary = graph_lines(&graph);
        let snippets = format!("{summary_snippet}\n\n{graph_summary}");

        let request = CompletionRequest::new(vec![
            ChatMessage::system(SUMMARY_SYSTEM_PROMPT),
            ChatMessage::user(build_summary_user_prompt(&snippets)),
        ])
        .with_temperature(SUMMARY_TEMPERATURE)
        .with_max_tokens(SUMMARY_MAX_TOKENS);

        let response = self.llm.complete(request).await?;
        if response.finish_reason == FinishReason::Length {
            warn!(company, "Company summary hit the token limit");
        }
        let extracted = parse_summary(&response.content);

        let raw_results = serde_json::to_value(&hits).unwrap_or(Value::Array(Vec::new()));
        Ok(HandlerOutcome::Persist(EnrichedResult {
            intent: IntentLabel::CompanyResearch,
            details: json!({
                "company": company,
                "summary_snippet": summary_snippet,
                "raw_results": raw_results,
                "knowledge_graph": Value::Object(graph),
                "extracted": extracted,
            }),
        }))
    }

    async fn search_hits(&self, company: &str) -> Vec<SearchHit> {
        let Some(ref search) = self.search else {
            debug!("Web search not configured");
            return Vec::new();
        };
        match search.search(company, MAX_SEARCH_RESULTS).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(provider = search.name(), company, error = %e, "Web search failed");
                Vec::new()
            }
        }
    }

    async fn graph_facts(&self, company: &str) -> Map<String, Value> {
        let Some(ref graph) = self.knowledge_graph else {
            debug!("Knowledge graph not configured");
            return Map::new();
        };
        match graph.lookup(company).await {
            Ok(facts) => facts,
            Err(e) => {
                warn!(provider = graph.name(), company, error = %e, "Knowledge graph lookup failed");
                Map::new()
            }
        }
    }
}

/// Space-joined search snippets.
fn join_snippets(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|h| h.snippet.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// One `key: value` line per knowledge-graph fact.
fn graph_lines(graph: &Map<String, Value>) -> String {
    graph
        .iter()
        .map(|(key, value)| match value {
            Value::String(s) => format!("{key}: {s}"),
            other => format!("{key}: {other}"),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn build_summary_user_prompt(snippets: &str) -> String {
    format!(
        "Here are search result snippets:\n\n{snippets}\n\n\
         Please summarize and extract:\n\
         - Headquarters\n\
         - Total number of employees (approximate)\n\
         - Office locations mention\n\
         - One-line company description\n\n\
         Output as JSON."
    )
}

/// Parsed summary, or the not-JSON sentinel carrying the raw text.
fn parse_summary(raw: &str) -> Value {
    match parse_json_object(raw) {
        Some(map) => Value::Object(map),
        None => json!({
            "error": NOT_JSON_ERROR,
            "raw_output": raw,
        }),
    }
}
