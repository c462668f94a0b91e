//! Intent classifier. One LLM call per message, strict schema on the reply.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::ClassifyError;
use crate::llm::extract_json_text;
use crate::llm::provider::{ChatMessage, CompletionRequest, FinishReason, LlmProvider};
use crate::pipeline::types::{Candidate, IntentLabel, IntentResult};

/// Max tokens for the classification call.
const CLASSIFY_MAX_TOKENS: u32 = 512;

/// Temperature for classification.
const CLASSIFY_TEMPERATURE: f32 = 0.2;

/// Body characters sent to the model.
const MAX_BODY_CHARS: usize = 8000;

const SYSTEM_PROMPT: &str =
    "You are a helpful agent. Extract the intent and relevant details in JSON.";

/// Raw classifier reply. Every field is optional at this stage;
/// `parse_intent_response` enforces the schema.
#[derive(Debug, Deserialize)]
struct IntentResponse {
    #[serde(default)]
    intent: Option<String>,
    #[serde(default)]
    company: Option<String>,
    #[serde(default)]
    meeting_datetime: Option<String>,
    #[serde(default)]
    participants: Option<Vec<String>>,
}

pub struct IntentClassifier {
    llm: Arc<dyn LlmProvider>,
}

impl IntentClassifier {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Classify one candidate.
    pub async fn classify(&self, candidate: &Candidate) -> Result<IntentResult, ClassifyError> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(build_classify_user_prompt(candidate)),
        ])
        .with_temperature(CLASSIFY_TEMPERATURE)
        .with_max_tokens(CLASSIFY_MAX_TOKENS);

        let response = self.llm.complete(request).await?;
        debug!(
            id = %candidate.message_ref,
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            "Classifier responded"
        );
        if response.finish_reason == FinishReason::Length {
            warn!(id = %candidate.message_ref, "Classifier reply hit the token limit");
        }

        parse_intent_response(&response.content).inspect_err(|e| {
            warn!(id = %candidate.message_ref, error = %e, "Classifier output rejected");
        })
    }
}

/// Build the classification user prompt.
fn build_classify_user_prompt(candidate: &Candidate) -> String {
    let mut prompt = String::with_capacity(1024);
    if let Some(ref subject) = candidate.subject
        && !subject.is_empty()
    {
        prompt.push_str(&format!("Subject: {subject}\n"));
    }
    prompt.push_str(&format!(
        "Email: {}\n\n",
        truncate_chars(&candidate.body, MAX_BODY_CHARS)
    ));
    prompt.push_str(
        "Output a JSON matching the schema:\n\
         - intent: 'company_research' | 'schedule_meeting' | 'other'\n\
         - company (string|null)\n\
         - meeting_datetime (string|null)\n\
         - participants (list of strings|null)\n\
         If no relevant info, use null.",
    );
    prompt
}

/// Truncate on a char boundary.
fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Parse and validate the classifier reply.
pub fn parse_intent_response(raw: &str) -> Result<IntentResult, ClassifyError> {
    let schema_error = |reason: String| ClassifyError::Schema {
        reason,
        raw_output: raw.to_string(),
    };

    let json_str = extract_json_text(raw);
    let response: IntentResponse = serde_json::from_str(&json_str)
        .map_err(|e| schema_error(format!("JSON parse error: {e}")))?;

    let label = response
        .intent
        .as_deref()
        .ok_or_else(|| schema_error("missing field 'intent'".into()))?;
    let label = IntentLabel::from_label(label)
        .ok_or_else(|| schema_error(format!("unknown intent '{label}'")))?;

    match label {
        IntentLabel::CompanyResearch => {
            let company = response
                .company
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .ok_or_else(|| schema_error("company_research without a company".into()))?;
            Ok(IntentResult::CompanyResearch { company })
        }
        IntentLabel::ScheduleMeeting => Ok(IntentResult::ScheduleMeeting {
            datetime: response
                .meeting_datetime
                .map(|d| d.trim().to_string())
                .unwrap_or_default(),
            participants: response
                .participants
                .unwrap_or_default()
                .into_iter()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
        }),
        IntentLabel::Other => Ok(IntentResult::Other),
    }
}
