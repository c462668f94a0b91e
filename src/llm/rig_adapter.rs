//! Bridges rig's `CompletionModel` to `LlmProvider`.

use async_trait::async_trait;
use rig::completion::{AssistantContent, CompletionModel, Message};

use crate::error::LlmError;
use crate::llm::provider::{
    ChatMessage, CompletionRequest, CompletionResponse, FinishReason, LlmProvider, Role,
};

/// Wraps any rig completion model.
pub struct RigAdapter<M> {
    model: M,
    model_name: String,
}

impl<M> RigAdapter<M> {
    pub fn new(model: M, model_name: &str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
        }
    }
}

/// Split our message list into (preamble, history, prompt) as rig expects.
fn split_messages(messages: &[ChatMessage]) -> (Option<String>, Vec<Message>, Option<String>) {
    let preamble: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();
    let preamble = (!preamble.is_empty()).then(|| preamble.join("\n\n"));

    let mut turns: Vec<&ChatMessage> = messages.iter().filter(|m| m.role != Role::System).collect();
    let prompt = match turns.last() {
        Some(last) if last.role == Role::User => turns.pop().map(|m| m.content.clone()),
        _ => None,
    };

    let history = turns
        .into_iter()
        .map(|m| match m.role {
            Role::Assistant => Message::assistant(m.content.clone()),
            _ => Message::user(m.content.clone()),
        })
        .collect();

    (preamble, history, prompt)
}

/// Map a rig error message onto our error kinds by its status markers.
fn classify_error(provider: &str, message: String) -> LlmError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("429") || lower.contains("rate limit") || lower.contains("rate_limit") {
        LlmError::RateLimited {
            provider: provider.to_string(),
            retry_after: None,
        }
    } else if lower.contains("401")
        || lower.contains("authentication")
        || lower.contains("invalid x-api-key")
    {
        LlmError::AuthFailed {
            provider: provider.to_string(),
        }
    } else {
        LlmError::RequestFailed {
            provider: provider.to_string(),
            reason: message,
        }
    }
}

/// A reply that used the whole token budget is reported as `Length`.
fn finish_reason(output_tokens: u32, max_tokens: Option<u32>) -> FinishReason {
    match max_tokens {
        Some(limit) if output_tokens >= limit => FinishReason::Length,
        _ => FinishReason::Stop,
    }
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + Send + Sync + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let (preamble, history, prompt) = split_messages(&request.messages);
        let prompt = prompt.ok_or_else(|| LlmError::InvalidResponse {
            provider: self.model_name.clone(),
            reason: "request must end with a user message".to_string(),
        })?;

        let mut builder = self.model.completion_request(prompt).messages(history);
        if let Some(preamble) = preamble {
            builder = builder.preamble(preamble);
        }
        if let Some(temperature) = request.temperature {
            builder = builder.temperature(f64::from(temperature));
        }
        if let Some(max_tokens) = request.max_tokens {
            builder = builder.max_tokens(u64::from(max_tokens));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| classify_error(&self.model_name, e.to_string()))?;

        let content: String = response
            .choice
            .iter()
            .filter_map(|c| match c {
                AssistantContent::Text(text) => Some(text.text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");

        let output_tokens = response.usage.output_tokens.try_into().unwrap_or(u32::MAX);
        Ok(CompletionResponse {
            content,
            input_tokens: response.usage.input_tokens.try_into().unwrap_or(u32::MAX),
            output_tokens,
            finish_reason: finish_reason(output_tokens, request.max_tokens),
            response_id: None,
        })
    }
}
