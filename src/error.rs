//! Error types for mail-intent.

use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Mail provider error: {0}")]
    Mail(#[from] MailError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Credential lifecycle errors. Always fatal for a run.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error(
        "Credential file {path} not found. Run the OAuth consent flow once out-of-band to create it."
    )]
    MissingCredential { path: String },

    #[error("Credential file is invalid: {0}")]
    InvalidCredential(String),

    #[error(
        "Access token expired and no refresh token is available. Manual re-authentication required."
    )]
    NotRefreshable,

    #[error("Token refresh failed: {0}. Manual re-authentication may be required.")]
    RefreshFailed(String),

    #[error("Mail provider rejected the access token. Manual re-authentication required.")]
    Rejected,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Mail provider errors (per request).
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Message {id} not found")]
    NotFound { id: String },

    #[error("Access token expired or revoked")]
    AuthExpired,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Credential error: {0}")]
    Credential(#[from] AuthError),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },
}

/// Web search provider errors.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Search provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Intent classification failures. Carry the raw model output for diagnostics.
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("Classifier LLM call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Classifier output failed schema validation: {reason}")]
    Schema { reason: String, raw_output: String },
}

impl ClassifyError {
    /// Raw model output, when the failure happened after the model answered.
    pub fn raw_output(&self) -> Option<&str> {
        match self {
            Self::Schema { raw_output, .. } => Some(raw_output),
            Self::Llm(_) => None,
        }
    }
}

/// Intent handler failures.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("Summarization LLM call failed: {0}")]
    Llm(#[from] LlmError),
}

/// Pipeline-level errors. Only these abort a run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
