//! Configuration types, loaded from the environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::{LlmBackend, LlmConfig};
use crate::mail::GmailConfig;
use crate::mail::lister::MAX_PAGE_SIZE;
use crate::mail::query::{
    DEFAULT_EXCLUDE_TERMS, DEFAULT_INCLUDE_TERMS, DEFAULT_WINDOW_MINUTES, SearchQuery,
};

const DEFAULT_LABELS: &[&str] = &["INBOX", "CATEGORY_PERSONAL"];
const DEFAULT_PAGE_SIZE: u32 = 100;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 3600;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Which messages a run considers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterConfig {
    pub include_terms: Vec<String>,
    pub exclude_terms: Vec<String>,
    pub label_ids: Vec<String>,
    /// Look-back window ending at run time.
    pub window_minutes: i64,
    pub page_size: u32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            include_terms: to_strings(DEFAULT_INCLUDE_TERMS),
            exclude_terms: to_strings(DEFAULT_EXCLUDE_TERMS),
            label_ids: to_strings(DEFAULT_LABELS),
            window_minutes: DEFAULT_WINDOW_MINUTES,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl FilterConfig {
    /// The search filter for a run starting at `now`.
    pub fn query_at(&self, now: DateTime<Utc>) -> SearchQuery {
        SearchQuery::new()
            .include_any(self.include_terms.iter().cloned())
            .exclude(self.exclude_terms.iter().cloned())
            .within_last(self.window_minutes, now)
    }
}

/// Optional enrichment backends. Unset keys disable the lookup.
#[derive(Debug, Clone, Default)]
pub struct SearchConfig {
    pub tavily_api_key: Option<SecretString>,
    pub serpapi_api_key: Option<SecretString>,
}

/// Full application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub gmail: GmailConfig,
    /// Authorized-user credential file.
    pub token_path: PathBuf,
    pub filter: FilterConfig,
    pub llm_backend: LlmBackend,
    pub llm_model: String,
    pub llm_api_key: Option<SecretString>,
    pub search: SearchConfig,
    pub db_path: PathBuf,
    pub poll_interval: Duration,
    pub http_timeout: Duration,
}

impl AppConfig {
    /// Load from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` for variable values.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let http_timeout =
            Duration::from_secs(parse_or(&get, "MAIL_INTENT_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?);

        let page_size: u32 = parse_or(&get, "MAIL_INTENT_PAGE_SIZE", DEFAULT_PAGE_SIZE)?;
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::InvalidValue {
                key: "MAIL_INTENT_PAGE_SIZE".into(),
                message: format!("must be between 1 and {MAX_PAGE_SIZE}"),
            });
        }

        let window_minutes: i64 =
            parse_or(&get, "MAIL_INTENT_WINDOW_MINUTES", DEFAULT_WINDOW_MINUTES)?;
        if window_minutes <= 0 {
            return Err(ConfigError::InvalidValue {
                key: "MAIL_INTENT_WINDOW_MINUTES".into(),
                message: "must be positive".into(),
            });
        }

        let filter = FilterConfig {
            include_terms: list_or(&get, "MAIL_INTENT_INCLUDE_TERMS", DEFAULT_INCLUDE_TERMS),
            exclude_terms: list_or(&get, "MAIL_INTENT_EXCLUDE_TERMS", DEFAULT_EXCLUDE_TERMS),
            label_ids: list_or(&get, "MAIL_INTENT_LABELS", DEFAULT_LABELS),
            window_minutes,
            page_size,
        };

        let llm_backend = match get("MAIL_INTENT_LLM_BACKEND") {
            Some(raw) => LlmBackend::from_str(&raw).map_err(|message| ConfigError::InvalidValue {
                key: "MAIL_INTENT_LLM_BACKEND".into(),
                message,
            })?,
            None => LlmBackend::Anthropic,
        };
        let llm_model =
            get("MAIL_INTENT_MODEL").unwrap_or_else(|| llm_backend.default_model().to_string());
        let llm_api_key = get(llm_backend.api_key_var()).map(SecretString::from);

        let poll_secs: u64 =
            parse_or(&get, "MAIL_INTENT_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?;
        if poll_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "MAIL_INTENT_POLL_INTERVAL_SECS".into(),
                message: "must be positive".into(),
            });
        }

        let gmail = GmailConfig {
            user_id: get("MAIL_INTENT_GMAIL_USER").unwrap_or_else(|| "me".to_string()),
            timeout: http_timeout,
            ..GmailConfig::default()
        };

        Ok(Self {
            gmail,
            token_path: get("MAIL_INTENT_TOKEN_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./token.json")),
            filter,
            llm_backend,
            llm_model,
            llm_api_key,
            search: SearchConfig {
                tavily_api_key: get("TAVILY_API_KEY").map(SecretString::from),
                serpapi_api_key: get("SERPAPI_API_KEY").map(SecretString::from),
            },
            db_path: get("MAIL_INTENT_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data/mail-intent.db")),
            poll_interval: Duration::from_secs(poll_secs),
            http_timeout,
        })
    }

    /// LLM settings. Fails if the chosen backend has no API key.
    pub fn llm_config(&self) -> Result<LlmConfig, ConfigError> {
        let api_key = self
            .llm_api_key
            .clone()
            .ok_or_else(|| ConfigError::MissingRequired {
                key: self.llm_backend.api_key_var().to_string(),
                hint: "Set it in the environment or in .env".to_string(),
            })?;
        Ok(LlmConfig {
            backend: self.llm_backend,
            api_key,
            model: self.llm_model.clone(),
        })
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{raw}': {e}"),
        }),
        None => Ok(default),
    }
}

fn list_or<G>(get: &G, key: &str, default: &[&str]) -> Vec<String>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        None => to_strings(default),
    }
}
