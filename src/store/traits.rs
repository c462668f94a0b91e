//! `Database` trait, the single async interface for result persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::DatabaseError;

/// A result ready to be appended.
#[derive(Debug, Clone)]
pub struct NewResult {
    pub message_ref: String,
    /// Intent label, e.g. `company_research`.
    pub intent: String,
    pub subject: Option<String>,
    /// Raw `Date` header of the source message.
    pub date: Option<String>,
    pub details: serde_json::Value,
}

/// A persisted result row.
#[derive(Debug, Clone, Serialize)]
pub struct StoredResult {
    pub id: String,
    pub message_ref: String,
    pub intent: String,
    pub subject: Option<String>,
    pub date: Option<String>,
    pub details: serde_json::Value,
    pub processed_at: DateTime<Utc>,
}

/// The columns the dashboard shows for one result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardRow {
    pub company: String,
    pub headline: String,
    pub intent: String,
    pub content: serde_json::Value,
}

const PLACEHOLDER: &str = " - ";

impl StoredResult {
    /// Project to the dashboard view. Missing fields show a placeholder.
    pub fn dashboard_row(&self) -> DashboardRow {
        let company = self
            .details
            .get("company")
            .and_then(|v| v.as_str())
            .unwrap_or(PLACEHOLDER)
            .to_string();
        let content = self
            .details
            .get("extracted")
            .or_else(|| self.details.get("meeting"))
            .cloned()
            .unwrap_or_else(|| serde_json::Value::String(PLACEHOLDER.to_string()));
        DashboardRow {
            company,
            headline: self
                .subject
                .clone()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| PLACEHOLDER.to_string()),
            intent: self.intent.clone(),
            content,
        }
    }
}

/// Backend-agnostic persistence for processed messages.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    /// Append a result. Returns the new row id.
    /// A second result for the same message is a `Constraint` error.
    async fn append_result(&self, result: &NewResult) -> Result<String, DatabaseError>;

    /// Whether a result exists for this message reference.
    async fn is_processed(&self, message_ref: &str) -> Result<bool, DatabaseError>;

    /// Results in dashboard order: meetings first, then by message date
    /// (unparseable dates last), then by processing time.
    async fn list_results(&self, limit: usize) -> Result<Vec<StoredResult>, DatabaseError>;

    /// Delete results processed more than `keep_days` ago. Returns rows removed.
    async fn prune_results(&self, keep_days: u32) -> Result<u64, DatabaseError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stored(intent: &str, details: serde_json::Value) -> StoredResult {
        StoredResult {
            id: "1".into(),
            message_ref: "m1".into(),
            intent: intent.into(),
            subject: Some("Intro call".into()),
            date: None,
            details,
            processed_at: Utc::now(),
        }
    }

    #[test]
    fn company_row_shows_extracted() {
        let row = stored(
            "company_research",
            json!({"company": "Acme", "extracted": {"headquarters": "Springfield"}}),
        )
        .dashboard_row();
        assert_eq!(row.company, "Acme");
        assert_eq!(row.headline, "Intro call");
        assert_eq!(row.content["headquarters"], "Springfield");
    }

    #[test]
    fn meeting_row_uses_placeholder_company() {
        let row = stored(
            "schedule_meeting",
            json!({"meeting": {"datetime": "2025-07-10T15:00:00"}}),
        )
        .dashboard_row();
        assert_eq!(row.company, PLACEHOLDER);
        assert_eq!(row.content["datetime"], "2025-07-10T15:00:00");
    }
}
