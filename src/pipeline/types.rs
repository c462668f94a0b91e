//! Shared types for the intent pipeline.

use serde::{Deserialize, Serialize};

/// A fetched message ready for classification.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub message_ref: String,
    pub subject: Option<String>,
    /// Raw `Date` header.
    pub date: Option<String>,
    pub body: String,
}

/// Intent labels the classifier may emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentLabel {
    CompanyResearch,
    ScheduleMeeting,
    Other,
}

impl IntentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CompanyResearch => "company_research",
            Self::ScheduleMeeting => "schedule_meeting",
            Self::Other => "other",
        }
    }

    /// Parse an exact wire label.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "company_research" => Some(Self::CompanyResearch),
            "schedule_meeting" => Some(Self::ScheduleMeeting),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

impl std::fmt::Display for IntentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified intent with its extracted details.
#[derive(Debug, Clone, PartialEq)]
pub enum IntentResult {
    CompanyResearch {
        company: String,
    },
    ScheduleMeeting {
        /// ISO-8601 text as the model produced it; empty when none was found.
        datetime: String,
        participants: Vec<String>,
    },
    Other,
}

impl IntentResult {
    pub fn label(&self) -> IntentLabel {
        match self {
            Self::CompanyResearch { .. } => IntentLabel::CompanyResearch,
            Self::ScheduleMeeting { .. } => IntentLabel::ScheduleMeeting,
            Self::Other => IntentLabel::Other,
        }
    }
}

/// Handler output destined for persistence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedResult {
    pub intent: IntentLabel,
    /// Always a JSON object.
    pub details: serde_json::Value,
}

/// What a handler decided for one message.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerOutcome {
    Persist(EnrichedResult),
    NoAction { reason: String },
}

/// Pipeline stage at which a message was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Lookup,
    Fetch,
    Extract,
    Classify,
    Handle,
    Persist,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lookup => "lookup",
            Self::Fetch => "fetch",
            Self::Extract => "extract",
            Self::Classify => "classify",
            Self::Handle => "handle",
            Self::Persist => "persist",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message that did not make it through the pipeline this run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedMessage {
    pub message_ref: String,
    pub stage: Stage,
    pub reason: String,
}

/// Outcome of one orchestrator pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub listed: usize,
    pub already_processed: usize,
    pub persisted: usize,
    pub no_action: usize,
    pub skipped: Vec<SkippedMessage>,
    pub listing_complete: bool,
}

impl RunSummary {
    pub fn skip(&mut self, message_ref: &str, stage: Stage, reason: impl Into<String>) {
        self.skipped.push(SkippedMessage {
            message_ref: message_ref.to_string(),
            stage,
            reason: reason.into(),
        });
    }
}
