//! Meeting requests: validate what the classifier extracted.

use chrono::{DateTime, NaiveDateTime};
use regex::Regex;
use serde_json::json;
use tracing::debug;

use crate::pipeline::types::{EnrichedResult, HandlerOutcome, IntentLabel};

/// Accepted naive datetime layouts, most specific first.
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

pub struct MeetingHandler {
    email: Regex,
}

impl Default for MeetingHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl MeetingHandler {
    pub fn new() -> Self {
        Self {
            email: Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static pattern"),
        }
    }

    pub fn handle(
        &self,
        datetime: &str,
        participants: &[String],
        subject: Option<&str>,
    ) -> HandlerOutcome {
        let (datetime, datetime_valid) = match normalize_datetime(datetime) {
            Some(normalized) => (normalized, true),
            None => (datetime.trim().to_string(), false),
        };

        let (valid, invalid): (Vec<&String>, Vec<&String>) = participants
            .iter()
            .partition(|p| self.email.is_match(p.trim()));

        debug!(
            datetime = %datetime,
            datetime_valid,
            participants = valid.len(),
            invalid = invalid.len(),
            "Meeting request validated"
        );

        HandlerOutcome::Persist(EnrichedResult {
            intent: IntentLabel::ScheduleMeeting,
            details: json!({
                "meeting": {
                    "datetime": datetime,
                    "datetime_valid": datetime_valid,
                    "participants": valid,
                    "invalid_participants": invalid,
                    "subject": subject.unwrap_or_default(),
                }
            }),
        })
    }
}

/// Normalize an RFC 3339 or naive ISO-8601 datetime.
/// Naive input stays naive; it carries no offset to invent.
fn normalize_datetime(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.to_rfc3339());
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|ndt| ndt.format("%Y-%m-%dT%H:%M:%S").to_string())
}
