//! Intent handlers. Each takes a classified candidate and decides what,
//! if anything, gets persisted.

pub mod company;
pub mod meeting;

pub use company::CompanyResearchHandler;
pub use meeting::MeetingHandler;

use crate::pipeline::types::HandlerOutcome;

/// Reason recorded when no handler exists for an intent.
pub const UNSUPPORTED_INTENT: &str = "unsupported_intent";

/// Handler for intents with no enrichment.
pub fn no_action() -> HandlerOutcome {
    HandlerOutcome::NoAction {
        reason: UNSUPPORTED_INTENT.to_string(),
    }
}
