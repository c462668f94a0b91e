//! Intent pipeline: classify fetched mail and route it to handlers.
//!
//! Flow per message:
//! 1. Skip if a result is already stored
//! 2. Fetch and extract the body
//! 3. LLM classification → `IntentResult`
//! 4. Route to a handler → persist or no-op

pub mod classifier;
pub mod handlers;
pub mod orchestrator;
pub mod poller;
pub mod router;
pub mod types;

pub use classifier::IntentClassifier;
pub use orchestrator::Orchestrator;
pub use poller::spawn_poller;
pub use router::IntentRouter;
pub use types::{
    Candidate, EnrichedResult, HandlerOutcome, IntentLabel, IntentResult, RunSummary,
    SkippedMessage, Stage,
};
