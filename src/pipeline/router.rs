//! Intent router: one handler per classified message.

use tracing::debug;

use crate::error::HandlerError;
use crate::pipeline::handlers::{self, CompanyResearchHandler, MeetingHandler};
use crate::pipeline::types::{Candidate, HandlerOutcome, IntentResult};

pub struct IntentRouter {
    company: CompanyResearchHandler,
    meeting: MeetingHandler,
}

impl IntentRouter {
    pub fn new(company: CompanyResearchHandler, meeting: MeetingHandler) -> Self {
        Self { company, meeting }
    }

    /// Dispatch `intent` to its handler.
    pub async fn route(
        &self,
        candidate: &Candidate,
        intent: &IntentResult,
    ) -> Result<HandlerOutcome, HandlerError> {
        debug!(id = %candidate.message_ref, intent = %intent.label(), "Routing");
        match intent {
            IntentResult::CompanyResearch { company } => self.company.handle(company).await,
            IntentResult::ScheduleMeeting {
                datetime,
                participants,
            } => Ok(self
                .meeting
                .handle(datetime, participants, candidate.subject.as_deref())),
            IntentResult::Other => Ok(handlers::no_action()),
        }
    }
}
