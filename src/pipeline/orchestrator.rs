//! One pipeline pass: list → fetch → extract → classify → route → persist.
//!
//! Messages are processed strictly one at a time. A failure at any stage
//! skips that message only; the only errors that end a run are credential
//! failures before the per-message loop starts.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::config::FilterConfig;
use crate::error::{AuthError, MailError, PipelineError};
use crate::mail::{MailProvider, MessageLister, MessageRef, extract_body};
use crate::pipeline::classifier::IntentClassifier;
use crate::pipeline::router::IntentRouter;
use crate::pipeline::types::{Candidate, HandlerOutcome, RunSummary, Stage};
use crate::store::{Database, NewResult};

pub struct Orchestrator {
    mail: Arc<dyn MailProvider>,
    lister: MessageLister,
    filter: FilterConfig,
    classifier: IntentClassifier,
    router: IntentRouter,
    db: Arc<dyn Database>,
}

impl Orchestrator {
    pub fn new(
        mail: Arc<dyn MailProvider>,
        filter: FilterConfig,
        classifier: IntentClassifier,
        router: IntentRouter,
        db: Arc<dyn Database>,
    ) -> Self {
        let lister = MessageLister::new(
            Arc::clone(&mail),
            filter.label_ids.clone(),
            filter.page_size,
        );
        Self {
            mail,
            lister,
            filter,
            classifier,
            router,
            db,
        }
    }

    /// Run a single pass over the current filter window.
    pub async fn run_once(&self) -> Result<RunSummary, PipelineError> {
        let mut summary = RunSummary::default();

        self.probe_access().await?;

        let query = self.filter.query_at(Utc::now());
        let listing = self.lister.list_all(&query).await?;
        summary.listed = listing.references.len();
        summary.listing_complete = listing.complete;

        if !listing.complete {
            warn!(
                listed = summary.listed,
                "Listing incomplete; processing nothing this run"
            );
            return Ok(summary);
        }

        if listing.references.is_empty() {
            info!("No messages matched the filter");
            return Ok(summary);
        }

        for reference in &listing.references {
            self.process_one(reference, &mut summary).await;
        }

        info!(
            listed = summary.listed,
            already_processed = summary.already_processed,
            persisted = summary.persisted,
            no_action = summary.no_action,
            skipped = summary.skipped.len(),
            "Run complete"
        );
        Ok(summary)
    }

    /// Fail fast on a rejected credential. Other probe failures are left
    /// for the listing to surface.
    async fn probe_access(&self) -> Result<(), PipelineError> {
        match self.mail.check_access().await {
            Ok(()) => {
                debug!(provider = self.mail.name(), "Mailbox access verified");
                Ok(())
            }
            Err(MailError::AuthExpired) => Err(PipelineError::Auth(AuthError::Rejected)),
            Err(MailError::Credential(e)) => Err(PipelineError::Auth(e)),
            Err(e) => {
                warn!(provider = self.mail.name(), error = %e, "Access probe failed");
                Ok(())
            }
        }
    }

    async fn process_one(&self, reference: &MessageRef, summary: &mut RunSummary) {
        let id = reference.id.as_str();

        match self.db.is_processed(id).await {
            Ok(true) => {
                debug!(id, "Already processed");
                summary.already_processed += 1;
                return;
            }
            Ok(false) => {}
            Err(e) => {
                error!(id, stage = %Stage::Lookup, error = %e, "Skipping message");
                summary.skip(id, Stage::Lookup, e.to_string());
                return;
            }
        }

        let message = match self.mail.get_message(id).await {
            Ok(message) => message,
            Err(e) => {
                error!(id, stage = %Stage::Fetch, error = %e, "Skipping message");
                summary.skip(id, Stage::Fetch, e.to_string());
                return;
            }
        };

        let body = message
            .payload
            .as_ref()
            .map(extract_body)
            .unwrap_or_default();
        if body.trim().is_empty() {
            warn!(id, stage = %Stage::Extract, "No extractable body; skipping");
            summary.skip(id, Stage::Extract, "no extractable body");
            return;
        }

        let candidate = Candidate {
            message_ref: id.to_string(),
            subject: Some(message.subject()).filter(|s| !s.is_empty()),
            date: Some(message.date()).filter(|s| !s.is_empty()),
            body,
        };

        let intent = match self.classifier.classify(&candidate).await {
            Ok(intent) => intent,
            Err(e) => {
                error!(
                    id,
                    stage = %Stage::Classify,
                    error = %e,
                    raw_output = e.raw_output().unwrap_or(""),
                    "Skipping message"
                );
                summary.skip(id, Stage::Classify, e.to_string());
                return;
            }
        };
        info!(id, intent = %intent.label(), "Classified");

        let outcome = match self.router.route(&candidate, &intent).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(id, stage = %Stage::Handle, error = %e, "Skipping message");
                summary.skip(id, Stage::Handle, e.to_string());
                return;
            }
        };

        let enriched = match outcome {
            HandlerOutcome::Persist(enriched) => enriched,
            HandlerOutcome::NoAction { reason } => {
                debug!(id, reason = %reason, "No action");
                summary.no_action += 1;
                return;
            }
        };

        let record = NewResult {
            message_ref: candidate.message_ref,
            intent: enriched.intent.as_str().to_string(),
            subject: candidate.subject,
            date: candidate.date,
            details: enriched.details,
        };
        match self.db.append_result(&record).await {
            Ok(row_id) => {
                info!(id, row_id = %row_id, intent = %record.intent, "Result persisted");
                summary.persisted += 1;
            }
            Err(e) => {
                error!(id, stage = %Stage::Persist, error = %e, "Skipping message");
                summary.skip(id, Stage::Persist, e.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::provider::{CompletionRequest, CompletionResponse, FinishReason, LlmProvider};
    use crate::mail::ListRequest;
    use crate::mail::types::{Header, Message, MessagePage, MessagePart, PartBody};
    use crate::pipeline::handlers::{CompanyResearchHandler, MeetingHandler};
    use crate::store::LibSqlBackend;
    use async_trait::async_trait;
    use base64::Engine as _;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scripted mailbox: one listing page plus a message map. Missing ids
    /// fail with a transport error.
    struct FakeMailbox {
        ids: Vec<String>,
        messages: HashMap<String, Message>,
        probe: Option<fn() -> MailError>,
        list_fails: bool,
        fetched: Mutex<Vec<String>>,
    }

    impl FakeMailbox {
        fn new() -> Self {
            Self {
                ids: Vec::new(),
                messages: HashMap::new(),
                probe: None,
                list_fails: false,
                fetched: Mutex::new(Vec::new()),
            }
        }

        fn with(mut self, id: &str, message: Option<Message>) -> Self {
            self.ids.push(id.to_string());
            if let Some(message) = message {
                self.messages.insert(id.to_string(), message);
            }
            self
        }
    }

    #[async_trait]
    impl MailProvider for FakeMailbox {
        fn name(&self) -> &str {
            "fake"
        }

        async fn check_access(&self) -> Result<(), MailError> {
            match self.probe {
                Some(make) => Err(make()),
                None => Ok(()),
            }
        }

        async fn list_messages(&self, _request: &ListRequest) -> Result<MessagePage, MailError> {
            if self.list_fails {
                return Err(MailError::Transport("reset".into()));
            }
            Ok(MessagePage {
                messages: self.ids.iter().map(MessageRef::new).collect(),
                next_page_token: None,
                result_size_estimate: None,
            })
        }

        async fn get_message(&self, id: &str) -> Result<Message, MailError> {
            self.fetched.lock().unwrap().push(id.to_string());
            self.messages
                .get(id)
                .cloned()
                .ok_or_else(|| MailError::Transport("timed out".into()))
        }
    }

    /// Replies by keyword in the last user message.
    struct KeywordLlm {
        rules: Vec<(&'static str, &'static str)>,
    }

    #[async_trait]
    impl LlmProvider for KeywordLlm {
        fn model_name(&self) -> &str {
            "keyword"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            let prompt = request
                .messages
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default();
            let content = self
                .rules
                .iter()
                .find(|(needle, _)| prompt.contains(needle))
                .map(|(_, reply)| reply.to_string())
                .unwrap_or_else(|| r#"{"intent": "other"}"#.to_string());
            Ok(CompletionResponse {
                content,
                input_tokens: 0,
                output_tokens: 0,
                finish_reason: FinishReason::Stop,
                response_id: None,
            })
        }
    }

    fn plain_message(id: &str, subject: &str, text: &str) -> Message {
        Message {
            id: id.into(),
            payload: Some(MessagePart {
                mime_type: "multipart/alternative".into(),
                headers: vec![
                    Header {
                        name: "Subject".into(),
                        value: subject.into(),
                    },
                    Header {
                        name: "Date".into(),
                        value: "Thu, 10 Jul 2025 09:00:00 +0000".into(),
                    },
                ],
                parts: vec![MessagePart {
                    mime_type: "text/plain".into(),
                    body: Some(PartBody {
                        data: Some(URL_SAFE_NO_PAD.encode(text)),
                        ..Default::default()
                    }),
                    ..Default::default()
                }],
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn llm() -> Arc<dyn LlmProvider> {
        Arc::new(KeywordLlm {
            rules: vec![
                (
                    "Let's meet",
                    r#"{"intent": "schedule_meeting", "meeting_datetime": "2025-07-15T10:00", "participants": ["alice@example.com"]}"#,
                ),
                (
                    "Acme",
                    r#"{"intent": "company_research", "company": "Acme"}"#,
                ),
                ("search result snippets", r#"{"headquarters": "Springfield"}"#),
                ("garbage", "not json at all"),
            ],
        })
    }

    async fn orchestrator(mailbox: FakeMailbox) -> (Orchestrator, Arc<FakeMailbox>, Arc<LibSqlBackend>) {
        let mailbox = Arc::new(mailbox);
        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let llm = llm();
        let orchestrator = Orchestrator::new(
            mailbox.clone(),
            FilterConfig::default(),
            IntentClassifier::new(llm.clone()),
            IntentRouter::new(
                CompanyResearchHandler::new(llm, None, None),
                MeetingHandler::new(),
            ),
            db.clone(),
        );
        (orchestrator, mailbox, db)
    }

    #[tokio::test]
    async fn routes_each_intent_and_skips_failures() {
        let mailbox = FakeMailbox::new()
            .with("meet", Some(plain_message("meet", "Sync", "Let's meet Tuesday")))
            .with("acme", Some(plain_message("acme", "Intro", "Talk to Acme about it")))
            .with("other", Some(plain_message("other", "Hi", "Just saying hi")))
            .with("bad", Some(plain_message("bad", "?", "garbage")))
            .with("empty", Some(Message::default()))
            .with("gone", None);
        let (orchestrator, _, db) = orchestrator(mailbox).await;

        let summary = orchestrator.run_once().await.unwrap();

        assert!(summary.listing_complete);
        assert_eq!(summary.listed, 6);
        assert_eq!(summary.persisted, 2);
        assert_eq!(summary.no_action, 1);
        let stages: Vec<(&str, Stage)> = summary
            .skipped
            .iter()
            .map(|s| (s.message_ref.as_str(), s.stage))
            .collect();
        assert_eq!(
            stages,
            vec![
                ("bad", Stage::Classify),
                ("empty", Stage::Extract),
                ("gone", Stage::Fetch),
            ]
        );

        let stored = db.list_results(10).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].intent, "schedule_meeting");
        assert_eq!(stored[0].subject.as_deref(), Some("Sync"));
        assert_eq!(stored[0].details["meeting"]["datetime"], "2025-07-15T10:00:00");
        assert_eq!(stored[1].intent, "company_research");
        assert_eq!(stored[1].details["extracted"]["headquarters"], "Springfield");
    }

    #[tokio::test]
    async fn second_run_skips_stored_messages_before_fetch() {
        let mailbox = FakeMailbox::new()
            .with("meet", Some(plain_message("meet", "Sync", "Let's meet Tuesday")));
        let (orchestrator, mailbox, _) = orchestrator(mailbox).await;

        let first = orchestrator.run_once().await.unwrap();
        assert_eq!(first.persisted, 1);

        let second = orchestrator.run_once().await.unwrap();
        assert_eq!(second.persisted, 0);
        assert_eq!(second.already_processed, 1);
        assert_eq!(mailbox.fetched.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn incomplete_listing_processes_nothing() {
        let mut mailbox = FakeMailbox::new()
            .with("meet", Some(plain_message("meet", "Sync", "Let's meet Tuesday")));
        mailbox.list_fails = true;
        let (orchestrator, mailbox, _) = orchestrator(mailbox).await;

        let summary = orchestrator.run_once().await.unwrap();
        assert!(!summary.listing_complete);
        assert_eq!(summary.persisted, 0);
        assert!(mailbox.fetched.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejected_probe_is_fatal() {
        let mut mailbox = FakeMailbox::new();
        mailbox.probe = Some(|| MailError::AuthExpired);
        let (orchestrator, _, _) = orchestrator(mailbox).await;

        let result = orchestrator.run_once().await;
        assert!(matches!(result, Err(PipelineError::Auth(AuthError::Rejected))));
    }

    #[tokio::test]
    async fn transport_probe_failure_is_not_fatal() {
        let mut mailbox = FakeMailbox::new();
        mailbox.probe = Some(|| MailError::Transport("dns".into()));
        let (orchestrator, _, _) = orchestrator(mailbox).await;

        let summary = orchestrator.run_once().await.unwrap();
        assert_eq!(summary.listed, 0);
        assert!(summary.listing_complete);
    }
}
