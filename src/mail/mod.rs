//! Mailbox access: wire types, body extraction, search filters, listing.

pub mod body;
pub mod gmail;
pub mod lister;
pub mod query;
pub mod types;

pub use body::extract_body;
pub use gmail::{GmailClient, GmailConfig};
pub use lister::{Listing, MessageLister};
pub use query::SearchQuery;
pub use types::{Message, MessagePage, MessagePart, MessageRef};

use async_trait::async_trait;

use crate::error::MailError;

/// Parameters for one list-messages request.
#[derive(Debug, Clone)]
pub struct ListRequest {
    /// Rendered search filter (`q`).
    pub query: String,
    pub label_ids: Vec<String>,
    pub max_results: u32,
    pub page_token: Option<String>,
}

/// Mail provider collaborator. Pure I/O with no business logic.
#[async_trait]
pub trait MailProvider: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    /// Cheap authenticated request used to fail fast on bad credentials.
    async fn check_access(&self) -> Result<(), MailError>;

    /// Fetch one page of message references.
    async fn list_messages(&self, request: &ListRequest) -> Result<MessagePage, MailError>;

    /// Fetch the full structured payload for one message.
    async fn get_message(&self, id: &str) -> Result<Message, MailError>;
}
