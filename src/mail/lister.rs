//! Paginated message listing.
//!
//! Follows `nextPageToken` until the provider stops returning one. A failed
//! page ends the listing early and marks it incomplete; callers decide what
//! a partial listing means for them.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::error::{AuthError, MailError};
use crate::mail::query::SearchQuery;
use crate::mail::types::MessageRef;
use crate::mail::{ListRequest, MailProvider};

/// Gmail caps `maxResults` at 500.
pub const MAX_PAGE_SIZE: u32 = 500;

/// Result of a listing pass.
#[derive(Debug, Clone, Default)]
pub struct Listing {
    /// References in provider order, deduplicated.
    pub references: Vec<MessageRef>,
    /// Number of pages successfully fetched.
    pub pages: usize,
    /// False when a page failed and `references` is a partial set.
    pub complete: bool,
}

/// Lists every message matching a filter.
pub struct MessageLister {
    provider: Arc<dyn MailProvider>,
    label_ids: Vec<String>,
    page_size: u32,
}

impl MessageLister {
    pub fn new(provider: Arc<dyn MailProvider>, label_ids: Vec<String>, page_size: u32) -> Self {
        Self {
            provider,
            label_ids,
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Enumerate all references matching `query`.
    ///
    /// Transport and API failures are absorbed into an incomplete `Listing`.
    /// A rejected credential is returned as an error since no later page
    /// could succeed either.
    pub async fn list_all(&self, query: &SearchQuery) -> Result<Listing, AuthError> {
        let rendered = query.render();
        info!(
            provider = self.provider.name(),
            query = %rendered,
            labels = ?self.label_ids,
            "Listing messages"
        );

        let mut listing = Listing::default();
        let mut seen: HashSet<String> = HashSet::new();
        let mut seen_tokens: HashSet<String> = HashSet::new();
        let mut page_token: Option<String> = None;

        loop {
            let request = ListRequest {
                query: rendered.clone(),
                label_ids: self.label_ids.clone(),
                max_results: self.page_size,
                page_token: page_token.take(),
            };

            let page = match self.provider.list_messages(&request).await {
                Ok(page) => page,
                Err(MailError::AuthExpired) => return Err(AuthError::Rejected),
                Err(MailError::Credential(e)) => return Err(e),
                Err(e) => {
                    error!(
                        page = listing.pages + 1,
                        collected = listing.references.len(),
                        error = %e,
                        "Listing page failed; returning partial result"
                    );
                    return Ok(listing);
                }
            };

            listing.pages += 1;
            let batch = page.messages.len();
            for reference in page.messages {
                if seen.insert(reference.id.clone()) {
                    listing.references.push(reference);
                } else {
                    warn!(id = %reference.id, "Duplicate message reference across pages");
                }
            }

            debug!(
                page = listing.pages,
                batch,
                next_page_token = page.next_page_token.as_deref().unwrap_or(""),
                "Fetched listing page"
            );

            match page.next_page_token {
                Some(token) if !token.is_empty() => {
                    if !seen_tokens.insert(token.clone()) {
                        error!(
                            page = listing.pages,
                            token = %token,
                            "Provider repeated a page token; returning partial result"
                        );
                        return Ok(listing);
                    }
                    page_token = Some(token);
                }
                _ => break,
            }
        }

        listing.complete = true;
        info!(
            count = listing.references.len(),
            pages = listing.pages,
            "Listing complete"
        );
        Ok(listing)
    }
}
