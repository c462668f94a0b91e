//! OAuth credential sources for the mail provider.
//!
//! The consent flow itself happens out-of-band; this module only loads an
//! existing credential and keeps its access token fresh.

pub mod token;

pub use token::{AuthorizedUserToken, StaticToken};

use async_trait::async_trait;

use crate::error::AuthError;

/// Supplies bearer tokens to API clients.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// A currently valid access token, refreshing if needed.
    async fn access_token(&self) -> Result<String, AuthError>;
}
