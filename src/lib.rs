//! mail-intent: Gmail intake and LLM intent routing.

pub mod auth;
pub mod config;
pub mod error;
pub mod llm;
pub mod mail;
pub mod pipeline;
pub mod search;
pub mod store;
