//! # mailroom-core
//!
//! Read-only mailbox retrieval for `mailroom`.
//!
//! This crate provides:
//! - Session gateway with guaranteed logout
//! - Header search planning
//! - Concurrent metadata fetch into [`MessageSummary`] values
//! - MIME body reconstruction and attachment extraction
//! - Ordering and correspondent deduplication
//! - **Access gate** - `SQLite`-backed permission flags that pick the retrieval strategy
//! - **One-time codes** - in-memory verification code store

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod access;
pub mod config;
pub mod directory;
mod error;
pub mod fetch;
pub mod gateway;
pub mod model;
pub mod ordering;
pub mod otp;
pub mod reconstruct;
pub mod search;
pub mod service;
#[cfg(test)]
mod testing;

pub use access::{AccessFlag, AccessRecord, AccessRepository, AccessVerdict, RetrievalStrategy};
pub use config::{MailroomConfig, ServerAddress};
pub use directory::{
    extract_mobile_number, fetch_correspondents, has_correspondence, resolve_display_name,
};
pub use error::{Error, Result};
pub use fetch::{FetchOptions, attachment_names, fetch_summaries, summarize};
pub use gateway::{KEEPALIVE_INTERVAL, MailSession, keepalive, open_session, scoped, with_session};
pub use model::{InlineMedia, MessageBody, MessageSummary};
pub use ordering::{canonical_address, dedupe_cohort, dedupe_recipients, order};
pub use otp::{OtpError, OtpStore};
pub use reconstruct::{
    AttachmentData, extract_attachment, fetch_attachment, reconstruct, reconstruct_raw,
};
pub use search::{MessageSet, SearchPlan, plan, resolve};
pub use service::Mailroom;
