//! Error types for the retrieval core.

use mailroom_imap::Uid;
use thiserror::Error;

use crate::otp::OtpError;

/// Errors that can occur in core operations.
///
/// Every variant names the identifier or stage it failed on so the caller can
/// word a user-facing message without re-deriving context.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed server address or unsupported port. Raised before any I/O.
    #[error("Configuration error: {0}")]
    Config(String),

    /// TCP, TLS or greeting failure while opening a session.
    #[error("Connection to {address} failed: {source}")]
    Connection {
        /// `host:port` that was dialed.
        address: String,
        /// Underlying protocol error.
        #[source]
        source: mailroom_imap::Error,
    },

    /// The connect phase did not finish within the configured deadline.
    #[error("Connection to {address} timed out after {seconds}s")]
    ConnectTimeout {
        /// `host:port` that was dialed.
        address: String,
        /// The deadline that elapsed.
        seconds: u64,
    },

    /// The server rejected the credentials. The session was logged out first.
    #[error("Authentication failed for {username}: {reason}")]
    Authentication {
        /// Login identity.
        username: String,
        /// Server-supplied reason.
        reason: String,
    },

    /// A header search (or the mailbox open preceding it) failed.
    #[error("Search failed during {stage}: {source}")]
    Search {
        /// `examine` or `search`.
        stage: &'static str,
        /// Underlying protocol error.
        #[source]
        source: mailroom_imap::Error,
    },

    /// A batch or single-message fetch failed. No partial results are returned.
    #[error("Fetch failed during {stage}: {source}")]
    Fetch {
        /// `examine`, `metadata` or `body`.
        stage: &'static str,
        /// Underlying protocol error.
        #[source]
        source: mailroom_imap::Error,
    },

    /// No message carries the requested UID.
    #[error("Message {uid} not found")]
    MessageNotFound {
        /// Requested UID.
        uid: Uid,
    },

    /// The server returned the message with an empty body section.
    #[error("Message {uid} has an empty body")]
    EmptyBody {
        /// Requested UID.
        uid: Uid,
    },

    /// The message announced MIME content but could not be decoded.
    #[error("Message {uid} could not be parsed: {source}")]
    Parse {
        /// Requested UID.
        uid: Uid,
        /// Underlying MIME error.
        #[source]
        source: mailroom_mime::Error,
    },

    /// Neither a readable body nor inline media was found.
    #[error("Message {uid} has no readable content")]
    NoContent {
        /// Requested UID.
        uid: Uid,
    },

    /// No part of the message carries the requested file name.
    #[error("Attachment {filename:?} not found in message {uid}")]
    AttachmentNotFound {
        /// Requested UID.
        uid: Uid,
        /// Requested file name.
        filename: String,
    },

    /// The access record store failed. A missing record is not an error.
    #[error("Access store error: {0}")]
    AccessStore(#[from] sqlx::Error),

    /// A post-processing worker panicked or was cancelled.
    #[error("Worker failed: {0}")]
    Worker(String),

    /// One-time code verification failed.
    #[error("One-time code rejected: {0}")]
    Otp(#[from] OtpError),

    /// An address does not have the `local@domain` shape.
    #[error("Invalid address: {0:?}")]
    InvalidAddress(String),

    /// IMAP operation failed outside a named stage (keepalive, logout).
    #[error("IMAP error: {0}")]
    Imap(#[from] mailroom_imap::Error),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
