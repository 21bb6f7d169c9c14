//! Type-state markers for IMAP client connection states.
//!
//! `Selected` carries the mailbox it was opened on, so the selected-state
//! methods can report what they operate on.

use crate::types::{Mailbox, MailboxStatus};

/// Marker type for the not-authenticated state.
///
/// Only STARTTLS, LOGIN and LOGOUT are valid here.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotAuthenticated;

/// Marker type for the authenticated state.
#[derive(Debug, Clone, Copy, Default)]
pub struct Authenticated;

/// State for a selected mailbox.
#[derive(Debug, Clone)]
pub struct Selected {
    pub(crate) mailbox: Mailbox,
    pub(crate) status: MailboxStatus,
}

impl Selected {
    /// Creates a new Selected state.
    #[must_use]
    pub const fn new(mailbox: Mailbox, status: MailboxStatus) -> Self {
        Self { mailbox, status }
    }

    /// The selected mailbox.
    #[must_use]
    pub const fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    /// Mailbox status snapshot from SELECT/EXAMINE.
    #[must_use]
    pub const fn status(&self) -> &MailboxStatus {
        &self.status
    }

    /// True if the mailbox was opened read-only.
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        self.status.read_only
    }
}
