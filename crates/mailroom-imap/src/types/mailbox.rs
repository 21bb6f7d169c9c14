//! Mailbox names and selection status.

use std::fmt;

use super::{Uid, UidValidity};

/// A mailbox name.
///
/// `INBOX` is case-insensitive on the wire and is normalized here.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Mailbox(String);

impl Mailbox {
    /// Creates a mailbox name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        if name.eq_ignore_ascii_case("INBOX") {
            Self::inbox()
        } else {
            Self(name)
        }
    }

    /// The `INBOX` mailbox.
    #[must_use]
    pub fn inbox() -> Self {
        Self("INBOX".to_string())
    }

    /// Returns the name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// State reported by SELECT or EXAMINE.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailboxStatus {
    /// Number of messages.
    pub exists: u32,
    /// Number of messages with `\Recent`.
    pub recent: u32,
    /// UIDVALIDITY, if reported.
    pub uid_validity: Option<UidValidity>,
    /// Predicted next UID, if reported.
    pub uid_next: Option<Uid>,
    /// True when the server granted read-only access.
    pub read_only: bool,
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn inbox_is_normalized() {
        assert_eq!(Mailbox::new("inbox"), Mailbox::inbox());
        assert_eq!(Mailbox::new("Inbox").as_str(), "INBOX");
        assert_eq!(Mailbox::new("Archive/2024").as_str(), "Archive/2024");
    }
}
