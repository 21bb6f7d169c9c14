//! IMAP commands issued by the retrieval core.

mod serialize;
mod tag_generator;
mod types;

pub use tag_generator::TagGenerator;
pub use types::{FetchAttribute, FetchItems, SearchCriteria};

use crate::Result;
use crate::types::{Mailbox, SequenceSet, UidSet};

use serialize::{write_astring, write_fetch_items, write_search_criteria};

/// Target of a FETCH: sequence numbers or UIDs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchTarget {
    /// Plain `FETCH`.
    Sequence(SequenceSet),
    /// `UID FETCH`.
    Uid(UidSet),
}

/// A client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `CAPABILITY`.
    Capability,
    /// `NOOP`.
    Noop,
    /// `LOGOUT`.
    Logout,
    /// `STARTTLS`.
    StartTls,
    /// `LOGIN <user> <password>`.
    Login {
        /// Login identity.
        username: String,
        /// Secret.
        password: String,
    },
    /// `SELECT <mailbox>`.
    Select(Mailbox),
    /// `EXAMINE <mailbox>` (read-only SELECT).
    Examine(Mailbox),
    /// `[UID] SEARCH <criteria>`.
    Search {
        /// Search key.
        criteria: SearchCriteria,
        /// Return UIDs instead of sequence numbers.
        uid: bool,
    },
    /// `[UID] FETCH <set> <items>`.
    Fetch {
        /// Messages to fetch.
        target: FetchTarget,
        /// Data items.
        items: FetchItems,
    },
}

impl Command {
    /// Short name used in logs and error messages.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Capability => "CAPABILITY",
            Self::Noop => "NOOP",
            Self::Logout => "LOGOUT",
            Self::StartTls => "STARTTLS",
            Self::Login { .. } => "LOGIN",
            Self::Select(_) => "SELECT",
            Self::Examine(_) => "EXAMINE",
            Self::Search { uid: false, .. } => "SEARCH",
            Self::Search { uid: true, .. } => "UID SEARCH",
            Self::Fetch {
                target: FetchTarget::Sequence(_),
                ..
            } => "FETCH",
            Self::Fetch {
                target: FetchTarget::Uid(_),
                ..
            } => "UID FETCH",
        }
    }

    /// Encodes the command line, tag and trailing CRLF included.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidArgument`] when a string argument holds
    /// CR, LF, NUL or a non-ASCII character.
    pub fn serialize(&self, tag: &str) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(tag.as_bytes());
        buf.push(b' ');
        buf.extend_from_slice(self.name().as_bytes());

        match self {
            Self::Capability | Self::Noop | Self::Logout | Self::StartTls => {}
            Self::Login { username, password } => {
                buf.push(b' ');
                write_astring(&mut buf, "LOGIN username", username)?;
                buf.push(b' ');
                write_astring(&mut buf, "LOGIN password", password)?;
            }
            Self::Select(mailbox) | Self::Examine(mailbox) => {
                buf.push(b' ');
                write_astring(&mut buf, "mailbox name", mailbox.as_str())?;
            }
            Self::Search { criteria, .. } => {
                buf.push(b' ');
                write_search_criteria(&mut buf, criteria)?;
            }
            Self::Fetch { target, items } => {
                buf.push(b' ');
                let set = match target {
                    FetchTarget::Sequence(set) => set.to_string(),
                    FetchTarget::Uid(set) => set.to_string(),
                };
                buf.extend_from_slice(set.as_bytes());
                buf.push(b' ');
                write_fetch_items(&mut buf, items);
            }
        }

        buf.extend_from_slice(b"\r\n");
        Ok(buf)
    }
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
    use crate::types::Uid;

    #[test]
    fn test_login_quotes_when_needed() {
        let cmd = Command::Login {
            username: "clinic@example.com".to_string(),
            password: "s3cret \"pw\"".to_string(),
        };
        assert_eq!(
            cmd.serialize("A0001").unwrap(),
            b"A0001 LOGIN clinic@example.com \"s3cret \\\"pw\\\"\"\r\n".to_vec()
        );
    }

    #[test]
    fn test_examine_inbox() {
        let cmd = Command::Examine(Mailbox::inbox());
        assert_eq!(cmd.serialize("A0002").unwrap(), b"A0002 EXAMINE INBOX\r\n".to_vec());
    }

    #[test]
    fn test_uid_search_header_conjunction() {
        let cmd = Command::Search {
            criteria: SearchCriteria::all_of(vec![
                SearchCriteria::Header("From".to_string(), "a@x".to_string()),
                SearchCriteria::Header("To".to_string(), "b@x".to_string()),
            ]),
            uid: true,
        };
        assert_eq!(
            cmd.serialize("A0003").unwrap(),
            b"A0003 UID SEARCH HEADER From a@x HEADER To b@x\r\n".to_vec()
        );
    }

    #[test]
    fn test_search_or_groups_conjunctions() {
        let criteria = SearchCriteria::Or(
            Box::new(SearchCriteria::And(vec![
                SearchCriteria::From("a@x".to_string()),
                SearchCriteria::To("b@x".to_string()),
            ])),
            Box::new(SearchCriteria::Not(Box::new(SearchCriteria::All))),
        );
        let cmd = Command::Search {
            criteria,
            uid: false,
        };
        assert_eq!(
            cmd.serialize("A0004").unwrap(),
            b"A0004 SEARCH OR (FROM a@x TO b@x) NOT ALL\r\n".to_vec()
        );
    }

    #[test]
    fn test_uid_fetch_summary_items() {
        let uids = [101, 102, 103].map(|n| Uid::new(n).unwrap());
        let cmd = Command::Fetch {
            target: FetchTarget::Uid(UidSet::from_uids(uids).unwrap()),
            items: FetchItems::summary(),
        };
        assert_eq!(
            cmd.serialize("A0005").unwrap(),
            b"A0005 UID FETCH 101:103 (UID INTERNALDATE ENVELOPE BODYSTRUCTURE)\r\n".to_vec()
        );
    }

    #[test]
    fn test_fetch_full_message_peek() {
        let cmd = Command::Fetch {
            target: FetchTarget::Sequence(SequenceSet::range(1, 3).unwrap()),
            items: FetchItems(vec![FetchAttribute::Uid, FetchAttribute::full_message()]),
        };
        assert_eq!(
            cmd.serialize("A0006").unwrap(),
            b"A0006 FETCH 1:3 (UID BODY.PEEK[])\r\n".to_vec()
        );
    }

    #[test]
    fn test_empty_string_is_quoted() {
        let mut buf = Vec::new();
        write_astring(&mut buf, "value", "").unwrap();
        assert_eq!(buf, b"\"\"".to_vec());
    }

    #[test]
    fn test_line_breaks_in_search_value_are_refused() {
        let cmd = Command::Search {
            criteria: SearchCriteria::all_of(vec![
                SearchCriteria::Header("From".to_string(), "a@x".to_string()),
                SearchCriteria::Header("To".to_string(), "b@x\r\nA9 LOGOUT".to_string()),
            ]),
            uid: true,
        };
        assert!(matches!(
            cmd.serialize("A0007"),
            Err(crate::Error::InvalidArgument("HEADER value"))
        ));

        let nested = Command::Search {
            criteria: SearchCriteria::Not(Box::new(SearchCriteria::To("b@x\n".to_string()))),
            uid: false,
        };
        assert!(nested.serialize("A0008").is_err());
    }

    #[test]
    fn test_unsafe_login_values_are_refused_without_echo() {
        let cmd = Command::Login {
            username: "clinic".to_string(),
            password: "pw\0\r\nA2 LOGOUT".to_string(),
        };
        let err = cmd.serialize("A0001").unwrap_err();
        assert!(matches!(err, crate::Error::InvalidArgument("LOGIN password")));
        assert!(!err.to_string().contains("LOGOUT"));

        let accented = Command::Login {
            username: "médico".to_string(),
            password: "pw".to_string(),
        };
        assert!(matches!(
            accented.serialize("A0001"),
            Err(crate::Error::InvalidArgument("LOGIN username"))
        ));
    }

    #[test]
    fn test_control_characters_are_quoted() {
        let mut buf = Vec::new();
        write_astring(&mut buf, "value", "a\tb").unwrap();
        assert_eq!(buf, b"\"a\tb\"".to_vec());
    }

    #[test]
    fn test_all_of_flattens() {
        assert_eq!(SearchCriteria::all_of(vec![]), SearchCriteria::All);
        assert_eq!(
            SearchCriteria::all_of(vec![SearchCriteria::To("c@x".to_string())]),
            SearchCriteria::To("c@x".to_string())
        );
    }
}
