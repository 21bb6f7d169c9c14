//! FETCH and SEARCH building blocks.

use crate::types::{SequenceSet, UidSet};

/// One FETCH data item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchAttribute {
    /// `UID`.
    Uid,
    /// `FLAGS`.
    Flags,
    /// `INTERNALDATE`.
    InternalDate,
    /// `RFC822.SIZE`.
    Rfc822Size,
    /// `ENVELOPE`.
    Envelope,
    /// `BODYSTRUCTURE`.
    BodyStructure,
    /// `BODY[section]` or `BODY.PEEK[section]`.
    Body {
        /// Section specifier; `None` is the whole message.
        section: Option<String>,
        /// Use `.PEEK` so `\Seen` is not set.
        peek: bool,
    },
}

impl FetchAttribute {
    /// The whole RFC 5322 message without touching `\Seen`.
    #[must_use]
    pub const fn full_message() -> Self {
        Self::Body {
            section: None,
            peek: true,
        }
    }
}

/// The data items requested by one FETCH.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchItems(pub Vec<FetchAttribute>);

impl FetchItems {
    /// Metadata needed to summarize a message without downloading it.
    #[must_use]
    pub fn summary() -> Self {
        Self(vec![
            FetchAttribute::Uid,
            FetchAttribute::InternalDate,
            FetchAttribute::Envelope,
            FetchAttribute::BodyStructure,
        ])
    }
}

impl From<Vec<FetchAttribute>> for FetchItems {
    fn from(items: Vec<FetchAttribute>) -> Self {
        Self(items)
    }
}

/// SEARCH key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchCriteria {
    /// `ALL`.
    All,
    /// A sequence set.
    Sequence(SequenceSet),
    /// `UID <set>`.
    Uid(UidSet),
    /// `FROM <string>`.
    From(String),
    /// `TO <string>`.
    To(String),
    /// `HEADER <field> <string>`: substring match on a named header.
    Header(String, String),
    /// Every key must match (space-separated on the wire).
    And(Vec<Self>),
    /// `OR <a> <b>`.
    Or(Box<Self>, Box<Self>),
    /// `NOT <key>`.
    Not(Box<Self>),
}

impl SearchCriteria {
    /// Conjoins keys, flattening a single key to itself.
    #[must_use]
    pub fn all_of(mut keys: Vec<Self>) -> Self {
        match keys.len() {
            0 => Self::All,
            1 => keys.remove(0),
            _ => Self::And(keys),
        }
    }
}
