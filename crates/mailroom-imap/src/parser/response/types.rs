//! Parsed response data.

use crate::types::{Capability, ResponseCode, SeqNum, Status, Uid};

/// One data item of a FETCH response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchItem {
    /// `UID`.
    Uid(Uid),
    /// `FLAGS`, as raw flag atoms.
    Flags(Vec<String>),
    /// `INTERNALDATE`, unparsed (`"17-Jul-1996 02:44:25 -0700"`).
    InternalDate(String),
    /// `RFC822.SIZE`.
    Rfc822Size(u32),
    /// `ENVELOPE`.
    Envelope(Box<Envelope>),
    /// `BODYSTRUCTURE` (or the non-extensible `BODY`).
    BodyStructure(BodyStructure),
    /// `BODY[section]` payload.
    Body {
        /// Section specifier; `None` for the whole message.
        section: Option<String>,
        /// Section bytes; `None` when the server sent `NIL`.
        data: Option<Vec<u8>>,
    },
}

/// Message envelope (RFC 3501 §7.4.2).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Envelope {
    /// `Date:` header, unparsed.
    pub date: Option<String>,
    /// `Subject:` header, possibly RFC 2047 encoded.
    pub subject: Option<String>,
    /// `From:` addresses.
    pub from: Vec<Address>,
    /// `Sender:` addresses.
    pub sender: Vec<Address>,
    /// `Reply-To:` addresses.
    pub reply_to: Vec<Address>,
    /// `To:` addresses.
    pub to: Vec<Address>,
    /// `Cc:` addresses.
    pub cc: Vec<Address>,
    /// `Bcc:` addresses.
    pub bcc: Vec<Address>,
    /// `In-Reply-To:` header.
    pub in_reply_to: Option<String>,
    /// `Message-ID:` header.
    pub message_id: Option<String>,
}

/// One envelope address.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Address {
    /// Display name (possibly RFC 2047 encoded).
    pub name: Option<String>,
    /// Source route, obsolete.
    pub adl: Option<String>,
    /// Local part; a group name when `host` is `None`.
    pub mailbox: Option<String>,
    /// Domain.
    pub host: Option<String>,
}

impl Address {
    /// `local@domain`, or `None` for group markers and incomplete entries.
    #[must_use]
    pub fn email(&self) -> Option<String> {
        match (self.mailbox.as_deref(), self.host.as_deref()) {
            (Some(local), Some(host)) if !local.is_empty() && !host.is_empty() => {
                Some(format!("{local}@{host}"))
            }
            _ => None,
        }
    }

    /// The display name, when non-blank.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.name.as_deref().map(str::trim).filter(|n| !n.is_empty())
    }
}

/// `Content-Disposition` as reported in a body structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disposition {
    /// Disposition type, lowercased (`attachment`, `inline`, ...).
    pub kind: String,
    /// Parameters with lowercased names.
    pub params: Vec<(String, String)>,
}

impl Disposition {
    /// True for `attachment`.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.kind == "attachment"
    }

    /// True for `inline`.
    #[must_use]
    pub fn is_inline(&self) -> bool {
        self.kind == "inline"
    }

    /// Looks up a parameter by (case-insensitive) name.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        lookup(&self.params, name)
    }
}

/// Shape-specific fields of a body structure node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyKind {
    /// Any non-multipart, non-message part.
    Single {
        /// `Content-ID`.
        id: Option<String>,
        /// `Content-Description`.
        description: Option<String>,
        /// `Content-Transfer-Encoding`.
        encoding: String,
        /// Encoded size in octets.
        size: u32,
        /// Line count, reported for `text/*` only.
        lines: Option<u32>,
    },
    /// `message/rfc822`: an embedded message.
    Message {
        /// `Content-Transfer-Encoding`.
        encoding: String,
        /// Encoded size in octets.
        size: u32,
        /// Envelope of the embedded message.
        envelope: Box<Envelope>,
        /// Structure of the embedded message.
        body: Box<BodyStructure>,
        /// Line count.
        lines: u32,
    },
    /// `multipart/*`.
    Multipart {
        /// Child parts in declaration order.
        parts: Vec<BodyStructure>,
    },
}

/// One node of a message's MIME layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyStructure {
    /// Top-level media type, lowercased.
    pub media_type: String,
    /// Media subtype, lowercased.
    pub media_subtype: String,
    /// Content-type parameters with lowercased names.
    pub params: Vec<(String, String)>,
    /// Content-disposition, when the server reported one.
    pub disposition: Option<Disposition>,
    /// Shape-specific data.
    pub kind: BodyKind,
}

impl BodyStructure {
    /// `type/subtype`.
    #[must_use]
    pub fn mime_type(&self) -> String {
        format!("{}/{}", self.media_type, self.media_subtype)
    }

    /// True for `multipart/*` nodes.
    #[must_use]
    pub const fn is_multipart(&self) -> bool {
        matches!(self.kind, BodyKind::Multipart { .. })
    }

    /// Child parts; empty for leaves.
    #[must_use]
    pub fn children(&self) -> &[Self] {
        match &self.kind {
            BodyKind::Multipart { parts } => parts,
            _ => &[],
        }
    }

    /// Looks up a content-type parameter by (case-insensitive) name.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        lookup(&self.params, name)
    }

    /// All non-multipart nodes, depth-first in declaration order.
    ///
    /// An embedded `message/rfc822` is a leaf; its inner structure is not
    /// entered.
    #[must_use]
    pub fn leaves(&self) -> Vec<&Self> {
        let mut out = Vec::new();
        collect_leaves(self, &mut out);
        out
    }
}

fn collect_leaves<'a>(node: &'a BodyStructure, out: &mut Vec<&'a BodyStructure>) {
    if node.is_multipart() {
        for child in node.children() {
            collect_leaves(child, out);
        }
    } else {
        out.push(node);
    }
}

fn lookup<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// Untagged server data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UntaggedResponse {
    /// `* OK|NO|BAD|PREAUTH|BYE [code] text`.
    Status {
        /// The status keyword.
        status: Status,
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// `* CAPABILITY ...`.
    Capability(Vec<Capability>),
    /// `* FLAGS (...)`.
    Flags(Vec<String>),
    /// `* n EXISTS`.
    Exists(u32),
    /// `* n RECENT`.
    Recent(u32),
    /// `* n EXPUNGE`.
    Expunge(SeqNum),
    /// `* SEARCH ...`: sequence numbers or UIDs depending on the command.
    Search(Vec<u32>),
    /// `* n FETCH (...)`.
    Fetch {
        /// Sequence number of the message.
        seq: SeqNum,
        /// Data items.
        items: Vec<FetchItem>,
    },
    /// A response this client does not interpret, keyed by its keyword.
    Other(String),
}
