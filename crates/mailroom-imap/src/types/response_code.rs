//! Bracketed response codes (`[UIDVALIDITY 3]`, `[READ-ONLY]`, ...).

use super::{Capability, SeqNum, Uid, UidValidity};

/// Response code attached to a status response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseCode {
    /// `ALERT`: text that must be shown to the user.
    Alert,
    /// `CAPABILITY` list piggy-backed on a status response.
    Capability(Vec<Capability>),
    /// `READ-ONLY`.
    ReadOnly,
    /// `READ-WRITE`.
    ReadWrite,
    /// `UIDNEXT`.
    UidNext(Uid),
    /// `UIDVALIDITY`.
    UidValidity(UidValidity),
    /// `UNSEEN`: first unseen sequence number.
    Unseen(SeqNum),
    /// `AUTHENTICATIONFAILED` (RFC 5530).
    AuthenticationFailed,
    /// Anything else, with its atom uppercased.
    Other(String),
}
