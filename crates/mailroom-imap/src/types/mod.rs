//! Core IMAP types.

#![allow(clippy::missing_const_for_fn)]

mod capability;
mod identifiers;
mod mailbox;
mod response_code;
mod sequence;

pub use capability::{Capability, Status};
pub use identifiers::{SeqNum, Tag, Uid, UidValidity};
pub use mailbox::{Mailbox, MailboxStatus};
pub use response_code::ResponseCode;
pub use sequence::{SequenceSet, UidSet};
