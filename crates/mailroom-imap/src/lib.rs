//! # mailroom-imap
//!
//! The IMAP4rev1 subset a read-only mail retrieval service needs: session
//! setup over implicit TLS or STARTTLS, LOGIN, EXAMINE, header searches and
//! FETCH of envelopes, body structures and full messages.
//!
//! ## Features
//!
//! - **Type-state connection management**: compile-time enforcement of valid
//!   IMAP state transitions (`NotAuthenticated` → `Authenticated` → `Selected`)
//! - **TLS via rustls**: implicit TLS on 993, STARTTLS upgrade on 143
//! - **Sans-I/O parser**: protocol parsing separated from network I/O
//! - **No leaked sessions**: a rejected LOGIN or EXAMINE logs out before the
//!   error is returned
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailroom_imap::{Client, Endpoint, FetchItems, Mailbox, SearchCriteria, UidSet};
//!
//! #[tokio::main]
//! async fn main() -> mailroom_imap::Result<()> {
//!     let endpoint = Endpoint::from_port("imap.example.com", 993).unwrap();
//!     let stream = mailroom_imap::connection::connect(&endpoint).await?;
//!     let client = Client::from_stream(stream).await?;
//!
//!     let client = client.login("user@example.com", "password").await?;
//!     let mut client = client.examine(&Mailbox::inbox()).await?;
//!
//!     let criteria = SearchCriteria::Header("From".into(), "boss@example.com".into());
//!     let uids = client.uid_search(&criteria).await?;
//!     if let Some(set) = UidSet::from_uids(uids) {
//!         let messages = client.uid_fetch(&set, FetchItems::summary()).await?;
//!         println!("{} messages", messages.len());
//!     }
//!
//!     client.logout().await
//! }
//! ```
//!
//! ## Modules
//!
//! - [`command`]: command model and wire encoding
//! - [`connection`]: transport, framing and the type-state client
//! - [`parser`]: response lexer and parser
//! - [`types`]: identifiers, sequence sets, mailboxes and response codes

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use command::{Command, FetchAttribute, FetchItems, FetchTarget, SearchCriteria, TagGenerator};
pub use connection::{
    Authenticated, Client, Endpoint, FramedStream, ImapStream, NotAuthenticated, Security,
    Selected,
};
pub use error::{Error, Result};
pub use parser::{
    Address, BodyKind, BodyStructure, Disposition, Envelope, FetchItem, Response, ResponseParser,
    UntaggedResponse,
};
pub use types::{
    Capability, Mailbox, MailboxStatus, ResponseCode, SeqNum, SequenceSet, Status, Tag, Uid,
    UidSet, UidValidity,
};
