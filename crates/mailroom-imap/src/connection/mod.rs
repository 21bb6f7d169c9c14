//! IMAP connection management.
//!
//! - Endpoint description and the port-to-security mapping
//! - TLS/plaintext stream abstraction with STARTTLS upgrade
//! - Framed I/O for the IMAP line/literal protocol
//! - Type-state client

mod client;
mod config;
mod framed;
mod stream;

pub use client::{Authenticated, Client, NotAuthenticated, Selected};
pub use config::{Endpoint, Security};
pub use framed::FramedStream;
pub use stream::{ImapStream, connect, connect_plain, connect_tls, create_tls_connector};
