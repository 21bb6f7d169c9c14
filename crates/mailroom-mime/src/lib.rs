//! # mailroom-mime
//!
//! Read-side MIME parsing for mail retrieval.
//!
//! ## Features
//!
//! - **Entity trees**: parse a raw RFC 5322 message into nested multipart
//!   entities and walk their leaves in declaration order
//! - **Parameters**: quoted values, RFC 2231 continuations and extended
//!   values for `Content-Type` and `Content-Disposition`
//! - **Decoding**: Base64, Quoted-Printable, RFC 2047 encoded words and the
//!   common charsets
//!
//! ## Quick Start
//!
//! ```
//! use mailroom_mime::Entity;
//!
//! let raw = b"Subject: hi\r\n\
//!             Content-Type: text/plain; charset=utf-8\r\n\
//!             \r\n\
//!             Hello, World!";
//!
//! let message = Entity::parse(raw).unwrap();
//! assert_eq!(message.headers.get("subject"), Some("hi"));
//! assert_eq!(message.text().unwrap(), "Hello, World!");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod content_type;
mod disposition;
mod entity;
mod error;
mod header;
mod params;

pub mod encoding;

pub use content_type::ContentType;
pub use disposition::ContentDisposition;
pub use entity::{Body, Entity, TransferEncoding};
pub use error::{Error, Result};
pub use header::Headers;
