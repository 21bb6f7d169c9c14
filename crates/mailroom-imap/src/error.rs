//! Error types for the IMAP client.

use thiserror::Error;

/// Errors that can occur during IMAP operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS handshake or encryption error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// The host name is not usable as a TLS server name.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// Malformed server response.
    #[error("Protocol error at position {position}: {message}")]
    Parse {
        /// Byte position where parsing stopped.
        position: usize,
        /// Description of what went wrong.
        message: String,
    },

    /// The server rejected the credentials.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Server returned NO.
    #[error("{command} failed: {text}")]
    No {
        /// Command name, e.g. `UID FETCH`.
        command: &'static str,
        /// Server text.
        text: String,
    },

    /// Server returned BAD.
    #[error("{command} rejected as malformed: {text}")]
    Bad {
        /// Command name.
        command: &'static str,
        /// Server text.
        text: String,
    },

    /// Server sent BYE (disconnecting).
    #[error("Server sent BYE: {0}")]
    Bye(String),

    /// Invalid state for the requested operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A command argument cannot be sent as an atom or quoted string.
    #[error("{0} contains characters that cannot be sent")]
    InvalidArgument(&'static str),

    /// Protocol violation or unexpected data.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// True when the server refused the credentials.
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
