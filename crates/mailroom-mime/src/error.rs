//! Error types for MIME operations.

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// MIME error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed header section.
    #[error("Invalid MIME header: {0}")]
    InvalidHeader(String),

    /// Malformed `Content-Type` value.
    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    /// Malformed transfer-encoded data.
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    /// Base64 decode error.
    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// A multipart entity without a `boundary` parameter.
    #[error("Missing boundary in multipart entity")]
    MissingBoundary,

    /// A multipart body whose delimiters cannot be found.
    #[error("Invalid multipart structure: {0}")]
    InvalidMultipart(String),
}
