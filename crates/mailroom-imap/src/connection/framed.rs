//! Framed I/O for the IMAP wire format.
//!
//! Server responses are CRLF-terminated lines that may embed `{n}` literals;
//! a logical response ends at the first CRLF that is not followed by a
//! literal announcement.

#![allow(clippy::missing_errors_doc)]

use std::io;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::{Error, Result};

const READ_BUFFER_SIZE: usize = 16 * 1024;

/// Upper bound for a single protocol line.
const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Upper bound for one literal (a full message body fetched with `BODY[]`).
const MAX_LITERAL_SIZE: usize = 64 * 1024 * 1024;

/// Buffered IMAP connection.
pub struct FramedStream<S> {
    reader: BufReader<S>,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a connected transport.
    pub fn new(stream: S) -> Self {
        Self {
            reader: BufReader::with_capacity(READ_BUFFER_SIZE, stream),
        }
    }

    /// Reads one logical response, including any embedded literals.
    pub async fn read_response(&mut self) -> Result<Vec<u8>> {
        let mut response = Vec::new();

        loop {
            let line = self.read_line().await?;
            response.extend_from_slice(&line);

            let Some(literal_len) = literal_length(&line) else {
                break;
            };
            if literal_len > MAX_LITERAL_SIZE {
                return Err(Error::Protocol(format!(
                    "literal of {literal_len} bytes exceeds limit of {MAX_LITERAL_SIZE}"
                )));
            }
            let start = response.len();
            response.resize(start + literal_len, 0);
            self.reader.read_exact(&mut response[start..]).await?;
        }

        Ok(response)
    }

    /// Reads responses until the tagged completion for `tag` arrives.
    ///
    /// The tagged line is the last element of the returned vector.
    pub async fn read_until_tagged(&mut self, tag: &str) -> Result<Vec<Vec<u8>>> {
        let mut responses = Vec::new();
        loop {
            let response = self.read_response().await?;
            let done = is_tagged_by(&response, tag);
            responses.push(response);
            if done {
                return Ok(responses);
            }
        }
    }

    async fn read_line(&mut self) -> Result<Vec<u8>> {
        let mut line = Vec::new();

        loop {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "server closed the connection",
                )));
            }

            if let Some(pos) = find_crlf(buf) {
                line.extend_from_slice(&buf[..pos + 2]);
                self.reader.consume(pos + 2);
                return Ok(line);
            }

            let len = buf.len();
            line.extend_from_slice(buf);
            self.reader.consume(len);

            if line.len() > MAX_LINE_LENGTH {
                return Err(Error::Protocol(format!(
                    "response line exceeds {MAX_LINE_LENGTH} bytes"
                )));
            }
        }
    }

    /// Writes a serialized command and flushes it.
    pub async fn write_command(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.reader.get_mut();
        stream.write_all(data).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Returns the transport. Unread buffered bytes are discarded.
    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }
}

fn is_tagged_by(response: &[u8], tag: &str) -> bool {
    response
        .strip_prefix(tag.as_bytes())
        .is_some_and(|rest| rest.first() == Some(&b' '))
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Extracts `n` from a line ending in `{n}\r\n` or `{n+}\r\n`.
fn literal_length(line: &[u8]) -> Option<usize> {
    let body = line.strip_suffix(b"\r\n")?.strip_suffix(b"}")?;
    let body = body.strip_suffix(b"+").unwrap_or(body);
    let open = body.iter().rposition(|&b| b == b'{')?;
    let digits = &body[open + 1..];
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
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
    use tokio_test::io::Builder;

    use super::*;

    #[test]
    fn test_literal_length() {
        assert_eq!(literal_length(b"* 3 FETCH (BODY[] {42}\r\n"), Some(42));
        assert_eq!(literal_length(b"{7+}\r\n"), Some(7));
        assert_eq!(literal_length(b"{0}\r\n"), Some(0));
        assert_eq!(literal_length(b"* OK done\r\n"), None);
        assert_eq!(literal_length(b"{12}"), None);
        assert_eq!(literal_length(b"{x1}\r\n"), None);
        assert_eq!(literal_length(b"{}\r\n"), None);
    }

    #[test]
    fn test_is_tagged_by() {
        assert!(is_tagged_by(b"A0001 OK done\r\n", "A0001"));
        assert!(!is_tagged_by(b"A00012 OK done\r\n", "A0001"));
        assert!(!is_tagged_by(b"* OK done\r\n", "A0001"));
    }

    #[tokio::test]
    async fn test_read_response_with_literal() {
        let mock = Builder::new()
            .read(b"* 7 FETCH (UID 101 BODY[] {11}\r\n")
            .read(b"Hello world)\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        let response = framed.read_response().await.unwrap();
        assert_eq!(
            response,
            b"* 7 FETCH (UID 101 BODY[] {11}\r\nHello world)\r\n".to_vec()
        );
    }

    #[tokio::test]
    async fn test_read_until_tagged_collects_untagged() {
        let mock = Builder::new()
            .read(b"* 2 EXISTS\r\n* OK [UIDVALIDITY 9] ok\r\nA0002 OK EXAMINE completed\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        let responses = framed.read_until_tagged("A0002").await.unwrap();
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[2], b"A0002 OK EXAMINE completed\r\n".to_vec());
    }

    #[tokio::test]
    async fn test_eof_is_an_error() {
        let mock = Builder::new().read(b"* OK partial").build();
        let mut framed = FramedStream::new(mock);

        let err = framed.read_response().await.unwrap_err();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == io::ErrorKind::UnexpectedEof));
    }

    #[tokio::test]
    async fn test_oversized_literal_rejected() {
        let header = format!("* 1 FETCH (BODY[] {{{}}}\r\n", MAX_LITERAL_SIZE + 1);
        let mock = Builder::new().read(header.as_bytes()).build();
        let mut framed = FramedStream::new(mock);

        let err = framed.read_response().await.unwrap_err();
        assert!(err.to_string().contains("exceeds limit"));
    }

    #[tokio::test]
    async fn test_write_command() {
        let mock = Builder::new().write(b"A0001 NOOP\r\n").build();
        let mut framed = FramedStream::new(mock);
        framed.write_command(b"A0001 NOOP\r\n").await.unwrap();
    }
}
