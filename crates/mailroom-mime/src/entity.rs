//! Recursive MIME entity tree.

use std::fmt;

use crate::content_type::ContentType;
use crate::disposition::ContentDisposition;
use crate::encoding::{decode_base64, decode_charset, decode_quoted_printable, decode_rfc2047};
use crate::error::{Error, Result};
use crate::header::Headers;

/// Maximum multipart nesting accepted before parsing gives up.
const MAX_DEPTH: usize = 32;

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// 8-bit text.
    EightBit,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Binary (no encoding).
    Binary,
}

impl TransferEncoding {
    /// Parses transfer encoding from string; unknown values mean 7bit.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "binary" => Self::Binary,
            _ => Self::SevenBit,
        }
    }

    /// Undoes this encoding.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed Base64.
    pub fn decode(self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Base64 => decode_base64(data),
            Self::QuotedPrintable => Ok(decode_quoted_printable(data)),
            Self::SevenBit | Self::EightBit | Self::Binary => Ok(data.to_vec()),
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Binary => write!(f, "binary"),
        }
    }
}

/// Content of an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// A leaf: the still transfer-encoded body bytes.
    Single(Vec<u8>),
    /// Child entities of a `multipart/*` entity.
    Multipart(Vec<Entity>),
}

/// One MIME entity: a header section and a body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    /// Header fields.
    pub headers: Headers,
    /// Parsed `Content-Type`, defaulted when absent.
    pub content_type: ContentType,
    /// Leaf bytes or child entities.
    pub body: Body,
}

impl Entity {
    /// Parses a complete message (or body part).
    ///
    /// `message/rfc822` parts are leaves; their content is not entered.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed headers or content types, a multipart
    /// entity without a boundary, or a multipart body with no delimiter.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        Self::parse_at_depth(raw, 0, None)
    }

    fn parse_at_depth(raw: &[u8], depth: usize, default: Option<&ContentType>) -> Result<Self> {
        if depth > MAX_DEPTH {
            return Err(Error::InvalidMultipart(format!(
                "nesting deeper than {MAX_DEPTH} levels"
            )));
        }

        let (header_bytes, body_bytes) = split_header_body(raw);
        let headers = Headers::parse(&String::from_utf8_lossy(header_bytes))?;

        let content_type = match headers.get("content-type") {
            Some(value) => ContentType::parse(value)?,
            None => default.cloned().unwrap_or_else(ContentType::text_plain),
        };

        let body = if content_type.is_multipart() {
            let boundary = content_type.boundary().ok_or(Error::MissingBoundary)?;
            // parts of multipart/digest default to message/rfc822
            let child_default = (content_type.sub_type == "digest")
                .then(|| ContentType::new("message", "rfc822"));
            let parts = split_multipart(body_bytes, boundary)?
                .into_iter()
                .map(|part| Self::parse_at_depth(part, depth + 1, child_default.as_ref()))
                .collect::<Result<Vec<_>>>()?;
            Body::Multipart(parts)
        } else {
            Body::Single(body_bytes.to_vec())
        };

        Ok(Self {
            headers,
            content_type,
            body,
        })
    }

    /// True for `multipart/*` entities.
    #[must_use]
    pub const fn is_multipart(&self) -> bool {
        matches!(self.body, Body::Multipart(_))
    }

    /// `Content-Disposition`, if present.
    #[must_use]
    pub fn disposition(&self) -> Option<ContentDisposition> {
        self.headers
            .get("content-disposition")
            .map(ContentDisposition::parse)
    }

    /// `Content-Transfer-Encoding`, defaulting to 7bit.
    #[must_use]
    pub fn transfer_encoding(&self) -> TransferEncoding {
        self.headers
            .get("content-transfer-encoding")
            .map_or(TransferEncoding::SevenBit, TransferEncoding::parse)
    }

    /// Attachment name: the disposition `filename`, falling back to the
    /// content-type `name`. Blank names count as absent.
    #[must_use]
    pub fn filename(&self) -> Option<String> {
        self.disposition()
            .and_then(|d| d.filename())
            .or_else(|| {
                self.content_type
                    .parameter("name")
                    .map(decode_rfc2047)
                    .filter(|name| !name.trim().is_empty())
            })
    }

    /// All leaf entities, depth-first in declaration order.
    #[must_use]
    pub fn leaves(&self) -> Vec<&Self> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a Self>) {
        match &self.body {
            Body::Single(_) => out.push(self),
            Body::Multipart(parts) => {
                for part in parts {
                    part.collect_leaves(out);
                }
            }
        }
    }

    /// Leaf body with the transfer encoding removed.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed Base64, or when called on a multipart
    /// entity.
    pub fn decoded_body(&self) -> Result<Vec<u8>> {
        match &self.body {
            Body::Single(raw) => self.transfer_encoding().decode(raw),
            Body::Multipart(_) => Err(Error::InvalidMultipart(
                "a multipart entity has no leaf body".to_string(),
            )),
        }
    }

    /// Leaf body decoded to text using the declared charset.
    ///
    /// # Errors
    ///
    /// Same as [`Entity::decoded_body`].
    pub fn text(&self) -> Result<String> {
        let bytes = self.decoded_body()?;
        Ok(decode_charset(&bytes, self.content_type.charset()))
    }
}

/// Splits at the first empty line. A message without one is all header.
fn split_header_body(raw: &[u8]) -> (&[u8], &[u8]) {
    // a part that starts with a blank line has no headers
    if raw.starts_with(b"\r\n") {
        return (&[], &raw[2..]);
    }
    if raw.starts_with(b"\n") {
        return (&[], &raw[1..]);
    }

    let mut i = 0;
    while let Some(offset) = raw[i..].iter().position(|&b| b == b'\n') {
        let line_end = i + offset + 1;
        match raw.get(line_end..) {
            Some([b'\r', b'\n', ..]) => return (&raw[..line_end], &raw[line_end + 2..]),
            Some([b'\n', ..]) => return (&raw[..line_end], &raw[line_end + 1..]),
            _ => i = line_end,
        }
        if i >= raw.len() {
            break;
        }
    }
    (raw, &[])
}

/// Returns the bodies between `--boundary` delimiter lines.
///
/// The preamble and epilogue are discarded. A missing close delimiter is
/// tolerated; a body without any delimiter is not.
fn split_multipart<'a>(body: &'a [u8], boundary: &str) -> Result<Vec<&'a [u8]>> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();

    let mut parts = Vec::new();
    let mut current_start: Option<usize> = None;
    let mut pos = 0;
    let mut found = false;

    while pos < body.len() {
        let line_end = body[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(body.len(), |offset| pos + offset + 1);
        let line = trim_line_end(&body[pos..line_end]);

        if let Some(rest) = line.strip_prefix(delimiter) {
            let closing = rest.starts_with(b"--");
            if closing || rest.iter().all(u8::is_ascii_whitespace) {
                found = true;
                if let Some(start) = current_start.take() {
                    parts.push(strip_trailing_newline(&body[start..pos]));
                }
                if closing {
                    return Ok(parts);
                }
                current_start = Some(line_end);
            }
        }
        pos = line_end;
    }

    if !found {
        return Err(Error::InvalidMultipart(format!(
            "no delimiter for boundary {boundary:?}"
        )));
    }
    if let Some(start) = current_start {
        parts.push(&body[start.min(body.len())..]);
    }
    Ok(parts)
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// The CRLF before a delimiter belongs to the delimiter.
fn strip_trailing_newline(part: &[u8]) -> &[u8] {
    part.strip_suffix(b"\r\n")
        .or_else(|| part.strip_suffix(b"\n"))
        .unwrap_or(part)
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
    use proptest::prelude::*;

    use super::*;

    const NESTED: &str = concat!(
        "From: Alice <alice@example.com>\r\n",
        "To: bob@example.org\r\n",
        "Subject: photos\r\n",
        "MIME-Version: 1.0\r\n",
        "Content-Type: multipart/mixed; boundary=\"outer\"\r\n",
        "\r\n",
        "This is a multi-part message.\r\n",
        "--outer\r\n",
        "Content-Type: multipart/alternative; boundary=inner\r\n",
        "\r\n",
        "--inner\r\n",
        "Content-Type: text/plain; charset=utf-8\r\n",
        "Content-Transfer-Encoding: quoted-printable\r\n",
        "\r\n",
        "Caf=C3=A9 tonight?\r\n",
        "--inner\r\n",
        "Content-Type: text/html; charset=utf-8\r\n",
        "\r\n",
        "<p>Caf\u{e9} tonight?</p>\r\n",
        "--inner--\r\n",
        "--outer\r\n",
        "Content-Type: image/png\r\n",
        "Content-Disposition: inline; filename=\"cat.png\"\r\n",
        "Content-Transfer-Encoding: base64\r\n",
        "\r\n",
        "iVBORw0K\r\n",
        "GgoAAAAN\r\n",
        "--outer--\r\n",
        "epilogue\r\n",
    );

    #[test]
    fn test_nested_multipart_leaves() {
        let entity = Entity::parse(NESTED.as_bytes()).unwrap();
        assert!(entity.is_multipart());
        assert_eq!(entity.headers.get("subject"), Some("photos"));

        let leaves = entity.leaves();
        let types: Vec<String> = leaves.iter().map(|e| e.content_type.essence()).collect();
        assert_eq!(types, vec!["text/plain", "text/html", "image/png"]);

        assert_eq!(leaves[0].text().unwrap(), "Café tonight?");
        assert_eq!(leaves[1].text().unwrap(), "<p>Café tonight?</p>");
        assert_eq!(leaves[2].filename().as_deref(), Some("cat.png"));
        assert_eq!(
            leaves[2].decoded_body().unwrap(),
            vec![0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n', 0, 0, 0, 0x0D]
        );
    }

    #[test]
    fn test_single_part_defaults() {
        let entity = Entity::parse(b"Subject: hi\n\nplain body\n").unwrap();
        assert!(!entity.is_multipart());
        assert_eq!(entity.content_type.essence(), "text/plain");
        assert_eq!(entity.transfer_encoding(), TransferEncoding::SevenBit);
        assert_eq!(entity.text().unwrap(), "plain body\n");
        assert_eq!(entity.leaves().len(), 1);
    }

    #[test]
    fn test_latin1_text() {
        let raw = b"Content-Type: text/plain; charset=ISO-8859-1\r\n\r\nna\xEFve";
        assert_eq!(Entity::parse(raw).unwrap().text().unwrap(), "naïve");
    }

    #[test]
    fn test_filename_falls_back_to_content_type_name() {
        let raw = concat!(
            "Content-Type: application/pdf; name=\"=?utf-8?Q?r=C3=A9sum=C3=A9.pdf?=\"\r\n",
            "Content-Disposition: attachment\r\n",
            "\r\n",
            "%PDF"
        );
        let entity = Entity::parse(raw.as_bytes()).unwrap();
        assert_eq!(entity.filename().as_deref(), Some("résumé.pdf"));
    }

    #[test]
    fn test_missing_boundary() {
        let raw = b"Content-Type: multipart/mixed\r\n\r\n--x\r\n\r\nhi\r\n--x--\r\n";
        assert!(matches!(Entity::parse(raw), Err(Error::MissingBoundary)));
    }

    #[test]
    fn test_no_delimiter_is_invalid() {
        let raw = b"Content-Type: multipart/mixed; boundary=zzz\r\n\r\nno parts here\r\n";
        assert!(matches!(Entity::parse(raw), Err(Error::InvalidMultipart(_))));
    }

    #[test]
    fn test_unterminated_multipart_keeps_last_part() {
        let raw = b"Content-Type: multipart/mixed; boundary=b\n\n--b\n\nfirst\n--b\n\nsecond\n";
        let entity = Entity::parse(raw).unwrap();
        let texts: Vec<String> = entity.leaves().iter().map(|e| e.text().unwrap()).collect();
        assert_eq!(texts, vec!["first", "second\n"]);
    }

    #[test]
    fn test_invalid_content_type_is_error() {
        let raw = b"Content-Type: garbage\r\n\r\nbody";
        assert!(matches!(Entity::parse(raw), Err(Error::InvalidContentType(_))));
    }

    #[test]
    fn test_embedded_message_is_leaf() {
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=b\r\n\r\n",
            "--b\r\n",
            "Content-Type: message/rfc822\r\n\r\n",
            "Content-Type: multipart/mixed; boundary=c\r\n\r\n--c\r\n\r\ninner\r\n--c--\r\n",
            "--b--\r\n"
        );
        let entity = Entity::parse(raw.as_bytes()).unwrap();
        let leaves = entity.leaves();
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].content_type.essence(), "message/rfc822");
    }

    proptest! {
        #[test]
        fn parse_never_panics(input in proptest::collection::vec(any::<u8>(), 0..512)) {
            let _ = Entity::parse(&input);
        }
    }
}
