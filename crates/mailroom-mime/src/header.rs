//! MIME header handling.

use crate::encoding::decode_rfc2047;
use crate::error::{Error, Result};

/// An ordered header section with case-insensitive lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<(String, String)>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a header value.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    /// Gets the first value for a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Gets all values for a header, in order of appearance.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// First value of a header with RFC 2047 encoded words decoded.
    #[must_use]
    pub fn get_decoded(&self, name: &str) -> Option<String> {
        self.get(name).map(decode_rfc2047)
    }

    /// True if any value exists for `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Number of header fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when there are no header fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over `(name, value)` pairs in order of appearance.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Parses a header section.
    ///
    /// Folded lines are unfolded with a single space. Parsing stops at the
    /// first empty line. A leading mbox `From ` line is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeader`] for a line that is neither a field
    /// nor a continuation.
    pub fn parse(text: &str) -> Result<Self> {
        let mut headers = Self::new();
        let mut current: Option<(String, String)> = None;

        for (index, line) in text.lines().enumerate() {
            if line.is_empty() {
                break;
            }

            if line.starts_with(' ') || line.starts_with('\t') {
                match current.as_mut() {
                    Some((_, value)) => {
                        value.push(' ');
                        value.push_str(line.trim());
                    }
                    None => {
                        return Err(Error::InvalidHeader(format!(
                            "continuation line without a field: {line:?}"
                        )));
                    }
                }
                continue;
            }

            if let Some((name, value)) = current.take() {
                headers.add(name, value);
            }

            if index == 0 && line.starts_with("From ") {
                continue;
            }

            match line.split_once(':') {
                Some((name, value)) if is_field_name(name.trim_end()) => {
                    current = Some((name.trim_end().to_string(), value.trim().to_string()));
                }
                _ => {
                    return Err(Error::InvalidHeader(format!("malformed field: {line:?}")));
                }
            }
        }

        if let Some((name, value)) = current {
            headers.add(name, value);
        }

        Ok(headers)
    }
}

fn is_field_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_graphic())
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
    use super::*;

    #[test]
    fn test_headers_parse() {
        let text = concat!(
            "From: sender@example.com\r\n",
            "To: recipient@example.com\r\n",
            "Subject: Test Message\r\n",
            "Content-Type: multipart/mixed;\r\n",
            "\tboundary=\"abc\"\r\n",
            "\r\n",
            "Not-A-Header: body text\r\n"
        );

        let headers = Headers::parse(text).unwrap();
        assert_eq!(headers.len(), 4);
        assert_eq!(headers.get("from"), Some("sender@example.com"));
        assert_eq!(headers.get("SUBJECT"), Some("Test Message"));
        assert_eq!(
            headers.get("Content-Type"),
            Some("multipart/mixed; boundary=\"abc\"")
        );
        assert!(!headers.contains("Not-A-Header"));
    }

    #[test]
    fn test_repeated_fields_keep_order() {
        let headers = Headers::parse("Received: a\nReceived: b\nX: 1\n").unwrap();
        assert_eq!(headers.get_all("received"), vec!["a", "b"]);
        let names: Vec<_> = headers.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["Received", "Received", "X"]);
    }

    #[test]
    fn test_decoded_value() {
        let headers = Headers::parse("Subject: =?utf-8?Q?caf=C3=A9?=\r\n").unwrap();
        assert_eq!(headers.get_decoded("subject").as_deref(), Some("café"));
    }

    #[test]
    fn test_mbox_separator_is_skipped() {
        let headers =
            Headers::parse("From alice@example.com Mon Jan 1 00:00:00 2024\nSubject: hi\n").unwrap();
        assert_eq!(headers.get("subject"), Some("hi"));
    }

    #[test]
    fn test_malformed_lines() {
        assert!(matches!(
            Headers::parse(" leading continuation\n"),
            Err(Error::InvalidHeader(_))
        ));
        assert!(matches!(
            Headers::parse("Subject: ok\nno colon here\n"),
            Err(Error::InvalidHeader(_))
        ));
    }
}
