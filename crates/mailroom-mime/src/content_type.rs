//! MIME content type handling.

use std::fmt;

use crate::error::{Error, Result};
use crate::params::{lookup, split_parameters};

/// MIME content type with parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    /// Main type, lowercased (e.g., "text", "image", "multipart").
    pub main_type: String,
    /// Subtype, lowercased (e.g., "plain", "html", "jpeg").
    pub sub_type: String,
    /// Parameters with lowercased names, in order of appearance.
    pub parameters: Vec<(String, String)>,
}

impl ContentType {
    /// Creates a new content type without parameters.
    #[must_use]
    pub fn new(main_type: impl Into<String>, sub_type: impl Into<String>) -> Self {
        Self {
            main_type: main_type.into(),
            sub_type: sub_type.into(),
            parameters: Vec::new(),
        }
    }

    /// `text/plain; charset=us-ascii`, the RFC 2045 default.
    #[must_use]
    pub fn text_plain() -> Self {
        let mut ct = Self::new("text", "plain");
        ct.parameters
            .push(("charset".to_string(), "us-ascii".to_string()));
        ct
    }

    /// Looks up a parameter by (case-insensitive) name.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&str> {
        lookup(&self.parameters, name)
    }

    /// Returns the charset parameter if present.
    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.parameter("charset")
    }

    /// Returns the boundary parameter if present.
    #[must_use]
    pub fn boundary(&self) -> Option<&str> {
        self.parameter("boundary")
    }

    /// Checks if this is a multipart content type.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.main_type == "multipart"
    }

    /// Checks if this is a text content type.
    #[must_use]
    pub fn is_text(&self) -> bool {
        self.main_type == "text"
    }

    /// `main/sub` without parameters.
    #[must_use]
    pub fn essence(&self) -> String {
        format!("{}/{}", self.main_type, self.sub_type)
    }

    /// Parses a content type string.
    ///
    /// Format: `type/subtype; param1=value1; param2="value 2"`
    ///
    /// # Errors
    ///
    /// Returns an error if the `type/subtype` part is missing or malformed.
    pub fn parse(s: &str) -> Result<Self> {
        let (essence, parameters) = split_parameters(s);

        let (main_type, sub_type) = essence
            .split_once('/')
            .map(|(main, sub)| (main.trim(), sub.trim()))
            .filter(|(main, sub)| is_token(main) && is_token(sub))
            .ok_or_else(|| Error::InvalidContentType(s.to_string()))?;

        Ok(Self {
            main_type: main_type.to_ascii_lowercase(),
            sub_type: sub_type.to_ascii_lowercase(),
            parameters,
        })
    }
}

fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| {
            b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?=".contains(&b)
        })
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.main_type, self.sub_type)?;

        for (key, value) in &self.parameters {
            if value.contains(|c: char| c.is_whitespace() || "()<>@,;:\\\"/[]?=".contains(c)) {
                write!(f, "; {key}=\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))?;
            } else {
                write!(f, "; {key}={value}")?;
            }
        }

        Ok(())
    }
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
    fn test_content_type_parse() {
        let ct = ContentType::parse("Text/HTML; Charset=UTF-8").unwrap();
        assert_eq!(ct.essence(), "text/html");
        assert_eq!(ct.charset(), Some("UTF-8"));
        assert!(ct.is_text());
    }

    #[test]
    fn test_content_type_parse_quoted() {
        let ct = ContentType::parse("multipart/mixed; boundary=\"----=_Part_123\"").unwrap();
        assert!(ct.is_multipart());
        assert_eq!(ct.boundary(), Some("----=_Part_123"));
    }

    #[test]
    fn test_name_parameter() {
        let ct = ContentType::parse("image/png; name=\"holiday photo.png\"").unwrap();
        assert_eq!(ct.parameter("NAME"), Some("holiday photo.png"));
    }

    #[test]
    fn test_invalid_content_types() {
        assert!(ContentType::parse("").is_err());
        assert!(ContentType::parse("text").is_err());
        assert!(ContentType::parse("text/").is_err());
        assert!(ContentType::parse("te xt/plain").is_err());
    }

    #[test]
    fn test_content_type_display() {
        let ct = ContentType::parse("image/png; name=\"a b.png\"").unwrap();
        assert_eq!(ct.to_string(), "image/png; name=\"a b.png\"");
        assert_eq!(ContentType::text_plain().to_string(), "text/plain; charset=us-ascii");
    }
}
