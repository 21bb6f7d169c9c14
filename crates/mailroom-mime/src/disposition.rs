//! `Content-Disposition` (RFC 2183).

use crate::encoding::decode_rfc2047;
use crate::params::{lookup, split_parameters};

/// A parsed `Content-Disposition` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDisposition {
    /// Disposition type, lowercased (`inline`, `attachment`, ...).
    pub kind: String,
    /// Parameters with lowercased names.
    pub parameters: Vec<(String, String)>,
}

impl ContentDisposition {
    /// Parses a header value. Unknown types are kept as given.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        let (kind, parameters) = split_parameters(value);
        Self {
            kind: kind.to_ascii_lowercase(),
            parameters,
        }
    }

    /// True for `attachment`.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.kind == "attachment"
    }

    /// True for `inline`.
    #[must_use]
    pub fn is_inline(&self) -> bool {
        self.kind == "inline"
    }

    /// Looks up a parameter by (case-insensitive) name.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&str> {
        lookup(&self.parameters, name)
    }

    /// The `filename` parameter, RFC 2047 decoded, if non-empty.
    #[must_use]
    pub fn filename(&self) -> Option<String> {
        self.parameter("filename")
            .map(decode_rfc2047)
            .filter(|name| !name.trim().is_empty())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_with_filename() {
        let d = ContentDisposition::parse("ATTACHMENT; filename=\"report.pdf\"; size=4000");
        assert!(d.is_attachment());
        assert!(!d.is_inline());
        assert_eq!(d.filename().as_deref(), Some("report.pdf"));
        assert_eq!(d.parameter("size"), Some("4000"));
    }

    #[test]
    fn test_encoded_filename() {
        let d = ContentDisposition::parse("inline; filename=\"=?utf-8?B?w6l0w6kuanBn?=\"");
        assert!(d.is_inline());
        assert_eq!(d.filename().as_deref(), Some("été.jpg"));
    }

    #[test]
    fn test_blank_filename_is_none() {
        assert_eq!(ContentDisposition::parse("attachment; filename=\"  \"").filename(), None);
        assert_eq!(ContentDisposition::parse("inline").filename(), None);
    }
}
