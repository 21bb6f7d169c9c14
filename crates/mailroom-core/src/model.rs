//! Values handed back to the web layer.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Metadata of one fetched message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageSummary {
    /// Per-session sequence number.
    pub seq: u32,
    /// Durable identifier.
    pub uid: u32,
    /// Decoded subject; empty when absent.
    pub subject: String,
    /// First `From` address.
    pub from: String,
    /// Display name of the sender, if any.
    pub from_name: Option<String>,
    /// First `To` address.
    pub to: String,
    /// Every `To` address, in header order.
    pub recipients: Vec<String>,
    /// Message timestamp, used as the sort key.
    pub date: Option<DateTime<Utc>>,
    /// Attachment and inline file names, in structure order.
    pub attachments: Vec<String>,
}

/// Readable content of one message.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct MessageBody {
    /// HTML when the message has it, plain text otherwise.
    ///
    /// Parts are decoded with their declared charset. A message without MIME
    /// structure is read as UTF-8, or as Windows-1252 when that fails.
    pub body: String,
    /// Images to embed next to the body.
    pub media: Vec<InlineMedia>,
}

/// An image extracted from a message, ready for an `<img src>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineMedia {
    /// Media kind; always `image` today.
    #[serde(rename = "type")]
    pub kind: String,
    /// File name.
    pub name: String,
    /// `data:` URI with the Base64 payload.
    #[serde(rename = "base64")]
    pub data_uri: String,
}

impl InlineMedia {
    /// Builds an image record from decoded bytes.
    #[must_use]
    pub fn image(name: impl Into<String>, content_type: &str, data: &[u8]) -> Self {
        Self {
            kind: "image".to_string(),
            name: name.into(),
            data_uri: format!(
                "data:{content_type};base64,{}",
                mailroom_mime::encoding::encode_base64(data)
            ),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_media_json_shape() {
        let media = InlineMedia::image("dot.png", "image/png", b"\x89PNG");
        let json = serde_json::to_value(&media).unwrap();
        assert_eq!(json["type"], "image");
        assert_eq!(json["name"], "dot.png");
        assert_eq!(json["base64"], "data:image/png;base64,iVBORw==");
    }

    #[test]
    fn test_summary_serializes_date_as_rfc3339() {
        let summary = MessageSummary {
            seq: 1,
            uid: 101,
            subject: "Lab results".to_string(),
            from: "a@x".to_string(),
            from_name: None,
            to: "b@x".to_string(),
            recipients: vec!["b@x".to_string()],
            date: DateTime::parse_from_rfc3339("2024-03-01T09:00:00Z")
                .ok()
                .map(|d| d.with_timezone(&Utc)),
            attachments: vec![],
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["date"], "2024-03-01T09:00:00Z");
        assert_eq!(json["uid"], 101);
    }
}
