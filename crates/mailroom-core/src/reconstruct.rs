//! MIME reconstructor.
//!
//! Turns one message's raw bytes into a readable body plus embeddable
//! images, and pulls single attachments out by file name. Only the body
//! section is fetched; metadata comes from the summary fetch.

use mailroom_imap::{FetchAttribute, FetchItem, FetchItems, Mailbox, Uid, UidSet};
use mailroom_mime::Entity;
use mailroom_mime::encoding::decode_charset;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::gateway::MailSession;
use crate::model::{InlineMedia, MessageBody};
use crate::{Error, Result};

const CONTENT_TYPE_MARKER: &[u8] = b"content-type:";

/// One attachment's decoded bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentData {
    /// Name as declared in the message.
    pub filename: String,
    /// `type/subtype`, for the caller's response headers.
    pub content_type: String,
    /// Decoded content.
    pub data: Vec<u8>,
}

/// Fetches message `uid` and reconstructs its body.
///
/// # Errors
///
/// [`Error::Fetch`], [`Error::MessageNotFound`] or [`Error::EmptyBody`] from
/// the fetch, then anything [`reconstruct_raw`] returns.
pub async fn reconstruct<S>(
    session: &mut MailSession<S>,
    mailbox: &Mailbox,
    uid: Uid,
) -> Result<MessageBody>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let raw = fetch_raw(session, mailbox, uid).await?;
    reconstruct_raw(uid, &raw)
}

/// Fetches message `uid` and extracts the attachment named `filename`.
///
/// # Errors
///
/// Fetch errors as for [`reconstruct`], then anything
/// [`extract_attachment`] returns.
pub async fn fetch_attachment<S>(
    session: &mut MailSession<S>,
    mailbox: &Mailbox,
    uid: Uid,
    filename: &str,
) -> Result<AttachmentData>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let raw = fetch_raw(session, mailbox, uid).await?;
    extract_attachment(uid, &raw, filename)
}

async fn fetch_raw<S>(session: &mut MailSession<S>, mailbox: &Mailbox, uid: Uid) -> Result<Vec<u8>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    session
        .examine(mailbox)
        .await
        .map_err(|source| Error::Fetch {
            stage: "examine",
            source,
        })?;

    let items = FetchItems(vec![FetchAttribute::Uid, FetchAttribute::full_message()]);
    let fetched = session
        .uid_fetch(&UidSet::single(uid), items)
        .await
        .map_err(|source| Error::Fetch {
            stage: "body",
            source,
        })?;

    let section = fetched
        .into_iter()
        .flat_map(|(_, items)| items)
        .find_map(|item| match item {
            FetchItem::Body {
                section: None,
                data,
            } => Some(data),
            _ => None,
        });

    match section {
        None => Err(Error::MessageNotFound { uid }),
        Some(None) => Err(Error::EmptyBody { uid }),
        Some(Some(data)) if data.is_empty() => Err(Error::EmptyBody { uid }),
        Some(Some(data)) => {
            tracing::debug!(%uid, bytes = data.len(), "message body fetched");
            Ok(data)
        }
    }
}

fn has_content_type(raw: &[u8]) -> bool {
    raw.windows(CONTENT_TYPE_MARKER.len())
        .any(|window| window.eq_ignore_ascii_case(CONTENT_TYPE_MARKER))
}

/// Unlabelled text: UTF-8 when it is valid, Windows-1252 otherwise.
fn unlabelled_text(raw: &[u8]) -> String {
    match std::str::from_utf8(raw) {
        Ok(text) => text.to_string(),
        Err(_) => decode_charset(raw, Some("windows-1252")),
    }
}

/// Reconstructs the readable content of a raw message.
///
/// - No `Content-Type:` anywhere: the raw bytes are the body, read as UTF-8
///   or, when that fails, as Windows-1252.
/// - Otherwise every leaf is visited in order. The last `text/html` part
///   is the body; the last `text/plain` part is the fallback. Selection
///   goes by content type alone, so a text part sent as an attachment can
///   still be the body.
/// - Images with an `attachment` or `inline` disposition become
///   [`InlineMedia`], independently of body selection. Empty images are
///   skipped.
///
/// # Errors
///
/// [`Error::Parse`] when MIME decoding fails and [`Error::NoContent`] when
/// neither a body nor an image was found.
pub fn reconstruct_raw(uid: Uid, raw: &[u8]) -> Result<MessageBody> {
    if !has_content_type(raw) {
        tracing::debug!(%uid, "no MIME structure, using raw body");
        return Ok(MessageBody {
            body: unlabelled_text(raw),
            media: Vec::new(),
        });
    }

    let entity = Entity::parse(raw).map_err(|source| Error::Parse { uid, source })?;

    let mut html = None;
    let mut plain = None;
    let mut media = Vec::new();

    for part in entity.leaves() {
        let is_placed = part
            .disposition()
            .is_some_and(|d| d.is_attachment() || d.is_inline());
        let content_type = &part.content_type;

        match (content_type.main_type.as_str(), content_type.sub_type.as_str()) {
            ("text", "html") => {
                html = Some(part.text().map_err(|source| Error::Parse { uid, source })?);
            }
            ("text", "plain") => {
                plain = Some(part.text().map_err(|source| Error::Parse { uid, source })?);
            }
            ("image", _) if is_placed => {
                let data = part
                    .decoded_body()
                    .map_err(|source| Error::Parse { uid, source })?;
                let name = part.filename().unwrap_or_default();
                if data.is_empty() {
                    tracing::warn!(%uid, %name, "skipping empty image");
                    continue;
                }
                tracing::debug!(%uid, %name, bytes = data.len(), "captured image");
                media.push(InlineMedia::image(name, &content_type.essence(), &data));
            }
            _ => {}
        }
    }

    let body = html.or(plain).unwrap_or_default();
    if body.is_empty() && media.is_empty() {
        return Err(Error::NoContent { uid });
    }
    Ok(MessageBody { body, media })
}

/// Extracts the first attachment or inline part named `filename`.
///
/// Names compare case-insensitively.
///
/// # Errors
///
/// [`Error::AttachmentNotFound`] when no part carries the name (including
/// messages without MIME structure), [`Error::Parse`] when the message or
/// the matching part cannot be decoded.
pub fn extract_attachment(uid: Uid, raw: &[u8], filename: &str) -> Result<AttachmentData> {
    let not_found = || Error::AttachmentNotFound {
        uid,
        filename: filename.to_string(),
    };
    if !has_content_type(raw) {
        return Err(not_found());
    }

    let wanted = filename.trim().to_lowercase();
    let entity = Entity::parse(raw).map_err(|source| Error::Parse { uid, source })?;

    let part = entity
        .leaves()
        .into_iter()
        .filter(|part| {
            part.disposition()
                .is_some_and(|d| d.is_attachment() || d.is_inline())
        })
        .find_map(|part| {
            let name = part.filename()?;
            (name.to_lowercase() == wanted).then_some((part, name))
        });

    let Some((part, name)) = part else {
        tracing::debug!(%uid, filename, "attachment not found");
        return Err(not_found());
    };

    let data = part
        .decoded_body()
        .map_err(|source| Error::Parse { uid, source })?;
    tracing::debug!(%uid, filename = %name, bytes = data.len(), "attachment extracted");
    Ok(AttachmentData {
        filename: name,
        content_type: part.content_type.essence(),
        data,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio_test::io::Builder;

    use super::*;
    use crate::testing::{examine, login, session};

    fn uid() -> Uid {
        Uid::new(7).unwrap()
    }

    const ALTERNATIVE: &str = "From: a@x\r\n\
To: b@x\r\n\
Subject: results\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"outer\"\r\n\
\r\n\
--outer\r\n\
Content-Type: multipart/alternative; boundary=\"inner\"\r\n\
\r\n\
--inner\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Plain version\r\n\
--inner\r\n\
Content-Type: text/html; charset=utf-8\r\n\
Content-Transfer-Encoding: quoted-printable\r\n\
\r\n\
<p>HTML =E2=9C=93</p>\r\n\
--inner--\r\n\
--outer\r\n\
Content-Type: image/png\r\n\
Content-Disposition: inline; filename=\"scan.png\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
iVBORw==\r\n\
--outer\r\n\
Content-Type: image/gif; name=\"empty.gif\"\r\n\
Content-Disposition: attachment\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
\r\n\
--outer\r\n\
Content-Type: application/pdf\r\n\
Content-Disposition: attachment; filename=\"Report.PDF\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
JVBERi0=\r\n\
--outer--\r\n";

    const PLAIN_ONLY: &str = "From: a@x\r\n\
To: b@x\r\n\
Content-Type: text/plain; charset=iso-8859-1\r\n\
Content-Transfer-Encoding: quoted-printable\r\n\
\r\n\
Caf=E9 at noon\r\n";

    #[test]
    fn test_no_marker_returns_raw_body() {
        let raw = b"From: a@x\r\nSubject: hi\r\n\r\nJust text.";
        let body = reconstruct_raw(uid(), raw).unwrap();
        assert_eq!(body.body, String::from_utf8_lossy(raw));
        assert!(body.media.is_empty());
    }

    #[test]
    fn test_no_marker_legacy_bytes() {
        let raw = b"Subject: hi\r\n\r\nCaf\xE9 \x93ok\x94";
        let body = reconstruct_raw(uid(), raw).unwrap();
        assert_eq!(body.body, "Subject: hi\r\n\r\nCaf\u{e9} \u{201C}ok\u{201D}");
    }

    #[test]
    fn test_attached_text_only_becomes_body() {
        let raw = "Content-Type: multipart/mixed; boundary=b\r\n\
\r\n\
--b\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
Content-Disposition: attachment; filename=notes.txt\r\n\
\r\n\
Take two daily\r\n\
--b--\r\n";
        let body = reconstruct_raw(uid(), raw.as_bytes()).unwrap();
        assert_eq!(body.body.trim_end(), "Take two daily");
        assert!(body.media.is_empty());

        let file = extract_attachment(uid(), raw.as_bytes(), "NOTES.TXT").unwrap();
        assert_eq!(file.filename, "notes.txt");
    }

    #[test]
    fn test_html_wins_and_images_are_captured() {
        let body = reconstruct_raw(uid(), ALTERNATIVE.as_bytes()).unwrap();
        assert_eq!(body.body, "<p>HTML \u{2713}</p>");
        assert_eq!(body.media.len(), 1);
        assert_eq!(body.media[0].name, "scan.png");
        assert_eq!(body.media[0].data_uri, "data:image/png;base64,iVBORw==");
    }

    #[test]
    fn test_plain_only_message() {
        let body = reconstruct_raw(uid(), PLAIN_ONLY.as_bytes()).unwrap();
        assert_eq!(body.body.trim_end(), "Café at noon");
        assert!(body.media.is_empty());

        let err = extract_attachment(uid(), PLAIN_ONLY.as_bytes(), "anything.pdf").unwrap_err();
        assert!(matches!(err, Error::AttachmentNotFound { ref filename, .. } if filename == "anything.pdf"));
    }

    #[test]
    fn test_image_only_message_has_content() {
        let raw = "Content-Type: image/jpeg; name=\"x.jpg\"\r\n\
Content-Disposition: attachment\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
/9j/\r\n";
        let body = reconstruct_raw(uid(), raw.as_bytes()).unwrap();
        assert!(body.body.is_empty());
        assert_eq!(body.media[0].name, "x.jpg");
        assert!(body.media[0].data_uri.starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn test_nothing_readable_is_no_content() {
        let raw = "Content-Type: multipart/mixed; boundary=b\r\n\
\r\n\
--b\r\n\
Content-Type: application/pdf\r\n\
Content-Disposition: attachment; filename=a.pdf\r\n\
\r\n\
%PDF\r\n\
--b--\r\n";
        let err = reconstruct_raw(uid(), raw.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::NoContent { .. }));
    }

    #[test]
    fn test_announced_but_broken_mime_is_parse_error() {
        let raw = b"Content-Type: multipart/mixed\r\n\r\nno boundary parameter";
        let err = reconstruct_raw(uid(), raw).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn test_extract_attachment_case_insensitive() {
        let found = extract_attachment(uid(), ALTERNATIVE.as_bytes(), "report.pdf").unwrap();
        assert_eq!(found.filename, "Report.PDF");
        assert_eq!(found.content_type, "application/pdf");
        assert_eq!(found.data, b"%PDF-");

        let inline = extract_attachment(uid(), ALTERNATIVE.as_bytes(), "SCAN.png").unwrap();
        assert_eq!(inline.data, b"\x89PNG");
    }

    fn body_fetch<'a>(builder: &'a mut Builder, raw: &str) -> &'a mut Builder {
        let response = format!(
            "* 1 FETCH (UID 7 BODY[] {{{}}}\r\n{raw})\r\nA0003 OK FETCH completed\r\n",
            raw.len()
        );
        builder
            .write(b"A0003 UID FETCH 7 (UID BODY.PEEK[])\r\n")
            .read(response.as_bytes())
    }

    #[tokio::test]
    async fn test_reconstruct_over_session() {
        let mut builder = Builder::new();
        login(&mut builder);
        examine(&mut builder, 2, 1);
        let mock = body_fetch(&mut builder, PLAIN_ONLY).build();
        let mut s = session(mock).await;

        let body = reconstruct(&mut s, &Mailbox::inbox(), uid()).await.unwrap();
        assert_eq!(body.body.trim_end(), "Café at noon");
    }

    #[tokio::test]
    async fn test_fetch_attachment_over_session() {
        let mut builder = Builder::new();
        login(&mut builder);
        examine(&mut builder, 2, 1);
        let mock = body_fetch(&mut builder, ALTERNATIVE).build();
        let mut s = session(mock).await;

        let pdf = fetch_attachment(&mut s, &Mailbox::inbox(), uid(), "report.pdf")
            .await
            .unwrap();
        assert_eq!(pdf.data, b"%PDF-");
    }

    #[tokio::test]
    async fn test_missing_message() {
        let mut builder = Builder::new();
        login(&mut builder);
        let mock = examine(&mut builder, 2, 1)
            .write(b"A0003 UID FETCH 7 (UID BODY.PEEK[])\r\n")
            .read(b"A0003 OK FETCH completed\r\n")
            .build();
        let mut s = session(mock).await;

        let err = reconstruct(&mut s, &Mailbox::inbox(), uid()).await.unwrap_err();
        assert!(matches!(err, Error::MessageNotFound { .. }));
    }

    #[tokio::test]
    async fn test_nil_body_is_empty() {
        let mut builder = Builder::new();
        login(&mut builder);
        let mock = examine(&mut builder, 2, 1)
            .write(b"A0003 UID FETCH 7 (UID BODY.PEEK[])\r\n")
            .read(b"* 1 FETCH (UID 7 BODY[] NIL)\r\nA0003 OK FETCH completed\r\n")
            .build();
        let mut s = session(mock).await;

        let err = reconstruct(&mut s, &Mailbox::inbox(), uid()).await.unwrap_err();
        assert!(matches!(err, Error::EmptyBody { .. }));
    }
}
