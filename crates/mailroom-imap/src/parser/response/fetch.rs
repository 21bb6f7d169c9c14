//! FETCH response parsing.

use crate::Result;
use crate::parser::lexer::{Lexer, Token};
use crate::types::Uid;

use super::helpers::parse_flag_list;
use super::types::{Address, BodyKind, BodyStructure, Disposition, Envelope, FetchItem};

/// Parses the parenthesized data item list of `* n FETCH (...)`.
pub fn parse_fetch_items(lexer: &mut Lexer<'_>) -> Result<Vec<FetchItem>> {
    lexer.expect(&Token::LParen)?;
    let mut items = Vec::new();

    loop {
        let name = match lexer.next_token()? {
            Token::RParen => return Ok(items),
            Token::Space => continue,
            Token::Atom(name) => name.to_ascii_uppercase(),
            other => {
                return Err(lexer.error(format!("unexpected {} in FETCH data", other.describe())));
            }
        };

        match name.as_str() {
            "UID" => {
                lexer.expect_space()?;
                let n = lexer.read_number()?;
                let uid = Uid::new(n).ok_or_else(|| lexer.error("UID 0 in FETCH data"))?;
                items.push(FetchItem::Uid(uid));
            }
            "FLAGS" => {
                lexer.expect_space()?;
                items.push(FetchItem::Flags(parse_flag_list(lexer)?));
            }
            "INTERNALDATE" => {
                lexer.expect_space()?;
                if let Some(date) = lexer.read_nstring()? {
                    items.push(FetchItem::InternalDate(date));
                }
            }
            "RFC822.SIZE" => {
                lexer.expect_space()?;
                items.push(FetchItem::Rfc822Size(lexer.read_number()?));
            }
            "ENVELOPE" => {
                lexer.expect_space()?;
                items.push(FetchItem::Envelope(Box::new(parse_envelope(lexer)?)));
            }
            "BODYSTRUCTURE" => {
                lexer.expect_space()?;
                items.push(FetchItem::BodyStructure(parse_body_structure(lexer)?));
            }
            "BODY" | "BINARY" if lexer.peek() == Some(b'[') => {
                let section = parse_section(lexer)?;
                lexer.expect_space()?;
                let data = lexer.read_nstring_bytes()?;
                items.push(FetchItem::Body { section, data });
            }
            // Non-extensible form of BODYSTRUCTURE.
            "BODY" => {
                lexer.expect_space()?;
                items.push(FetchItem::BodyStructure(parse_body_structure(lexer)?));
            }
            "RFC822" => {
                lexer.expect_space()?;
                let data = lexer.read_nstring_bytes()?;
                items.push(FetchItem::Body {
                    section: None,
                    data,
                });
            }
            _ => {
                tracing::trace!(item = %name, "skipping FETCH item");
                lexer.expect_space()?;
                lexer.skip_value()?;
            }
        }
    }
}

/// Reads `[section]<origin>` after `BODY`; the origin is dropped.
fn parse_section(lexer: &mut Lexer<'_>) -> Result<Option<String>> {
    lexer.expect(&Token::LBracket)?;
    let rest = lexer.remaining();
    let end = rest
        .iter()
        .position(|&b| b == b']')
        .ok_or_else(|| lexer.error("unterminated section specifier"))?;
    let section = String::from_utf8_lossy(&rest[..end]).into_owned();
    lexer.skip(end + 1);

    if lexer.eat(b'<') {
        while lexer.peek().is_some_and(|b| b.is_ascii_digit()) {
            lexer.skip(1);
        }
        if !lexer.eat(b'>') {
            return Err(lexer.error("unterminated partial origin"));
        }
    }

    Ok((!section.is_empty()).then_some(section))
}

/// Parses an envelope structure.
pub fn parse_envelope(lexer: &mut Lexer<'_>) -> Result<Envelope> {
    lexer.expect(&Token::LParen)?;

    let date = lexer.read_nstring()?;
    lexer.expect_space()?;
    let subject = lexer.read_nstring()?;
    lexer.expect_space()?;
    let from = parse_address_list(lexer)?;
    lexer.expect_space()?;
    let sender = parse_address_list(lexer)?;
    lexer.expect_space()?;
    let reply_to = parse_address_list(lexer)?;
    lexer.expect_space()?;
    let to = parse_address_list(lexer)?;
    lexer.expect_space()?;
    let cc = parse_address_list(lexer)?;
    lexer.expect_space()?;
    let bcc = parse_address_list(lexer)?;
    lexer.expect_space()?;
    let in_reply_to = lexer.read_nstring()?;
    lexer.expect_space()?;
    let message_id = lexer.read_nstring()?;

    lexer.expect(&Token::RParen)?;

    Ok(Envelope {
        date,
        subject,
        from,
        sender,
        reply_to,
        to,
        cc,
        bcc,
        in_reply_to,
        message_id,
    })
}

/// Parses an address list (`NIL` or a list of addresses).
fn parse_address_list(lexer: &mut Lexer<'_>) -> Result<Vec<Address>> {
    match lexer.next_token()? {
        Token::Nil => Ok(Vec::new()),
        Token::LParen => {
            let mut addresses = Vec::new();
            loop {
                match lexer.peek() {
                    Some(b')') => {
                        lexer.skip(1);
                        return Ok(addresses);
                    }
                    Some(b' ') => lexer.skip(1),
                    Some(b'(') => addresses.push(parse_address(lexer)?),
                    _ => return Err(lexer.error("malformed address list")),
                }
            }
        }
        other => Err(lexer.error(format!(
            "expected address list, found {}",
            other.describe()
        ))),
    }
}

fn parse_address(lexer: &mut Lexer<'_>) -> Result<Address> {
    lexer.expect(&Token::LParen)?;
    let name = lexer.read_nstring()?;
    lexer.expect_space()?;
    let adl = lexer.read_nstring()?;
    lexer.expect_space()?;
    let mailbox = lexer.read_nstring()?;
    lexer.expect_space()?;
    let host = lexer.read_nstring()?;
    lexer.expect(&Token::RParen)?;

    Ok(Address {
        name,
        adl,
        mailbox,
        host,
    })
}

/// Parses a `BODYSTRUCTURE` (or `BODY`) value.
///
/// Multipart: `((part) (part) "subtype" [params [disposition ...]])`.
/// Single part: `("type" "subtype" params id desc enc size [lines] [md5
/// [disposition ...]])`, where `message/rfc822` carries an envelope, a
/// nested structure and a line count after the size.
pub fn parse_body_structure(lexer: &mut Lexer<'_>) -> Result<BodyStructure> {
    lexer.expect(&Token::LParen)?;

    if lexer.peek() == Some(b'(') {
        parse_multipart(lexer)
    } else {
        parse_single_part(lexer)
    }
}

fn parse_multipart(lexer: &mut Lexer<'_>) -> Result<BodyStructure> {
    let mut parts = Vec::new();
    while lexer.peek() == Some(b'(') {
        parts.push(parse_body_structure(lexer)?);
        lexer.eat(b' ');
    }

    let media_subtype = lexer.read_nstring()?.unwrap_or_default().to_ascii_lowercase();

    let mut params = Vec::new();
    let mut disposition = None;
    if lexer.eat(b' ') {
        params = parse_body_params(lexer)?;
        if lexer.eat(b' ') {
            disposition = parse_disposition(lexer)?;
        }
    }
    skip_extensions(lexer)?;

    Ok(BodyStructure {
        media_type: "multipart".to_string(),
        media_subtype,
        params,
        disposition,
        kind: BodyKind::Multipart { parts },
    })
}

fn parse_single_part(lexer: &mut Lexer<'_>) -> Result<BodyStructure> {
    let media_type = lexer.read_nstring()?.unwrap_or_default().to_ascii_lowercase();
    lexer.expect_space()?;
    let media_subtype = lexer.read_nstring()?.unwrap_or_default().to_ascii_lowercase();
    lexer.expect_space()?;
    let params = parse_body_params(lexer)?;
    lexer.expect_space()?;
    let id = lexer.read_nstring()?;
    lexer.expect_space()?;
    let description = lexer.read_nstring()?;
    lexer.expect_space()?;
    let encoding = lexer.read_nstring()?.unwrap_or_default().to_ascii_lowercase();
    lexer.expect_space()?;
    let size = lexer.read_number()?;

    let is_message = media_type == "message"
        && (media_subtype == "rfc822" || media_subtype == "global");

    let kind = if is_message {
        lexer.expect_space()?;
        let envelope = Box::new(parse_envelope(lexer)?);
        lexer.expect_space()?;
        let body = Box::new(parse_body_structure(lexer)?);
        lexer.expect_space()?;
        let lines = lexer.read_number()?;
        BodyKind::Message {
            encoding,
            size,
            envelope,
            body,
            lines,
        }
    } else {
        let lines = if media_type == "text" && lexer.eat(b' ') {
            Some(lexer.read_number()?)
        } else {
            None
        };
        BodyKind::Single {
            id,
            description,
            encoding,
            size,
            lines,
        }
    };

    // body-ext-1part: md5, then disposition
    let mut disposition = None;
    if lexer.eat(b' ') {
        lexer.skip_value()?;
        if lexer.eat(b' ') {
            disposition = parse_disposition(lexer)?;
        }
    }
    skip_extensions(lexer)?;

    Ok(BodyStructure {
        media_type,
        media_subtype,
        params,
        disposition,
        kind,
    })
}

/// Parses `NIL` or `("key" "value" ...)`; names are lowercased.
fn parse_body_params(lexer: &mut Lexer<'_>) -> Result<Vec<(String, String)>> {
    match lexer.next_token()? {
        Token::Nil => Ok(Vec::new()),
        Token::LParen => {
            let mut params = Vec::new();
            loop {
                match lexer.peek() {
                    Some(b')') => {
                        lexer.skip(1);
                        return Ok(params);
                    }
                    Some(b' ') => lexer.skip(1),
                    _ => {
                        let key = lexer.read_astring()?.to_ascii_lowercase();
                        lexer.expect_space()?;
                        let value = lexer.read_nstring()?.unwrap_or_default();
                        params.push((key, value));
                    }
                }
            }
        }
        other => Err(lexer.error(format!(
            "expected body parameters, found {}",
            other.describe()
        ))),
    }
}

/// Parses `NIL` or `("type" params)`.
fn parse_disposition(lexer: &mut Lexer<'_>) -> Result<Option<Disposition>> {
    match lexer.next_token()? {
        Token::Nil => Ok(None),
        Token::LParen => {
            let kind = lexer.read_astring()?.to_ascii_lowercase();
            lexer.expect_space()?;
            let params = parse_body_params(lexer)?;
            lexer.expect(&Token::RParen)?;
            Ok(Some(Disposition { kind, params }))
        }
        other => Err(lexer.error(format!(
            "expected disposition, found {}",
            other.describe()
        ))),
    }
}

/// Skips language, location and future extension data up to the closing
/// parenthesis of the current body.
fn skip_extensions(lexer: &mut Lexer<'_>) -> Result<()> {
    loop {
        match lexer.peek() {
            Some(b')') => {
                lexer.skip(1);
                return Ok(());
            }
            Some(b' ') => lexer.skip(1),
            Some(_) => lexer.skip_value()?,
            None => return Err(lexer.error("unterminated body structure")),
        }
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

    fn items(input: &[u8]) -> Vec<FetchItem> {
        parse_fetch_items(&mut Lexer::new(input)).unwrap()
    }

    #[test]
    fn test_summary_items() {
        let parsed = items(
            b"(UID 101 INTERNALDATE \"17-Jul-2024 02:44:25 -0700\" ENVELOPE \
(\"Wed, 17 Jul 2024 09:44:25 +0000\" \"Quarterly report\" \
((\"Alice Example\" NIL \"alice\" \"example.com\")) NIL NIL \
((NIL NIL \"bob\" \"example.org\")(NIL NIL \"carol\" \"example.org\")) NIL NIL NIL \"<m1@example.com>\"))",
        );

        assert_eq!(parsed[0], FetchItem::Uid(Uid::new(101).unwrap()));
        assert_eq!(
            parsed[1],
            FetchItem::InternalDate("17-Jul-2024 02:44:25 -0700".to_string())
        );
        let FetchItem::Envelope(envelope) = &parsed[2] else {
            panic!("expected envelope");
        };
        assert_eq!(envelope.subject.as_deref(), Some("Quarterly report"));
        assert_eq!(envelope.from[0].email().as_deref(), Some("alice@example.com"));
        assert_eq!(envelope.from[0].display_name(), Some("Alice Example"));
        assert_eq!(envelope.to.len(), 2);
        assert_eq!(envelope.to[1].email().as_deref(), Some("carol@example.org"));
        assert_eq!(envelope.message_id.as_deref(), Some("<m1@example.com>"));
    }

    #[test]
    fn test_body_section_literal() {
        let parsed = items(b"(UID 7 BODY[] {11}\r\nhello world)");
        assert_eq!(
            parsed[1],
            FetchItem::Body {
                section: None,
                data: Some(b"hello world".to_vec()),
            }
        );
    }

    #[test]
    fn test_body_section_with_origin_and_nil() {
        let parsed = items(b"(BODY[1.MIME]<0> NIL)");
        assert_eq!(
            parsed[0],
            FetchItem::Body {
                section: Some("1.MIME".to_string()),
                data: None,
            }
        );
    }

    #[test]
    fn test_multipart_with_attachment_disposition() {
        let input = b"(BODYSTRUCTURE ((\"TEXT\" \"PLAIN\" (\"CHARSET\" \"utf-8\") NIL NIL \"7BIT\" 12 1 NIL NIL NIL NIL)\
(\"APPLICATION\" \"PDF\" (\"NAME\" \"report.pdf\") NIL NIL \"BASE64\" 4000 NIL (\"attachment\" (\"filename\" \"report.pdf\")) NIL NIL) \
\"MIXED\" (\"BOUNDARY\" \"b1\") NIL NIL NIL))";
        let parsed = items(input);
        let FetchItem::BodyStructure(structure) = &parsed[0] else {
            panic!("expected body structure");
        };

        assert_eq!(structure.mime_type(), "multipart/mixed");
        assert_eq!(structure.param("boundary"), Some("b1"));
        let leaves = structure.leaves();
        assert_eq!(leaves.len(), 2);
        assert_eq!(leaves[0].mime_type(), "text/plain");
        assert_eq!(leaves[0].param("charset"), Some("utf-8"));
        assert!(leaves[0].disposition.is_none());
        let disposition = leaves[1].disposition.as_ref().unwrap();
        assert!(disposition.is_attachment());
        assert_eq!(disposition.param("FILENAME"), Some("report.pdf"));
        assert!(matches!(
            leaves[1].kind,
            BodyKind::Single { ref encoding, size: 4000, .. } if encoding == "base64"
        ));
    }

    #[test]
    fn test_minimal_single_part_without_extensions() {
        let parsed = items(b"(BODY (\"text\" \"html\" NIL NIL NIL \"quoted-printable\" 320 9))");
        let FetchItem::BodyStructure(structure) = &parsed[0] else {
            panic!("expected body structure");
        };
        assert_eq!(structure.mime_type(), "text/html");
        assert!(matches!(structure.kind, BodyKind::Single { lines: Some(9), .. }));
    }

    #[test]
    fn test_embedded_message_is_a_leaf() {
        let input = b"(BODYSTRUCTURE ((\"text\" \"plain\" NIL NIL NIL \"7bit\" 5 1)\
(\"message\" \"rfc822\" NIL NIL NIL \"7bit\" 200 \
(NIL \"inner\" NIL NIL NIL NIL NIL NIL NIL NIL) (\"text\" \"plain\" NIL NIL NIL \"7bit\" 20 2) 8 \
NIL (\"inline\" NIL) NIL NIL) \"mixed\"))";
        let parsed = items(input);
        let FetchItem::BodyStructure(structure) = &parsed[0] else {
            panic!("expected body structure");
        };
        let leaves = structure.leaves();
        assert_eq!(leaves.len(), 2);
        assert_eq!(leaves[1].mime_type(), "message/rfc822");
        assert!(leaves[1].disposition.as_ref().unwrap().is_inline());
        let BodyKind::Message { envelope, lines, .. } = &leaves[1].kind else {
            panic!("expected embedded message");
        };
        assert_eq!(envelope.subject.as_deref(), Some("inner"));
        assert_eq!(*lines, 8);
    }

    #[test]
    fn test_unknown_items_are_skipped() {
        let parsed = items(b"(MODSEQ (12345) X-GM-LABELS (\"\\\\Inbox\" foo) UID 9)");
        assert_eq!(parsed, vec![FetchItem::Uid(Uid::new(9).unwrap())]);
    }
}
