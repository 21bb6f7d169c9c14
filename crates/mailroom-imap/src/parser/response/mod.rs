//! Response parser (RFC 3501 §7 / RFC 9051 §7).

#![allow(clippy::missing_errors_doc)]

mod fetch;
mod helpers;
mod types;

pub use types::{
    Address, BodyKind, BodyStructure, Disposition, Envelope, FetchItem, UntaggedResponse,
};

use crate::Result;
use crate::parser::lexer::{Lexer, Token};
use crate::types::{ResponseCode, SeqNum, Status, Tag};

use helpers::{parse_capabilities, parse_flag_list, parse_resp_text, parse_search_hits};

/// One complete server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Command completion.
    Tagged {
        /// Tag of the completed command.
        tag: Tag,
        /// Completion status.
        status: Status,
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// Server data.
    Untagged(UntaggedResponse),
    /// `+ text`: the server waits for more client data.
    Continuation(String),
}

/// Entry point of the response parser.
pub struct ResponseParser;

impl ResponseParser {
    /// Parses one response as produced by `FramedStream::read_response`.
    pub fn parse(input: &[u8]) -> Result<Response> {
        let mut lexer = Lexer::new(input);
        match lexer.next_token()? {
            Token::Asterisk => {
                lexer.expect_space()?;
                parse_untagged(&mut lexer).map(Response::Untagged)
            }
            Token::Plus => {
                lexer.eat(b' ');
                Ok(Response::Continuation(lexer.read_text_line()))
            }
            Token::Atom(tag) => {
                lexer.expect_space()?;
                let status = parse_status(&mut lexer)?;
                let (code, text) = parse_resp_text(&mut lexer)?;
                Ok(Response::Tagged {
                    tag: Tag::new(tag),
                    status,
                    code,
                    text,
                })
            }
            other => Err(lexer.error(format!(
                "expected '*', '+' or a tag, found {}",
                other.describe()
            ))),
        }
    }
}

fn parse_status(lexer: &mut Lexer<'_>) -> Result<Status> {
    let word = lexer.read_atom()?;
    Status::parse(word).ok_or_else(|| lexer.error(format!("unknown status {word:?}")))
}

fn parse_untagged(lexer: &mut Lexer<'_>) -> Result<UntaggedResponse> {
    match lexer.next_token()? {
        Token::Number(n) => {
            lexer.expect_space()?;
            let keyword = lexer.read_atom()?.to_ascii_uppercase();
            match keyword.as_str() {
                "EXISTS" => Ok(UntaggedResponse::Exists(n)),
                "RECENT" => Ok(UntaggedResponse::Recent(n)),
                "EXPUNGE" => Ok(UntaggedResponse::Expunge(nonzero_seq(lexer, n)?)),
                "FETCH" => {
                    let seq = nonzero_seq(lexer, n)?;
                    lexer.expect_space()?;
                    let items = fetch::parse_fetch_items(lexer)?;
                    Ok(UntaggedResponse::Fetch { seq, items })
                }
                _ => Ok(UntaggedResponse::Other(keyword)),
            }
        }
        Token::Atom(word) => {
            if let Some(status) = Status::parse(word) {
                let (code, text) = parse_resp_text(lexer)?;
                return Ok(UntaggedResponse::Status { status, code, text });
            }
            let keyword = word.to_ascii_uppercase();
            match keyword.as_str() {
                "CAPABILITY" => Ok(UntaggedResponse::Capability(parse_capabilities(lexer)?)),
                "FLAGS" => {
                    lexer.expect_space()?;
                    Ok(UntaggedResponse::Flags(parse_flag_list(lexer)?))
                }
                "SEARCH" => Ok(UntaggedResponse::Search(parse_search_hits(lexer)?)),
                _ => Ok(UntaggedResponse::Other(keyword)),
            }
        }
        other => Err(lexer.error(format!(
            "unexpected {} in untagged response",
            other.describe()
        ))),
    }
}

fn nonzero_seq(lexer: &Lexer<'_>, n: u32) -> Result<SeqNum> {
    SeqNum::new(n).ok_or_else(|| lexer.error("sequence number 0"))
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
    use crate::types::Capability;

    #[test]
    fn test_greeting_with_capabilities() {
        let response =
            ResponseParser::parse(b"* OK [CAPABILITY IMAP4rev1 STARTTLS LOGINDISABLED] ready\r\n")
                .unwrap();
        let Response::Untagged(UntaggedResponse::Status { status, code, text }) = response else {
            panic!("expected untagged status");
        };
        assert_eq!(status, Status::Ok);
        assert_eq!(text, "ready");
        assert_eq!(
            code,
            Some(ResponseCode::Capability(vec![
                Capability::Imap4Rev1,
                Capability::StartTls,
                Capability::LoginDisabled,
            ]))
        );
    }

    #[test]
    fn test_tagged_no_with_code() {
        let response =
            ResponseParser::parse(b"A0002 NO [AUTHENTICATIONFAILED] Invalid credentials\r\n")
                .unwrap();
        assert_eq!(
            response,
            Response::Tagged {
                tag: Tag::new("A0002"),
                status: Status::No,
                code: Some(ResponseCode::AuthenticationFailed),
                text: "Invalid credentials".to_string(),
            }
        );
    }

    #[test]
    fn test_examine_read_only_completion() {
        let response = ResponseParser::parse(b"A0003 OK [READ-ONLY] EXAMINE completed\r\n").unwrap();
        assert!(matches!(
            response,
            Response::Tagged {
                code: Some(ResponseCode::ReadOnly),
                ..
            }
        ));
    }

    #[test]
    fn test_search_hits() {
        assert_eq!(
            ResponseParser::parse(b"* SEARCH 101 102 250\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Search(vec![101, 102, 250]))
        );
        assert_eq!(
            ResponseParser::parse(b"* SEARCH\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Search(Vec::new()))
        );
    }

    #[test]
    fn test_exists_and_flags() {
        assert_eq!(
            ResponseParser::parse(b"* 18 EXISTS\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Exists(18))
        );
        assert_eq!(
            ResponseParser::parse(b"* FLAGS (\\Seen \\Answered)\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Flags(vec![
                "\\Seen".to_string(),
                "\\Answered".to_string()
            ]))
        );
    }

    #[test]
    fn test_unknown_untagged_is_tolerated() {
        assert_eq!(
            ResponseParser::parse(b"* ENABLED CONDSTORE\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Other("ENABLED".to_string()))
        );
    }

    #[test]
    fn test_continuation() {
        assert_eq!(
            ResponseParser::parse(b"+ go ahead\r\n").unwrap(),
            Response::Continuation("go ahead".to_string())
        );
    }

    #[test]
    fn test_bye() {
        let response = ResponseParser::parse(b"* BYE server shutting down\r\n").unwrap();
        assert!(matches!(
            response,
            Response::Untagged(UntaggedResponse::Status {
                status: Status::Bye,
                ..
            })
        ));
    }
}
