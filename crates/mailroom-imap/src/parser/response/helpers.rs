//! Small grammar pieces shared by the response parsers.

use crate::Result;
use crate::parser::lexer::{Lexer, Token};
use crate::types::{Capability, ResponseCode, SeqNum, Uid, UidValidity};

/// Parses `[SP] ["[" resp-text-code "]" SP] text CRLF`.
pub fn parse_resp_text(lexer: &mut Lexer<'_>) -> Result<(Option<ResponseCode>, String)> {
    lexer.eat(b' ');
    let code = if lexer.peek() == Some(b'[') {
        let code = parse_response_code(lexer)?;
        lexer.eat(b' ');
        Some(code)
    } else {
        None
    };
    Ok((code, lexer.read_text_line()))
}

fn parse_response_code(lexer: &mut Lexer<'_>) -> Result<ResponseCode> {
    lexer.expect(&Token::LBracket)?;
    let name = lexer.read_atom()?.to_ascii_uppercase();

    let code = match name.as_str() {
        "ALERT" => ResponseCode::Alert,
        "READ-ONLY" => ResponseCode::ReadOnly,
        "READ-WRITE" => ResponseCode::ReadWrite,
        "AUTHENTICATIONFAILED" => ResponseCode::AuthenticationFailed,
        "CAPABILITY" => ResponseCode::Capability(parse_capabilities(lexer)?),
        "UIDNEXT" => {
            let n = code_number(lexer)?;
            Uid::new(n).map_or_else(|| ResponseCode::Other(name.clone()), ResponseCode::UidNext)
        }
        "UIDVALIDITY" => {
            let n = code_number(lexer)?;
            UidValidity::new(n)
                .map_or_else(|| ResponseCode::Other(name.clone()), ResponseCode::UidValidity)
        }
        "UNSEEN" => {
            let n = code_number(lexer)?;
            SeqNum::new(n).map_or_else(|| ResponseCode::Other(name.clone()), ResponseCode::Unseen)
        }
        _ => ResponseCode::Other(name.clone()),
    };

    // Codes such as PERMANENTFLAGS carry arguments we do not model.
    while !matches!(lexer.peek(), Some(b']') | None) {
        lexer.skip(1);
    }
    lexer.expect(&Token::RBracket)?;
    Ok(code)
}

fn code_number(lexer: &mut Lexer<'_>) -> Result<u32> {
    lexer.expect_space()?;
    lexer.read_number()
}

/// Parses the space-separated capability atoms that follow `CAPABILITY`.
pub fn parse_capabilities(lexer: &mut Lexer<'_>) -> Result<Vec<Capability>> {
    let mut caps = Vec::new();
    while lexer.eat(b' ') {
        match lexer.next_token()? {
            Token::Atom(atom) => caps.push(Capability::parse(atom)),
            Token::Number(n) => caps.push(Capability::Other(n.to_string())),
            _ => break,
        }
    }
    Ok(caps)
}

/// Parses a parenthesized flag list into raw atoms.
pub fn parse_flag_list(lexer: &mut Lexer<'_>) -> Result<Vec<String>> {
    lexer.expect(&Token::LParen)?;
    let mut flags = Vec::new();
    loop {
        match lexer.next_token()? {
            Token::RParen => return Ok(flags),
            Token::Space => {}
            Token::Atom(atom) => flags.push(atom.to_string()),
            // `\*` in PERMANENTFLAGS lexes as `\` followed by `*`
            Token::Asterisk => match flags.last_mut() {
                Some(last) if last == "\\" => last.push('*'),
                _ => flags.push("*".to_string()),
            },
            other => {
                return Err(lexer.error(format!("unexpected {} in flag list", other.describe())));
            }
        }
    }
}

/// Parses the numbers following `SEARCH`.
pub fn parse_search_hits(lexer: &mut Lexer<'_>) -> Result<Vec<u32>> {
    let mut hits = Vec::new();
    while lexer.eat(b' ') {
        match lexer.next_token()? {
            Token::Number(n) if n > 0 => hits.push(n),
            // `(MODSEQ n)` trailer from CONDSTORE servers
            Token::LParen => break,
            _ => {}
        }
    }
    Ok(hits)
}
