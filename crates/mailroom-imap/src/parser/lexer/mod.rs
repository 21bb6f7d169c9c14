//! Tokenizer for IMAP server responses (RFC 3501 §9 / RFC 9051 §9).
//!
//! Servers routinely put raw 8-bit text in quoted strings and literals, so
//! string values are decoded lossily instead of being rejected.

#![allow(clippy::missing_errors_doc)]

mod token;

pub use token::Token;

use crate::{Error, Result};

/// Cursor over one complete response.
pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a lexer positioned at the start of `input`.
    #[must_use]
    pub const fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    /// Byte offset of the cursor.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Unconsumed input.
    #[must_use]
    pub fn remaining(&self) -> &'a [u8] {
        &self.input[self.pos..]
    }

    /// True when all input is consumed.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// The next byte, without consuming it.
    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    /// Consumes `n` bytes (clamped to the input length).
    pub fn skip(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.input.len());
    }

    /// Consumes the next byte if it equals `byte`.
    pub fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Builds a parse error at the cursor.
    pub fn error(&self, message: impl Into<String>) -> Error {
        Error::Parse {
            position: self.pos,
            message: message.into(),
        }
    }

    /// Reads the next token.
    pub fn next_token(&mut self) -> Result<Token<'a>> {
        let Some(byte) = self.peek() else {
            return Ok(Token::Eof);
        };

        let single = match byte {
            b' ' => Some(Token::Space),
            b'(' => Some(Token::LParen),
            b')' => Some(Token::RParen),
            b'[' => Some(Token::LBracket),
            b']' => Some(Token::RBracket),
            b'*' => Some(Token::Asterisk),
            b'+' => Some(Token::Plus),
            _ => None,
        };
        if let Some(token) = single {
            self.pos += 1;
            return Ok(token);
        }

        match byte {
            b'\r' if self.peek_at(1) == Some(b'\n') => {
                self.pos += 2;
                Ok(Token::Crlf)
            }
            b'"' => self.quoted().map(Token::Quoted),
            b'{' => self.literal().map(Token::Literal),
            _ if is_atom_char(byte) => Ok(self.atom()),
            _ => Err(self.error(format!("unexpected byte {byte:#04x}"))),
        }
    }

    fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a [u8] {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.pos += 1;
        }
        &self.input[start..self.pos]
    }

    fn atom(&mut self) -> Token<'a> {
        let raw = self.take_while(is_atom_char);
        // atom chars are a subset of ASCII
        let text = std::str::from_utf8(raw).unwrap_or_default();
        if text.eq_ignore_ascii_case("NIL") {
            Token::Nil
        } else if !text.is_empty() && raw.iter().all(u8::is_ascii_digit) {
            text.parse().map_or(Token::Atom(text), Token::Number)
        } else {
            Token::Atom(text)
        }
    }

    fn quoted(&mut self) -> Result<String> {
        self.pos += 1;
        let mut out = Vec::new();
        loop {
            let Some(byte) = self.peek() else {
                return Err(self.error("unterminated quoted string"));
            };
            self.pos += 1;
            match byte {
                b'"' => return Ok(String::from_utf8_lossy(&out).into_owned()),
                b'\\' => match self.peek() {
                    Some(escaped @ (b'"' | b'\\')) => {
                        self.pos += 1;
                        out.push(escaped);
                    }
                    _ => return Err(self.error("invalid escape in quoted string")),
                },
                b'\r' | b'\n' => return Err(self.error("line break in quoted string")),
                _ => out.push(byte),
            }
        }
    }

    fn literal(&mut self) -> Result<Vec<u8>> {
        self.pos += 1;
        let digits = self.take_while(|b| b.is_ascii_digit());
        let size: usize = std::str::from_utf8(digits)
            .ok()
            .and_then(|d| d.parse().ok())
            .ok_or_else(|| self.error("invalid literal size"))?;
        self.eat(b'+');
        if !self.eat(b'}') || !self.eat(b'\r') || !self.eat(b'\n') {
            return Err(self.error("malformed literal prefix"));
        }
        let end = self
            .pos
            .checked_add(size)
            .filter(|&end| end <= self.input.len())
            .ok_or_else(|| self.error("literal extends past end of response"))?;
        let data = self.input[self.pos..end].to_vec();
        self.pos = end;
        Ok(data)
    }

    /// Consumes a specific token kind.
    pub fn expect(&mut self, expected: &Token<'_>) -> Result<()> {
        let token = self.next_token()?;
        if std::mem::discriminant(&token) == std::mem::discriminant(expected) {
            Ok(())
        } else {
            Err(self.error(format!(
                "expected {}, found {}",
                expected.describe(),
                token.describe()
            )))
        }
    }

    /// Consumes a single space.
    pub fn expect_space(&mut self) -> Result<()> {
        self.expect(&Token::Space)
    }

    /// Reads a number.
    pub fn read_number(&mut self) -> Result<u32> {
        match self.next_token()? {
            Token::Number(n) => Ok(n),
            other => Err(self.error(format!("expected number, found {}", other.describe()))),
        }
    }

    /// Reads an atom.
    pub fn read_atom(&mut self) -> Result<&'a str> {
        match self.next_token()? {
            Token::Atom(atom) => Ok(atom),
            other => Err(self.error(format!("expected atom, found {}", other.describe()))),
        }
    }

    /// Reads an nstring as raw bytes (`NIL` is `None`).
    pub fn read_nstring_bytes(&mut self) -> Result<Option<Vec<u8>>> {
        match self.next_token()? {
            Token::Nil => Ok(None),
            Token::Quoted(text) => Ok(Some(text.into_bytes())),
            Token::Literal(data) => Ok(Some(data)),
            other => Err(self.error(format!("expected nstring, found {}", other.describe()))),
        }
    }

    /// Reads an nstring as text (`NIL` is `None`).
    pub fn read_nstring(&mut self) -> Result<Option<String>> {
        Ok(self
            .read_nstring_bytes()?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    /// Reads an astring (atom, number, quoted string or literal).
    pub fn read_astring(&mut self) -> Result<String> {
        match self.next_token()? {
            Token::Atom(atom) => Ok(atom.to_string()),
            Token::Number(n) => Ok(n.to_string()),
            Token::Quoted(text) => Ok(text),
            Token::Literal(data) => Ok(String::from_utf8_lossy(&data).into_owned()),
            other => Err(self.error(format!("expected astring, found {}", other.describe()))),
        }
    }

    /// Skips one complete value: an atom, string, literal, `NIL`, or a
    /// parenthesized list with arbitrary nesting.
    pub fn skip_value(&mut self) -> Result<()> {
        let mut depth = 0usize;
        loop {
            match self.next_token()? {
                Token::LParen => depth += 1,
                Token::RParen if depth > 0 => depth -= 1,
                Token::Space if depth > 0 => continue,
                Token::RParen | Token::Crlf | Token::Eof | Token::Space => {
                    return Err(self.error("expected a value"));
                }
                _ => {}
            }
            if depth == 0 {
                return Ok(());
            }
        }
    }

    /// Reads the rest of the line as text, consuming the CRLF.
    pub fn read_text_line(&mut self) -> String {
        let rest = self.remaining();
        let end = rest
            .windows(2)
            .position(|w| w == b"\r\n")
            .unwrap_or(rest.len());
        self.skip(end + 2);
        String::from_utf8_lossy(&rest[..end]).into_owned()
    }
}

/// True for bytes allowed in an atom.
///
/// `\` is accepted so that flags such as `\Seen` lex as one atom.
#[must_use]
pub const fn is_atom_char(byte: u8) -> bool {
    matches!(byte, 0x21..=0x7E)
        && !matches!(byte, b'(' | b')' | b'{' | b'"' | b'%' | b'*' | b']' | b'[')
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

    fn tokens(input: &[u8]) -> Vec<Token<'_>> {
        let mut lexer = Lexer::new(input);
        let mut out = Vec::new();
        loop {
            let token = lexer.next_token().unwrap();
            if token == Token::Eof {
                return out;
            }
            out.push(token);
        }
    }

    #[test]
    fn test_fetch_line_tokens() {
        assert_eq!(
            tokens(b"* 12 FETCH (UID 101)\r\n"),
            vec![
                Token::Asterisk,
                Token::Space,
                Token::Number(12),
                Token::Space,
                Token::Atom("FETCH"),
                Token::Space,
                Token::LParen,
                Token::Atom("UID"),
                Token::Space,
                Token::Number(101),
                Token::RParen,
                Token::Crlf,
            ]
        );
    }

    #[test]
    fn test_quoted_with_escapes_and_8bit() {
        let mut lexer = Lexer::new("\"Dr. \\\"Ana\\\" Müller\"".as_bytes());
        assert_eq!(
            lexer.next_token().unwrap(),
            Token::Quoted("Dr. \"Ana\" Müller".to_string())
        );
    }

    #[test]
    fn test_literal_and_nil() {
        let mut lexer = Lexer::new(b"{5}\r\nhello NIL");
        assert_eq!(
            lexer.read_nstring_bytes().unwrap(),
            Some(b"hello".to_vec())
        );
        lexer.expect_space().unwrap();
        assert_eq!(lexer.read_nstring().unwrap(), None);
    }

    #[test]
    fn test_truncated_literal_is_error() {
        let mut lexer = Lexer::new(b"{10}\r\nshort");
        assert!(lexer.next_token().is_err());
    }

    #[test]
    fn test_skip_value_nested() {
        let mut lexer = Lexer::new(b"(\"a\" (NIL {3}\r\nx)y) 42");
        lexer.skip_value().unwrap();
        lexer.expect_space().unwrap();
        assert_eq!(lexer.read_number().unwrap(), 42);
    }

    #[test]
    fn test_flags_lex_as_atoms() {
        assert_eq!(
            tokens(b"(\\Seen $Forwarded)"),
            vec![
                Token::LParen,
                Token::Atom("\\Seen"),
                Token::Space,
                Token::Atom("$Forwarded"),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn test_read_text_line() {
        let mut lexer = Lexer::new(b"LOGIN completed\r\n");
        assert_eq!(lexer.read_text_line(), "LOGIN completed");
        assert!(lexer.is_eof());
    }

    proptest! {
        #[test]
        fn lexer_never_panics(input in proptest::collection::vec(any::<u8>(), 0..256)) {
            let mut lexer = Lexer::new(&input);
            for _ in 0..512 {
                match lexer.next_token() {
                    Ok(Token::Eof) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        }
    }
}
