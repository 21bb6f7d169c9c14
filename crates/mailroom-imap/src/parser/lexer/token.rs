//! Lexical tokens of IMAP server responses.

/// A single token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// Bare atom, borrowed from the input.
    Atom(&'a str),
    /// A number (all-digit atom that fits in `u32`).
    Number(u32),
    /// Quoted string with escapes resolved.
    Quoted(String),
    /// `{n}\r\n` literal payload.
    Literal(Vec<u8>),
    /// `NIL`.
    Nil,
    /// `(`.
    LParen,
    /// `)`.
    RParen,
    /// `[`.
    LBracket,
    /// `]`.
    RBracket,
    /// A single space.
    Space,
    /// `*` untagged marker.
    Asterisk,
    /// `+` continuation marker.
    Plus,
    /// `\r\n`.
    Crlf,
    /// End of input.
    Eof,
}

impl Token<'_> {
    /// Short description for error messages.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Atom(atom) => format!("atom {atom:?}"),
            Self::Number(n) => format!("number {n}"),
            Self::Quoted(_) => "quoted string".to_string(),
            Self::Literal(data) => format!("literal of {} bytes", data.len()),
            Self::Nil => "NIL".to_string(),
            Self::LParen => "'('".to_string(),
            Self::RParen => "')'".to_string(),
            Self::LBracket => "'['".to_string(),
            Self::RBracket => "']'".to_string(),
            Self::Space => "space".to_string(),
            Self::Asterisk => "'*'".to_string(),
            Self::Plus => "'+'".to_string(),
            Self::Crlf => "CRLF".to_string(),
            Self::Eof => "end of input".to_string(),
        }
    }
}
