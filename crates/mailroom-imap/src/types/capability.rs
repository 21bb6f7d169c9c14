//! Server capabilities and response status.

/// A server capability relevant to session setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    /// `IMAP4rev1`.
    Imap4Rev1,
    /// `IMAP4rev2`.
    Imap4Rev2,
    /// `STARTTLS` is offered.
    StartTls,
    /// `LOGINDISABLED`: LOGIN is refused on this transport.
    LoginDisabled,
    /// `AUTH=<mechanism>`.
    Auth(String),
    /// Any other capability atom, kept verbatim.
    Other(String),
}

impl Capability {
    /// Parses one capability atom (case-insensitive).
    #[must_use]
    pub fn parse(atom: &str) -> Self {
        let upper = atom.to_ascii_uppercase();
        match upper.as_str() {
            "IMAP4REV1" => Self::Imap4Rev1,
            "IMAP4REV2" => Self::Imap4Rev2,
            "STARTTLS" => Self::StartTls,
            "LOGINDISABLED" => Self::LoginDisabled,
            _ => upper
                .strip_prefix("AUTH=")
                .map_or_else(|| Self::Other(atom.to_string()), |m| Self::Auth(m.to_string())),
        }
    }
}

/// Completion status of a tagged or untagged status response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// `OK`.
    Ok,
    /// `NO`: the command failed.
    No,
    /// `BAD`: the command was malformed.
    Bad,
    /// `PREAUTH`: the connection is already authenticated.
    PreAuth,
    /// `BYE`: the server is closing the connection.
    Bye,
}

impl Status {
    /// Parses a status keyword (case-insensitive).
    #[must_use]
    pub fn parse(word: &str) -> Option<Self> {
        match word.to_ascii_uppercase().as_str() {
            "OK" => Some(Self::Ok),
            "NO" => Some(Self::No),
            "BAD" => Some(Self::Bad),
            "PREAUTH" => Some(Self::PreAuth),
            "BYE" => Some(Self::Bye),
            _ => None,
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

    #[test]
    fn parses_known_capabilities() {
        assert_eq!(Capability::parse("imap4rev1"), Capability::Imap4Rev1);
        assert_eq!(Capability::parse("STARTTLS"), Capability::StartTls);
        assert_eq!(Capability::parse("LoginDisabled"), Capability::LoginDisabled);
        assert_eq!(
            Capability::parse("AUTH=plain"),
            Capability::Auth("PLAIN".to_string())
        );
        assert_eq!(
            Capability::parse("IDLE"),
            Capability::Other("IDLE".to_string())
        );
    }

    #[test]
    fn parses_status_words() {
        assert_eq!(Status::parse("ok"), Some(Status::Ok));
        assert_eq!(Status::parse("BYE"), Some(Status::Bye));
        assert_eq!(Status::parse("MAYBE"), None);
    }
}
