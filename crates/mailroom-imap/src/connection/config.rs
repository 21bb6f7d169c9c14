//! Server endpoint description.

use std::fmt;

/// How the transport is secured before credentials are sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Security {
    /// Plaintext connect, upgraded with STARTTLS before LOGIN.
    StartTls,
    /// TLS handshake at connect time.
    Implicit,
}

impl Security {
    /// Maps a well-known IMAP port to its security mode.
    ///
    /// Only the two registered ports are accepted: 993 is implicit TLS and
    /// 143 is STARTTLS. Everything else returns `None`.
    #[must_use]
    pub const fn for_port(port: u16) -> Option<Self> {
        match port {
            993 => Some(Self::Implicit),
            143 => Some(Self::StartTls),
            _ => None,
        }
    }

    /// Returns the registered port for this mode.
    #[must_use]
    pub const fn port(self) -> u16 {
        match self {
            Self::StartTls => 143,
            Self::Implicit => 993,
        }
    }
}

impl fmt::Display for Security {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StartTls => f.write_str("starttls"),
            Self::Implicit => f.write_str("implicit-tls"),
        }
    }
}

/// A resolved server endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Server hostname, also used as the TLS server name.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
}

impl Endpoint {
    /// Creates an endpoint on the registered port for `security`.
    #[must_use]
    pub fn new(host: impl Into<String>, security: Security) -> Self {
        Self {
            host: host.into(),
            port: security.port(),
            security,
        }
    }

    /// Creates an endpoint from an explicit port, deriving the security mode.
    ///
    /// Returns `None` when the port has no known security mode.
    #[must_use]
    pub fn from_port(host: impl Into<String>, port: u16) -> Option<Self> {
        Security::for_port(port).map(|security| Self {
            host: host.into(),
            port,
            security,
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} ({})", self.host, self.port, self.security)
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
    fn test_security_for_port() {
        assert_eq!(Security::for_port(993), Some(Security::Implicit));
        assert_eq!(Security::for_port(143), Some(Security::StartTls));
        assert_eq!(Security::for_port(587), None);
        assert_eq!(Security::for_port(0), None);
    }

    #[test]
    fn test_endpoint_from_port() {
        let endpoint = Endpoint::from_port("imap.example.com", 143).unwrap();
        assert_eq!(endpoint.security, Security::StartTls);
        assert_eq!(endpoint.port, 143);
        assert!(Endpoint::from_port("imap.example.com", 2525).is_none());
    }

    #[test]
    fn test_endpoint_display() {
        let endpoint = Endpoint::new("mail.example.org", Security::Implicit);
        assert_eq!(endpoint.to_string(), "mail.example.org:993 (implicit-tls)");
    }
}
