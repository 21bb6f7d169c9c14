//! Service configuration.
//!
//! Everything here is validated without touching the network: a bad address
//! or port fails before a socket is opened.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use mailroom_imap::{Endpoint, Mailbox, Security};
use serde::{Deserialize, Serialize};

use crate::fetch::FetchOptions;
use crate::{Error, Result};

/// Default connect-phase deadline.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default number of post-processing workers per fetch batch.
pub const DEFAULT_FETCH_WORKERS: usize = 8;

/// A validated `host:port` IMAP server address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServerAddress {
    host: String,
    port: u16,
}

impl ServerAddress {
    /// Parses `host:port`.
    ///
    /// Port 993 selects implicit TLS and port 143 selects STARTTLS. Any other
    /// port is rejected, since there is no way to know how to secure it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a missing or repeated separator, an empty
    /// host, a non-numeric port or an unsupported port.
    pub fn parse(address: &str) -> Result<Self> {
        let mut pieces = address.trim().split(':');
        let (Some(host), Some(port), None) = (pieces.next(), pieces.next(), pieces.next()) else {
            return Err(Error::Config(format!(
                "server address {address:?} must have the form host:port"
            )));
        };

        if host.is_empty() {
            return Err(Error::Config(format!(
                "server address {address:?} has an empty host"
            )));
        }
        let port: u16 = port.parse().map_err(|_| {
            Error::Config(format!("server address {address:?} has an invalid port"))
        })?;
        if Security::for_port(port).is_none() {
            return Err(Error::Config(format!(
                "unsupported IMAP port {port}: use 993 (TLS) or 143 (STARTTLS)"
            )));
        }

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    /// Server hostname.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Server port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// How the connection is secured, derived from the port.
    #[must_use]
    pub const fn security(&self) -> Security {
        match Security::for_port(self.port) {
            Some(security) => security,
            // parse() only accepts ports with a known mode
            None => Security::Implicit,
        }
    }

    /// The endpoint handed to the protocol layer.
    #[must_use]
    pub fn endpoint(&self) -> Endpoint {
        Endpoint {
            host: self.host.clone(),
            port: self.port,
            security: self.security(),
        }
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for ServerAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ServerAddress {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ServerAddress> for String {
    fn from(address: ServerAddress) -> Self {
        address.to_string()
    }
}

/// Service configuration.
///
/// The password is never serialized and is redacted from `Debug` output.
#[derive(Clone, Serialize, Deserialize)]
pub struct MailroomConfig {
    /// IMAP server.
    pub server: ServerAddress,
    /// Login identity.
    pub username: String,
    /// Login secret.
    #[serde(skip_serializing, default)]
    pub password: String,
    /// Mailbox every operation reads from.
    #[serde(default = "default_mailbox")]
    pub mailbox: String,
    /// Deadline for connect, TLS and greeting, in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Worker cap for per-message post-processing.
    #[serde(default = "default_fetch_workers")]
    pub fetch_workers: usize,
    /// `SQLite` file for access records; in-memory when absent.
    #[serde(default)]
    pub access_db: Option<String>,
}

fn default_mailbox() -> String {
    "INBOX".to_string()
}

const fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

const fn default_fetch_workers() -> usize {
    DEFAULT_FETCH_WORKERS
}

impl MailroomConfig {
    /// Creates a configuration with default tunables.
    #[must_use]
    pub fn new(
        server: ServerAddress,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            server,
            username: username.into(),
            password: password.into(),
            mailbox: default_mailbox(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            fetch_workers: DEFAULT_FETCH_WORKERS,
            access_db: None,
        }
    }

    /// Loads the configuration from the process environment.
    ///
    /// See [`MailroomConfig::from_lookup`] for the variables read.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when a required variable is missing or a
    /// value is malformed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads the configuration through an arbitrary key lookup.
    ///
    /// Required: `IMAP_SERVER`, `EMAIL_USERNAME`, `EMAIL_PASSWORD`.
    /// Optional: `MAILROOM_MAILBOX`, `MAILROOM_FETCH_WORKERS`,
    /// `MAILROOM_CONNECT_TIMEOUT_SECS`, `MAILROOM_ACCESS_DB`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when a required key is missing or a value is
    /// malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| Error::Config(format!("{key} is not set")))
        };
        let optional = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let mut config = Self::new(
            ServerAddress::parse(&required("IMAP_SERVER")?)?,
            required("EMAIL_USERNAME")?,
            required("EMAIL_PASSWORD")?,
        );

        if let Some(mailbox) = optional("MAILROOM_MAILBOX") {
            config.mailbox = mailbox;
        }
        if let Some(workers) = optional("MAILROOM_FETCH_WORKERS") {
            config.fetch_workers = parse_number("MAILROOM_FETCH_WORKERS", &workers)?;
            if config.fetch_workers == 0 {
                return Err(Error::Config(
                    "MAILROOM_FETCH_WORKERS must be at least 1".to_string(),
                ));
            }
        }
        if let Some(secs) = optional("MAILROOM_CONNECT_TIMEOUT_SECS") {
            config.connect_timeout_secs = parse_number("MAILROOM_CONNECT_TIMEOUT_SECS", &secs)?;
        }
        config.access_db = optional("MAILROOM_ACCESS_DB");

        Ok(config)
    }

    /// Connect-phase deadline.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// The configured mailbox.
    #[must_use]
    pub fn mailbox(&self) -> Mailbox {
        Mailbox::new(self.mailbox.as_str())
    }

    /// Fetch tunables derived from this configuration.
    #[must_use]
    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions::new(self.fetch_workers)
    }
}

impl fmt::Debug for MailroomConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailroomConfig")
            .field("server", &self.server)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("mailbox", &self.mailbox)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("fetch_workers", &self.fetch_workers)
            .field("access_db", &self.access_db)
            .finish()
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{key} must be a number, got {value:?}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_port_selects_security() {
        let tls = ServerAddress::parse("imap.example.com:993").unwrap();
        assert_eq!(tls.security(), Security::Implicit);
        assert_eq!(tls.host(), "imap.example.com");

        let starttls = ServerAddress::parse("imap.example.com:143").unwrap();
        assert_eq!(starttls.security(), Security::StartTls);
        assert_eq!(starttls.endpoint().port, 143);
    }

    #[test]
    fn test_malformed_addresses() {
        for bad in [
            "imap.example.com",
            "imap.example.com:993:1",
            ":993",
            "imap.example.com:tls",
            "imap.example.com:",
        ] {
            assert!(
                matches!(ServerAddress::parse(bad), Err(Error::Config(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_unsupported_port() {
        let err = ServerAddress::parse("imap.example.com:587").unwrap_err();
        assert!(err.to_string().contains("587"));
    }

    #[test]
    fn test_from_lookup_defaults() {
        let config = MailroomConfig::from_lookup(lookup(&[
            ("IMAP_SERVER", "imap.example.com:993"),
            ("EMAIL_USERNAME", "clinic@example.com"),
            ("EMAIL_PASSWORD", "hunter2"),
        ]))
        .unwrap();

        assert_eq!(config.mailbox, "INBOX");
        assert_eq!(config.fetch_workers, DEFAULT_FETCH_WORKERS);
        assert_eq!(config.connect_timeout(), Duration::from_secs(30));
        assert!(config.access_db.is_none());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = MailroomConfig::from_lookup(lookup(&[
            ("IMAP_SERVER", "imap.example.com:143"),
            ("EMAIL_USERNAME", "clinic@example.com"),
            ("EMAIL_PASSWORD", "hunter2"),
            ("MAILROOM_MAILBOX", "Archive"),
            ("MAILROOM_FETCH_WORKERS", "3"),
            ("MAILROOM_CONNECT_TIMEOUT_SECS", "5"),
            ("MAILROOM_ACCESS_DB", "/tmp/access.db"),
        ]))
        .unwrap();

        assert_eq!(config.mailbox().as_str(), "Archive");
        assert_eq!(config.fetch_options().workers(), 3);
        assert_eq!(config.connect_timeout_secs, 5);
        assert_eq!(config.access_db.as_deref(), Some("/tmp/access.db"));
    }

    #[test]
    fn test_from_lookup_missing_and_invalid() {
        let missing = MailroomConfig::from_lookup(lookup(&[("IMAP_SERVER", "h:993")]));
        assert!(matches!(missing, Err(Error::Config(msg)) if msg.contains("EMAIL_USERNAME")));

        let zero_workers = MailroomConfig::from_lookup(lookup(&[
            ("IMAP_SERVER", "h:993"),
            ("EMAIL_USERNAME", "u"),
            ("EMAIL_PASSWORD", "p"),
            ("MAILROOM_FETCH_WORKERS", "0"),
        ]));
        assert!(zero_workers.is_err());
    }

    #[test]
    fn test_password_is_not_exposed() {
        let config = MailroomConfig::new(
            ServerAddress::parse("imap.example.com:993").unwrap(),
            "clinic@example.com",
            "hunter2",
        );

        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(json.contains("\"server\":\"imap.example.com:993\""));
        assert!(!format!("{config:?}").contains("hunter2"));

        let back: MailroomConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.server, config.server);
        assert!(back.password.is_empty());
    }
}
