//! Session gateway.
//!
//! One network session per logical operation. [`open_session`] connects,
//! secures and authenticates; [`scoped`] runs an operation against the
//! session and always logs it out afterwards, whatever the operation
//! returned.
//!
//! If an operation panics, the session is dropped during unwinding and the
//! transport is closed without a LOGOUT.

use std::time::Duration;

use mailroom_imap::connection::connect;
use mailroom_imap::{
    Authenticated, Client, Endpoint, FetchItem, FetchItems, ImapStream, Mailbox, MailboxStatus,
    NotAuthenticated, SearchCriteria, SeqNum, Security, Selected, SequenceSet, Uid, UidSet,
};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::config::{MailroomConfig, ServerAddress};
use crate::{Error, Result};

/// How often an idle session should be poked with NOOP.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(40 * 60);

/// An authenticated session, optionally positioned on a mailbox.
pub struct MailSession<S> {
    state: SessionState<S>,
}

enum SessionState<S> {
    Authenticated(Client<S, Authenticated>),
    Selected(Client<S, Selected>),
    /// The client was consumed by a failed state change.
    Closed,
}

impl<S> std::fmt::Debug for MailSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            SessionState::Authenticated(_) => "authenticated".to_string(),
            SessionState::Selected(client) => format!("selected({})", client.mailbox()),
            SessionState::Closed => "closed".to_string(),
        };
        f.debug_struct("MailSession").field("state", &state).finish()
    }
}

fn closed() -> mailroom_imap::Error {
    mailroom_imap::Error::InvalidState("session is closed".to_string())
}

impl<S> MailSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a client that is already logged in.
    #[must_use]
    pub const fn from_client(client: Client<S, Authenticated>) -> Self {
        Self {
            state: SessionState::Authenticated(client),
        }
    }

    /// Logs in on a connected, secured client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Authentication`] when the server rejects the
    /// credentials; the protocol client has already logged out by then.
    /// Transport failures during LOGIN surface as [`Error::Imap`].
    pub async fn authenticate(
        client: Client<S, NotAuthenticated>,
        username: &str,
        password: &str,
    ) -> Result<Self> {
        match client.login(username, password).await {
            Ok(client) => {
                tracing::info!(%username, "session authenticated");
                Ok(Self::from_client(client))
            }
            Err(mailroom_imap::Error::Auth(reason)) => {
                tracing::warn!(%username, %reason, "login rejected");
                Err(Error::Authentication {
                    username: username.to_string(),
                    reason,
                })
            }
            Err(error) => Err(error.into()),
        }
    }

    /// True until a failed state change has consumed the connection.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        !matches!(self.state, SessionState::Closed)
    }

    /// Status of the open mailbox, if any.
    #[must_use]
    pub fn status(&self) -> Option<&MailboxStatus> {
        match &self.state {
            SessionState::Selected(client) => Some(client.status()),
            _ => None,
        }
    }

    /// Opens `mailbox` read-only.
    ///
    /// A session already positioned on `mailbox` is reused without another
    /// round trip. When the server refuses, the connection is logged out and
    /// the session becomes closed.
    ///
    /// # Errors
    ///
    /// Returns the protocol error of the refused EXAMINE, or
    /// [`mailroom_imap::Error::InvalidState`] on a closed session.
    pub async fn examine(&mut self, mailbox: &Mailbox) -> mailroom_imap::Result<MailboxStatus> {
        let positioned = matches!(
            &self.state,
            SessionState::Selected(client) if client.mailbox() == mailbox
        );
        if !positioned {
            let client = match std::mem::replace(&mut self.state, SessionState::Closed) {
                SessionState::Authenticated(client) => client.examine(mailbox).await?,
                SessionState::Selected(client) => client.examine(mailbox).await?,
                SessionState::Closed => return Err(closed()),
            };
            tracing::debug!(%mailbox, exists = client.status().exists, "mailbox opened");
            self.state = SessionState::Selected(client);
        }
        Ok(self.selected()?.status().clone())
    }

    fn selected(&mut self) -> mailroom_imap::Result<&mut Client<S, Selected>> {
        match &mut self.state {
            SessionState::Selected(client) => Ok(client),
            SessionState::Authenticated(_) => Err(mailroom_imap::Error::InvalidState(
                "no mailbox is open".to_string(),
            )),
            SessionState::Closed => Err(closed()),
        }
    }

    /// `SEARCH` in the open mailbox.
    ///
    /// # Errors
    ///
    /// Returns the protocol error, or `InvalidState` without an open mailbox.
    pub async fn search(&mut self, criteria: &SearchCriteria) -> mailroom_imap::Result<Vec<SeqNum>> {
        self.selected()?.search(criteria).await
    }

    /// `UID SEARCH` in the open mailbox.
    ///
    /// # Errors
    ///
    /// Returns the protocol error, or `InvalidState` without an open mailbox.
    pub async fn uid_search(&mut self, criteria: &SearchCriteria) -> mailroom_imap::Result<Vec<Uid>> {
        self.selected()?.uid_search(criteria).await
    }

    /// `FETCH` by sequence numbers.
    ///
    /// # Errors
    ///
    /// Returns the protocol error, or `InvalidState` without an open mailbox.
    pub async fn fetch(
        &mut self,
        set: &SequenceSet,
        items: FetchItems,
    ) -> mailroom_imap::Result<Vec<(SeqNum, Vec<FetchItem>)>> {
        self.selected()?.fetch(set, items).await
    }

    /// `UID FETCH`.
    ///
    /// # Errors
    ///
    /// Returns the protocol error, or `InvalidState` without an open mailbox.
    pub async fn uid_fetch(
        &mut self,
        set: &UidSet,
        items: FetchItems,
    ) -> mailroom_imap::Result<Vec<(SeqNum, Vec<FetchItem>)>> {
        self.selected()?.uid_fetch(set, items).await
    }

    /// `NOOP`.
    ///
    /// # Errors
    ///
    /// Returns the protocol error, or `InvalidState` on a closed session.
    pub async fn noop(&mut self) -> mailroom_imap::Result<()> {
        match &mut self.state {
            SessionState::Authenticated(client) => client.noop().await,
            SessionState::Selected(client) => client.noop().await,
            SessionState::Closed => Err(closed()),
        }
    }

    /// Ends the session. A closed session has nothing left to release.
    ///
    /// # Errors
    ///
    /// Returns the protocol error if LOGOUT itself fails.
    pub async fn logout(self) -> mailroom_imap::Result<()> {
        match self.state {
            SessionState::Authenticated(client) => client.logout().await,
            SessionState::Selected(client) => client.logout().await,
            SessionState::Closed => Ok(()),
        }
    }
}

/// Connects, secures and greets within `timeout`, then logs in.
///
/// Port 993 handshakes TLS at connect time; port 143 upgrades with STARTTLS
/// before the credentials are sent.
///
/// # Errors
///
/// - [`Error::ConnectTimeout`] when the connect phase exceeds `timeout`
/// - [`Error::Connection`] for TCP, TLS or greeting failures
/// - [`Error::Authentication`] for rejected credentials
pub async fn open_session(
    address: &ServerAddress,
    username: &str,
    password: &str,
    timeout: Duration,
) -> Result<MailSession<ImapStream>> {
    let endpoint = address.endpoint();
    tracing::debug!(%address, security = %endpoint.security, "opening session");

    let client = connect_within(&address.to_string(), &endpoint, timeout).await?;
    MailSession::authenticate(client, username, password).await
}

async fn connect_within(
    address: &str,
    endpoint: &Endpoint,
    timeout: Duration,
) -> Result<Client<ImapStream, NotAuthenticated>> {
    tokio::time::timeout(timeout, connect_client(endpoint))
        .await
        .map_err(|_| Error::ConnectTimeout {
            address: address.to_string(),
            seconds: timeout.as_secs(),
        })?
        .map_err(|source| Error::Connection {
            address: address.to_string(),
            source,
        })
}

async fn connect_client(
    endpoint: &Endpoint,
) -> mailroom_imap::Result<Client<ImapStream, NotAuthenticated>> {
    let stream = connect(endpoint).await?;
    let client = Client::from_stream(stream).await?;
    match endpoint.security {
        Security::StartTls => client.starttls(&endpoint.host).await,
        Security::Implicit => Ok(client),
    }
}

/// Runs `op` against `session` and logs out afterwards.
///
/// The operation's result is returned unchanged; a failing LOGOUT is only
/// logged, so it never masks what the operation produced.
///
/// # Errors
///
/// Returns whatever `op` returns.
pub async fn scoped<S, T>(
    mut session: MailSession<S>,
    op: impl AsyncFnOnce(&mut MailSession<S>) -> Result<T>,
) -> Result<T>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let outcome = op(&mut session).await;
    if let Err(error) = session.logout().await {
        tracing::warn!(%error, "logout failed");
    }
    outcome
}

/// Opens a session from `config` and runs `op` in it via [`scoped`].
///
/// # Errors
///
/// Returns session-open errors, or whatever `op` returns.
pub async fn with_session<T>(
    config: &MailroomConfig,
    op: impl AsyncFnOnce(&mut MailSession<ImapStream>) -> Result<T>,
) -> Result<T> {
    let session = open_session(
        &config.server,
        &config.username,
        &config.password,
        config.connect_timeout(),
    )
    .await?;
    scoped(session, op).await
}

/// Pokes the server so an idle session is not dropped.
///
/// Call every [`KEEPALIVE_INTERVAL`] while a session is held idle.
///
/// # Errors
///
/// Returns [`Error::Imap`] if the NOOP fails.
pub async fn keepalive<S>(session: &mut MailSession<S>) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    session.noop().await?;
    tracing::debug!("keepalive sent");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio_test::io::Builder;

    use super::*;
    use crate::testing::{login, session};

    #[tokio::test]
    async fn test_rejected_login_logs_out_first() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 LOGIN u p\r\n")
            .read(b"A0001 NO [AUTHENTICATIONFAILED] Invalid credentials\r\n")
            .write(b"A0002 LOGOUT\r\n")
            .read(b"* BYE bye\r\nA0002 OK done\r\n")
            .build();

        let client = Client::<_, NotAuthenticated>::from_stream(mock).await.unwrap();
        let err = MailSession::authenticate(client, "u", "p").await.unwrap_err();
        assert!(
            matches!(err, Error::Authentication { ref username, ref reason }
                if username == "u" && reason == "Invalid credentials")
        );
    }

    #[tokio::test]
    async fn test_scoped_logs_out_after_success() {
        let mock = login(&mut Builder::new())
            .write(b"A0002 EXAMINE INBOX\r\n")
            .read(b"* 2 EXISTS\r\nA0002 OK [READ-ONLY] done\r\n")
            .write(b"A0003 LOGOUT\r\n")
            .read(b"* BYE bye\r\nA0003 OK done\r\n")
            .build();

        let exists = scoped(session(mock).await, async |s| {
            Ok(s.examine(&Mailbox::inbox()).await?.exists)
        })
        .await
        .unwrap();
        assert_eq!(exists, 2);
    }

    #[tokio::test]
    async fn test_scoped_logs_out_after_failure() {
        let mock = login(&mut Builder::new())
            .write(b"A0002 LOGOUT\r\n")
            .read(b"* BYE bye\r\nA0002 OK done\r\n")
            .build();

        let result: Result<()> = scoped(session(mock).await, async |_| {
            Err(Error::Config("stop early".to_string()))
        })
        .await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_examine_is_reused_for_same_mailbox() {
        let mut builder = Builder::new();
        let mock = login(&mut builder)
            .write(b"A0002 EXAMINE INBOX\r\n")
            .read(b"* 5 EXISTS\r\nA0002 OK [READ-ONLY] done\r\n")
            .write(b"A0003 EXAMINE Archive\r\n")
            .read(b"* 1 EXISTS\r\nA0003 OK [READ-ONLY] done\r\n")
            .build();
        let mut s = session(mock).await;

        assert_eq!(s.examine(&Mailbox::inbox()).await.unwrap().exists, 5);
        assert_eq!(s.examine(&Mailbox::inbox()).await.unwrap().exists, 5);
        let archive = s.examine(&Mailbox::new("Archive")).await.unwrap();
        assert_eq!(archive.exists, 1);
        assert!(archive.read_only);
    }

    #[tokio::test]
    async fn test_refused_examine_closes_session() {
        let mock = login(&mut Builder::new())
            .write(b"A0002 EXAMINE Missing\r\n")
            .read(b"A0002 NO no such mailbox\r\n")
            .write(b"A0003 LOGOUT\r\n")
            .read(b"* BYE bye\r\nA0003 OK done\r\n")
            .build();
        let mut s = session(mock).await;

        assert!(s.examine(&Mailbox::new("Missing")).await.is_err());
        assert!(!s.is_open());
        assert!(matches!(
            s.uid_search(&SearchCriteria::All).await,
            Err(mailroom_imap::Error::InvalidState(_))
        ));
        // nothing left to release
        s.logout().await.unwrap();
    }

    #[tokio::test]
    async fn test_search_requires_open_mailbox() {
        let mock = login(&mut Builder::new()).build();
        let mut s = session(mock).await;
        assert!(matches!(
            s.search(&SearchCriteria::All).await,
            Err(mailroom_imap::Error::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_keepalive_sends_noop() {
        let mock = login(&mut Builder::new())
            .write(b"A0002 NOOP\r\n")
            .read(b"A0002 OK NOOP completed\r\n")
            .build();
        let mut s = session(mock).await;
        keepalive(&mut s).await.unwrap();
        assert!(KEEPALIVE_INTERVAL >= Duration::from_secs(60 * 40));
    }

    #[tokio::test]
    async fn test_silent_server_hits_connect_timeout() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let endpoint = Endpoint {
            host: "127.0.0.1".to_string(),
            port,
            security: Security::StartTls,
        };

        // accepted but never greeted
        let err = connect_within("127.0.0.1", &endpoint, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConnectTimeout { seconds: 0, .. }));
        drop(listener);
    }

    #[tokio::test]
    async fn test_closed_greeting_is_connection_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        });
        let endpoint = Endpoint {
            host: "127.0.0.1".to_string(),
            port,
            security: Security::StartTls,
        };

        let err = connect_within("127.0.0.1", &endpoint, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Connection { .. }));
        server.await.unwrap();
    }
}
