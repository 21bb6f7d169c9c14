//! Implementation for the not-authenticated state.

use tokio::io::{AsyncRead, AsyncWrite};

use super::Client;
use super::states::{Authenticated, NotAuthenticated};
use crate::command::{Command, TagGenerator};
use crate::connection::framed::FramedStream;
use crate::connection::stream::ImapStream;
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::types::{ResponseCode, Status};
use crate::{Error, Result};

impl<S> Client<S, NotAuthenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new client from a connected stream.
    ///
    /// Reads the server greeting and any capabilities it advertises.
    pub async fn from_stream(stream: S) -> Result<Self> {
        let mut framed = FramedStream::new(stream);
        let greeting = framed.read_response().await?;

        let capabilities = match ResponseParser::parse(&greeting)? {
            Response::Untagged(UntaggedResponse::Status {
                status: Status::Ok | Status::PreAuth,
                code,
                ..
            }) => match code {
                Some(ResponseCode::Capability(caps)) => caps,
                _ => Vec::new(),
            },
            Response::Untagged(UntaggedResponse::Status {
                status: Status::Bye,
                text,
                ..
            }) => return Err(Error::Bye(text)),
            other => {
                return Err(Error::Protocol(format!("unexpected greeting: {other:?}")));
            }
        };

        Ok(Self {
            stream: framed,
            tag_gen: TagGenerator::default(),
            capabilities,
            state: NotAuthenticated,
        })
    }

    /// Authenticates with LOGIN.
    ///
    /// On rejection the connection is logged out before the
    /// [`Error::Auth`] is returned, so no half-open session survives.
    pub async fn login(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<S, Authenticated>> {
        if self.login_disabled() {
            let error = Error::Auth("server advertises LOGINDISABLED".to_string());
            return Err(self.abandon(error).await);
        }

        let command = Command::Login {
            username: username.to_string(),
            password: password.to_string(),
        };
        match self.execute(&command).await {
            Ok(_) => {
                tracing::debug!(%username, "logged in");
                Ok(self.transition(Authenticated))
            }
            Err(error @ Error::Auth(_)) => Err(self.abandon(error).await),
            Err(error) => Err(error),
        }
    }
}

impl Client<ImapStream, NotAuthenticated> {
    /// Upgrades a plaintext connection with STARTTLS.
    ///
    /// Capabilities are re-read over the encrypted channel, since anything
    /// learned before the handshake is untrusted.
    pub async fn starttls(mut self, host: &str) -> Result<Self> {
        self.execute(&Command::StartTls).await?;

        let stream = self.stream.into_inner().upgrade_to_tls(host).await?;
        let mut client = Self {
            stream: FramedStream::new(stream),
            tag_gen: self.tag_gen,
            capabilities: Vec::new(),
            state: NotAuthenticated,
        };
        client.capability().await?;
        Ok(client)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio_test::io::Builder;

    use super::*;
    use crate::types::Capability;

    #[tokio::test]
    async fn test_greeting_capabilities() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 AUTH=PLAIN] ready\r\n")
            .build();
        let client = Client::<_, NotAuthenticated>::from_stream(mock).await.unwrap();
        assert!(client.has_capability(&Capability::Imap4Rev1));
        assert!(client.has_capability(&Capability::Auth("PLAIN".to_string())));
    }

    #[tokio::test]
    async fn test_bye_greeting_is_error() {
        let mock = Builder::new().read(b"* BYE too many connections\r\n").build();
        let err = Client::<_, NotAuthenticated>::from_stream(mock).await.unwrap_err();
        assert!(matches!(err, Error::Bye(text) if text == "too many connections"));
    }

    #[tokio::test]
    async fn test_login_success() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 LOGIN alice@example.com \"s3cret pass\"\r\n")
            .read(b"A0001 OK [CAPABILITY IMAP4rev1] LOGIN completed\r\n")
            .build();
        let client = Client::<_, NotAuthenticated>::from_stream(mock).await.unwrap();
        let client = client
            .login("alice@example.com", "s3cret pass")
            .await
            .unwrap();
        assert!(client.has_capability(&Capability::Imap4Rev1));
    }

    #[tokio::test]
    async fn test_rejected_login_logs_out() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 LOGIN alice wrong\r\n")
            .read(b"A0001 NO [AUTHENTICATIONFAILED] Invalid credentials\r\n")
            .write(b"A0002 LOGOUT\r\n")
            .read(b"* BYE logging out\r\nA0002 OK LOGOUT completed\r\n")
            .build();
        let client = Client::<_, NotAuthenticated>::from_stream(mock).await.unwrap();
        let err = client.login("alice", "wrong").await.unwrap_err();
        assert!(err.is_auth());
    }

    #[tokio::test]
    async fn test_login_disabled_logs_out_without_sending_credentials() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 STARTTLS LOGINDISABLED] ready\r\n")
            .write(b"A0001 LOGOUT\r\n")
            .read(b"* BYE\r\nA0001 OK done\r\n")
            .build();
        let client = Client::<_, NotAuthenticated>::from_stream(mock).await.unwrap();
        let err = client.login("alice", "secret").await.unwrap_err();
        assert!(err.is_auth());
    }
}
