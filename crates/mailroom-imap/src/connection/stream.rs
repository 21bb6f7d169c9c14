//! Plaintext and TLS transports.

#![allow(clippy::missing_errors_doc)]

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

use super::config::{Endpoint, Security};
use crate::{Error, Result};

/// A connected transport, either plaintext or TLS.
pub enum ImapStream {
    /// Plaintext TCP, only valid until STARTTLS completes.
    Plain(TcpStream),
    /// TLS-encrypted stream (boxed to keep the enum small).
    Tls(Box<TlsStream<TcpStream>>),
}

impl ImapStream {
    /// Performs the TLS handshake over an existing plaintext connection.
    pub async fn upgrade_to_tls(self, host: &str) -> Result<Self> {
        let Self::Plain(tcp) = self else {
            return Err(Error::InvalidState("stream is already TLS".to_string()));
        };
        tracing::debug!(host, "upgrading connection to TLS");
        Ok(Self::Tls(Box::new(handshake(host, tcp).await?)))
    }

    /// Returns true once the transport is encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

impl std::fmt::Debug for ImapStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain(_) => f.write_str("ImapStream::Plain"),
            Self::Tls(_) => f.write_str("ImapStream::Tls"),
        }
    }
}

impl AsyncRead for ImapStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for ImapStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// Builds a TLS connector trusting the bundled webpki roots.
pub fn create_tls_connector() -> Result<TlsConnector> {
    let root_store = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };
    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();
    Ok(TlsConnector::from(Arc::new(config)))
}

async fn handshake(host: &str, tcp: TcpStream) -> Result<TlsStream<TcpStream>> {
    let connector = create_tls_connector()?;
    let server_name = ServerName::try_from(host.to_string())?;
    Ok(connector.connect(server_name, tcp).await?)
}

/// Opens a TCP connection and completes the TLS handshake immediately.
pub async fn connect_tls(host: &str, port: u16) -> Result<ImapStream> {
    let tcp = TcpStream::connect((host, port)).await?;
    Ok(ImapStream::Tls(Box::new(handshake(host, tcp).await?)))
}

/// Opens a plaintext TCP connection (to be upgraded with STARTTLS).
pub async fn connect_plain(host: &str, port: u16) -> Result<ImapStream> {
    let tcp = TcpStream::connect((host, port)).await?;
    Ok(ImapStream::Plain(tcp))
}

/// Connects to `endpoint` according to its security mode.
///
/// For [`Security::StartTls`] the returned stream is still plaintext; the
/// upgrade happens after the greeting via `Client::starttls`.
pub async fn connect(endpoint: &Endpoint) -> Result<ImapStream> {
    tracing::debug!(%endpoint, "connecting");
    match endpoint.security {
        Security::Implicit => connect_tls(&endpoint.host, endpoint.port).await,
        Security::StartTls => connect_plain(&endpoint.host, endpoint.port).await,
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
    fn test_create_tls_connector() {
        assert!(create_tls_connector().is_ok());
    }

    #[tokio::test]
    async fn test_upgrade_rejects_invalid_server_name() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let stream = connect_plain("127.0.0.1", addr.port()).await.unwrap();
        assert!(!stream.is_tls());

        let result = stream.upgrade_to_tls("not a hostname").await;
        assert!(matches!(result, Err(Error::InvalidDnsName(_))));
    }
}
