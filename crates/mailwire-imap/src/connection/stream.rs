//! Transports and the connector seam.

#![allow(clippy::missing_errors_doc)]

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

use super::config::{Config, Security};
use crate::{Result, Violation};

/// Establishes transports for a session.
///
/// Production code uses [`TlsConnector`]; tests plug in in-memory streams.
pub trait Connector: Send + Sync + 'static {
    /// The byte stream this connector produces.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Opens a transport to `config.host:config.port`. With
    /// [`Security::Implicit`] the TLS handshake is part of this step.
    fn connect(&self, config: &Config) -> impl Future<Output = Result<Self::Stream>> + Send;

    /// Upgrades a plaintext stream in place after STARTTLS.
    fn upgrade(
        &self,
        stream: Self::Stream,
        host: &str,
    ) -> impl Future<Output = Result<Self::Stream>> + Send;
}

/// A stream that can be either plaintext or TLS.
pub enum ImapStream {
    /// Plaintext TCP.
    Plain(TcpStream),
    /// TLS over TCP.
    Tls(Box<TlsStream<TcpStream>>),
}

impl ImapStream {
    /// Returns true if the stream is encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

impl std::fmt::Debug for ImapStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapStream").field("tls", &self.is_tls()).finish()
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

/// TCP + rustls connector. Trust roots are per instance.
#[derive(Clone)]
pub struct TlsConnector {
    tls: Arc<rustls::ClientConfig>,
}

impl TlsConnector {
    /// Trusts the Mozilla root set from `webpki-roots`.
    #[must_use]
    pub fn new() -> Self {
        let roots = rustls::RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        };
        let config = rustls::ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        Self::with_config(Arc::new(config))
    }

    /// Uses a caller-supplied rustls configuration (custom roots, client
    /// certificates).
    #[must_use]
    pub const fn with_config(tls: Arc<rustls::ClientConfig>) -> Self {
        Self { tls }
    }

    async fn handshake(&self, tcp: TcpStream, host: &str) -> Result<ImapStream> {
        let server_name = ServerName::try_from(host.to_string())?;
        let connector = tokio_rustls::TlsConnector::from(Arc::clone(&self.tls));
        let tls = connector.connect(server_name, tcp).await?;
        Ok(ImapStream::Tls(Box::new(tls)))
    }
}

impl Default for TlsConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TlsConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConnector").finish_non_exhaustive()
    }
}

impl Connector for TlsConnector {
    type Stream = ImapStream;

    async fn connect(&self, config: &Config) -> Result<ImapStream> {
        let tcp = TcpStream::connect((config.host.as_str(), config.port)).await?;
        tcp.set_nodelay(true)?;
        match config.security {
            Security::Implicit => self.handshake(tcp, &config.host).await,
            Security::StartTls | Security::None => Ok(ImapStream::Plain(tcp)),
        }
    }

    async fn upgrade(&self, stream: ImapStream, host: &str) -> Result<ImapStream> {
        match stream {
            ImapStream::Plain(tcp) => self.handshake(tcp, host).await,
            ImapStream::Tls(_) => Err(Violation::WrongState.into()),
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
    fn default_roots_load() {
        let connector = TlsConnector::new();
        assert!(format!("{connector:?}").starts_with("TlsConnector"));
    }

    #[tokio::test]
    async fn connection_refused_is_connection_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = Config::builder("127.0.0.1")
            .port(port)
            .security(Security::None)
            .build();
        let err = TlsConnector::new().connect(&config).await.unwrap_err();
        assert!(matches!(err, crate::Error::Connection(crate::ConnectionError::Io(_))));
    }
}
