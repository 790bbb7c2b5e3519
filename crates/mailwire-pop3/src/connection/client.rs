//! Type-state POP3 client.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use mailwire_sasl::SaslMechanism;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use super::stream::{Pop3Stream, default_tls_config};
use crate::command::Command;
use crate::config::{Pop3Config, Security};
use crate::error::{Error, Result};
use crate::parser::{continuation_payload, is_continuation, parse_status, unstuff};
use crate::types::{
    Capabilities, Capability, DropListing, Greeting, ScanListing, StatusLine, UniqueIdListing,
};

/// Longest command line RFC 2449 allows, CRLF included.
const MAX_COMMAND_LINE: usize = 255;

/// Type-state marker for the AUTHORIZATION state.
#[derive(Debug)]
pub struct Authorization;

/// Type-state marker for the TRANSACTION state.
#[derive(Debug)]
pub struct Transaction;

#[derive(Debug, Clone, Copy)]
struct Limits {
    send_timeout: Duration,
    receive_timeout: Duration,
    max_line_length: usize,
}

impl From<&Pop3Config> for Limits {
    fn from(config: &Pop3Config) -> Self {
        Self {
            send_timeout: config.send_timeout,
            receive_timeout: config.receive_timeout,
            max_line_length: config.max_line_length,
        }
    }
}

/// POP3 client over stream `S` in state `State`.
#[derive(Debug)]
pub struct Client<S, State> {
    reader: BufReader<S>,
    greeting: Greeting,
    capabilities: Option<Capabilities>,
    limits: Limits,
    _state: PhantomData<State>,
}

impl Client<Pop3Stream, Authorization> {
    /// Connects with the default trust roots and reads the greeting.
    ///
    /// With [`Security::Stls`] the connection is upgraded before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection, greeting, or upgrade fails.
    pub async fn connect(config: &Pop3Config) -> Result<Self> {
        Self::connect_with(config, default_tls_config()).await
    }

    /// Connects with a caller-supplied rustls configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection, greeting, or upgrade fails.
    pub async fn connect_with(
        config: &Pop3Config,
        tls: Arc<rustls::ClientConfig>,
    ) -> Result<Self> {
        tracing::debug!(
            host = %config.host,
            port = config.port,
            security = ?config.security,
            "connecting"
        );
        let open = async {
            let stream = Pop3Stream::connect(config, &tls).await?;
            Self::from_stream(stream, config).await
        };
        let client = tokio::time::timeout(config.connect_timeout, open)
            .await
            .map_err(|_| Error::Timeout {
                after: config.connect_timeout,
            })??;

        if config.security == Security::Stls {
            let host = config.host.clone();
            return client
                .stls_with(|stream| async move { stream.upgrade(&host, &tls).await })
                .await;
        }
        Ok(client)
    }
}

impl<S> Client<S, Authorization>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wraps an established stream and reads the greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if the greeting cannot be read or is `-ERR`.
    pub async fn from_stream(stream: S, config: &Pop3Config) -> Result<Self> {
        let mut client = Self {
            reader: BufReader::new(stream),
            greeting: Greeting::from_text(""),
            capabilities: None,
            limits: Limits::from(config),
            _state: PhantomData,
        };
        let status = client.read_status().await?;
        if !status.ok {
            return Err(Error::ErrResponse {
                code: status.code,
                text: status.text,
            });
        }
        client.greeting = Greeting::from_text(&status.text);
        tracing::debug!(greeting = %client.greeting.text, "connected");
        Ok(client)
    }

    /// Upgrades the connection with STLS and re-reads capabilities.
    ///
    /// `upgrade` performs the TLS handshake on the raw stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSupported`] if CAPA was read and lacks STLS, or an
    /// error if the command or the handshake fails.
    pub async fn stls_with<T, F, Fut>(mut self, upgrade: F) -> Result<Client<T, Authorization>>
    where
        T: AsyncRead + AsyncWrite + Unpin + Send,
        F: FnOnce(S) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(capabilities) = &self.capabilities
            && !capabilities.has(&Capability::Stls)
        {
            return Err(Error::NotSupported("STLS".into()));
        }
        self.command(&Command::Stls).await?;
        if !self.reader.buffer().is_empty() {
            return Err(Error::Malformed("data after STLS response".into()));
        }

        let stream = upgrade(self.reader.into_inner()).await?;
        let mut client = Client {
            reader: BufReader::new(stream),
            greeting: self.greeting,
            capabilities: None,
            limits: self.limits,
            _state: PhantomData,
        };
        tracing::debug!("TLS established");
        // Servers without CAPA still allow login.
        if let Err(e) = client.capa().await {
            if e.is_fatal() {
                return Err(e);
            }
            tracing::debug!(error = %e, "CAPA after STLS failed");
        }
        Ok(client)
    }

    /// Sends USER.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the name.
    pub async fn user(&mut self, name: &str) -> Result<()> {
        self.command(&Command::User(name.to_string())).await?;
        Ok(())
    }

    /// Sends PASS and enters the TRANSACTION state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AuthenticationFailed`] if the server answers `-ERR`.
    pub async fn pass(mut self, password: &str) -> Result<Client<S, Transaction>> {
        self.send(&Command::Pass(password.to_string())).await?;
        let status = self.read_status().await?;
        if !status.ok {
            return Err(Error::AuthenticationFailed {
                code: status.code,
                text: status.text,
            });
        }
        Ok(self.into_transaction())
    }

    /// USER followed by PASS.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AuthenticationFailed`] if either step is refused.
    pub async fn login(mut self, name: &str, password: &str) -> Result<Client<S, Transaction>> {
        self.send(&Command::User(name.to_string())).await?;
        let status = self.read_status().await?;
        if !status.ok {
            return Err(Error::AuthenticationFailed {
                code: status.code,
                text: status.text,
            });
        }
        self.pass(password).await
    }

    /// Authenticates with a SASL mechanism (RFC 5034).
    ///
    /// The initial response is sent with the command when the line fits in
    /// 255 octets, and on the first empty challenge otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Sasl`] if the mechanism gives up (the exchange is
    /// cancelled with `*`), or [`Error::AuthenticationFailed`] if the server
    /// answers `-ERR`.
    pub async fn auth(
        mut self,
        mechanism: &mut dyn SaslMechanism,
    ) -> Result<Client<S, Transaction>> {
        let name = mechanism.name().to_ascii_uppercase();
        let mut pending = mechanism.initial_response();

        let inline = pending
            .as_deref()
            .map(encode_initial)
            .filter(|ir| "AUTH ".len() + name.len() + 1 + ir.len() + 2 <= MAX_COMMAND_LINE);
        if inline.is_some() {
            pending = None;
        }
        self.send(&Command::Auth {
            mechanism: name,
            initial_response: inline,
        })
        .await?;

        loop {
            let line = self.read_line().await?;
            if !is_continuation(&line) {
                let status = parse_status(&line)?;
                if status.ok {
                    return Ok(self.into_transaction());
                }
                return Err(Error::AuthenticationFailed {
                    code: status.code,
                    text: status.text,
                });
            }

            let response = if let Some(ir) = pending.take() {
                ir
            } else {
                let challenge = match STANDARD.decode(continuation_payload(&line)) {
                    Ok(challenge) => challenge,
                    Err(e) => {
                        self.cancel_auth().await?;
                        return Err(Error::Malformed(format!("SASL challenge: {e}")));
                    }
                };
                match mechanism.step(&challenge) {
                    Ok(response) => response,
                    Err(e) => {
                        self.cancel_auth().await?;
                        return Err(e.into());
                    }
                }
            };
            self.write_line(STANDARD.encode(response).as_bytes()).await?;
        }
    }

    async fn cancel_auth(&mut self) -> Result<()> {
        self.write_line(b"*").await?;
        let status = self.read_status().await?;
        tracing::debug!(ok = status.ok, text = %status.text, "AUTH cancelled");
        Ok(())
    }

    fn into_transaction(self) -> Client<S, Transaction> {
        tracing::debug!("entered TRANSACTION state");
        Client {
            reader: self.reader,
            greeting: self.greeting,
            capabilities: self.capabilities,
            limits: self.limits,
            _state: PhantomData,
        }
    }
}

impl<S> Client<S, Transaction>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// STAT: message count and maildrop size.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails or the listing is malformed.
    pub async fn stat(&mut self) -> Result<DropListing> {
        let text = self.command(&Command::Stat).await?;
        DropListing::parse(&text)
    }

    /// LIST: sizes of all messages not marked deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails or a listing is malformed.
    pub async fn list(&mut self) -> Result<Vec<ScanListing>> {
        self.command(&Command::List(None)).await?;
        self.read_multiline()
            .await?
            .iter()
            .map(|line| ScanListing::parse(&String::from_utf8_lossy(line)))
            .collect()
    }

    /// LIST n: size of one message.
    ///
    /// # Errors
    ///
    /// Returns an error if the number is 0, the message does not exist, or
    /// the listing is malformed.
    pub async fn list_one(&mut self, message: u32) -> Result<ScanListing> {
        let text = self
            .command(&Command::List(Some(message_number(message)?)))
            .await?;
        ScanListing::parse(&text)
    }

    /// UIDL: unique ids of all messages not marked deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails or a listing is malformed.
    pub async fn uidl(&mut self) -> Result<Vec<UniqueIdListing>> {
        self.command(&Command::Uidl(None)).await?;
        self.read_multiline()
            .await?
            .iter()
            .map(|line| UniqueIdListing::parse(&String::from_utf8_lossy(line)))
            .collect()
    }

    /// UIDL n: unique id of one message.
    ///
    /// # Errors
    ///
    /// Returns an error if the number is 0, the message does not exist, or
    /// the listing is malformed.
    pub async fn uidl_one(&mut self, message: u32) -> Result<UniqueIdListing> {
        let text = self
            .command(&Command::Uidl(Some(message_number(message)?)))
            .await?;
        UniqueIdListing::parse(&text)
    }

    /// RETR: the full message, unstuffed, with CRLF line endings.
    ///
    /// # Errors
    ///
    /// Returns an error if the number is 0 or the server refuses.
    pub async fn retr(&mut self, message: u32) -> Result<Vec<u8>> {
        self.command(&Command::Retr(message_number(message)?))
            .await?;
        Ok(join_lines(self.read_multiline().await?))
    }

    /// TOP: headers plus the first `lines` body lines.
    ///
    /// # Errors
    ///
    /// Returns an error if the number is 0 or the server refuses.
    pub async fn top(&mut self, message: u32, lines: u32) -> Result<Vec<u8>> {
        self.command(&Command::Top {
            message: message_number(message)?,
            lines,
        })
        .await?;
        Ok(join_lines(self.read_multiline().await?))
    }

    /// DELE: marks a message deleted. Removal happens at QUIT.
    ///
    /// # Errors
    ///
    /// Returns an error if the number is 0 or the server refuses.
    pub async fn dele(&mut self, message: u32) -> Result<()> {
        self.command(&Command::Dele(message_number(message)?))
            .await?;
        Ok(())
    }

    /// NOOP
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not answer `+OK`.
    pub async fn noop(&mut self) -> Result<()> {
        self.command(&Command::Noop).await?;
        Ok(())
    }

    /// RSET: unmarks all deleted messages.
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not answer `+OK`.
    pub async fn rset(&mut self) -> Result<()> {
        self.command(&Command::Rset).await?;
        Ok(())
    }
}

impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// The server greeting.
    #[must_use]
    pub const fn greeting(&self) -> &Greeting {
        &self.greeting
    }

    /// Capabilities from the last CAPA, if any was read.
    #[must_use]
    pub const fn capabilities(&self) -> Option<&Capabilities> {
        self.capabilities.as_ref()
    }

    /// Sends CAPA and records the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not support CAPA.
    pub async fn capa(&mut self) -> Result<&Capabilities> {
        self.command(&Command::Capa).await?;
        let lines = self.read_multiline().await?;
        let text: Vec<String> = lines
            .iter()
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .collect();
        let capabilities = Capabilities::from_lines(text.iter().map(String::as_str));
        tracing::debug!(count = text.len(), "capabilities read");
        Ok(self.capabilities.insert(capabilities))
    }

    /// Sends QUIT and closes the connection. In TRANSACTION state this
    /// enters UPDATE, where messages marked deleted are removed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ErrResponse`] if the server could not remove the
    /// marked messages.
    pub async fn quit(mut self) -> Result<()> {
        let text = self.command(&Command::Quit).await?;
        tracing::debug!(%text, "signed off");
        self.reader.get_mut().shutdown().await?;
        Ok(())
    }

    async fn command(&mut self, command: &Command) -> Result<String> {
        self.send(command).await?;
        let status = self.read_status().await?;
        if status.ok {
            Ok(status.text)
        } else {
            tracing::debug!(code = ?status.code, text = %status.text, "-ERR");
            Err(Error::ErrResponse {
                code: status.code,
                text: status.text,
            })
        }
    }

    async fn send(&mut self, command: &Command) -> Result<()> {
        tracing::debug!(command = %command.redacted(), "C:");
        self.write_raw(&command.serialize()).await
    }

    async fn write_line(&mut self, line: &[u8]) -> Result<()> {
        let mut data = Vec::with_capacity(line.len() + 2);
        data.extend_from_slice(line);
        data.extend_from_slice(b"\r\n");
        self.write_raw(&data).await
    }

    async fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        let after = self.limits.send_timeout;
        let stream = self.reader.get_mut();
        let write = async {
            stream.write_all(data).await?;
            stream.flush().await
        };
        tokio::time::timeout(after, write)
            .await
            .map_err(|_| Error::Timeout { after })??;
        Ok(())
    }

    async fn read_status(&mut self) -> Result<StatusLine> {
        let line = self.read_line().await?;
        parse_status(&line)
    }

    /// Reads a multi-line body up to the `.` terminator.
    async fn read_multiline(&mut self) -> Result<Vec<Vec<u8>>> {
        let mut lines = Vec::new();
        loop {
            let line = self.read_line().await?;
            match unstuff(&line) {
                Some(content) => lines.push(content.to_vec()),
                None => return Ok(lines),
            }
        }
    }

    /// Reads one line without its CRLF (a bare LF is tolerated).
    async fn read_line(&mut self) -> Result<Vec<u8>> {
        let limit = self.limits.max_line_length;
        let after = self.limits.receive_timeout;
        let mut line = Vec::new();
        let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
        let mut limited = (&mut self.reader).take(cap);
        let n = tokio::time::timeout(after, limited.read_until(b'\n', &mut line))
            .await
            .map_err(|_| Error::Timeout { after })??;

        if n == 0 {
            return Err(Error::Closed);
        }
        if line.last() != Some(&b'\n') {
            if line.len() > limit {
                return Err(Error::LineTooLong { limit });
            }
            return Err(Error::Closed);
        }
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Ok(line)
    }
}

/// Initial responses use `=` for zero length; later responses are sent as
/// an empty line.
fn encode_initial(data: &[u8]) -> String {
    if data.is_empty() {
        "=".to_string()
    } else {
        STANDARD.encode(data)
    }
}

fn message_number(n: u32) -> Result<u32> {
    if n == 0 {
        return Err(Error::InvalidArgument("message numbers start at 1".into()));
    }
    Ok(n)
}

fn join_lines(lines: Vec<Vec<u8>>) -> Vec<u8> {
    let mut out = Vec::with_capacity(lines.iter().map(|l| l.len() + 2).sum());
    for line in lines {
        out.extend_from_slice(&line);
        out.extend_from_slice(b"\r\n");
    }
    out
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
    use tokio_test::io::{Builder, Mock};

    fn config() -> Pop3Config {
        Pop3Config::builder("pop.example.com")
            .security(Security::None)
            .build()
    }

    async fn transaction(mock: Mock) -> Client<Mock, Transaction> {
        Client::from_stream(mock, &config())
            .await
            .unwrap()
            .login("alice", "secret")
            .await
            .unwrap()
    }

    fn login_script() -> Builder {
        let mut builder = Builder::new();
        builder
            .read(b"+OK POP3 ready <1896.697170952@dbc.mtview.ca.us>\r\n")
            .write(b"USER alice\r\n")
            .read(b"+OK\r\n")
            .write(b"PASS secret\r\n")
            .read(b"+OK maildrop locked and ready\r\n");
        builder
    }

    #[tokio::test]
    async fn greeting_records_apop_timestamp() {
        let mock = Builder::new().read(b"+OK ready <1.2@host>\r\n").build();
        let client = Client::from_stream(mock, &config()).await.unwrap();
        assert_eq!(client.greeting().timestamp.as_deref(), Some("<1.2@host>"));
    }

    #[tokio::test]
    async fn err_greeting_is_rejected() {
        let mock = Builder::new().read(b"-ERR [SYS/TEMP] try later\r\n").build();
        let err = Client::from_stream(mock, &config()).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn stat_and_multiline_list() {
        let mock = login_script()
            .write(b"STAT\r\n")
            .read(b"+OK 2 320\r\n")
            .write(b"LIST\r\n")
            .read(b"+OK 2 messages\r\n1 120\r\n2 200\r\n.\r\n")
            .build();
        let mut client = transaction(mock).await;
        assert_eq!(client.stat().await.unwrap(), DropListing { count: 2, size: 320 });
        let list = client.list().await.unwrap();
        assert_eq!(
            list,
            vec![
                ScanListing { number: 1, size: 120 },
                ScanListing { number: 2, size: 200 }
            ]
        );
    }

    #[tokio::test]
    async fn retr_unstuffs_leading_dots() {
        let mock = login_script()
            .write(b"RETR 1\r\n")
            .read(b"+OK 24 octets\r\nSubject: hi\r\n\r\n..dots\r\n.\r\n")
            .build();
        let mut client = transaction(mock).await;
        let message = client.retr(1).await.unwrap();
        assert_eq!(message, b"Subject: hi\r\n\r\n.dots\r\n");
    }

    #[tokio::test]
    async fn message_zero_is_rejected_without_io() {
        let mut client = transaction(login_script().build()).await;
        assert!(matches!(
            client.dele(0).await,
            Err(Error::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn err_response_carries_extended_code() {
        let mock = Builder::new()
            .read(b"+OK ready\r\n")
            .write(b"USER alice\r\n")
            .read(b"+OK\r\n")
            .write(b"PASS secret\r\n")
            .read(b"-ERR [IN-USE] maildrop already locked\r\n")
            .build();
        let client = Client::from_stream(mock, &config()).await.unwrap();
        let err = client.login("alice", "secret").await.unwrap_err();
        assert!(matches!(
            err,
            Error::AuthenticationFailed {
                code: Some(crate::types::ExtendedCode::InUse),
                ..
            }
        ));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn line_limit() {
        let config = Pop3Config::builder("pop.example.com")
            .security(Security::None)
            .max_line_length(8)
            .build();
        let mock = Builder::new().read(b"+OK this greeting is too long\r\n").build();
        let err = Client::from_stream(mock, &config).await.unwrap_err();
        assert!(matches!(err, Error::LineTooLong { limit: 8 }));
    }

    #[tokio::test]
    async fn eof_is_closed() {
        let mock = Builder::new().read(b"+OK rea").build();
        assert!(matches!(
            Client::from_stream(mock, &config()).await,
            Err(Error::Closed)
        ));
    }

    #[test]
    fn empty_initial_response_encodes_as_equals() {
        assert_eq!(encode_initial(b""), "=");
        assert_eq!(encode_initial(b"\0a\0b"), "AGEAYg==");
    }
}
