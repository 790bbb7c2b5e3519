//! One exclusive use of the transport: send a command, read to completion.

use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use mailwire_sasl::SaslMechanism;
use tokio::sync::OwnedMutexGuard;

use super::{CommandResult, Link, Session};
use crate::command::Command;
use crate::connection::{Connector, FramedStream};
use crate::error::{ConnectionError, Error, Result, TimeoutKind, Violation};
use crate::events::ChangeEvent;
use crate::model::{MessageRef, SessionState};
use crate::parser::{FetchItem, Response, ResponseParser, UntaggedResponse};
use crate::types::{Capability, CapabilitySet, ResponseCode, Status, Tag};

/// What one received response means for the command in flight.
enum Step {
    Pending,
    Continuation(String),
    Done(CommandResult),
}

/// Accumulates a command's untagged responses.
struct Collector {
    tag: Tag,
    /// BYE is the expected reply to LOGOUT.
    expect_bye: bool,
    /// Suppress change events (SELECT/EXAMINE populate the model silently).
    quiet: bool,
    /// Deadline kind reported if a read times out.
    timeout: TimeoutKind,
    responses: Vec<UntaggedResponse>,
    fetched: Vec<(usize, MessageRef)>,
    /// First recoverable error; reported once the command completes.
    error: Option<Error>,
}

impl Collector {
    fn finish(
        &mut self,
        status: Status,
        code: Option<ResponseCode>,
        text: String,
    ) -> Result<CommandResult> {
        if let Some(error) = self.error.take() {
            return Err(error);
        }
        Ok(CommandResult {
            tag: self.tag.clone(),
            status,
            code,
            text,
            responses: std::mem::take(&mut self.responses),
            fetched: std::mem::take(&mut self.fetched),
        })
    }
}

/// Exclusive access to a session's transport.
///
/// Holding an `Exchange` is holding the session's single-flight guard.
pub(crate) struct Exchange<C: Connector> {
    session: Session<C>,
    link: OwnedMutexGuard<Link<C::Stream>>,
}

impl<C: Connector> Exchange<C> {
    pub(crate) const fn new(session: Session<C>, link: OwnedMutexGuard<Link<C::Stream>>) -> Self {
        Self { session, link }
    }

    pub(crate) const fn session(&self) -> &Session<C> {
        &self.session
    }

    fn stream(&mut self) -> Result<&mut FramedStream<C::Stream>> {
        (*self.link)
            .as_mut()
            .ok_or(Error::ProtocolViolation(Violation::NotConnected))
    }

    /// Installs a freshly connected transport.
    pub(crate) fn attach(&mut self, stream: C::Stream) {
        let config = &self.session.inner.config;
        *self.link = Some(FramedStream::new(
            stream,
            config.max_line_length,
            config.max_literal_size,
        ));
    }

    /// Removes the transport, e.g. for a TLS upgrade.
    pub(crate) fn detach(&mut self) -> Option<C::Stream> {
        self.link.take().map(FramedStream::into_inner)
    }

    /// Drops the transport and publishes the disconnect.
    pub(crate) fn disconnect(&mut self, text: Option<String>) {
        let had_link = self.link.take().is_some();
        let mut events = Vec::new();
        {
            let mut shared = self.session.shared();
            let was = shared.state;
            shared.state = SessionState::Disconnected;
            if let Some(selected) = shared.selected.take() {
                events.push(ChangeEvent::MailboxClosed {
                    mailbox: selected.handle,
                });
            }
            if had_link || was != SessionState::Disconnected {
                events.push(ChangeEvent::Disconnected { text: text.clone() });
            }
        }
        tracing::info!(session = %self.session.id(), reason = text.as_deref().unwrap_or(""), "disconnected");
        self.session.publish(&events);
    }

    /// Disconnects on fatal errors and passes the error through.
    pub(crate) fn fail(&mut self, error: Error) -> Error {
        if error.is_fatal() {
            let text = match &error {
                Error::Connection(ConnectionError::Bye { text, .. }) => Some(text.clone()),
                _ => None,
            };
            self.disconnect(text);
        }
        error
    }

    /// Writes raw bytes within the send timeout.
    pub(crate) async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let limit = self.session.inner.config.send_timeout;
        let stream = self.stream()?;
        match tokio::time::timeout(limit, stream.write_all(bytes)).await {
            Ok(Ok(())) => {
                self.session.shared().last_activity = Some(Instant::now());
                Ok(())
            }
            Ok(Err(e)) => Err(self.fail(e)),
            Err(_) => Err(self.fail(Error::Timeout {
                kind: TimeoutKind::Send,
                after: limit,
            })),
        }
    }

    /// Reads one response line within `limit`.
    async fn read_within(&mut self, limit: Duration, kind: TimeoutKind) -> Result<Vec<u8>> {
        let stream = self.stream()?;
        match tokio::time::timeout(limit, stream.next_line()).await {
            Ok(Ok(line)) => {
                tracing::trace!(line = %String::from_utf8_lossy(&line).trim_end(), "received");
                Ok(line)
            }
            Ok(Err(e)) => Err(self.fail(e)),
            Err(_) => Err(self.fail(Error::Timeout { kind, after: limit })),
        }
    }

    /// Waits for the server to send something, without a deadline.
    pub(crate) async fn readable(&mut self) -> Result<()> {
        let stream = self.stream()?;
        match stream.readable().await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Reads and parses the server greeting.
    pub(crate) async fn greeting(&mut self) -> Result<(Status, Option<ResponseCode>, String)> {
        let limit = self.session.inner.config.connect_timeout;
        let line = self.read_within(limit, TimeoutKind::Connect).await?;
        let response = ResponseParser::parse(&line).map_err(|e| self.fail_greeting(&e.to_string()))?;
        match response {
            Response::Untagged(UntaggedResponse::Ok { code, text }) => Ok((Status::Ok, code, text)),
            Response::Untagged(UntaggedResponse::PreAuth { code, text }) => {
                Ok((Status::PreAuth, code, text))
            }
            Response::Untagged(UntaggedResponse::Bye { code, text }) => {
                Err(self.fail(ConnectionError::Bye { code, text }.into()))
            }
            _ => Err(self.fail_greeting(String::from_utf8_lossy(&line).trim_end())),
        }
    }

    fn fail_greeting(&mut self, text: &str) -> Error {
        self.fail(ConnectionError::Greeting(text.to_string()).into())
    }

    /// Runs one command to completion.
    pub(crate) async fn run(&mut self, command: &Command) -> Result<CommandResult> {
        self.run_command(command, None, false).await
    }

    /// Runs a command whose untagged data must not raise change events.
    pub(crate) async fn run_quiet(&mut self, command: &Command) -> Result<CommandResult> {
        self.run_command(command, None, true).await
    }

    /// Runs AUTHENTICATE, answering challenges with `mechanism`.
    pub(crate) async fn run_sasl(
        &mut self,
        command: &Command,
        mechanism: &mut dyn SaslMechanism,
    ) -> Result<CommandResult> {
        self.run_command(command, Some(mechanism), false).await
    }

    async fn run_command(
        &mut self,
        command: &Command,
        mut sasl: Option<&mut dyn SaslMechanism>,
        quiet: bool,
    ) -> Result<CommandResult> {
        let tag = self.session.inner.tags.next();
        let literal_plus = self.session.has_capability(&Capability::LiteralPlus);
        tracing::debug!(%tag, command = command.verb(), "sending");

        let mut collector = Collector {
            tag: tag.clone(),
            expect_bye: matches!(command, Command::Logout),
            quiet,
            timeout: TimeoutKind::Receive,
            responses: Vec::new(),
            fetched: Vec::new(),
            error: None,
        };

        let mut fragments = command.encode(&tag, literal_plus).into_iter();
        if let Some(first) = fragments.next() {
            self.write(&first).await?;
        }
        for fragment in fragments {
            loop {
                match self.receive(&mut collector).await? {
                    Step::Pending => {}
                    Step::Continuation(_) => break,
                    // The server refused the literal.
                    Step::Done(result) => return Ok(result),
                }
            }
            self.write(&fragment).await?;
        }

        loop {
            match self.receive(&mut collector).await? {
                Step::Pending => {}
                Step::Done(result) => return Ok(result),
                Step::Continuation(text) => match sasl.as_deref_mut() {
                    Some(mechanism) => {
                        let reply = sasl_reply(mechanism, &text, &mut collector);
                        self.write(&reply).await?;
                    }
                    None => {
                        // Nothing is owed; wait for the completion.
                        tracing::warn!(%tag, "unexpected continuation request");
                        collector
                            .error
                            .get_or_insert(Violation::UnexpectedContinuation.into());
                    }
                },
            }
        }
    }

    /// Sends IDLE and waits for the server's go-ahead.
    ///
    /// Returns the tag; the command stays in flight until [`Self::done`].
    pub(crate) async fn begin_idle(&mut self) -> Result<Tag> {
        let tag = self.session.inner.tags.next();
        tracing::debug!(%tag, command = "IDLE", "sending");
        let bytes = Command::Idle.encode(&tag, false).concat();
        self.write(&bytes).await?;
        let mut collector = Self::collector(&tag, TimeoutKind::Receive);
        loop {
            match self.receive(&mut collector).await? {
                Step::Pending => {}
                Step::Continuation(_) => return Ok(tag),
                Step::Done(result) => {
                    result.into_result()?;
                    return Err(Violation::WrongState.into());
                }
            }
        }
    }

    /// Applies untagged data that arrives while IDLE is running.
    ///
    /// Returns the completion if the server ended the IDLE on its own.
    pub(crate) async fn idle_step(&mut self, tag: &Tag) -> Result<Option<CommandResult>> {
        let mut collector = Self::collector(tag, TimeoutKind::Receive);
        match self.receive(&mut collector).await? {
            Step::Done(result) => Ok(Some(result)),
            Step::Pending | Step::Continuation(_) => Ok(None),
        }
    }

    /// Ends IDLE with DONE and waits for the tagged completion.
    pub(crate) async fn done(&mut self, tag: &Tag) -> Result<CommandResult> {
        self.write(b"DONE\r\n").await?;
        let mut collector = Self::collector(tag, TimeoutKind::Idle);
        loop {
            if let Step::Done(result) = self.receive(&mut collector).await? {
                return Ok(result);
            }
        }
    }

    fn collector(tag: &Tag, timeout: TimeoutKind) -> Collector {
        Collector {
            tag: tag.clone(),
            expect_bye: false,
            quiet: false,
            timeout,
            responses: Vec::new(),
            fetched: Vec::new(),
            error: None,
        }
    }

    /// Reads and handles one response.
    async fn receive(&mut self, collector: &mut Collector) -> Result<Step> {
        let limit = self.session.inner.config.receive_timeout;
        let line = match self.read_within(limit, collector.timeout).await {
            Ok(line) => line,
            Err(Error::Framing(e)) if e.is_resynchronized() => {
                let ours = (*self.link)
                    .as_ref()
                    .is_some_and(|s| starts_with_tag(s.discarded_head(), &collector.tag));
                if ours {
                    // The completion itself was discarded.
                    return Err(Error::Framing(e));
                }
                collector.error.get_or_insert(Error::Framing(e));
                return Ok(Step::Pending);
            }
            Err(e) => return Err(e),
        };

        let response = match ResponseParser::parse(&line) {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(error = %e, "unparseable response");
                if starts_with_tag(&line, &collector.tag) {
                    return Err(e);
                }
                collector.error.get_or_insert(e);
                return Ok(Step::Pending);
            }
        };

        match response {
            Response::Continuation { text } => Ok(Step::Continuation(text.unwrap_or_default())),
            Response::Untagged(UntaggedResponse::Bye { code, text }) if !collector.expect_bye => {
                tracing::info!(%text, "server sent BYE");
                Err(self.fail(ConnectionError::Bye { code, text }.into()))
            }
            Response::Untagged(untagged) => {
                self.dispatch(untagged, collector);
                Ok(Step::Pending)
            }
            Response::Tagged {
                tag,
                status,
                code,
                text,
            } => {
                if tag != collector.tag {
                    tracing::warn!(%tag, expected = %collector.tag, "completion for unknown tag");
                    return Ok(Step::Pending);
                }
                if let Some(code) = &code {
                    let mut events = Vec::new();
                    self.session.shared().apply_code(code, &text, &mut events);
                    self.publish(collector, &events);
                }
                tracing::debug!(%tag, %status, "completed");
                collector.finish(status, code, text).map(Step::Done)
            }
        }
    }

    /// Applies untagged data to the model and records it.
    fn dispatch(&self, response: UntaggedResponse, collector: &mut Collector) {
        let mut events = Vec::new();
        {
            let mut shared = self.session.shared();
            let shared = &mut *shared;
            match &response {
                UntaggedResponse::Capability(caps) => {
                    shared.capabilities = caps.iter().cloned().collect::<CapabilitySet>();
                }
                UntaggedResponse::Ok {
                    code: Some(code),
                    text,
                }
                | UntaggedResponse::No {
                    code: Some(code),
                    text,
                }
                | UntaggedResponse::Bad {
                    code: Some(code),
                    text,
                }
                | UntaggedResponse::PreAuth {
                    code: Some(code),
                    text,
                }
                | UntaggedResponse::Bye {
                    code: Some(code),
                    text,
                } => shared.apply_code(code, text, &mut events),
                _ => {}
            }
            if let Some(selected) = shared.selected.as_mut() {
                match &response {
                    UntaggedResponse::Flags(flags) => selected.apply_flags(flags.clone(), &mut events),
                    UntaggedResponse::Exists(n) => selected.apply_exists(*n, &mut events),
                    UntaggedResponse::Recent(n) => selected.apply_recent(*n, &mut events),
                    UntaggedResponse::Expunge(seq) => selected.apply_expunge(*seq, &mut events),
                    UntaggedResponse::Fetch { seq, items } => {
                        let cached = items
                            .iter()
                            .filter(|item| !matches!(item, FetchItem::Body { .. }))
                            .cloned()
                            .collect();
                        let slot = selected.apply_fetch(*seq, cached, &mut events);
                        collector.fetched.push((
                            collector.responses.len(),
                            MessageRef {
                                mailbox: selected.handle,
                                slot,
                            },
                        ));
                    }
                    _ => {}
                }
            }
        }
        collector.responses.push(response);
        self.publish(collector, &events);
    }

    fn publish(&self, collector: &Collector, events: &[ChangeEvent]) {
        if collector.quiet {
            // Alerts must reach the user regardless.
            let alerts: Vec<_> = events
                .iter()
                .filter(|e| matches!(e, ChangeEvent::AlertReceived { .. }))
                .cloned()
                .collect();
            self.session.publish(&alerts);
        } else {
            self.session.publish(events);
        }
    }

    /// CAPABILITY, replacing the current set.
    pub(crate) async fn refresh_capabilities(&mut self) -> Result<CapabilitySet> {
        self.run(&Command::Capability).await?.into_result()?;
        Ok(self.session.capabilities())
    }

    /// LOGOUT and close the transport.
    pub(crate) async fn logout(&mut self) -> Result<()> {
        self.session.shared().state = SessionState::LoggingOut;
        tracing::info!(session = %self.session.id(), "logging out");
        let outcome = self.run(&Command::Logout).await;
        if let Some(stream) = self.link.as_mut() {
            let _ = stream.shutdown().await;
        }
        self.disconnect(None);
        outcome.map(|_| ())
    }
}

fn starts_with_tag(line: &[u8], tag: &Tag) -> bool {
    line.strip_prefix(tag.as_str().as_bytes())
        .is_some_and(|rest| rest.first() == Some(&b' '))
}

/// Answers one SASL challenge; `*` cancels the exchange on failure.
fn sasl_reply(mechanism: &mut dyn SaslMechanism, text: &str, collector: &mut Collector) -> Vec<u8> {
    let answer = STANDARD
        .decode(text.trim())
        .map_err(|e| e.to_string())
        .and_then(|challenge| mechanism.step(&challenge).map_err(|e| e.to_string()));
    match answer {
        Ok(response) => {
            let mut line = STANDARD.encode(response).into_bytes();
            line.extend_from_slice(b"\r\n");
            line
        }
        Err(reason) => {
            tracing::debug!(mechanism = mechanism.name(), %reason, "cancelling SASL exchange");
            collector.error.get_or_insert_with(|| {
                ConnectionError::AuthenticationFailed(reason).into()
            });
            b"*\r\n".to_vec()
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
    fn tag_prefix_needs_space() {
        let tag = Tag::new("A0001");
        assert!(starts_with_tag(b"A0001 OK done\r\n", &tag));
        assert!(!starts_with_tag(b"A00012 OK done\r\n", &tag));
        assert!(!starts_with_tag(b"* OK\r\n", &tag));
    }

    #[test]
    fn sasl_failure_cancels() {
        let mut mechanism = mailwire_sasl::Login::new("u", "p");
        let mut collector = Collector {
            tag: Tag::new("A1"),
            expect_bye: false,
            quiet: false,
            timeout: TimeoutKind::Receive,
            responses: Vec::new(),
            fetched: Vec::new(),
            error: None,
        };
        assert_eq!(sasl_reply(&mut mechanism, "VXNlcm5hbWU6", &mut collector), b"dQ==\r\n");
        assert_eq!(sasl_reply(&mut mechanism, "UGFzc3dvcmQ6", &mut collector), b"cA==\r\n");
        assert_eq!(sasl_reply(&mut mechanism, "", &mut collector), b"*\r\n");
        assert!(matches!(
            collector.error,
            Some(Error::Connection(ConnectionError::AuthenticationFailed(_)))
        ));
    }
}
