//! The session engine.
//!
//! A [`Session`] owns one transport and serializes every protocol exchange
//! on it: at most one command is in flight, and a caller that tries to
//! start a second one gets [`Violation::Busy`] without a byte being sent.
//! Untagged data is applied to the session's model as it arrives, and the
//! resulting [`ChangeEvent`]s are published to listeners before the command
//! completes.
//!
//! `Session` is a cheap handle; clones share the same connection.

mod connect;
mod exchange;
mod mailboxes;
mod messages;
mod transfer;
mod watch;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tokio::sync::OwnedMutexGuard;

pub use connect::{ConnectHandle, Credentials};
pub use mailboxes::{ListOptions, Quota};
pub use messages::{BodyPart, SearchResult};
pub use transfer::{TransferMode, TransferReport};
pub use watch::WatchKind;

pub(crate) use exchange::Exchange;

use crate::command::{Command, TagGenerator};
use crate::connection::{Config, Connector, FramedStream, TlsConnector};
use crate::error::{Error, Result, Violation};
use crate::events::{ChangeEvent, ChangeListener};
use crate::model::{
    Message, MessageRef, OpenedMailbox, SelectedMailbox, SessionId, SessionState,
};
use crate::parser::{Namespaces, UntaggedResponse};
use crate::types::{Capability, CapabilitySet, ResponseCode, Status, Tag};

/// Outcome of one tagged command.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Tag the command was sent with.
    pub tag: Tag,
    /// OK, NO or BAD.
    pub status: Status,
    /// Response code on the tagged line.
    pub code: Option<ResponseCode>,
    /// Text on the tagged line.
    pub text: String,
    /// Untagged responses received while the command was in flight.
    pub responses: Vec<UntaggedResponse>,
    /// Messages named by FETCH responses: index into `responses` and the
    /// message it updated.
    pub fetched: Vec<(usize, MessageRef)>,
}

impl CommandResult {
    /// Returns true if the command completed with OK.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.status.is_ok()
    }

    /// Converts a NO or BAD completion into [`Error::ErrorResponse`].
    ///
    /// # Errors
    ///
    /// Returns the server's refusal as an error.
    pub fn into_result(self) -> Result<Self> {
        if self.is_ok() {
            Ok(self)
        } else {
            Err(Error::ErrorResponse {
                status: self.status,
                code: self.code,
                text: self.text,
            })
        }
    }

    /// Returns true if the completion carries `code`'s variant.
    #[must_use]
    pub fn has_code(&self, code: &ResponseCode) -> bool {
        self.code
            .as_ref()
            .is_some_and(|c| std::mem::discriminant(c) == std::mem::discriminant(code))
    }
}

/// Session state guarded by a plain mutex. Never held across an await.
pub(crate) struct Shared {
    pub state: SessionState,
    pub capabilities: CapabilitySet,
    pub namespaces: Option<Namespaces>,
    pub server_id: Option<Vec<(String, Option<String>)>>,
    pub greeting: Option<String>,
    pub selected: Option<SelectedMailbox>,
    pub generation: u64,
    pub connect: Option<connect::Pending>,
    pub watch: Option<watch::Active>,
    pub last_activity: Option<Instant>,
}

impl Shared {
    const fn new() -> Self {
        Self {
            state: SessionState::Disconnected,
            capabilities: CapabilitySet::new(Vec::new()),
            namespaces: None,
            server_id: None,
            greeting: None,
            selected: None,
            generation: 0,
            connect: None,
            watch: None,
            last_activity: None,
        }
    }

    /// Drops everything learned from the server.
    fn reset(&mut self) {
        self.capabilities = CapabilitySet::default();
        self.namespaces = None;
        self.server_id = None;
        self.greeting = None;
        self.selected = None;
    }

    /// Applies a response code from a status line.
    fn apply_code(&mut self, code: &ResponseCode, text: &str, events: &mut Vec<ChangeEvent>) {
        match code {
            ResponseCode::Alert => {
                tracing::warn!(%text, "server alert");
                events.push(ChangeEvent::AlertReceived {
                    text: text.to_string(),
                });
            }
            ResponseCode::Capability(caps) => {
                self.capabilities = caps.iter().cloned().collect();
            }
            ResponseCode::Closed => {}
            _ => {
                if let Some(selected) = self.selected.as_mut() {
                    selected.apply_code(code, events);
                }
            }
        }
    }
}

/// State requirement checked before an exchange starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Need {
    Disconnected,
    Connected,
    NotAuthenticated,
    Authenticated,
    Selected,
}

pub(crate) type Link<S> = Option<FramedStream<S>>;

pub(crate) struct Inner<C: Connector> {
    pub id: SessionId,
    pub config: Config,
    pub connector: C,
    pub link: Arc<tokio::sync::Mutex<Link<C::Stream>>>,
    pub shared: Mutex<Shared>,
    pub listeners: Mutex<Vec<Box<dyn ChangeListener>>>,
    pub tags: TagGenerator,
}

/// One IMAP connection and its synchronized view of server state.
///
/// # Example
///
/// ```no_run
/// use mailwire_imap::{Config, Credentials, Session};
///
/// # async fn example() -> mailwire_imap::Result<()> {
/// let session = Session::new(Config::new("imap.example.com"));
/// session.connect(Credentials::login("user", "password")).await?;
/// let inbox = session.open("INBOX", false).await?;
/// println!("{} messages", inbox.exists);
/// session.logout().await?;
/// # Ok(())
/// # }
/// ```
pub struct Session<C: Connector = TlsConnector> {
    inner: Arc<Inner<C>>,
}

impl<C: Connector> Clone for Session<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Connector> std::fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("host", &self.inner.config.host)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Session<TlsConnector> {
    /// Creates a disconnected session using the default TLS connector.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self::with_connector(config, TlsConnector::new())
    }
}

impl<C: Connector> Session<C> {
    /// Creates a disconnected session over a custom transport.
    #[must_use]
    pub fn with_connector(config: Config, connector: C) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: SessionId::next(),
                config,
                connector,
                link: Arc::new(tokio::sync::Mutex::new(None)),
                shared: Mutex::new(Shared::new()),
                listeners: Mutex::new(Vec::new()),
                tags: TagGenerator::default(),
            }),
        }
    }

    /// Process-unique id of this session.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.inner.id
    }

    /// The configuration the session was created with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub(crate) fn shared(&self) -> MutexGuard<'_, Shared> {
        self.inner
            .shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Current protocol state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.shared().state
    }

    /// Capabilities from the most recent negotiation.
    #[must_use]
    pub fn capabilities(&self) -> CapabilitySet {
        self.shared().capabilities.clone()
    }

    /// Returns true if `capability` is currently advertised.
    #[must_use]
    pub fn has_capability(&self, capability: &Capability) -> bool {
        self.shared().capabilities.has(capability)
    }

    /// NAMESPACE data learned after login.
    #[must_use]
    pub fn namespaces(&self) -> Option<Namespaces> {
        self.shared().namespaces.clone()
    }

    /// ID data the server sent after login.
    #[must_use]
    pub fn server_id(&self) -> Option<Vec<(String, Option<String>)>> {
        self.shared().server_id.clone()
    }

    /// Text of the server greeting.
    #[must_use]
    pub fn greeting(&self) -> Option<String> {
        self.shared().greeting.clone()
    }

    /// When the last command was sent.
    #[must_use]
    pub fn last_activity(&self) -> Option<Instant> {
        self.shared().last_activity
    }

    /// Snapshot of the selected mailbox.
    #[must_use]
    pub fn selected(&self) -> Option<OpenedMailbox> {
        self.shared().selected.as_ref().map(SelectedMailbox::snapshot)
    }

    /// Current view of one message.
    ///
    /// Vanished messages are still returned, with
    /// [`Message::is_vanished`] set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MailboxClosed`] for a handle from an earlier
    /// selection and [`Violation::CrossSession`] for another session's handle.
    pub fn message(&self, handle: MessageRef) -> Result<Message> {
        let shared = self.shared();
        let selected = self.selection(&shared, handle)?;
        selected
            .message(handle.slot)
            .ok_or(Error::ProtocolViolation(Violation::StaleHandle))
    }

    /// Live messages whose attributes have been fetched, in sequence order.
    #[must_use]
    pub fn cached_messages(&self) -> Vec<Message> {
        self.shared()
            .selected
            .as_ref()
            .map(SelectedMailbox::live_messages)
            .unwrap_or_default()
    }

    /// The selection `handle` points into, checking session and generation.
    pub(crate) fn selection<'a>(
        &self,
        shared: &'a Shared,
        handle: MessageRef,
    ) -> Result<&'a SelectedMailbox> {
        if handle.mailbox.session != self.inner.id {
            return Err(Violation::CrossSession.into());
        }
        match shared.selected.as_ref() {
            Some(selected) if selected.handle == handle.mailbox => Ok(selected),
            _ => Err(Error::MailboxClosed),
        }
    }

    /// Registers a change listener.
    pub fn add_listener(&self, listener: impl ChangeListener + 'static) {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(listener));
    }

    /// Unregisters every change listener.
    pub fn remove_listeners(&self) {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Delivers events in order. Called with no other lock held.
    pub(crate) fn publish(&self, events: &[ChangeEvent]) {
        if events.is_empty() {
            return;
        }
        let mut listeners = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for event in events {
            for listener in listeners.iter_mut() {
                listener.on_change(event);
            }
        }
    }

    /// Takes the exchange guard after checking `need`.
    ///
    /// Fails without touching the network when a watch or connect is
    /// pending, another exchange is in flight, or the state is wrong.
    pub(crate) fn acquire(&self, need: Need) -> Result<Exchange<C>> {
        {
            let shared = self.shared();
            if shared.watch.is_some() {
                return Err(Violation::WatchActive.into());
            }
            if shared.connect.is_some() {
                return Err(Violation::ConnectPending.into());
            }
        }
        let guard = Arc::clone(&self.inner.link)
            .try_lock_owned()
            .map_err(|_| Error::ProtocolViolation(Violation::Busy))?;
        self.check_state(&guard, need)?;
        Ok(Exchange::new(self.clone(), guard))
    }

    fn check_state(&self, link: &OwnedMutexGuard<Link<C::Stream>>, need: Need) -> Result<()> {
        let state = self.state();
        if need == Need::Disconnected {
            return if state == SessionState::Disconnected && link.is_none() {
                Ok(())
            } else {
                Err(Violation::WrongState.into())
            };
        }
        if link.is_none() || !state.is_connected() {
            return Err(Violation::NotConnected.into());
        }
        let ok = match need {
            Need::Disconnected | Need::Connected => true,
            Need::NotAuthenticated => state == SessionState::NotAuthenticated,
            Need::Authenticated => state.is_authenticated(),
            Need::Selected => state == SessionState::Selected,
        };
        if ok {
            Ok(())
        } else {
            Err(Violation::WrongState.into())
        }
    }

    /// Sends `command` and waits for its completion.
    ///
    /// NO and BAD completions are returned as results, not errors; see
    /// [`CommandResult::into_result`].
    ///
    /// # Errors
    ///
    /// Returns [`Violation::Busy`] if another exchange is in flight,
    /// [`Violation::NotConnected`] if there is no connection, and transport,
    /// timeout or parse errors from the exchange itself.
    pub async fn execute(&self, command: Command) -> Result<CommandResult> {
        let mut exchange = self.acquire(Need::Connected)?;
        exchange.run(&command).await
    }

    /// CAPABILITY: refreshes the capability set.
    ///
    /// # Errors
    ///
    /// Fails if the exchange fails or the server refuses.
    pub async fn capability(&self) -> Result<CapabilitySet> {
        let mut exchange = self.acquire(Need::Connected)?;
        exchange.refresh_capabilities().await
    }

    /// NOOP
    ///
    /// # Errors
    ///
    /// Fails if the exchange fails or the server refuses.
    pub async fn noop(&self) -> Result<()> {
        let mut exchange = self.acquire(Need::Connected)?;
        exchange.run(&Command::Noop).await?.into_result()?;
        Ok(())
    }

    /// LOGOUT, then closes the transport.
    ///
    /// # Errors
    ///
    /// Fails if the exchange fails. The session ends up disconnected either
    /// way.
    pub async fn logout(&self) -> Result<()> {
        let mut exchange = self.acquire(Need::Connected)?;
        exchange.logout().await
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
    fn error_completion_becomes_error() {
        let result = CommandResult {
            tag: Tag::new("A0001"),
            status: Status::No,
            code: Some(ResponseCode::TryCreate),
            text: "no such mailbox".into(),
            responses: Vec::new(),
            fetched: Vec::new(),
        };
        assert!(result.has_code(&ResponseCode::TryCreate));
        let err = result.into_result().unwrap_err();
        assert!(matches!(
            err.response_code(),
            Some(ResponseCode::TryCreate)
        ));
    }

    #[tokio::test]
    async fn disconnected_session_refuses_commands() {
        let session = Session::new(Config::new("imap.invalid"));
        assert_eq!(session.state(), SessionState::Disconnected);
        let err = session.noop().await.unwrap_err();
        assert!(matches!(
            err,
            Error::ProtocolViolation(Violation::NotConnected)
        ));
    }
}
