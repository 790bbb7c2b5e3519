//! Connection establishment and authentication.
//!
//! Connect runs as a background task holding the session's exchange guard,
//! so the outcome is the same whether the caller awaits
//! [`Session::connect`] or splits it into [`Session::begin_connect`] and
//! [`Session::end_connect`].

use mailwire_sasl::SaslMechanism;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::{Exchange, Need, Session};
use crate::command::Command;
use crate::connection::{Connector, Security};
use crate::error::{ConnectionError, Error, Result, TimeoutKind, Violation};
use crate::model::SessionState;
use crate::parser::UntaggedResponse;
use crate::types::{Capability, ResponseCode, Status};

/// How to authenticate after the greeting.
pub enum Credentials {
    /// LOGIN with a user name and password.
    Login {
        /// User name.
        username: String,
        /// Password.
        password: String,
    },
    /// AUTHENTICATE with a SASL mechanism.
    Sasl(Box<dyn SaslMechanism>),
    /// Stop after the greeting (and STARTTLS, if configured).
    None,
}

impl Credentials {
    /// LOGIN credentials.
    #[must_use]
    pub fn login(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Login {
            username: username.into(),
            password: password.into(),
        }
    }

    /// SASL credentials.
    #[must_use]
    pub fn sasl(mechanism: impl SaslMechanism + 'static) -> Self {
        Self::Sasl(Box::new(mechanism))
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Login { username, .. } => f
                .debug_struct("Login")
                .field("username", username)
                .finish_non_exhaustive(),
            Self::Sasl(mechanism) => f.debug_tuple("Sasl").field(&mechanism.name()).finish(),
            Self::None => f.write_str("None"),
        }
    }
}

/// Marker stored on the session while a connect is in progress.
pub(crate) struct Pending {
    cancel: watch::Sender<bool>,
}

/// A connect running in the background.
#[must_use = "pass the handle to Session::end_connect"]
pub struct ConnectHandle {
    task: JoinHandle<Result<()>>,
    cancelled: watch::Receiver<bool>,
}

impl std::fmt::Debug for ConnectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectHandle")
            .field("finished", &self.task.is_finished())
            .finish_non_exhaustive()
    }
}

impl<C: Connector> Session<C> {
    /// Starts connecting in the background.
    ///
    /// # Errors
    ///
    /// Returns [`Violation::ConnectPending`] if a connect is already running
    /// and [`Violation::WrongState`] if the session is connected. Neither
    /// touches the network.
    pub fn begin_connect(&self, credentials: Credentials) -> Result<ConnectHandle> {
        let mut exchange = self.acquire(Need::Disconnected)?;
        let (cancel, cancelled) = watch::channel(false);
        {
            let mut shared = self.shared();
            shared.connect = Some(Pending { cancel });
            shared.reset();
            shared.state = SessionState::Connecting;
        }

        let session = self.clone();
        let flag = cancelled.clone();
        let task = tokio::spawn(async move {
            let outcome = exchange.establish(credentials, &flag).await;
            let cancelled_now = *flag.borrow();
            let outcome = match outcome {
                Ok(()) if !cancelled_now => Ok(()),
                Ok(()) | Err(Error::Cancelled) => {
                    // The server is between commands: leave politely.
                    if let Err(e) = exchange.logout().await {
                        tracing::warn!(error = %e, "logout after cancelled connect failed");
                    }
                    Err(Error::Cancelled)
                }
                Err(e) => {
                    exchange.disconnect(None);
                    session.shared().reset();
                    Err(e)
                }
            };
            drop(exchange);
            session.shared().connect = None;
            outcome
        });
        Ok(ConnectHandle { task, cancelled })
    }

    /// Waits for a connect started with [`begin_connect`](Self::begin_connect).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if the connect was cancelled, otherwise
    /// whatever stopped it.
    pub async fn end_connect(&self, handle: ConnectHandle) -> Result<()> {
        let ConnectHandle {
            task,
            mut cancelled,
        } = handle;
        tokio::select! {
            biased;
            joined = task => joined.unwrap_or(Err(Error::Cancelled)),
            () = cancel_requested(&mut cancelled) => Err(Error::Cancelled),
        }
    }

    /// Connects, authenticates and learns the server's capabilities.
    ///
    /// # Errors
    ///
    /// See [`begin_connect`](Self::begin_connect) and
    /// [`end_connect`](Self::end_connect).
    pub async fn connect(&self, credentials: Credentials) -> Result<()> {
        let handle = self.begin_connect(credentials)?;
        self.end_connect(handle).await
    }

    /// Cancels a pending connect. Waiters in
    /// [`end_connect`](Self::end_connect) return [`Error::Cancelled`].
    ///
    /// # Errors
    ///
    /// Returns [`Violation::WrongState`] if no connect is pending.
    pub fn cancel_connect(&self) -> Result<()> {
        match self.shared().connect.as_ref() {
            Some(pending) => {
                pending.cancel.send_replace(true);
                Ok(())
            }
            None => Err(Violation::WrongState.into()),
        }
    }

    /// Ends the session: cancels any connect, stops any watch, then logs out
    /// on a best-effort basis. Never fails.
    pub async fn dispose(&self) {
        if self.cancel_connect().is_ok() {
            tracing::debug!(session = %self.id(), "cancelled pending connect");
        }
        if self.stop_any_watch().await.is_err() {
            tracing::debug!(session = %self.id(), "watch ended with an error during dispose");
        }
        if let Ok(mut exchange) = self.acquire(Need::Connected) {
            if let Err(e) = exchange.logout().await {
                tracing::warn!(error = %e, "logout during dispose failed");
            }
        }
    }

    /// STARTTLS: upgrades the transport and relearns capabilities.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Incapable`] if the server does not offer STARTTLS,
    /// or the TLS handshake error.
    pub async fn starttls(&self) -> Result<()> {
        let mut exchange = self.acquire(Need::NotAuthenticated)?;
        exchange.starttls().await
    }

    /// LOGIN
    ///
    /// # Errors
    ///
    /// Returns [`Error::Incapable`] when the server advertises
    /// LOGINDISABLED and [`ConnectionError::LoginRejected`] on NO.
    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        let mut exchange = self.acquire(Need::NotAuthenticated)?;
        exchange.login(username, password).await?;
        exchange.after_login().await
    }

    /// AUTHENTICATE with `mechanism`, using SASL-IR when offered.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Incapable`] when the mechanism is not advertised and
    /// [`ConnectionError::AuthenticationFailed`] on NO.
    pub async fn authenticate(&self, mechanism: &mut dyn SaslMechanism) -> Result<()> {
        let mut exchange = self.acquire(Need::NotAuthenticated)?;
        exchange.authenticate(mechanism).await?;
        exchange.after_login().await
    }
}

/// Resolves on cancel; never resolves once the connect task is gone.
async fn cancel_requested(flag: &mut watch::Receiver<bool>) {
    if flag.wait_for(|c| *c).await.is_err() {
        std::future::pending::<()>().await;
    }
}

fn check_cancel(flag: &watch::Receiver<bool>) -> Result<()> {
    if *flag.borrow() {
        Err(Error::Cancelled)
    } else {
        Ok(())
    }
}

impl<C: Connector> Exchange<C> {
    /// Transport, greeting, STARTTLS, authentication, post-login queries.
    async fn establish(
        &mut self,
        credentials: Credentials,
        flag: &watch::Receiver<bool>,
    ) -> Result<()> {
        let session = self.session().clone();
        let config = session.config();
        tracing::info!(host = %config.host, port = config.port, "connecting");

        let stream = tokio::time::timeout(
            config.connect_timeout,
            session.inner.connector.connect(config),
        )
        .await
        .map_err(|_| Error::Timeout {
            kind: TimeoutKind::Connect,
            after: config.connect_timeout,
        })??;
        self.attach(stream);

        let (status, code, text) = self.greeting().await?;
        {
            let mut shared = session.shared();
            shared.greeting = Some(text.clone());
            if let Some(ResponseCode::Capability(caps)) = &code {
                shared.capabilities = caps.iter().cloned().collect();
            }
            shared.state = if status == Status::PreAuth {
                SessionState::Authenticated
            } else {
                SessionState::NotAuthenticated
            };
        }
        tracing::debug!(%text, "greeting");
        check_cancel(flag)?;

        if session.capabilities().is_empty() {
            self.refresh_capabilities().await?;
        }
        if config.security == Security::StartTls && status != Status::PreAuth {
            self.starttls().await?;
        }
        check_cancel(flag)?;

        if status != Status::PreAuth {
            match credentials {
                Credentials::Login { username, password } => {
                    self.login(&username, &password).await?;
                }
                Credentials::Sasl(mut mechanism) => {
                    self.authenticate(mechanism.as_mut()).await?;
                }
                Credentials::None => return Ok(()),
            }
        }
        check_cancel(flag)?;
        self.after_login().await
    }

    async fn starttls(&mut self) -> Result<()> {
        let session = self.session().clone();
        if !session.has_capability(&Capability::StartTls) {
            return Err(Error::Incapable {
                capability: "STARTTLS".into(),
            });
        }
        self.run(&Command::StartTls).await?.into_result()?;

        let config = session.config();
        let plain = self.detach().ok_or(Error::ProtocolViolation(Violation::NotConnected))?;
        let upgraded = tokio::time::timeout(
            config.connect_timeout,
            session.inner.connector.upgrade(plain, &config.host),
        )
        .await;
        let stream = match upgraded {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(self.fail(e)),
            Err(_) => {
                return Err(self.fail(Error::Timeout {
                    kind: TimeoutKind::Connect,
                    after: config.connect_timeout,
                }));
            }
        };
        self.attach(stream);
        tracing::info!(host = %config.host, "TLS established");

        // Capabilities from before the upgrade must not be trusted.
        session.shared().capabilities = crate::types::CapabilitySet::default();
        self.refresh_capabilities().await?;
        Ok(())
    }

    async fn login(&mut self, username: &str, password: &str) -> Result<()> {
        if self.session().has_capability(&Capability::LoginDisabled) {
            return Err(Error::Incapable {
                capability: "LOGIN".into(),
            });
        }
        let result = self
            .run(&Command::Login {
                username: username.to_string(),
                password: password.to_string(),
            })
            .await?;
        if !result.is_ok() {
            return Err(ConnectionError::LoginRejected(result.text).into());
        }
        tracing::info!(username, "logged in");
        self.authenticated(&result);
        Ok(())
    }

    async fn authenticate(&mut self, mechanism: &mut dyn SaslMechanism) -> Result<()> {
        let session = self.session().clone();
        let name = mechanism.name().to_ascii_uppercase();
        if !session.shared().capabilities.has_auth(&name) {
            return Err(Error::Incapable {
                capability: format!("AUTH={name}"),
            });
        }
        let initial_response = if session.has_capability(&Capability::SaslIr) {
            mechanism.initial_response()
        } else {
            None
        };
        let command = Command::Authenticate {
            mechanism: name.clone(),
            initial_response,
        };
        let result = self.run_sasl(&command, mechanism).await?;
        if !result.is_ok() {
            return Err(ConnectionError::AuthenticationFailed(result.text).into());
        }
        tracing::info!(mechanism = %name, "authenticated");
        self.authenticated(&result);
        Ok(())
    }

    fn authenticated(&self, result: &super::CommandResult) {
        let mut shared = self.session().shared();
        shared.state = SessionState::Authenticated;
        if !result.has_code(&ResponseCode::Capability(Vec::new())) {
            // Stale until after_login re-reads them.
            shared.capabilities = crate::types::CapabilitySet::default();
        }
    }

    /// Post-login CAPABILITY, NAMESPACE and ID.
    async fn after_login(&mut self) -> Result<()> {
        let session = self.session().clone();
        if session.capabilities().is_empty() {
            self.refresh_capabilities().await?;
        }
        if !session.config().request_namespace_and_id {
            return Ok(());
        }
        if session.has_capability(&Capability::Namespace) {
            let result = self.run(&Command::Namespace).await?;
            let namespaces = result.responses.into_iter().find_map(|r| match r {
                UntaggedResponse::Namespace(ns) => Some(ns),
                _ => None,
            });
            session.shared().namespaces = namespaces;
        }
        if session.has_capability(&Capability::Id) {
            let parameters = Some(session.config().client_id.clone()).filter(|p| !p.is_empty());
            let result = self.run(&Command::Id { parameters }).await?;
            let server_id = result.responses.into_iter().find_map(|r| match r {
                UntaggedResponse::Id(fields) => Some(fields),
                _ => None,
            });
            session.shared().server_id = server_id;
        }
        Ok(())
    }
}
