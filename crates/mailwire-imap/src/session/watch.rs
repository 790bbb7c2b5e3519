//! Waiting for mailbox changes with IDLE or NOOP polling.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::{Exchange, Need, Session};
use crate::command::{Command, FetchAttribute, FetchItems};
use crate::connection::Connector;
use crate::error::{Error, Result, Violation};
use crate::model::{Message, SelectedMailbox};
use crate::types::{Capability, SequenceSet};

/// Poll interval used when the caller gives none.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Poll intervals must stay below this (servers drop idle clients at 30
/// minutes).
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Which watch operation is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WatchKind {
    /// Ends when messages arrive; reports them.
    Arrivals,
    /// Runs until stopped; changes reach listeners only.
    Idle,
}

/// Marker stored on the session while a watch runs.
pub(crate) struct Active {
    kind: WatchKind,
    stop: Arc<watch::Sender<bool>>,
    task: JoinHandle<Result<Vec<Message>>>,
}

/// Asks the loop to stop when the blocking caller goes away.
struct StopOnDrop(Arc<watch::Sender<bool>>);

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        self.0.send_replace(true);
    }
}

/// Validated watch parameters.
#[derive(Debug, Clone, Copy)]
struct Plan {
    kind: WatchKind,
    timeout: Option<Duration>,
    poll: Duration,
    push: bool,
}

impl<C: Connector> Session<C> {
    fn plan(
        &self,
        kind: WatchKind,
        timeout: Option<Duration>,
        poll_interval: Option<Duration>,
    ) -> Result<Plan> {
        let poll = poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL);
        if poll.is_zero() || poll >= MAX_POLL_INTERVAL {
            return Err(Violation::InvalidArgument.into());
        }
        let push = self.has_capability(&Capability::Idle);
        if !push && timeout.is_none() {
            // Polling forever never reports progress.
            return Err(Violation::InvalidArgument.into());
        }
        Ok(Plan {
            kind,
            timeout,
            poll,
            push,
        })
    }

    /// Waits for new messages and returns them with UID and FLAGS fetched.
    ///
    /// Uses IDLE when advertised, otherwise NOOP every `poll_interval`
    /// (default 10 minutes). `timeout` of zero checks once without waiting;
    /// `None` waits until messages arrive, which needs IDLE.
    ///
    /// Arrivals are counted net of expunges seen during the wait. Dropping
    /// the returned future stops the loop, which still sends DONE before
    /// releasing the session.
    ///
    /// # Errors
    ///
    /// Returns [`Violation::InvalidArgument`] for a zero or too long poll
    /// interval or an unbounded poll, and [`Violation::WatchActive`] if a
    /// watch is already running.
    pub async fn watch(
        &self,
        timeout: Option<Duration>,
        poll_interval: Option<Duration>,
    ) -> Result<Vec<Message>> {
        let (reply, outcome) = oneshot::channel();
        let stop = self.launch(WatchKind::Arrivals, timeout, poll_interval, Some(reply))?;
        let _stop = StopOnDrop(stop);
        outcome.await.unwrap_or(Err(Error::Cancelled))
    }

    /// Starts [`watch`](Self::watch) in the background.
    ///
    /// # Errors
    ///
    /// As for [`watch`](Self::watch), checked before anything is sent.
    pub fn start_watch(
        &self,
        timeout: Option<Duration>,
        poll_interval: Option<Duration>,
    ) -> Result<()> {
        self.spawn_watch(WatchKind::Arrivals, timeout, poll_interval)
    }

    /// Stops the background watch and returns the messages that arrived.
    /// A blocking [`watch`](Self::watch) is stopped too; its own caller
    /// receives the messages.
    ///
    /// # Errors
    ///
    /// Returns [`Violation::NoWatchActive`] if nothing is running and
    /// [`Violation::WatchKindMismatch`] if the running watch was started
    /// with [`start_idle`](Self::start_idle).
    pub async fn stop_watch(&self) -> Result<Vec<Message>> {
        self.stop(WatchKind::Arrivals).await
    }

    /// Starts an IDLE (or polling) loop that only feeds change listeners.
    ///
    /// # Errors
    ///
    /// As for [`watch`](Self::watch).
    pub fn start_idle(
        &self,
        timeout: Option<Duration>,
        poll_interval: Option<Duration>,
    ) -> Result<()> {
        self.spawn_watch(WatchKind::Idle, timeout, poll_interval)
    }

    /// Stops a loop started with [`start_idle`](Self::start_idle).
    ///
    /// # Errors
    ///
    /// Returns [`Violation::NoWatchActive`] or
    /// [`Violation::WatchKindMismatch`], or the error that ended the loop.
    pub async fn stop_idle(&self) -> Result<()> {
        self.stop(WatchKind::Idle).await.map(|_| ())
    }

    fn spawn_watch(
        &self,
        kind: WatchKind,
        timeout: Option<Duration>,
        poll_interval: Option<Duration>,
    ) -> Result<()> {
        self.launch(kind, timeout, poll_interval, None).map(|_| ())
    }

    /// Runs the watch loop on its own task so that it always finishes the
    /// protocol exchange. With `reply`, the result goes to a blocking caller
    /// and the marker is cleared when the loop ends.
    fn launch(
        &self,
        kind: WatchKind,
        timeout: Option<Duration>,
        poll_interval: Option<Duration>,
        reply: Option<oneshot::Sender<Result<Vec<Message>>>>,
    ) -> Result<Arc<watch::Sender<bool>>> {
        let plan = self.plan(kind, timeout, poll_interval)?;
        let mut exchange = self.acquire(Need::Selected)?;
        let (stop, mut stopped) = watch::channel(false);
        let stop = Arc::new(stop);
        let session = self.clone();
        // The marker must be in place before the task can clear it.
        let mut shared = self.shared();
        let task = tokio::spawn(async move {
            let outcome = exchange.watch_loop(plan, &mut stopped).await;
            let Some(reply) = reply else {
                return outcome;
            };
            // Still holding the exchange, so no other watch can own the marker.
            session.shared().watch = None;
            drop(exchange);
            if reply.send(outcome).is_err() {
                tracing::debug!("watch caller went away");
            }
            Ok(Vec::new())
        });
        shared.watch = Some(Active {
            kind,
            stop: Arc::clone(&stop),
            task,
        });
        drop(shared);
        tracing::debug!(?kind, push = plan.push, "watch started");
        Ok(stop)
    }

    /// Signals the running watch and waits for its loop to finish.
    async fn stop(&self, kind: WatchKind) -> Result<Vec<Message>> {
        let active = {
            let mut shared = self.shared();
            match shared.watch.take_if(|active| active.kind == kind) {
                Some(active) => active,
                None if shared.watch.is_some() => {
                    return Err(Violation::WatchKindMismatch.into());
                }
                None => return Err(Violation::NoWatchActive.into()),
            }
        };
        active.stop.send_replace(true);
        active.task.await.unwrap_or(Err(Error::Cancelled))
    }

    /// Stops whatever watch is running. Used on dispose.
    pub(crate) async fn stop_any_watch(&self) -> Result<()> {
        let kind = self.shared().watch.as_ref().map(|active| active.kind);
        match kind {
            Some(kind) => self.stop(kind).await.map(|_| ()),
            None => Ok(()),
        }
    }
}

impl<C: Connector> Exchange<C> {
    fn mark_arrivals(&self) {
        if let Some(selected) = self.session().shared().selected.as_mut() {
            selected.mark_arrivals();
        }
    }

    fn arrivals(&self) -> Option<SequenceSet> {
        self.session()
            .shared()
            .selected
            .as_ref()
            .and_then(SelectedMailbox::arrivals)
    }

    async fn watch_loop(
        &mut self,
        plan: Plan,
        stop: &mut watch::Receiver<bool>,
    ) -> Result<Vec<Message>> {
        self.mark_arrivals();
        let deadline = plan.timeout.map(|t| Instant::now() + t);
        if plan.timeout == Some(Duration::ZERO) {
            self.run(&Command::Noop).await?.into_result()?;
        } else if plan.push {
            self.idle_until(plan.kind, deadline, stop).await?;
        } else {
            self.poll_until(plan.kind, deadline, plan.poll, stop).await?;
        }
        match plan.kind {
            WatchKind::Arrivals => self.fetch_arrivals().await,
            WatchKind::Idle => Ok(Vec::new()),
        }
    }

    async fn idle_until(
        &mut self,
        kind: WatchKind,
        deadline: Option<Instant>,
        stop: &mut watch::Receiver<bool>,
    ) -> Result<()> {
        let period = self.session().config().idle_timeout;
        loop {
            let tag = self.begin_idle().await?;
            let reissue = Instant::now() + period;
            let until = deadline.map_or(reissue, |d| d.min(reissue));
            let mut finished = false;

            let completion = loop {
                tokio::select! {
                    ready = self.readable() => {
                        ready?;
                        if let Some(result) = self.idle_step(&tag).await? {
                            break Some(result);
                        }
                        if kind == WatchKind::Arrivals && self.arrivals().is_some() {
                            finished = true;
                            break None;
                        }
                    }
                    () = tokio::time::sleep_until(until) => break None,
                    () = stopped(stop) => {
                        finished = true;
                        break None;
                    }
                }
            };
            match completion {
                // The server ended the IDLE on its own.
                Some(result) => {
                    result.into_result()?;
                }
                None => {
                    self.done(&tag).await?.into_result()?;
                }
            }
            if finished || deadline.is_some_and(|d| Instant::now() >= d) {
                return Ok(());
            }
            tracing::debug!("re-issuing IDLE");
        }
    }

    async fn poll_until(
        &mut self,
        kind: WatchKind,
        deadline: Option<Instant>,
        poll: Duration,
        stop: &mut watch::Receiver<bool>,
    ) -> Result<()> {
        loop {
            self.run(&Command::Noop).await?.into_result()?;
            if kind == WatchKind::Arrivals && self.arrivals().is_some() {
                return Ok(());
            }
            let now = Instant::now();
            if deadline.is_some_and(|d| now >= d) {
                return Ok(());
            }
            let next = now + poll;
            let until = deadline.map_or(next, |d| d.min(next));
            tokio::select! {
                () = tokio::time::sleep_until(until) => {}
                () = stopped(stop) => return Ok(()),
            }
        }
    }

    async fn fetch_arrivals(&mut self) -> Result<Vec<Message>> {
        let Some(sequence) = self.arrivals() else {
            return Ok(Vec::new());
        };
        let command = Command::Fetch {
            sequence,
            items: FetchItems::Items(vec![FetchAttribute::Uid, FetchAttribute::Flags]),
            uid: false,
            changed_since: None,
        };
        let result = self.run(&command).await?.into_result()?;
        let shared = self.session().shared();
        let Some(selected) = shared.selected.as_ref() else {
            return Err(Error::MailboxClosed);
        };
        Ok(result
            .fetched
            .iter()
            .filter_map(|(_, message)| selected.message(message.slot))
            .collect())
    }
}

/// Resolves once a stop is requested or every stop handle is gone.
async fn stopped(stop: &mut watch::Receiver<bool>) {
    if stop.wait_for(|s| *s).await.is_err() {
        tracing::trace!("watch stop handle dropped");
    }
}
