//! Mailbox listing, management and selection.

use serde::Serialize;

use super::{Exchange, Need, Session};
use crate::command::{Command, ListExtendedOptions, StatusAttribute};
use crate::connection::Connector;
use crate::error::{Error, Result, Violation};
use crate::events::ChangeEvent;
use crate::model::{MailboxHandle, OpenedMailbox, SelectedMailbox, SessionState};
use crate::parser::{Namespaces, QuotaResource, UntaggedResponse};
use crate::types::{Capability, ListResponse, Mailbox, MailboxAttribute, MailboxStatus};

/// Which mailboxes [`Session::list_mailboxes`] returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct ListOptions {
    /// Only subscribed mailboxes (LSUB, or LIST-EXTENDED `SUBSCRIBED`).
    pub subscribed_only: bool,
    /// Fill [`ListResponse::status`] for every selectable mailbox.
    pub request_status: bool,
    /// Only the top hierarchy level (`%` instead of `*`).
    pub top_level_only: bool,
    /// Include remote mailboxes (LIST-EXTENDED `REMOTE`).
    pub remote: bool,
}

/// Usage under one quota root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quota {
    /// Quota root name.
    pub root: String,
    /// Resource usage and limits.
    pub resources: Vec<QuotaResource>,
}

fn listed(responses: Vec<UntaggedResponse>) -> (Vec<ListResponse>, Vec<(Mailbox, MailboxStatus)>) {
    let mut entries = Vec::new();
    let mut statuses = Vec::new();
    for response in responses {
        match response {
            UntaggedResponse::List(entry)
            | UntaggedResponse::Lsub(entry)
            | UntaggedResponse::XList(entry) => entries.push(entry),
            UntaggedResponse::Status { mailbox, status } => statuses.push((mailbox, status)),
            _ => {}
        }
    }
    (entries, statuses)
}

impl<C: Connector> Session<C> {
    fn require(&self, capability: Capability) -> Result<()> {
        if self.has_capability(&capability) {
            Ok(())
        } else {
            Err(Error::Incapable {
                capability: capability.to_string(),
            })
        }
    }

    fn status_items(&self) -> Vec<StatusAttribute> {
        let mut items = StatusAttribute::STANDARD.to_vec();
        if self.has_capability(&Capability::CondStore) {
            items.push(StatusAttribute::HighestModSeq);
        }
        items
    }

    /// Lists mailboxes.
    ///
    /// With `request_status`, counters come from LIST-STATUS when the server
    /// has it and from one STATUS per mailbox otherwise.
    ///
    /// # Errors
    ///
    /// Fails if the exchange fails or the server refuses.
    pub async fn list_mailboxes(&self, options: ListOptions) -> Result<Vec<ListResponse>> {
        let pattern = if options.top_level_only { "%" } else { "*" };
        let mut exchange = self.acquire(Need::Authenticated)?;
        exchange.list("", pattern, options).await
    }

    /// Looks up one mailbox by its exact full name.
    ///
    /// The name is sent as a LIST pattern, so wildcard characters in it may
    /// match other mailboxes too; only the entry whose name is identical is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MailboxNotFound`] if no such mailbox exists.
    pub async fn get_mailbox(&self, name: &str) -> Result<ListResponse> {
        let mut exchange = self.acquire(Need::Authenticated)?;
        exchange.find(name).await
    }

    /// Looks up a mailbox, creating it when missing.
    ///
    /// # Errors
    ///
    /// Fails if CREATE is refused.
    pub async fn get_or_create_mailbox(&self, name: &str) -> Result<ListResponse> {
        let mut exchange = self.acquire(Need::Authenticated)?;
        match exchange.find(name).await {
            Err(Error::MailboxNotFound { .. }) => {
                exchange.create(&Mailbox::new(name)).await?;
                exchange.find(name).await
            }
            other => other,
        }
    }

    /// Child mailboxes of `parent`.
    ///
    /// # Errors
    ///
    /// Fails if the exchange fails or the server refuses.
    pub async fn children(
        &self,
        parent: &ListResponse,
        options: ListOptions,
    ) -> Result<Vec<ListResponse>> {
        let Some(pattern) = parent.children_pattern(options.top_level_only) else {
            return Ok(Vec::new());
        };
        let mut exchange = self.acquire(Need::Authenticated)?;
        let mut children = exchange.list("", &pattern, options).await?;
        children.retain(|child| child.mailbox != parent.mailbox);
        Ok(children)
    }

    /// CREATE
    ///
    /// # Errors
    ///
    /// Fails if the server refuses, e.g. `[ALREADYEXISTS]`.
    pub async fn create_mailbox(&self, name: &str) -> Result<()> {
        let mut exchange = self.acquire(Need::Authenticated)?;
        exchange.create(&Mailbox::new(name)).await
    }

    /// CREATE `leaf` under `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`Violation::NoInferiors`] if `parent` cannot have children.
    pub async fn create_child(&self, parent: &ListResponse, leaf: &str) -> Result<ListResponse> {
        let name = parent
            .child_name(leaf)
            .filter(|_| parent.can_have_children())
            .ok_or(Error::ProtocolViolation(Violation::NoInferiors))?;
        let mut exchange = self.acquire(Need::Authenticated)?;
        exchange.create(&name).await?;
        Ok(ListResponse::new(name, parent.delimiter, Vec::new()))
    }

    /// DELETE
    ///
    /// # Errors
    ///
    /// Fails if the server refuses.
    pub async fn delete_mailbox(&self, name: &str) -> Result<()> {
        let mut exchange = self.acquire(Need::Authenticated)?;
        let command = Command::Delete {
            mailbox: Mailbox::new(name),
        };
        exchange.run(&command).await?.into_result()?;
        Ok(())
    }

    /// RENAME
    ///
    /// # Errors
    ///
    /// Returns [`Violation::RenameToSelf`] when the names are equal.
    pub async fn rename_mailbox(&self, from: &str, to: &str) -> Result<()> {
        let (from, to) = (Mailbox::new(from), Mailbox::new(to));
        if from == to {
            return Err(Violation::RenameToSelf.into());
        }
        let mut exchange = self.acquire(Need::Authenticated)?;
        exchange.run(&Command::Rename { from, to }).await?.into_result()?;
        Ok(())
    }

    /// SUBSCRIBE
    ///
    /// # Errors
    ///
    /// Fails if the server refuses.
    pub async fn subscribe(&self, name: &str) -> Result<()> {
        let mut exchange = self.acquire(Need::Authenticated)?;
        let command = Command::Subscribe {
            mailbox: Mailbox::new(name),
        };
        exchange.run(&command).await?.into_result()?;
        Ok(())
    }

    /// UNSUBSCRIBE
    ///
    /// # Errors
    ///
    /// Fails if the server refuses.
    pub async fn unsubscribe(&self, name: &str) -> Result<()> {
        let mut exchange = self.acquire(Need::Authenticated)?;
        let command = Command::Unsubscribe {
            mailbox: Mailbox::new(name),
        };
        exchange.run(&command).await?.into_result()?;
        Ok(())
    }

    /// STATUS with the standard counters (plus HIGHESTMODSEQ under CONDSTORE).
    ///
    /// # Errors
    ///
    /// Fails if the server refuses.
    pub async fn status(&self, name: &str) -> Result<MailboxStatus> {
        let items = self.status_items();
        let mut exchange = self.acquire(Need::Authenticated)?;
        exchange.status(&Mailbox::new(name), items).await
    }

    /// SELECT (or EXAMINE when `read_only`), closing any open mailbox.
    ///
    /// # Errors
    ///
    /// Fails if the server refuses; no mailbox is selected afterwards.
    pub async fn open(&self, name: &str, read_only: bool) -> Result<OpenedMailbox> {
        let mut exchange = self.acquire(Need::Authenticated)?;
        exchange.select(Mailbox::new(name), read_only).await
    }

    /// CLOSE: expunges `\Deleted` messages and deselects.
    ///
    /// # Errors
    ///
    /// Fails if no mailbox is selected or the server refuses.
    pub async fn close(&self) -> Result<()> {
        let mut exchange = self.acquire(Need::Selected)?;
        exchange.deselect(&Command::Close).await
    }

    /// UNSELECT when advertised, otherwise CLOSE.
    ///
    /// # Errors
    ///
    /// Fails if no mailbox is selected or the server refuses.
    pub async fn unselect(&self) -> Result<()> {
        let command = if self.has_capability(&Capability::Unselect) {
            Command::Unselect
        } else {
            Command::Close
        };
        let mut exchange = self.acquire(Need::Selected)?;
        exchange.deselect(&command).await
    }

    /// NOOP, applying whatever the server reports.
    ///
    /// # Errors
    ///
    /// Fails if the exchange fails.
    pub async fn refresh(&self) -> Result<()> {
        let mut exchange = self.acquire(Need::Authenticated)?;
        exchange.run(&Command::Noop).await?.into_result()?;
        Ok(())
    }

    /// CHECK
    ///
    /// # Errors
    ///
    /// Fails if no mailbox is selected or the server refuses.
    pub async fn check(&self) -> Result<()> {
        let mut exchange = self.acquire(Need::Selected)?;
        exchange.run(&Command::Check).await?.into_result()?;
        Ok(())
    }

    /// EXPUNGE
    ///
    /// # Errors
    ///
    /// Fails if no mailbox is selected or the server refuses.
    pub async fn expunge(&self) -> Result<()> {
        let mut exchange = self.acquire(Need::Selected)?;
        exchange.run(&Command::Expunge).await?.into_result()?;
        Ok(())
    }

    /// NAMESPACE
    ///
    /// # Errors
    ///
    /// Returns [`Error::Incapable`] without the NAMESPACE capability.
    pub async fn namespace(&self) -> Result<Namespaces> {
        self.require(Capability::Namespace)?;
        let mut exchange = self.acquire(Need::Authenticated)?;
        let result = exchange.run(&Command::Namespace).await?.into_result()?;
        let namespaces = result
            .responses
            .into_iter()
            .find_map(|r| match r {
                UntaggedResponse::Namespace(ns) => Some(ns),
                _ => None,
            })
            .unwrap_or_default();
        self.shared().namespaces = Some(namespaces.clone());
        Ok(namespaces)
    }

    /// ID: sends `parameters` (or NIL) and returns the server's fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Incapable`] without the ID capability.
    pub async fn send_id(
        &self,
        parameters: Option<Vec<(String, String)>>,
    ) -> Result<Vec<(String, Option<String>)>> {
        self.require(Capability::Id)?;
        let mut exchange = self.acquire(Need::Connected)?;
        let result = exchange.run(&Command::Id { parameters }).await?.into_result()?;
        let fields = result
            .responses
            .into_iter()
            .find_map(|r| match r {
                UntaggedResponse::Id(fields) => Some(fields),
                _ => None,
            })
            .unwrap_or_default();
        self.shared().server_id = Some(fields.clone());
        Ok(fields)
    }

    /// GETQUOTAROOT: the roots governing `mailbox` and their usage.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Incapable`] without the QUOTA capability.
    pub async fn quota_root(&self, mailbox: &str) -> Result<(Vec<String>, Vec<Quota>)> {
        self.require(Capability::Quota)?;
        let mut exchange = self.acquire(Need::Authenticated)?;
        let command = Command::GetQuotaRoot {
            mailbox: Mailbox::new(mailbox),
        };
        let result = exchange.run(&command).await?.into_result()?;
        let mut roots = Vec::new();
        let mut quotas = Vec::new();
        for response in result.responses {
            match response {
                UntaggedResponse::QuotaRoot { roots: r, .. } => roots.extend(r),
                UntaggedResponse::Quota { root, resources } => quotas.push(Quota { root, resources }),
                _ => {}
            }
        }
        Ok((roots, quotas))
    }

    /// GETQUOTA
    ///
    /// # Errors
    ///
    /// Returns [`Error::Incapable`] without the QUOTA capability.
    pub async fn quota(&self, root: &str) -> Result<Quota> {
        self.require(Capability::Quota)?;
        let mut exchange = self.acquire(Need::Authenticated)?;
        let command = Command::GetQuota {
            root: root.to_string(),
        };
        let result = exchange.run(&command).await?.into_result()?;
        Ok(result
            .responses
            .into_iter()
            .find_map(|r| match r {
                UntaggedResponse::Quota { root, resources } => Some(Quota { root, resources }),
                _ => None,
            })
            .unwrap_or_else(|| Quota {
                root: root.to_string(),
                resources: Vec::new(),
            }))
    }

    /// ENABLE: returns what the server actually enabled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Incapable`] without the ENABLE capability.
    pub async fn enable(&self, capabilities: &[&str]) -> Result<Vec<Capability>> {
        self.require(Capability::Enable)?;
        let mut exchange = self.acquire(Need::Authenticated)?;
        let command = Command::Enable {
            capabilities: capabilities.iter().map(ToString::to_string).collect(),
        };
        let result = exchange.run(&command).await?.into_result()?;
        Ok(result
            .responses
            .into_iter()
            .filter_map(|r| match r {
                UntaggedResponse::Enabled(caps) => Some(caps),
                _ => None,
            })
            .flatten()
            .collect())
    }
}

impl<C: Connector> Exchange<C> {
    pub(crate) async fn list(
        &mut self,
        reference: &str,
        pattern: &str,
        options: ListOptions,
    ) -> Result<Vec<ListResponse>> {
        let session = self.session().clone();
        let extended = session.has_capability(&Capability::ListExtended);
        let list_status = options.request_status && session.has_capability(&Capability::ListStatus);
        let (reference, pattern) = (reference.to_string(), pattern.to_string());

        let command = if extended && (options.subscribed_only || options.remote || list_status) {
            Command::ListExtended {
                reference,
                pattern,
                options: ListExtendedOptions {
                    subscribed: options.subscribed_only,
                    remote: options.remote,
                    return_children: session.has_capability(&Capability::Children),
                    return_status: if list_status {
                        session.status_items()
                    } else {
                        Vec::new()
                    },
                },
            }
        } else if options.subscribed_only {
            Command::Lsub { reference, pattern }
        } else if session.has_capability(&Capability::XList)
            && !session.has_capability(&Capability::SpecialUse)
        {
            Command::Xlist { reference, pattern }
        } else {
            Command::List { reference, pattern }
        };

        let result = self.run(&command).await?.into_result()?;
        let (mut entries, statuses) = listed(result.responses);
        if options.subscribed_only && extended {
            entries.retain(|e| !e.has(&MailboxAttribute::NonExistent));
        }

        if options.request_status {
            if list_status {
                for (mailbox, status) in statuses {
                    if let Some(entry) = entries.iter_mut().find(|e| e.mailbox == mailbox) {
                        entry.status = Some(status);
                    }
                }
            } else {
                let items = session.status_items();
                for entry in entries.iter_mut().filter(|e| e.is_selectable()) {
                    entry.status = Some(self.status(&entry.mailbox, items.clone()).await?);
                }
            }
        }
        Ok(entries)
    }

    pub(crate) async fn find(&mut self, name: &str) -> Result<ListResponse> {
        let wanted = Mailbox::new(name);
        let entries = self.list("", wanted.as_str(), ListOptions::default()).await?;
        entries
            .into_iter()
            .find(|e| e.mailbox == wanted && !e.has(&MailboxAttribute::NonExistent))
            .ok_or_else(|| Error::MailboxNotFound {
                name: name.to_string(),
            })
    }

    pub(crate) async fn create(&mut self, mailbox: &Mailbox) -> Result<()> {
        let command = Command::Create {
            mailbox: mailbox.clone(),
        };
        self.run(&command).await?.into_result()?;
        Ok(())
    }

    async fn status(&mut self, mailbox: &Mailbox, items: Vec<StatusAttribute>) -> Result<MailboxStatus> {
        let command = Command::Status {
            mailbox: mailbox.clone(),
            items,
        };
        let result = self.run(&command).await?.into_result()?;
        Ok(result
            .responses
            .into_iter()
            .find_map(|r| match r {
                UntaggedResponse::Status { status, .. } => Some(status),
                _ => None,
            })
            .unwrap_or_default())
    }

    /// Ends the current selection and starts a new one under a fresh
    /// generation.
    fn begin_selection(&self, mailbox: Mailbox, read_only: bool) -> Vec<ChangeEvent> {
        let session = self.session();
        let mut events = Vec::new();
        let mut shared = session.shared();
        if let Some(previous) = shared.selected.take() {
            events.push(ChangeEvent::MailboxClosed {
                mailbox: previous.handle,
            });
        }
        shared.generation += 1;
        let handle = MailboxHandle {
            session: session.id(),
            generation: shared.generation,
        };
        shared.selected = Some(SelectedMailbox::new(handle, mailbox, read_only));
        shared.state = SessionState::Selected;
        events
    }

    pub(crate) async fn select(&mut self, mailbox: Mailbox, read_only: bool) -> Result<OpenedMailbox> {
        let session = self.session().clone();
        let condstore = session.has_capability(&Capability::CondStore);
        let command = if read_only {
            Command::Examine {
                mailbox: mailbox.clone(),
                condstore,
            }
        } else {
            Command::Select {
                mailbox: mailbox.clone(),
                condstore,
            }
        };

        let closed = self.begin_selection(mailbox, read_only);
        session.publish(&closed);

        let outcome = self.run_quiet(&command).await.and_then(super::CommandResult::into_result);
        if let Err(e) = outcome {
            let mut shared = session.shared();
            if shared.state == SessionState::Selected {
                shared.selected = None;
                shared.state = SessionState::Authenticated;
            }
            return Err(e);
        }

        let opened = session
            .shared()
            .selected
            .as_ref()
            .map(SelectedMailbox::snapshot)
            .ok_or(Error::MailboxClosed)?;
        tracing::info!(mailbox = %opened.name, exists = opened.exists, read_only = opened.read_only, "mailbox opened");
        session.publish(&[ChangeEvent::MailboxOpened {
            mailbox: opened.clone(),
        }]);
        Ok(opened)
    }

    async fn deselect(&mut self, command: &Command) -> Result<()> {
        self.run(command).await?.into_result()?;
        let session = self.session().clone();
        let closed = {
            let mut shared = session.shared();
            shared.state = SessionState::Authenticated;
            shared.generation += 1;
            shared.selected.take()
        };
        if let Some(closed) = closed {
            session.publish(&[ChangeEvent::MailboxClosed {
                mailbox: closed.handle,
            }]);
        }
        Ok(())
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
    use crate::connection::Config;

    #[test]
    fn listed_splits_entries_and_status() {
        let entry = ListResponse::new(Mailbox::new("Sent"), Some('/'), Vec::new());
        let (entries, statuses) = listed(vec![
            UntaggedResponse::List(entry.clone()),
            UntaggedResponse::Status {
                mailbox: Mailbox::new("Sent"),
                status: MailboxStatus::default(),
            },
            UntaggedResponse::Exists(3),
        ]);
        assert_eq!(entries, vec![entry]);
        assert_eq!(statuses.len(), 1);
    }

    #[tokio::test]
    async fn rename_to_self_is_rejected_before_io() {
        let session = Session::new(Config::new("imap.invalid"));
        let err = session.rename_mailbox("inbox", "INBOX").await.unwrap_err();
        assert!(matches!(err, Error::ProtocolViolation(Violation::RenameToSelf)));
    }

    #[tokio::test]
    async fn child_of_noinferiors_is_rejected() {
        let session = Session::new(Config::new("imap.invalid"));
        let parent = ListResponse::new(
            Mailbox::new("Leaf"),
            Some('/'),
            vec![MailboxAttribute::NoInferiors],
        );
        let err = session.create_child(&parent, "x").await.unwrap_err();
        assert!(matches!(err, Error::ProtocolViolation(Violation::NoInferiors)));
    }
}
