//! Copy and move, within one session or across two.
//!
//! Inside one session the server copies natively. Across sessions the
//! messages are downloaded from the source and appended to the destination;
//! a move marks a source message `\Deleted` only once its APPEND succeeded.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use super::messages::{Target, append_uid};
use super::{CommandResult, Exchange, Need, Session};
use crate::command::{Command, FetchAttribute, FetchItems, StoreAction};
use crate::connection::Connector;
use crate::error::{Error, Result};
use crate::model::MessageRef;
use crate::parser::{FetchItem, UntaggedResponse};
use crate::types::{Flag, Flags, Mailbox, ResponseCode, SequenceSet, Status, Uid, UidValidity};

/// Copy or move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransferMode {
    /// Leave the source messages alone.
    Copy,
    /// Mark the source messages `\Deleted` after a successful copy.
    Move,
}

/// What a transfer did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReport {
    /// Copy or move.
    pub mode: TransferMode,
    /// Destination mailbox.
    pub destination: Mailbox,
    /// Source messages that reached the destination.
    pub transferred: Vec<MessageRef>,
    /// Destination UIDVALIDITY, from COPYUID/APPENDUID.
    pub uid_validity: Option<UidValidity>,
    /// Source UID to destination UID, when the server reported them.
    pub uid_mapping: Vec<(Uid, Uid)>,
    /// The destination was created on `[TRYCREATE]`.
    pub created: bool,
}

impl TransferReport {
    fn new(mode: TransferMode, destination: Mailbox) -> Self {
        Self {
            mode,
            destination,
            transferred: Vec::new(),
            uid_validity: None,
            uid_mapping: Vec::new(),
            created: false,
        }
    }
}

/// One downloaded message.
struct Download {
    message: MessageRef,
    uid: Option<Uid>,
    flags: Option<Flags>,
    internal_date: Option<DateTime<FixedOffset>>,
    body: Vec<u8>,
}

impl Download {
    fn from_items(message: MessageRef, items: &[FetchItem]) -> Option<Self> {
        let mut download = Self {
            message,
            uid: None,
            flags: None,
            internal_date: None,
            body: Vec::new(),
        };
        let mut has_body = false;
        for item in items {
            match item {
                FetchItem::Uid(uid) => download.uid = Some(*uid),
                FetchItem::Flags(flags) => download.flags = Some(flags.clone()),
                FetchItem::InternalDate(date) => download.internal_date = Some(*date),
                FetchItem::Body {
                    section: None,
                    data: Some(data),
                    ..
                } => {
                    download.body.clone_from(data);
                    has_body = true;
                }
                _ => {}
            }
        }
        has_body.then_some(download)
    }
}

fn is_try_create(result: &CommandResult) -> bool {
    result.status == Status::No && result.has_code(&ResponseCode::TryCreate)
}

fn deleted() -> StoreAction {
    StoreAction::add(Flags::from_vec(vec![Flag::Deleted]))
}

impl<C: Connector> Session<C> {
    /// Copies `messages` to `mailbox` on `destination`.
    ///
    /// `destination` may be this session or another one, even to another
    /// server. With `try_create`, a missing destination is created once.
    ///
    /// # Errors
    ///
    /// Fails before any I/O if a handle is stale, expunged or from another
    /// session, or if `destination` is not authenticated.
    pub async fn copy_messages<D: Connector>(
        &self,
        messages: &[MessageRef],
        destination: &Session<D>,
        mailbox: &str,
        try_create: bool,
    ) -> Result<TransferReport> {
        self.transfer(TransferMode::Copy, messages, destination, mailbox, try_create)
            .await
    }

    /// Like [`copy_messages`](Self::copy_messages), then marks the source
    /// messages `\Deleted`. Nothing is expunged.
    ///
    /// # Errors
    ///
    /// See [`copy_messages`](Self::copy_messages).
    pub async fn move_messages<D: Connector>(
        &self,
        messages: &[MessageRef],
        destination: &Session<D>,
        mailbox: &str,
        try_create: bool,
    ) -> Result<TransferReport> {
        self.transfer(TransferMode::Move, messages, destination, mailbox, try_create)
            .await
    }

    /// Copy or move, checking every precondition up front.
    ///
    /// # Errors
    ///
    /// See [`copy_messages`](Self::copy_messages).
    pub async fn transfer<D: Connector>(
        &self,
        mode: TransferMode,
        messages: &[MessageRef],
        destination: &Session<D>,
        mailbox: &str,
        try_create: bool,
    ) -> Result<TransferReport> {
        let mailbox = Mailbox::new(mailbox);
        let mut report = TransferReport::new(mode, mailbox.clone());

        if destination.id() == self.id() {
            let mut exchange = self.acquire(Need::Authenticated)?;
            let Some(target) = self.target(messages)? else {
                return Ok(report);
            };
            exchange.copy(&target, &mailbox, try_create, &mut report).await?;
            if mode == TransferMode::Move {
                exchange.store(&target, deleted()).await?;
            }
            return Ok(report);
        }

        let mut exchange = self.acquire(Need::Authenticated)?;
        let Some(target) = self.target(messages)? else {
            return Ok(report);
        };
        destination.check_authenticated()?;
        let downloads = exchange.download(&target).await?;
        drop(exchange);

        for download in downloads {
            let appended = destination
                .append_download(&download, &mailbox, try_create, &mut report)
                .await?;
            if mode == TransferMode::Move {
                let mut exchange = self.acquire(Need::Authenticated)?;
                let Some(single) = self.target(&[download.message])? else {
                    continue;
                };
                exchange.store(&single, deleted()).await?;
            }
            if let (Some(source), Some(dest)) = (download.uid, appended) {
                report.uid_mapping.push((source, dest));
            }
            report.transferred.push(download.message);
        }
        tracing::debug!(mode = ?mode, count = report.transferred.len(), "cross-session transfer done");
        Ok(report)
    }

    /// Fails unless the session could run an authenticated command now.
    fn check_authenticated(&self) -> Result<()> {
        drop(self.acquire(Need::Authenticated)?);
        Ok(())
    }

    /// APPEND one downloaded message, creating the mailbox once on
    /// `[TRYCREATE]`. Returns the destination UID when reported.
    async fn append_download(
        &self,
        download: &Download,
        mailbox: &Mailbox,
        try_create: bool,
        report: &mut TransferReport,
    ) -> Result<Option<Uid>> {
        let mut exchange = self.acquire(Need::Authenticated)?;
        let command = Command::Append {
            mailbox: mailbox.clone(),
            flags: download.flags.clone(),
            internal_date: download.internal_date,
            message: download.body.clone(),
        };
        let mut result = exchange.run(&command).await?;
        if try_create && !report.created && is_try_create(&result) {
            exchange.create(mailbox).await?;
            report.created = true;
            result = exchange.run(&command).await?;
        }
        let result = result.into_result()?;
        Ok(append_uid(&result).and_then(|(validity, uids)| {
            report.uid_validity = Some(validity);
            uids.uids().first().copied()
        }))
    }
}

impl<C: Connector> Exchange<C> {
    async fn copy(
        &mut self,
        target: &Target,
        mailbox: &Mailbox,
        try_create: bool,
        report: &mut TransferReport,
    ) -> Result<()> {
        let command = Command::Copy {
            sequence: target.sequence.clone(),
            mailbox: mailbox.clone(),
            uid: target.uid,
        };
        let mut result = self.run(&command).await?;
        if try_create && is_try_create(&result) {
            self.create(mailbox).await?;
            report.created = true;
            result = self.run(&command).await?;
        }
        let result = result.into_result()?;
        if let Some(ResponseCode::CopyUid {
            uid_validity,
            source,
            destination,
        }) = &result.code
        {
            report.uid_validity = Some(*uid_validity);
            report.uid_mapping = source.uids().into_iter().zip(destination.uids()).collect();
        }
        report.transferred.clone_from(&target.refs);
        Ok(())
    }

    /// FETCH flags, date and full body of every target message.
    async fn download(&mut self, target: &Target) -> Result<Vec<Download>> {
        let command = Command::Fetch {
            sequence: target.sequence.clone(),
            items: FetchItems::items([
                FetchAttribute::Uid,
                FetchAttribute::Flags,
                FetchAttribute::InternalDate,
                FetchAttribute::Rfc822Size,
                FetchAttribute::full_body_peek(),
            ]),
            uid: target.uid,
            changed_since: None,
        };
        let result = self.run(&command).await?.into_result()?;
        let mut downloads = Vec::with_capacity(target.refs.len());
        for &message in &target.refs {
            let download = result
                .fetched
                .iter()
                .filter(|(_, r)| *r == message)
                .find_map(|&(index, _)| match result.responses.get(index) {
                    Some(UntaggedResponse::Fetch { items, .. }) => {
                        Download::from_items(message, items)
                    }
                    _ => None,
                });
            match download {
                Some(download) => downloads.push(download),
                None => {
                    let set = self
                        .session()
                        .target(&[message])?
                        .map_or_else(SequenceSet::all, |t| t.sequence);
                    return Err(Error::MessageNotFound { set });
                }
            }
        }
        Ok(downloads)
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
    use crate::model::{MailboxHandle, SessionId};

    fn handle() -> MessageRef {
        MessageRef {
            mailbox: MailboxHandle {
                session: SessionId::next(),
                generation: 1,
            },
            slot: 0,
        }
    }

    #[test]
    fn download_requires_full_body() {
        let items = vec![
            FetchItem::Uid(Uid::new(7).unwrap()),
            FetchItem::Flags(Flags::from_vec(vec![Flag::Answered])),
            FetchItem::Body {
                section: Some("HEADER".into()),
                origin: None,
                data: Some(b"x".to_vec()),
            },
        ];
        assert!(Download::from_items(handle(), &items).is_none());
    }

    #[test]
    fn download_keeps_flags_date_and_body() {
        let date = DateTime::parse_from_rfc3339("2024-03-01T10:00:00+01:00").unwrap();
        let items = vec![
            FetchItem::Uid(Uid::new(7).unwrap()),
            FetchItem::Flags(Flags::from_vec(vec![Flag::Answered])),
            FetchItem::InternalDate(date),
            FetchItem::Body {
                section: None,
                origin: None,
                data: Some(b"Subject: hi\r\n\r\nbody".to_vec()),
            },
        ];
        let download = Download::from_items(handle(), &items).unwrap();
        assert_eq!(download.uid, Uid::new(7));
        assert_eq!(download.internal_date, Some(date));
        assert!(download.flags.unwrap().contains(&Flag::Answered));
        assert_eq!(download.body, b"Subject: hi\r\n\r\nbody");
    }
}
