//! Message operations on the selected mailbox.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use super::{CommandResult, Exchange, Need, Session};
use crate::command::{
    Command, FetchAttribute, FetchItems, SearchCriteria, SortCriterion, StoreAction,
};
use crate::connection::Connector;
use crate::error::{Error, Result};
use crate::model::{Message, MessageRef};
use crate::parser::{FetchItem, UntaggedResponse};
use crate::types::{
    Capability, Flag, Flags, Mailbox, ModSeq, ResponseCode, SequenceSet, Uid, UidSet, UidValidity,
};

/// Payload of one `BODY[section]` fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BodyPart {
    /// Message the part belongs to.
    pub message: MessageRef,
    /// Section specifier, `None` for the whole message.
    pub section: Option<String>,
    /// First octet for a partial fetch.
    pub origin: Option<u32>,
    /// Octets; empty when the server answered NIL.
    pub data: Vec<u8>,
}

/// Matches of a UID SEARCH.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    /// Matching UIDs in server order.
    pub uids: Vec<Uid>,
    /// Highest mod-sequence among the matches (CONDSTORE).
    pub mod_seq: Option<ModSeq>,
}

/// Resolved messages of one batch.
pub(crate) struct Target {
    pub refs: Vec<MessageRef>,
    pub sequence: SequenceSet,
    /// True when every message has a known UID and `sequence` holds UIDs.
    pub uid: bool,
}

impl Target {
    pub fn uids(&self) -> Option<UidSet> {
        self.uid.then(|| UidSet(self.sequence.clone()))
    }
}

fn deleted() -> Flags {
    Flags::from_vec(vec![Flag::Deleted])
}

fn search_numbers(responses: &[UntaggedResponse]) -> SearchResult {
    let mut result = SearchResult::default();
    for response in responses {
        match response {
            UntaggedResponse::Search { numbers, mod_seq } => {
                result.uids.extend(numbers.iter().copied().filter_map(Uid::new));
                result.mod_seq = result.mod_seq.max(*mod_seq);
            }
            UntaggedResponse::ESearch(esearch) => {
                if let Some(all) = &esearch.all {
                    result
                        .uids
                        .extend(all.expand(None).into_iter().filter_map(Uid::new));
                }
                result.mod_seq = result.mod_seq.max(esearch.mod_seq);
            }
            _ => {}
        }
    }
    result
}

pub(crate) fn append_uid(result: &CommandResult) -> Option<(UidValidity, UidSet)> {
    match &result.code {
        Some(ResponseCode::AppendUid { uid_validity, uids }) => Some((*uid_validity, uids.clone())),
        _ => None,
    }
}

impl<C: Connector> Session<C> {
    /// Checks every handle and builds the command set, before any I/O.
    ///
    /// UIDs are used when all messages have one, sequence numbers otherwise.
    pub(crate) fn target(&self, messages: &[MessageRef]) -> Result<Option<Target>> {
        let shared = self.shared();
        let mut refs = Vec::with_capacity(messages.len());
        let mut uids = Vec::with_capacity(messages.len());
        let mut seqs = Vec::with_capacity(messages.len());
        for &handle in messages {
            let selected = self.selection(&shared, handle)?;
            let slot = selected.resolve(handle)?;
            let Some(entry) = selected.entry(slot) else {
                continue;
            };
            refs.push(handle);
            uids.extend(entry.uid);
            seqs.extend(entry.seq);
        }
        if refs.is_empty() {
            return Ok(None);
        }
        let uid = uids.len() == refs.len();
        let sequence = if uid {
            SequenceSet::from_numbers(uids.into_iter().map(Uid::get))
        } else {
            SequenceSet::from_seqs(seqs)
        };
        Ok(sequence.map(|sequence| Target {
            refs,
            sequence,
            uid,
        }))
    }

    fn snapshots(&self, refs: impl IntoIterator<Item = MessageRef>) -> Vec<Message> {
        let shared = self.shared();
        let Some(selected) = shared.selected.as_ref() else {
            return Vec::new();
        };
        let mut seen = std::collections::HashSet::new();
        refs.into_iter()
            .filter(|r| r.mailbox == selected.handle && seen.insert(r.slot))
            .filter_map(|r| selected.message(r.slot))
            .collect()
    }

    /// FETCH by sequence number.
    ///
    /// # Errors
    ///
    /// Fails if no mailbox is selected or the server refuses.
    pub async fn fetch(&self, set: &SequenceSet, items: FetchItems) -> Result<Vec<Message>> {
        self.fetch_with(set.clone(), items, false).await
    }

    /// UID FETCH.
    ///
    /// # Errors
    ///
    /// Fails if no mailbox is selected or the server refuses.
    pub async fn fetch_uids(&self, uids: &UidSet, items: FetchItems) -> Result<Vec<Message>> {
        self.fetch_with(uids.0.clone(), items, true).await
    }

    async fn fetch_with(&self, sequence: SequenceSet, items: FetchItems, uid: bool) -> Result<Vec<Message>> {
        let mut exchange = self.acquire(Need::Selected)?;
        let command = Command::Fetch {
            sequence,
            items,
            uid,
            changed_since: None,
        };
        let result = exchange.run(&command).await?.into_result()?;
        drop(exchange);
        Ok(self.snapshots(result.fetched.iter().map(|&(_, r)| r)))
    }

    /// Finds a message by UID, asking the server when it is not cached.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MessageNotFound`] when the server has no such UID.
    pub async fn message_by_uid(&self, uid: Uid) -> Result<Message> {
        {
            let shared = self.shared();
            if let Some(message) = shared
                .selected
                .as_ref()
                .and_then(|s| s.slot_for_uid(uid).and_then(|slot| s.message(slot)))
                .filter(|m| !m.is_vanished())
            {
                return Ok(message);
            }
        }
        let found = self
            .fetch_uids(
                &UidSet::single(uid),
                FetchItems::items([FetchAttribute::Uid, FetchAttribute::Flags]),
            )
            .await?;
        found
            .into_iter()
            .find(|m| m.uid == Some(uid))
            .ok_or_else(|| Error::MessageNotFound {
                set: UidSet::single(uid).0,
            })
    }

    /// Fetches one body section without setting `\Seen`.
    ///
    /// `partial` is `(first octet, octet count)`.
    ///
    /// # Errors
    ///
    /// Fails for a stale or expunged handle, or
    /// [`Error::MessageNotFound`] when the server sends no body.
    pub async fn fetch_body(
        &self,
        message: MessageRef,
        section: Option<&str>,
        partial: Option<(u32, u32)>,
    ) -> Result<BodyPart> {
        let mut exchange = self.acquire(Need::Authenticated)?;
        let target = self.target(&[message])?.ok_or(Error::MessageDeleted)?;
        let command = Command::Fetch {
            sequence: target.sequence.clone(),
            items: FetchItems::items([FetchAttribute::Body {
                section: section.map(str::to_string),
                peek: true,
                partial,
            }]),
            uid: target.uid,
            changed_since: None,
        };
        let result = exchange.run(&command).await?.into_result()?;
        drop(exchange);

        let wanted = section.map(str::to_ascii_uppercase);
        result
            .fetched
            .iter()
            .filter(|(_, r)| *r == message)
            .filter_map(|&(index, _)| match result.responses.get(index) {
                Some(UntaggedResponse::Fetch { items, .. }) => Some(items),
                _ => None,
            })
            .flatten()
            .find_map(|item| match item {
                FetchItem::Body {
                    section: got,
                    origin,
                    data,
                } if got.as_ref().map(|s| s.to_ascii_uppercase()) == wanted => Some(BodyPart {
                    message,
                    section: got.clone(),
                    origin: *origin,
                    data: data.clone().unwrap_or_default(),
                }),
                _ => None,
            })
            .ok_or(Error::MessageNotFound {
                set: target.sequence,
            })
    }

    /// UID SEARCH.
    ///
    /// # Errors
    ///
    /// Fails if no mailbox is selected or the server refuses, e.g.
    /// `[BADCHARSET]`.
    pub async fn search(&self, criteria: SearchCriteria) -> Result<SearchResult> {
        let mut exchange = self.acquire(Need::Selected)?;
        let command = Command::Search {
            criteria,
            uid: true,
            save: false,
        };
        let result = exchange.run(&command).await?.into_result()?;
        Ok(search_numbers(&result.responses))
    }

    /// UID SEARCH RETURN (SAVE): keeps the matches on the server and
    /// returns the `$` reference for later UID commands.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Incapable`] without SEARCHRES.
    pub async fn search_saved(&self, criteria: SearchCriteria) -> Result<UidSet> {
        if !self.has_capability(&Capability::SearchRes) {
            return Err(Error::Incapable {
                capability: Capability::SearchRes.to_string(),
            });
        }
        let mut exchange = self.acquire(Need::Selected)?;
        let command = Command::Search {
            criteria,
            uid: true,
            save: true,
        };
        exchange.run(&command).await?.into_result()?;
        Ok(UidSet(SequenceSet::saved()))
    }

    /// UID SORT.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Incapable`] without SORT.
    pub async fn sort(&self, criteria: Vec<SortCriterion>, search: SearchCriteria) -> Result<Vec<Uid>> {
        if !self.has_capability(&Capability::Sort) {
            return Err(Error::Incapable {
                capability: Capability::Sort.to_string(),
            });
        }
        let mut exchange = self.acquire(Need::Selected)?;
        let command = Command::Sort {
            criteria,
            search,
            uid: true,
        };
        let result = exchange.run(&command).await?.into_result()?;
        Ok(result
            .responses
            .iter()
            .filter_map(|r| match r {
                UntaggedResponse::Sort(numbers) => Some(numbers),
                _ => None,
            })
            .flatten()
            .copied()
            .filter_map(Uid::new)
            .collect())
    }

    /// STORE flags on `messages` and returns their updated snapshots.
    ///
    /// Every handle is checked before anything is sent; one stale or
    /// expunged handle fails the whole batch. `.SILENT` updates are applied
    /// to the cache locally.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Incapable`] for UNCHANGEDSINCE without CONDSTORE.
    pub async fn store(&self, messages: &[MessageRef], action: StoreAction) -> Result<Vec<Message>> {
        if action.unchanged_since.is_some() && !self.has_capability(&Capability::CondStore) {
            return Err(Error::Incapable {
                capability: Capability::CondStore.to_string(),
            });
        }
        let mut exchange = self.acquire(Need::Authenticated)?;
        let Some(target) = self.target(messages)? else {
            return Ok(Vec::new());
        };
        exchange.store(&target, action).await?;
        drop(exchange);
        Ok(self.snapshots(target.refs))
    }

    /// Adds `\Deleted` to `messages`.
    ///
    /// # Errors
    ///
    /// See [`Session::store`].
    pub async fn mark_deleted(&self, messages: &[MessageRef]) -> Result<Vec<Message>> {
        self.store(messages, StoreAction::add(deleted())).await
    }

    /// Marks `messages` deleted and expunges them: UID EXPUNGE of exactly
    /// these messages with UIDPLUS, a plain EXPUNGE otherwise.
    ///
    /// # Errors
    ///
    /// See [`Session::store`].
    pub async fn delete(&self, messages: &[MessageRef]) -> Result<()> {
        let mut exchange = self.acquire(Need::Authenticated)?;
        let Some(target) = self.target(messages)? else {
            return Ok(());
        };
        exchange.store(&target, StoreAction::add(deleted())).await?;
        let command = match target.uids() {
            Some(uids) if self.has_capability(&Capability::UidPlus) => Command::UidExpunge { uids },
            _ => Command::Expunge,
        };
        exchange.run(&command).await?.into_result()?;
        Ok(())
    }

    /// APPEND, returning the assigned UID under UIDPLUS.
    ///
    /// # Errors
    ///
    /// Fails if the server refuses, e.g. `[TRYCREATE]`.
    pub async fn append(
        &self,
        mailbox: &str,
        message: Vec<u8>,
        flags: Option<Flags>,
        internal_date: Option<DateTime<FixedOffset>>,
    ) -> Result<Option<(UidValidity, UidSet)>> {
        let mut exchange = self.acquire(Need::Authenticated)?;
        let command = Command::Append {
            mailbox: Mailbox::new(mailbox),
            flags,
            internal_date,
            message,
        };
        let result = exchange.run(&command).await?.into_result()?;
        Ok(append_uid(&result))
    }
}

impl<C: Connector> Exchange<C> {
    pub(crate) async fn store(&mut self, target: &Target, action: StoreAction) -> Result<CommandResult> {
        let command = Command::Store {
            sequence: target.sequence.clone(),
            action: action.clone(),
            uid: target.uid,
        };
        let result = self.run(&command).await?.into_result()?;
        let modified = matches!(result.code, Some(ResponseCode::Modified(_)));
        if action.silent && !modified {
            let session = self.session().clone();
            let mut events = Vec::new();
            {
                let mut shared = session.shared();
                if let Some(selected) = shared.selected.as_mut() {
                    for handle in &target.refs {
                        if handle.mailbox == selected.handle {
                            selected.apply_silent_store(handle.slot, &action, &mut events);
                        }
                    }
                }
            }
            session.publish(&events);
        }
        Ok(result)
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
    use crate::parser::ESearchResult;

    #[test]
    fn search_collects_plain_and_extended_results() {
        let result = search_numbers(&[
            UntaggedResponse::Search {
                numbers: vec![4, 9],
                mod_seq: Some(ModSeq(7)),
            },
            UntaggedResponse::ESearch(ESearchResult {
                uid: true,
                all: SequenceSet::parse("11:12"),
                mod_seq: Some(ModSeq(3)),
                ..ESearchResult::default()
            }),
        ]);
        let uids: Vec<u32> = result.uids.iter().map(|u| u.get()).collect();
        assert_eq!(uids, vec![4, 9, 11, 12]);
        assert_eq!(result.mod_seq, Some(ModSeq(7)));
    }

    #[test]
    fn zero_uids_are_dropped() {
        let result = search_numbers(&[UntaggedResponse::Search {
            numbers: vec![0, 5],
            mod_seq: None,
        }]);
        assert_eq!(result.uids, vec![Uid::new(5).unwrap()]);
    }
}
