//! Commands and their wire encoding.

mod serialize;
mod tag_generator;
mod types;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, FixedOffset};

use crate::types::{Flags, Mailbox, ModSeq, SequenceSet, Tag, UidSet, format_internal_date};

pub use serialize::CommandBuf;
pub use tag_generator::TagGenerator;
pub use types::{
    FetchAttribute, FetchItems, ListExtendedOptions, SearchCriteria, SortCriterion, SortKey,
    StatusAttribute, StoreAction, StoreMode,
};

/// A client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// CAPABILITY
    Capability,
    /// NOOP
    Noop,
    /// LOGOUT
    Logout,
    /// STARTTLS
    StartTls,
    /// LOGIN
    Login {
        /// User name.
        username: String,
        /// Password.
        password: String,
    },
    /// AUTHENTICATE, with an optional SASL-IR initial response (raw bytes).
    Authenticate {
        /// Mechanism name.
        mechanism: String,
        /// Initial response, sent inline when the server supports SASL-IR.
        initial_response: Option<Vec<u8>>,
    },
    /// ID (RFC 2971); `None` sends `ID NIL`.
    Id {
        /// Field/value pairs.
        parameters: Option<Vec<(String, String)>>,
    },
    /// ENABLE (RFC 5161)
    Enable {
        /// Capability names.
        capabilities: Vec<String>,
    },
    /// SELECT
    Select {
        /// Mailbox.
        mailbox: Mailbox,
        /// Append `(CONDSTORE)`.
        condstore: bool,
    },
    /// EXAMINE
    Examine {
        /// Mailbox.
        mailbox: Mailbox,
        /// Append `(CONDSTORE)`.
        condstore: bool,
    },
    /// CREATE
    Create {
        /// Mailbox.
        mailbox: Mailbox,
    },
    /// DELETE
    Delete {
        /// Mailbox.
        mailbox: Mailbox,
    },
    /// RENAME
    Rename {
        /// Existing name.
        from: Mailbox,
        /// New name.
        to: Mailbox,
    },
    /// SUBSCRIBE
    Subscribe {
        /// Mailbox.
        mailbox: Mailbox,
    },
    /// UNSUBSCRIBE
    Unsubscribe {
        /// Mailbox.
        mailbox: Mailbox,
    },
    /// LIST
    List {
        /// Reference name.
        reference: String,
        /// Pattern with `*`/`%` wildcards.
        pattern: String,
    },
    /// LIST with LIST-EXTENDED selection/return options.
    ListExtended {
        /// Reference name.
        reference: String,
        /// Pattern with `*`/`%` wildcards.
        pattern: String,
        /// Options.
        options: ListExtendedOptions,
    },
    /// LSUB
    Lsub {
        /// Reference name.
        reference: String,
        /// Pattern.
        pattern: String,
    },
    /// XLIST (legacy Gmail)
    Xlist {
        /// Reference name.
        reference: String,
        /// Pattern.
        pattern: String,
    },
    /// NAMESPACE
    Namespace,
    /// STATUS
    Status {
        /// Mailbox.
        mailbox: Mailbox,
        /// Requested counters.
        items: Vec<StatusAttribute>,
    },
    /// APPEND
    Append {
        /// Destination.
        mailbox: Mailbox,
        /// Initial flags.
        flags: Option<Flags>,
        /// INTERNALDATE to record.
        internal_date: Option<DateTime<FixedOffset>>,
        /// RFC 5322 message.
        message: Vec<u8>,
    },
    /// GETQUOTA
    GetQuota {
        /// Quota root.
        root: String,
    },
    /// GETQUOTAROOT
    GetQuotaRoot {
        /// Mailbox.
        mailbox: Mailbox,
    },
    /// CHECK
    Check,
    /// CLOSE
    Close,
    /// UNSELECT (RFC 3691)
    Unselect,
    /// EXPUNGE
    Expunge,
    /// UID EXPUNGE (UIDPLUS)
    UidExpunge {
        /// UIDs to purge.
        uids: UidSet,
    },
    /// SEARCH / UID SEARCH
    Search {
        /// Keys.
        criteria: SearchCriteria,
        /// Use UID SEARCH.
        uid: bool,
        /// `RETURN (SAVE)` (SEARCHRES).
        save: bool,
    },
    /// SORT / UID SORT
    Sort {
        /// Sort program.
        criteria: Vec<SortCriterion>,
        /// Search keys.
        search: SearchCriteria,
        /// Use UID SORT.
        uid: bool,
    },
    /// FETCH / UID FETCH
    Fetch {
        /// Messages.
        sequence: SequenceSet,
        /// Attributes.
        items: FetchItems,
        /// Use UID FETCH.
        uid: bool,
        /// `(CHANGEDSINCE n)` modifier (CONDSTORE).
        changed_since: Option<ModSeq>,
    },
    /// STORE / UID STORE
    Store {
        /// Messages.
        sequence: SequenceSet,
        /// Update.
        action: StoreAction,
        /// Use UID STORE.
        uid: bool,
    },
    /// COPY / UID COPY
    Copy {
        /// Messages.
        sequence: SequenceSet,
        /// Destination.
        mailbox: Mailbox,
        /// Use UID COPY.
        uid: bool,
    },
    /// IDLE (RFC 2177); ended by an untagged `DONE` line.
    Idle,
}

impl Command {
    /// Command name for logs. Never includes arguments.
    #[must_use]
    pub const fn verb(&self) -> &'static str {
        match self {
            Self::Capability => "CAPABILITY",
            Self::Noop => "NOOP",
            Self::Logout => "LOGOUT",
            Self::StartTls => "STARTTLS",
            Self::Login { .. } => "LOGIN",
            Self::Authenticate { .. } => "AUTHENTICATE",
            Self::Id { .. } => "ID",
            Self::Enable { .. } => "ENABLE",
            Self::Select { .. } => "SELECT",
            Self::Examine { .. } => "EXAMINE",
            Self::Create { .. } => "CREATE",
            Self::Delete { .. } => "DELETE",
            Self::Rename { .. } => "RENAME",
            Self::Subscribe { .. } => "SUBSCRIBE",
            Self::Unsubscribe { .. } => "UNSUBSCRIBE",
            Self::List { .. } | Self::ListExtended { .. } => "LIST",
            Self::Lsub { .. } => "LSUB",
            Self::Xlist { .. } => "XLIST",
            Self::Namespace => "NAMESPACE",
            Self::Status { .. } => "STATUS",
            Self::Append { .. } => "APPEND",
            Self::GetQuota { .. } => "GETQUOTA",
            Self::GetQuotaRoot { .. } => "GETQUOTAROOT",
            Self::Check => "CHECK",
            Self::Close => "CLOSE",
            Self::Unselect => "UNSELECT",
            Self::Expunge => "EXPUNGE",
            Self::UidExpunge { .. } => "UID EXPUNGE",
            Self::Search { uid: true, .. } => "UID SEARCH",
            Self::Search { .. } => "SEARCH",
            Self::Sort { uid: true, .. } => "UID SORT",
            Self::Sort { .. } => "SORT",
            Self::Fetch { uid: true, .. } => "UID FETCH",
            Self::Fetch { .. } => "FETCH",
            Self::Store { uid: true, .. } => "UID STORE",
            Self::Store { .. } => "STORE",
            Self::Copy { uid: true, .. } => "UID COPY",
            Self::Copy { .. } => "COPY",
            Self::Idle => "IDLE",
        }
    }

    /// Encodes the command under `tag`.
    ///
    /// Returns the fragments to write; see [`CommandBuf`] for the
    /// continuation rule between them.
    #[must_use]
    #[allow(clippy::too_many_lines)]
    pub fn encode(&self, tag: &Tag, literal_plus: bool) -> Vec<Vec<u8>> {
        let mut buf = CommandBuf::new(tag, literal_plus);
        buf.raw(self.verb());

        match self {
            Self::Capability
            | Self::Noop
            | Self::Logout
            | Self::StartTls
            | Self::Namespace
            | Self::Check
            | Self::Close
            | Self::Unselect
            | Self::Expunge
            | Self::Idle => {}

            Self::Login { username, password } => {
                buf.sp().astring(username).sp().astring(password);
            }

            Self::Authenticate {
                mechanism,
                initial_response,
            } => {
                buf.sp().raw(mechanism);
                match initial_response {
                    Some(ir) if ir.is_empty() => {
                        buf.raw(" =");
                    }
                    Some(ir) => {
                        buf.sp().raw(&BASE64.encode(ir));
                    }
                    None => {}
                }
            }

            Self::Id { parameters } => {
                buf.sp();
                match parameters {
                    Some(params) if !params.is_empty() => {
                        buf.raw("(");
                        for (i, (key, value)) in params.iter().enumerate() {
                            if i > 0 {
                                buf.sp();
                            }
                            buf.string(key).sp().string(value);
                        }
                        buf.raw(")");
                    }
                    _ => {
                        buf.raw("NIL");
                    }
                }
            }

            Self::Enable { capabilities } => {
                for cap in capabilities {
                    buf.sp().raw(cap);
                }
            }

            Self::Select { mailbox, condstore } | Self::Examine { mailbox, condstore } => {
                buf.sp().mailbox(mailbox);
                if *condstore {
                    buf.raw(" (CONDSTORE)");
                }
            }

            Self::Create { mailbox }
            | Self::Delete { mailbox }
            | Self::Subscribe { mailbox }
            | Self::Unsubscribe { mailbox }
            | Self::GetQuotaRoot { mailbox } => {
                buf.sp().mailbox(mailbox);
            }

            Self::Rename { from, to } => {
                buf.sp().mailbox(from).sp().mailbox(to);
            }

            Self::List { reference, pattern }
            | Self::Lsub { reference, pattern }
            | Self::Xlist { reference, pattern } => {
                buf.sp().string(reference).sp().list_mailbox(pattern);
            }

            Self::ListExtended {
                reference,
                pattern,
                options,
            } => {
                let selection: Vec<&str> = [
                    options.subscribed.then_some("SUBSCRIBED"),
                    options.remote.then_some("REMOTE"),
                ]
                .into_iter()
                .flatten()
                .collect();
                if !selection.is_empty() {
                    buf.raw(&format!(" ({})", selection.join(" ")));
                }
                buf.sp().string(reference).sp().list_mailbox(pattern);

                let mut returns = Vec::new();
                if options.subscribed {
                    returns.push("SUBSCRIBED".to_string());
                }
                if options.return_children {
                    returns.push("CHILDREN".to_string());
                }
                if !options.return_status.is_empty() {
                    returns.push(format!("STATUS {}", status_list(&options.return_status)));
                }
                if !returns.is_empty() {
                    buf.raw(&format!(" RETURN ({})", returns.join(" ")));
                }
            }

            Self::Status { mailbox, items } => {
                buf.sp().mailbox(mailbox).sp().raw(&status_list(items));
            }

            Self::Append {
                mailbox,
                flags,
                internal_date,
                message,
            } => {
                buf.sp().mailbox(mailbox);
                if let Some(flags) = flags {
                    buf.sp().flag_list(&flags.without_recent());
                }
                if let Some(date) = internal_date {
                    buf.raw(&format!(" \"{}\"", format_internal_date(date)));
                }
                buf.sp().literal(message);
            }

            Self::GetQuota { root } => {
                buf.sp().astring(root);
            }

            Self::UidExpunge { uids } => {
                buf.sp().raw(&uids.to_string());
            }

            Self::Search {
                criteria,
                uid: _,
                save,
            } => {
                if *save {
                    buf.raw(" RETURN (SAVE)");
                }
                if criteria.needs_charset() {
                    buf.raw(" CHARSET UTF-8");
                }
                buf.sp().search_criteria(criteria);
            }

            Self::Sort {
                criteria,
                search,
                uid: _,
            } => {
                let program: Vec<String> = criteria
                    .iter()
                    .map(|c| {
                        if c.reverse {
                            format!("REVERSE {}", c.key.as_str())
                        } else {
                            c.key.as_str().to_string()
                        }
                    })
                    .collect();
                buf.raw(&format!(" ({}) UTF-8 ", program.join(" ")));
                buf.search_criteria(search);
            }

            Self::Fetch {
                sequence,
                items,
                uid: _,
                changed_since,
            } => {
                buf.sp().raw(&sequence.to_string()).sp().fetch_items(items);
                if let Some(mod_seq) = changed_since {
                    buf.raw(&format!(" (CHANGEDSINCE {mod_seq})"));
                }
            }

            Self::Store {
                sequence,
                action,
                uid: _,
            } => {
                buf.sp().raw(&sequence.to_string()).sp().store_action(action);
            }

            Self::Copy {
                sequence,
                mailbox,
                uid: _,
            } => {
                buf.sp().raw(&sequence.to_string()).sp().mailbox(mailbox);
            }
        }

        buf.finish()
    }
}

fn status_list(items: &[StatusAttribute]) -> String {
    let names: Vec<&str> = items.iter().map(|a| a.as_str()).collect();
    format!("({})", names.join(" "))
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
    use crate::types::{Flag, Uid};

    fn line(command: &Command) -> String {
        let fragments = command.encode(&Tag::new("A001"), false);
        assert_eq!(fragments.len(), 1, "unexpected literal split");
        String::from_utf8(fragments.concat()).unwrap()
    }

    mod any_state_tests {
        use super::*;

        #[test]
        fn bare_commands() {
            assert_eq!(line(&Command::Capability), "A001 CAPABILITY\r\n");
            assert_eq!(line(&Command::Noop), "A001 NOOP\r\n");
            assert_eq!(line(&Command::Idle), "A001 IDLE\r\n");
        }

        #[test]
        fn login_quotes_when_needed() {
            let cmd = Command::Login {
                username: "user@example.com".into(),
                password: "pass word".into(),
            };
            assert_eq!(line(&cmd), "A001 LOGIN user@example.com \"pass word\"\r\n");
        }

        #[test]
        fn authenticate_initial_response() {
            let cmd = Command::Authenticate {
                mechanism: "PLAIN".into(),
                initial_response: Some(b"\0user\0pass".to_vec()),
            };
            assert_eq!(line(&cmd), "A001 AUTHENTICATE PLAIN AHVzZXIAcGFzcw==\r\n");

            let empty = Command::Authenticate {
                mechanism: "EXTERNAL".into(),
                initial_response: Some(Vec::new()),
            };
            assert_eq!(line(&empty), "A001 AUTHENTICATE EXTERNAL =\r\n");
        }

        #[test]
        fn id_forms() {
            assert_eq!(line(&Command::Id { parameters: None }), "A001 ID NIL\r\n");
            let cmd = Command::Id {
                parameters: Some(vec![("name".into(), "mailwire".into())]),
            };
            assert_eq!(line(&cmd), "A001 ID (\"name\" \"mailwire\")\r\n");
        }
    }

    mod mailbox_tests {
        use super::*;

        #[test]
        fn select_with_condstore() {
            let cmd = Command::Select {
                mailbox: Mailbox::inbox(),
                condstore: true,
            };
            assert_eq!(line(&cmd), "A001 SELECT INBOX (CONDSTORE)\r\n");
        }

        #[test]
        fn list_keeps_pattern_literal() {
            let cmd = Command::List {
                reference: String::new(),
                pattern: "Box*".into(),
            };
            assert_eq!(line(&cmd), "A001 LIST \"\" Box*\r\n");
        }

        #[test]
        fn list_extended_with_status() {
            let cmd = Command::ListExtended {
                reference: String::new(),
                pattern: "*".into(),
                options: ListExtendedOptions {
                    subscribed: true,
                    remote: false,
                    return_children: true,
                    return_status: vec![StatusAttribute::Messages, StatusAttribute::Unseen],
                },
            };
            assert_eq!(
                line(&cmd),
                "A001 LIST (SUBSCRIBED) \"\" * RETURN (SUBSCRIBED CHILDREN STATUS (MESSAGES UNSEEN))\r\n"
            );
        }

        #[test]
        fn status_items() {
            let cmd = Command::Status {
                mailbox: Mailbox::new("Sent Items"),
                items: vec![StatusAttribute::UidNext, StatusAttribute::HighestModSeq],
            };
            assert_eq!(line(&cmd), "A001 STATUS \"Sent Items\" (UIDNEXT HIGHESTMODSEQ)\r\n");
        }

        #[test]
        fn append_splits_at_literal() {
            let date = chrono::DateTime::parse_from_rfc3339("1996-07-17T02:44:25-07:00").unwrap();
            let cmd = Command::Append {
                mailbox: Mailbox::new("Archive"),
                flags: Some(Flags::from_vec(vec![Flag::Seen, Flag::Recent])),
                internal_date: Some(date),
                message: b"Subject: x\r\n\r\nhi".to_vec(),
            };
            let fragments = cmd.encode(&Tag::new("A001"), false);
            assert_eq!(
                fragments,
                vec![
                    b"A001 APPEND Archive (\\Seen) \"17-Jul-1996 02:44:25 -0700\" {16}\r\n".to_vec(),
                    b"Subject: x\r\n\r\nhi\r\n".to_vec(),
                ]
            );
            let inline = cmd.encode(&Tag::new("A001"), true);
            assert_eq!(inline.len(), 1);
        }
    }

    mod message_tests {
        use super::*;

        #[test]
        fn uid_fetch_with_changedsince() {
            let cmd = Command::Fetch {
                sequence: SequenceSet::all(),
                items: FetchItems::items([FetchAttribute::Uid, FetchAttribute::Flags]),
                uid: true,
                changed_since: Some(ModSeq(12_345)),
            };
            assert_eq!(line(&cmd), "A001 UID FETCH 1:* (UID FLAGS) (CHANGEDSINCE 12345)\r\n");
        }

        #[test]
        fn store_variants() {
            let flags = Flags::from_vec(vec![Flag::Deleted]);
            let cmd = Command::Store {
                sequence: SequenceSet::range(1, 3).unwrap(),
                action: StoreAction::add(flags.clone()).silent(),
                uid: true,
            };
            assert_eq!(line(&cmd), "A001 UID STORE 1:3 +FLAGS.SILENT (\\Deleted)\r\n");

            let conditional = Command::Store {
                sequence: SequenceSet::single(4).unwrap(),
                action: StoreAction::replace(flags).unchanged_since(ModSeq(7)),
                uid: false,
            };
            assert_eq!(
                line(&conditional),
                "A001 STORE 4 (UNCHANGEDSINCE 7) FLAGS (\\Deleted)\r\n"
            );
        }

        #[test]
        fn search_save_and_charset() {
            let cmd = Command::Search {
                criteria: SearchCriteria::Subject("héllo".into()),
                uid: true,
                save: true,
            };
            let fragments = cmd.encode(&Tag::new("A001"), true);
            assert_eq!(
                fragments.concat(),
                "A001 UID SEARCH RETURN (SAVE) CHARSET UTF-8 SUBJECT {6+}\r\nhéllo\r\n".as_bytes()
            );
        }

        #[test]
        fn sort_program() {
            let cmd = Command::Sort {
                criteria: vec![
                    SortCriterion::descending(SortKey::Date),
                    SortCriterion::ascending(SortKey::Subject),
                ],
                search: SearchCriteria::All,
                uid: true,
            };
            assert_eq!(line(&cmd), "A001 UID SORT (REVERSE DATE SUBJECT) UTF-8 ALL\r\n");
        }

        #[test]
        fn uid_copy_and_expunge() {
            let uids = UidSet::from_uids([Uid::new(5).unwrap(), Uid::new(6).unwrap()]).unwrap();
            let copy = Command::Copy {
                sequence: uids.as_sequence_set().clone(),
                mailbox: Mailbox::new("Trash"),
                uid: true,
            };
            assert_eq!(line(&copy), "A001 UID COPY 5:6 Trash\r\n");
            assert_eq!(line(&Command::UidExpunge { uids }), "A001 UID EXPUNGE 5:6\r\n");
        }
    }
}
