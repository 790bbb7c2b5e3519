//! Session engine tests against a scripted server.

#![allow(clippy::unwrap_used)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use common::{GREETING, LOGGED_IN, WireLog, config, logged_in, logged_in_to, scripted, select_inbox, step};
use mailwire_imap::{
    ChangeEvent, CollectingListener, Command, ConnectionError, Credentials, Error, FetchAttribute,
    FetchItems, Flag, SequenceSet, SessionState, StoreAction, TimeoutKind, Violation,
};

fn flags(list: &[Flag]) -> mailwire_imap::Flags {
    mailwire_imap::Flags::from_vec(list.to_vec())
}

#[tokio::test]
async fn connect_learns_capabilities_from_login() {
    let log = WireLog::default();
    let session = logged_in("s", vec![], &log).await;
    assert_eq!(session.state(), SessionState::Authenticated);
    assert!(session.has_capability(&mailwire_imap::Capability::Idle));
    assert_eq!(log.entries().len(), 1);
    assert!(log.entries()[0].starts_with("s: A0001 LOGIN"));
}

#[tokio::test]
async fn second_connect_is_rejected_without_io() {
    let log = WireLog::default();
    let session = logged_in("s", vec![], &log).await;
    let err = session.begin_connect(Credentials::None).unwrap_err();
    assert!(matches!(err, Error::ProtocolViolation(Violation::WrongState)));
    assert_eq!(log.len(), 1);
}

#[tokio::test]
async fn concurrent_command_is_busy_and_sends_nothing() {
    let log = WireLog::default();
    let gate = Arc::new(Notify::new());
    let session = logged_in(
        "s",
        vec![step("NOOP", &["{tag} OK NOOP completed"]).gated(Arc::clone(&gate))],
        &log,
    )
    .await;

    let first = tokio::spawn({
        let session = session.clone();
        async move { session.noop().await }
    });
    log.wait_for(2).await;

    let err = session.execute(Command::Capability).await.unwrap_err();
    assert!(matches!(err, Error::ProtocolViolation(Violation::Busy)));
    let err = session.start_idle(None, None).unwrap_err();
    assert!(matches!(err, Error::ProtocolViolation(Violation::Busy) | Error::ProtocolViolation(Violation::WrongState)));
    assert_eq!(log.len(), 2);

    gate.notify_one();
    first.await.unwrap().unwrap();
}

#[tokio::test]
async fn operations_during_watch_are_rejected() {
    let log = WireLog::default();
    let session = logged_in(
        "s",
        vec![
            select_inbox(),
            step("IDLE", &["+ idling"]),
            step("DONE", &["{tag} OK IDLE terminated"]),
        ],
        &log,
    )
    .await;
    session.open("INBOX", false).await.unwrap();
    session.start_idle(None, None).unwrap();
    log.wait_for(3).await;

    for err in [
        session.execute(Command::Noop).await.unwrap_err(),
        session.start_watch(None, None).unwrap_err(),
        session.refresh().await.unwrap_err(),
        session.stop_watch().await.unwrap_err(),
    ] {
        assert!(matches!(
            err,
            Error::ProtocolViolation(Violation::WatchActive | Violation::WatchKindMismatch)
        ));
    }
    assert_eq!(log.len(), 3);

    session.stop_idle().await.unwrap();
    assert!(log.entries()[3].ends_with("DONE"));
    let err = session.stop_idle().await.unwrap_err();
    assert!(matches!(err, Error::ProtocolViolation(Violation::NoWatchActive)));
}

#[tokio::test]
async fn list_resolves_exact_name_with_wildcard() {
    let log = WireLog::default();
    let session = logged_in(
        "s",
        vec![step(
            "LIST \"\" Box*",
            &[
                "* LIST () \"/\" \"Box*/Child1\"",
                "* LIST () \"/\" \"Box*\"",
                "{tag} OK LIST completed",
            ],
        )],
        &log,
    )
    .await;
    let mailbox = session.get_mailbox("Box*").await.unwrap();
    assert_eq!(mailbox.mailbox.as_str(), "Box*");
    assert_eq!(mailbox.delimiter, Some('/'));
}

#[tokio::test]
async fn missing_mailbox_is_not_found() {
    let log = WireLog::default();
    let session = logged_in(
        "s",
        vec![step("LIST", &["{tag} OK LIST completed"])],
        &log,
    )
    .await;
    let err = session.get_mailbox("Nope").await.unwrap_err();
    assert!(matches!(err, Error::MailboxNotFound { name } if name == "Nope"));
}

#[tokio::test]
async fn store_replaces_or_merges_flags() {
    let log = WireLog::default();
    let session = logged_in(
        "s",
        vec![
            select_inbox(),
            step("FETCH 1 ", &["* 1 FETCH (UID 5 FLAGS (\\Seen))", "{tag} OK FETCH completed"]),
            step(
                "UID STORE 5 +FLAGS (\\Draft)",
                &["* 1 FETCH (UID 5 FLAGS (\\Seen \\Draft))", "{tag} OK STORE completed"],
            ),
            step(
                "UID STORE 5 FLAGS (\\Flagged)",
                &["* 1 FETCH (UID 5 FLAGS (\\Flagged))", "{tag} OK STORE completed"],
            ),
            step("UID STORE 5 -FLAGS.SILENT (\\Flagged)", &["{tag} OK STORE completed"]),
        ],
        &log,
    )
    .await;
    session.open("INBOX", false).await.unwrap();
    let listener = CollectingListener::new();
    session.add_listener(listener.clone());

    let fetched = session
        .fetch(
            &SequenceSet::single(1).unwrap(),
            FetchItems::items([FetchAttribute::Uid, FetchAttribute::Flags]),
        )
        .await
        .unwrap();
    let handle = fetched[0].handle;

    let updated = session
        .store(&[handle], StoreAction::add(flags(&[Flag::Draft])))
        .await
        .unwrap();
    assert!(updated[0].flags.as_ref().unwrap().same_members(&flags(&[Flag::Seen, Flag::Draft])));

    let updated = session
        .store(&[handle], StoreAction::replace(flags(&[Flag::Flagged])))
        .await
        .unwrap();
    assert!(updated[0].flags.as_ref().unwrap().same_members(&flags(&[Flag::Flagged])));

    let updated = session
        .store(&[handle], StoreAction::remove(flags(&[Flag::Flagged])).silent())
        .await
        .unwrap();
    assert!(updated[0].flags.as_ref().unwrap().is_empty());

    let changes = listener
        .take()
        .into_iter()
        .filter(|e| matches!(e, ChangeEvent::FlagsChanged { .. }))
        .count();
    assert_eq!(changes, 3);
}

#[tokio::test]
async fn expunge_renumbers_and_stale_handles_fail() {
    let log = WireLog::default();
    let session = logged_in(
        "s",
        vec![
            select_inbox(),
            step(
                "FETCH 1:2 ",
                &[
                    "* 1 FETCH (UID 5 FLAGS ())",
                    "* 2 FETCH (UID 6 FLAGS ())",
                    "{tag} OK FETCH completed",
                ],
            ),
            step("NOOP", &["* 1 EXPUNGE", "{tag} OK NOOP completed"]),
        ],
        &log,
    )
    .await;
    session.open("INBOX", false).await.unwrap();
    let fetched = session
        .fetch(
            &SequenceSet::range(1, 2).unwrap(),
            FetchItems::items([FetchAttribute::Uid, FetchAttribute::Flags]),
        )
        .await
        .unwrap();
    session.refresh().await.unwrap();

    let first = session.message(fetched[0].handle).unwrap();
    assert!(first.is_vanished());
    let second = session.message(fetched[1].handle).unwrap();
    assert_eq!(second.sequence.map(|s| s.get()), Some(1));
    assert_eq!(session.selected().unwrap().exists, 1);

    let err = session.mark_deleted(&[fetched[0].handle]).await.unwrap_err();
    assert!(matches!(err, Error::MessageDeleted));
    assert_eq!(log.len(), 4);
}

#[tokio::test]
async fn failed_select_leaves_nothing_selected() {
    let log = WireLog::default();
    let session = logged_in(
        "s",
        vec![step("SELECT Missing", &["{tag} NO [NONEXISTENT] no such mailbox"])],
        &log,
    )
    .await;
    let err = session.open("Missing", false).await.unwrap_err();
    assert!(matches!(err, Error::ErrorResponse { .. }));
    assert_eq!(session.state(), SessionState::Authenticated);
    assert!(session.selected().is_none());
}

#[tokio::test]
async fn unsolicited_bye_disconnects() {
    let log = WireLog::default();
    let session = logged_in(
        "s",
        vec![step("NOOP", &["* BYE server shutting down"])],
        &log,
    )
    .await;
    let listener = CollectingListener::new();
    session.add_listener(listener.clone());

    let err = session.noop().await.unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(session.state(), SessionState::Disconnected);
    assert!(listener
        .take()
        .iter()
        .any(|e| matches!(e, ChangeEvent::Disconnected { .. })));

    let err = session.noop().await.unwrap_err();
    assert!(matches!(err, Error::ProtocolViolation(Violation::NotConnected)));
}

#[tokio::test]
async fn pending_connect_rejects_a_second_one_without_io() {
    let log = WireLog::default();
    let gate = Arc::new(Notify::new());
    let session = scripted(
        "s",
        GREETING,
        config(),
        vec![step("LOGIN", &[LOGGED_IN]).gated(Arc::clone(&gate))],
        &log,
    );

    let handle = session.begin_connect(Credentials::login("alice", "secret")).unwrap();
    log.wait_for(1).await;
    let err = session.begin_connect(Credentials::None).unwrap_err();
    assert!(matches!(err, Error::ProtocolViolation(Violation::ConnectPending)));
    let err = session.connect(Credentials::None).await.unwrap_err();
    assert!(matches!(err, Error::ProtocolViolation(Violation::ConnectPending)));
    assert_eq!(log.len(), 1);

    gate.notify_one();
    session.end_connect(handle).await.unwrap();
    assert_eq!(session.state(), SessionState::Authenticated);
    assert_eq!(log.len(), 1);
}

#[tokio::test]
async fn dispose_during_connect_cancels_waiter_and_logs_out() {
    let log = WireLog::default();
    let gate = Arc::new(Notify::new());
    let session = scripted(
        "s",
        GREETING,
        config(),
        vec![
            step("LOGIN", &[LOGGED_IN]).gated(Arc::clone(&gate)),
            step("LOGOUT", &["* BYE see you", "{tag} OK LOGOUT completed"]),
        ],
        &log,
    );

    let handle = session.begin_connect(Credentials::login("alice", "secret")).unwrap();
    log.wait_for(1).await;
    let waiter = tokio::spawn({
        let session = session.clone();
        async move { session.end_connect(handle).await }
    });
    session.dispose().await;
    assert!(matches!(waiter.await.unwrap(), Err(Error::Cancelled)));

    // The login still completes on the wire and is then logged out.
    gate.notify_one();
    log.wait_for(2).await;
    while session.state() != SessionState::Disconnected {
        tokio::task::yield_now().await;
    }
    assert!(log.entries()[1].ends_with("LOGOUT"));
    let err = session.cancel_connect().unwrap_err();
    assert!(matches!(err, Error::ProtocolViolation(Violation::WrongState)));
}

#[tokio::test]
async fn cancelled_connect_reports_cancelled() {
    let log = WireLog::default();
    let gate = Arc::new(Notify::new());
    let session = scripted(
        "s",
        GREETING,
        config(),
        vec![
            step("LOGIN", &[LOGGED_IN]).gated(Arc::clone(&gate)),
            step("LOGOUT", &["* BYE see you", "{tag} OK LOGOUT completed"]),
        ],
        &log,
    );

    let handle = session.begin_connect(Credentials::login("alice", "secret")).unwrap();
    log.wait_for(1).await;
    session.cancel_connect().unwrap();
    assert!(matches!(session.end_connect(handle).await, Err(Error::Cancelled)));
    gate.notify_one();
    log.wait_for(2).await;
    assert!(log.entries()[1].ends_with("LOGOUT"));
}

#[tokio::test(start_paused = true)]
async fn receive_timeout_disconnects() {
    let log = WireLog::default();
    let never = Arc::new(Notify::new());
    let config = mailwire_imap::Config::builder("imap.test")
        .security(mailwire_imap::Security::None)
        .request_namespace_and_id(false)
        .receive_timeout(Duration::from_secs(5))
        .build();
    let session = logged_in_to(
        "s",
        GREETING,
        LOGGED_IN,
        config,
        vec![step("NOOP", &["{tag} OK NOOP completed"]).gated(never)],
        &log,
    )
    .await;

    let err = session.noop().await.unwrap_err();
    assert!(matches!(err, Error::Timeout { kind: TimeoutKind::Receive, .. }));
    assert!(err.is_fatal());
    assert_eq!(session.state(), SessionState::Disconnected);

    let err = session.noop().await.unwrap_err();
    assert!(matches!(err, Error::ProtocolViolation(Violation::NotConnected)));
    assert_eq!(log.len(), 2);
}

#[tokio::test]
async fn rejected_login_keeps_the_connection() {
    let log = WireLog::default();
    let session = scripted(
        "s",
        GREETING,
        config(),
        vec![
            step("LOGIN", &["{tag} NO [AUTHENTICATIONFAILED] invalid credentials"]),
            step("LOGIN", &[LOGGED_IN]),
        ],
        &log,
    );
    session.connect(Credentials::None).await.unwrap();
    assert_eq!(session.state(), SessionState::NotAuthenticated);

    let err = session.login("alice", "wrong").await.unwrap_err();
    assert!(matches!(err, Error::Connection(ConnectionError::LoginRejected(_))));
    assert!(!err.is_fatal());
    assert!(!err.report().fatal);
    assert_eq!(session.state(), SessionState::NotAuthenticated);

    session.login("alice", "secret").await.unwrap();
    assert_eq!(session.state(), SessionState::Authenticated);
    assert_eq!(log.len(), 2);
}

#[tokio::test]
async fn stray_continuation_fails_the_command_and_sends_nothing() {
    let log = WireLog::default();
    let session = logged_in(
        "s",
        vec![
            step("NOOP", &["+ more please", "{tag} OK NOOP completed"]),
            step("NOOP", &["{tag} OK NOOP completed"]),
        ],
        &log,
    )
    .await;

    let err = session.noop().await.unwrap_err();
    assert!(matches!(
        err,
        Error::ProtocolViolation(Violation::UnexpectedContinuation)
    ));
    assert_eq!(session.state(), SessionState::Authenticated);
    assert_eq!(log.len(), 2);

    session.noop().await.unwrap();
    assert_eq!(log.len(), 3);
    assert!(log.entries()[2].ends_with("NOOP"));
}

#[tokio::test]
async fn literal_in_response_is_followed_by_more_lines() {
    let log = WireLog::default();
    let session = logged_in(
        "s",
        vec![
            select_inbox(),
            step("FETCH 1 ", &["* 1 FETCH (UID 5 FLAGS ())", "{tag} OK FETCH completed"]),
            step(
                "UID FETCH 5 ",
                &[
                    "* 1 FETCH (UID 5 BODY[TEXT] {12}\r\nline one\r\nxy)",
                    "* 3 EXISTS",
                    "{tag} OK FETCH completed",
                ],
            ),
        ],
        &log,
    )
    .await;
    session.open("INBOX", false).await.unwrap();
    let fetched = session
        .fetch(
            &SequenceSet::single(1).unwrap(),
            FetchItems::items([FetchAttribute::Uid, FetchAttribute::Flags]),
        )
        .await
        .unwrap();

    let part = session.fetch_body(fetched[0].handle, Some("TEXT"), None).await.unwrap();
    assert_eq!(part.data, b"line one\r\nxy");
    assert_eq!(part.section.as_deref(), Some("TEXT"));
    assert_eq!(session.selected().unwrap().exists, 3);
    assert!(log.entries()[3].contains("BODY.PEEK[TEXT]"));
}
