//! Watch tests with a paused clock.

#![allow(clippy::unwrap_used)]

mod common;

use std::time::Duration;

use common::{
    PLAIN_GREETING, PLAIN_LOGGED_IN, WireLog, config, logged_in, logged_in_to, select_inbox, step,
};
use mailwire_imap::{Error, Session, Violation};

/// Logged in and INBOX selected on a server without IDLE.
async fn polling_session(steps: Vec<common::Step>, log: &WireLog) -> Session<common::ScriptedConnector> {
    let mut script = vec![select_inbox()];
    script.extend(steps);
    let session = logged_in_to("s", PLAIN_GREETING, PLAIN_LOGGED_IN, config(), script, log).await;
    session.open("INBOX", false).await.unwrap();
    session
}

#[tokio::test(start_paused = true)]
async fn idle_watch_times_out_empty() {
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

    let started = tokio::time::Instant::now();
    let arrived = session
        .watch(Some(Duration::from_millis(500)), None)
        .await
        .unwrap();
    assert!(arrived.is_empty());
    assert!(started.elapsed() >= Duration::from_millis(500));
    let entries = log.entries();
    assert!(entries[2].ends_with("IDLE"));
    assert_eq!(entries[3], "s: DONE");
    assert_eq!(entries.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn idle_watch_returns_arrivals() {
    let log = WireLog::default();
    let session = logged_in(
        "s",
        vec![
            select_inbox(),
            step("IDLE", &["+ idling", "* 3 EXISTS"]),
            step("DONE", &["{tag} OK IDLE terminated"]),
            step("FETCH 3 (UID FLAGS)", &["* 3 FETCH (UID 11 FLAGS (\\Recent))", "{tag} OK done"]),
        ],
        &log,
    )
    .await;
    session.open("INBOX", false).await.unwrap();

    let arrived = session.watch(Some(Duration::from_secs(60)), None).await.unwrap();
    assert_eq!(arrived.len(), 1);
    assert_eq!(arrived[0].uid.map(|u| u.get()), Some(11));
}

#[tokio::test]
async fn zero_timeout_checks_once() {
    let log = WireLog::default();
    let session = logged_in(
        "s",
        vec![select_inbox(), step("NOOP", &["{tag} OK NOOP completed"])],
        &log,
    )
    .await;
    session.open("INBOX", false).await.unwrap();
    let arrived = session.watch(Some(Duration::ZERO), None).await.unwrap();
    assert!(arrived.is_empty());
    assert_eq!(log.len(), 3);
}

#[tokio::test]
async fn poll_interval_is_range_checked() {
    let log = WireLog::default();
    let session = logged_in("s", vec![select_inbox()], &log).await;
    session.open("INBOX", false).await.unwrap();
    for poll in [Duration::ZERO, Duration::from_secs(30 * 60)] {
        let err = session.watch(Some(Duration::from_secs(1)), Some(poll)).await.unwrap_err();
        assert!(matches!(err, Error::ProtocolViolation(Violation::InvalidArgument)));
    }
    assert_eq!(log.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn dropped_watch_still_ends_idle() {
    let log = WireLog::default();
    let session = logged_in(
        "s",
        vec![
            select_inbox(),
            step("IDLE", &["+ idling"]),
            step("DONE", &["{tag} OK IDLE terminated"]),
            step("NOOP", &["{tag} OK NOOP completed"]),
        ],
        &log,
    )
    .await;
    session.open("INBOX", false).await.unwrap();

    let outcome = tokio::time::timeout(
        Duration::from_secs(1),
        session.watch(Some(Duration::from_secs(60)), None),
    )
    .await;
    assert!(outcome.is_err());

    // Either the loop already cleared its marker or stopping waits for it.
    match session.stop_watch().await {
        Ok(arrived) => assert!(arrived.is_empty()),
        Err(err) => assert!(matches!(err, Error::ProtocolViolation(Violation::NoWatchActive))),
    }
    session.refresh().await.unwrap();
    let entries = log.entries();
    assert_eq!(entries[3], "s: DONE");
    assert!(entries[4].ends_with("NOOP"));
}

#[tokio::test(start_paused = true)]
async fn arrival_behind_an_expunge_is_reported() {
    let log = WireLog::default();
    let session = logged_in(
        "s",
        vec![
            select_inbox(),
            step("IDLE", &["+ idling", "* 1 EXPUNGE", "* 2 EXISTS"]),
            step("DONE", &["{tag} OK IDLE terminated"]),
            step("FETCH 2 (UID FLAGS)", &["* 2 FETCH (UID 12 FLAGS ())", "{tag} OK done"]),
        ],
        &log,
    )
    .await;
    session.open("INBOX", false).await.unwrap();

    let started = tokio::time::Instant::now();
    let arrived = session.watch(Some(Duration::from_secs(60)), None).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(60));
    assert_eq!(arrived.len(), 1);
    assert_eq!(arrived[0].uid.map(|u| u.get()), Some(12));
    assert_eq!(arrived[0].sequence.map(|s| s.get()), Some(2));
}

#[tokio::test(start_paused = true)]
async fn polling_watch_repeats_noop_until_arrival() {
    let log = WireLog::default();
    let session = polling_session(
        vec![
            step("NOOP", &["{tag} OK NOOP completed"]),
            step("NOOP", &["* 3 EXISTS", "{tag} OK NOOP completed"]),
            step("FETCH 3 (UID FLAGS)", &["* 3 FETCH (UID 11 FLAGS ())", "{tag} OK done"]),
        ],
        &log,
    )
    .await;

    let started = tokio::time::Instant::now();
    let arrived = session
        .watch(Some(Duration::from_secs(60)), Some(Duration::from_secs(5)))
        .await
        .unwrap();
    assert_eq!(arrived.len(), 1);
    assert_eq!(arrived[0].uid.map(|u| u.get()), Some(11));
    assert!(started.elapsed() >= Duration::from_secs(5));
    let entries = log.entries();
    assert!(entries[2].ends_with("NOOP"));
    assert!(entries[3].ends_with("NOOP"));
    assert!(!entries.iter().any(|e| e.ends_with("IDLE")));
}

#[tokio::test]
async fn unbounded_watch_needs_idle() {
    let log = WireLog::default();
    let session = polling_session(vec![], &log).await;

    let err = session.watch(None, None).await.unwrap_err();
    assert!(matches!(err, Error::ProtocolViolation(Violation::InvalidArgument)));
    let err = session.start_idle(None, None).unwrap_err();
    assert!(matches!(err, Error::ProtocolViolation(Violation::InvalidArgument)));
    assert_eq!(log.len(), 2);
}
