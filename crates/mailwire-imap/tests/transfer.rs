//! Copy and move between sessions.

#![allow(clippy::unwrap_used)]

mod common;

use common::{WireLog, logged_in, select_inbox, step};
use mailwire_imap::{Error, FetchAttribute, FetchItems, MessageRef, SequenceSet, Session};

const SOURCE_FETCH: &str = "* 1 FETCH (UID 5 FLAGS (\\Answered $label1) \
    INTERNALDATE \"17-Jul-1996 02:44:25 -0700\" RFC822.SIZE 11 BODY[] {11}\r\nHello world)";

async fn first_message(session: &Session<common::ScriptedConnector>) -> MessageRef {
    session.open("INBOX", false).await.unwrap();
    let fetched = session
        .fetch(
            &SequenceSet::single(1).unwrap(),
            FetchItems::items([FetchAttribute::Uid, FetchAttribute::Flags]),
        )
        .await
        .unwrap();
    fetched[0].handle
}

fn source_steps(extra: Vec<common::Step>) -> Vec<common::Step> {
    let mut steps = vec![
        select_inbox(),
        step("FETCH 1 ", &["* 1 FETCH (UID 5 FLAGS (\\Answered $label1))", "{tag} OK done"]),
        step("UID FETCH 5 (UID FLAGS INTERNALDATE RFC822.SIZE BODY.PEEK[])", &[SOURCE_FETCH, "{tag} OK done"]),
    ];
    steps.extend(extra);
    steps
}

#[tokio::test]
async fn cross_session_move_appends_then_deletes() {
    let log = WireLog::default();
    let source = logged_in(
        "src",
        source_steps(vec![step(
            "UID STORE 5 +FLAGS (\\Deleted)",
            &["* 1 FETCH (UID 5 FLAGS (\\Answered $label1 \\Deleted))", "{tag} OK done"],
        )]),
        &log,
    )
    .await;
    let destination = logged_in(
        "dst",
        vec![step("APPEND Archive", &["{tag} OK [APPENDUID 9 100] APPEND completed"])],
        &log,
    )
    .await;
    let message = first_message(&source).await;

    let report = source
        .move_messages(&[message], &destination, "Archive", false)
        .await
        .unwrap();
    assert_eq!(report.transferred, vec![message]);
    let mapping: Vec<(u32, u32)> = report.uid_mapping.iter().map(|(s, d)| (s.get(), d.get())).collect();
    assert_eq!(mapping, vec![(5, 100)]);

    let entries = log.entries();
    let appends: Vec<_> = entries.iter().filter(|e| e.contains(" APPEND ")).collect();
    assert_eq!(appends.len(), 1);
    assert!(appends[0].contains("\\Answered"));
    assert!(appends[0].contains("$label1"));
    assert!(appends[0].contains("\"17-Jul-1996 02:44:25 -0700\""));
    assert!(appends[0].ends_with("{11}\r\nHello world"));

    let append_at = entries.iter().position(|e| e.contains(" APPEND ")).unwrap();
    let stores: Vec<_> = entries
        .iter()
        .enumerate()
        .filter(|(_, e)| e.contains("STORE"))
        .collect();
    assert_eq!(stores.len(), 1);
    assert!(stores[0].0 > append_at);
    assert!(stores[0].1.contains("+FLAGS (\\Deleted)"));
}

#[tokio::test]
async fn failed_append_leaves_source_untouched() {
    let log = WireLog::default();
    let source = logged_in("src", source_steps(vec![]), &log).await;
    let destination = logged_in(
        "dst",
        vec![step("APPEND Archive", &["{tag} NO [OVERQUOTA] quota exceeded"])],
        &log,
    )
    .await;
    let message = first_message(&source).await;

    let err = source
        .move_messages(&[message], &destination, "Archive", false)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ErrorResponse { .. }));
    assert!(!log.entries().iter().any(|e| e.contains("STORE")));
    let flags = source.message(message).unwrap().flags.unwrap();
    assert!(!flags.is_deleted());
}

#[tokio::test]
async fn same_session_copy_retries_after_trycreate() {
    let log = WireLog::default();
    let session = logged_in(
        "s",
        vec![
            select_inbox(),
            step("FETCH 1 ", &["* 1 FETCH (UID 5 FLAGS ())", "{tag} OK done"]),
            step("UID COPY 5 Archive", &["{tag} NO [TRYCREATE] no such mailbox"]),
            step("CREATE Archive", &["{tag} OK created"]),
            step("UID COPY 5 Archive", &["{tag} OK [COPYUID 9 5 200] copied"]),
        ],
        &log,
    )
    .await;
    let message = first_message(&session).await;
    let report = session
        .copy_messages(&[message], &session, "Archive", true)
        .await
        .unwrap();
    assert!(report.created);
    let mapping: Vec<(u32, u32)> = report.uid_mapping.iter().map(|(s, d)| (s.get(), d.get())).collect();
    assert_eq!(mapping, vec![(5, 200)]);
    assert_eq!(log.len(), 6);
}

#[tokio::test]
async fn empty_batch_is_a_no_op() {
    let log = WireLog::default();
    let session = logged_in("s", vec![], &log).await;
    let report = session
        .copy_messages(&[], &session, "Archive", false)
        .await
        .unwrap();
    assert!(report.transferred.is_empty());
    assert_eq!(log.len(), 1);
}
