//! Scripted-server tests for the POP3 client.

#![allow(clippy::unwrap_used)]

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use mailwire_pop3::{
    Capability, Client, Error, ExtendedCode, Pop3Config, Security, UniqueIdListing,
};
use mailwire_sasl::{Login, Plain, XOAuth2};
use tokio_test::io::Builder;

fn config() -> Pop3Config {
    Pop3Config::builder("pop.example.com")
        .security(Security::None)
        .build()
}

fn greeted() -> Builder {
    let mut builder = Builder::new();
    builder.read(b"+OK POP3 server ready\r\n");
    builder
}

#[tokio::test]
async fn auth_plain_sends_initial_response_inline() {
    let mock = greeted()
        .write(b"AUTH PLAIN AGFsaWNlAHNlY3JldA==\r\n")
        .read(b"+OK maildrop ready\r\n")
        .write(b"QUIT\r\n")
        .read(b"+OK bye\r\n")
        .build();
    let client = Client::from_stream(mock, &config()).await.unwrap();
    let mut plain = Plain::new("alice", "secret");
    let client = client.auth(&mut plain).await.unwrap();
    client.quit().await.unwrap();
}

#[tokio::test]
async fn oversized_initial_response_waits_for_challenge() {
    let password = "p".repeat(300);
    let ir = STANDARD.encode(format!("\0alice\0{password}"));
    let mock = greeted()
        .write(b"AUTH PLAIN\r\n")
        .read(b"+ \r\n")
        .write(format!("{ir}\r\n").as_bytes())
        .read(b"+OK\r\n")
        .build();
    let client = Client::from_stream(mock, &config()).await.unwrap();
    let mut plain = Plain::new("alice", password);
    client.auth(&mut plain).await.unwrap();
}

#[tokio::test]
async fn auth_login_answers_challenges() {
    let mock = greeted()
        .write(b"AUTH LOGIN\r\n")
        .read(b"+ VXNlcm5hbWU6\r\n")
        .write(b"YWxpY2U=\r\n")
        .read(b"+ UGFzc3dvcmQ6\r\n")
        .write(b"c2VjcmV0\r\n")
        .read(b"+OK logged in\r\n")
        .build();
    let client = Client::from_stream(mock, &config()).await.unwrap();
    let mut login = Login::new("alice", "secret");
    client.auth(&mut login).await.unwrap();
}

#[tokio::test]
async fn mechanism_failure_cancels_exchange() {
    let mock = greeted()
        .write(b"AUTH LOGIN\r\n")
        .read(b"+ VXNlcm5hbWU6\r\n")
        .write(b"YWxpY2U=\r\n")
        .read(b"+ UGFzc3dvcmQ6\r\n")
        .write(b"c2VjcmV0\r\n")
        .read(b"+ VXNlcm5hbWU6\r\n")
        .write(b"*\r\n")
        .read(b"-ERR AUTH cancelled\r\n")
        .build();
    let client = Client::from_stream(mock, &config()).await.unwrap();
    let mut login = Login::new("alice", "secret");
    let err = client.auth(&mut login).await.unwrap_err();
    assert!(matches!(err, Error::Sasl(_)));
}

#[tokio::test]
async fn xoauth2_error_challenge_is_acknowledged() {
    let mock = greeted()
        .write(b"AUTH XOAUTH2 dXNlcj1hbGljZQFhdXRoPUJlYXJlciB0b2sBAQ==\r\n")
        .read(b"+ eyJzdGF0dXMiOiI0MDEiLCJzY2hlbWVzIjoiYmVhcmVyIiwic2NvcGUiOiJodHRwczovL21haWwuZ29vZ2xlLmNvbS8ifQ==\r\n")
        .write(b"\r\n")
        .read(b"-ERR [AUTH] invalid credentials\r\n")
        .build();
    let client = Client::from_stream(mock, &config()).await.unwrap();
    let mut oauth = XOAuth2::new("alice", "tok");
    let err = client.auth(&mut oauth).await.unwrap_err();
    assert!(matches!(
        err,
        Error::AuthenticationFailed {
            code: Some(ExtendedCode::Auth),
            ..
        }
    ));
    assert_eq!(oauth.error().unwrap().status, "401");
}

#[tokio::test]
async fn stls_rereads_capabilities() {
    let mock = greeted()
        .write(b"CAPA\r\n")
        .read(b"+OK\r\nUSER\r\nSTLS\r\n.\r\n")
        .write(b"STLS\r\n")
        .read(b"+OK begin TLS\r\n")
        .write(b"CAPA\r\n")
        .read(b"+OK\r\nUSER\r\nSASL PLAIN\r\nUIDL\r\n.\r\n")
        .build();
    let mut client = Client::from_stream(mock, &config()).await.unwrap();
    assert!(client.capa().await.unwrap().has(&Capability::Stls));

    let client = client
        .stls_with(|stream| async move { Ok::<_, Error>(stream) })
        .await
        .unwrap();
    let capabilities = client.capabilities().unwrap();
    assert!(!capabilities.has(&Capability::Stls));
    assert!(capabilities.has_sasl("PLAIN"));
}

#[tokio::test]
async fn stls_requires_advertisement() {
    let mock = greeted()
        .write(b"CAPA\r\n")
        .read(b"+OK\r\nUSER\r\n.\r\n")
        .build();
    let mut client = Client::from_stream(mock, &config()).await.unwrap();
    client.capa().await.unwrap();
    let err = client
        .stls_with(|stream| async move { Ok::<_, Error>(stream) })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotSupported(_)));
}

#[tokio::test]
async fn transaction_commands() {
    let mock = greeted()
        .write(b"USER alice\r\n")
        .read(b"+OK\r\n")
        .write(b"PASS secret\r\n")
        .read(b"+OK\r\n")
        .write(b"UIDL\r\n")
        .read(b"+OK\r\n1 whqtswO00WBw418f9t5JxYwZ\r\n2 QhdPYR:00WBw1Ph7x7\r\n.\r\n")
        .write(b"UIDL 2\r\n")
        .read(b"+OK 2 QhdPYR:00WBw1Ph7x7\r\n")
        .write(b"LIST 9\r\n")
        .read(b"-ERR no such message, only 2 messages in maildrop\r\n")
        .write(b"TOP 1 0\r\n")
        .read(b"+OK\r\nSubject: hi\r\n\r\n.\r\n")
        .write(b"DELE 1\r\n")
        .read(b"+OK message 1 deleted\r\n")
        .write(b"RSET\r\n")
        .read(b"+OK\r\n")
        .write(b"NOOP\r\n")
        .read(b"+OK\r\n")
        .write(b"QUIT\r\n")
        .read(b"+OK dewey POP3 server signing off\r\n")
        .build();
    let client = Client::from_stream(mock, &config()).await.unwrap();
    let mut client = client.login("alice", "secret").await.unwrap();

    let uids = client.uidl().await.unwrap();
    assert_eq!(uids.len(), 2);
    assert_eq!(uids[0].uid, "whqtswO00WBw418f9t5JxYwZ");
    assert_eq!(
        client.uidl_one(2).await.unwrap(),
        UniqueIdListing {
            number: 2,
            uid: "QhdPYR:00WBw1Ph7x7".into()
        }
    );
    let err = client.list_one(9).await.unwrap_err();
    assert!(matches!(err, Error::ErrResponse { code: None, .. }));
    assert_eq!(client.top(1, 0).await.unwrap(), b"Subject: hi\r\n\r\n");
    client.dele(1).await.unwrap();
    client.rset().await.unwrap();
    client.noop().await.unwrap();
    client.quit().await.unwrap();
}

#[tokio::test]
async fn quit_reports_update_failure() {
    let mock = greeted()
        .write(b"QUIT\r\n")
        .read(b"-ERR [SYS/PERM] some deleted messages not removed\r\n")
        .build();
    let client = Client::from_stream(mock, &config()).await.unwrap();
    let err = client.quit().await.unwrap_err();
    assert!(matches!(
        err,
        Error::ErrResponse {
            code: Some(ExtendedCode::SysPerm),
            ..
        }
    ));
}
