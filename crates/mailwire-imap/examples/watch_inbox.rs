//! Logs in, opens INBOX and prints messages as they arrive.
//!
//! ```text
//! IMAP_HOST=imap.example.com IMAP_USER=me IMAP_PASS=secret \
//!     RUST_LOG=mailwire_imap=debug cargo run --example watch_inbox
//! ```

use std::time::Duration;

use anyhow::Context;
use mailwire_imap::{Config, Credentials, LoggingListener, Session};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let host = std::env::var("IMAP_HOST").context("IMAP_HOST not set")?;
    let user = std::env::var("IMAP_USER").context("IMAP_USER not set")?;
    let pass = std::env::var("IMAP_PASS").context("IMAP_PASS not set")?;

    let session = Session::new(Config::new(host));
    session.add_listener(LoggingListener);
    session.connect(Credentials::login(user, pass)).await?;

    let inbox = session.open("INBOX", true).await?;
    println!("INBOX: {} messages, {} recent", inbox.exists, inbox.recent);

    for _ in 0..3 {
        let arrived = session.watch(Some(Duration::from_secs(300)), None).await?;
        for message in arrived {
            println!(
                "new message: seq {:?} uid {:?} flags {:?}",
                message.sequence, message.uid, message.flags
            );
        }
    }

    session.logout().await?;
    Ok(())
}
