//! A scripted in-memory IMAP server for session tests.
//!
//! Each connector serves one connection. The server answers every command
//! with the next scripted reply and records what the client wrote, so tests
//! can assert on the exact wire traffic.

#![allow(dead_code, clippy::unwrap_used)]

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::sync::Notify;

use mailwire_imap::{Config, ConnectionError, Connector, Credentials, Error, Security, Session};

/// Commands written by clients, in wire order, shared between servers.
#[derive(Clone, Default)]
pub struct WireLog(Arc<Mutex<Vec<String>>>);

impl WireLog {
    pub fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    /// Waits until at least `n` commands were written.
    pub async fn wait_for(&self, n: usize) {
        while self.len() < n {
            tokio::task::yield_now().await;
        }
    }
}

/// One scripted exchange.
pub struct Step {
    /// Prefix the command (after its tag) must start with.
    expect: String,
    /// Reply lines; `{tag}` is replaced with the command's tag.
    reply: Vec<String>,
    /// Held back until notified.
    gate: Option<Arc<Notify>>,
}

pub fn step(expect: &str, reply: &[&str]) -> Step {
    Step {
        expect: expect.to_string(),
        reply: reply.iter().map(ToString::to_string).collect(),
        gate: None,
    }
}

impl Step {
    /// Delays the reply until `gate` is notified.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }
}

pub struct ScriptedConnector {
    label: &'static str,
    greeting: String,
    steps: Mutex<Option<VecDeque<Step>>>,
    log: WireLog,
}

impl ScriptedConnector {
    pub fn new(label: &'static str, greeting: &str, steps: Vec<Step>, log: WireLog) -> Self {
        Self {
            label,
            greeting: greeting.to_string(),
            steps: Mutex::new(Some(steps.into())),
            log,
        }
    }
}

impl Connector for ScriptedConnector {
    type Stream = DuplexStream;

    fn connect(&self, _config: &Config) -> impl Future<Output = mailwire_imap::Result<DuplexStream>> + Send {
        let steps = self.steps.lock().unwrap().take();
        let greeting = self.greeting.clone();
        let log = self.log.clone();
        let label = self.label;
        async move {
            let steps = steps.ok_or(Error::Connection(ConnectionError::Closed))?;
            let (client, server) = tokio::io::duplex(64 * 1024);
            tokio::spawn(serve(server, label, greeting, steps, log));
            Ok(client)
        }
    }

    fn upgrade(
        &self,
        stream: DuplexStream,
        _host: &str,
    ) -> impl Future<Output = mailwire_imap::Result<DuplexStream>> + Send {
        async move { Ok(stream) }
    }
}

/// Reads one command, acknowledging synchronizing literals.
async fn read_command<R, W>(reader: &mut BufReader<R>, writer: &mut W) -> Option<String>
where
    R: tokio::io::AsyncRead + Unpin,
    W: tokio::io::AsyncWrite + Unpin,
{
    let mut command = String::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await.ok()? == 0 {
            return None;
        }
        let line = line.trim_end_matches("\r\n");
        command.push_str(line);
        let Some(marker) = line.strip_suffix('}').and_then(|l| l.rsplit_once('{')) else {
            return Some(command);
        };
        let (count, sync) = match marker.1.strip_suffix('+') {
            Some(count) => (count, false),
            None => (marker.1, true),
        };
        let len: usize = count.parse().ok()?;
        if sync {
            writer.write_all(b"+ go ahead\r\n").await.ok()?;
        }
        let mut literal = vec![0; len];
        reader.read_exact(&mut literal).await.ok()?;
        command.push_str("\r\n");
        command.push_str(&String::from_utf8_lossy(&literal));
    }
}

async fn serve(
    stream: DuplexStream,
    label: &'static str,
    greeting: String,
    mut steps: VecDeque<Step>,
    log: WireLog,
) {
    let (read, mut write) = tokio::io::split(stream);
    let mut reader = BufReader::new(read);
    if write.write_all(format!("{greeting}\r\n").as_bytes()).await.is_err() {
        return;
    }
    let mut last_tag = String::new();
    while let Some(command) = read_command(&mut reader, &mut write).await {
        log.push(format!("{label}: {command}"));
        let (tag, rest) = if command == "DONE" {
            (last_tag.clone(), command.clone())
        } else {
            let (tag, rest) = command.split_once(' ').unwrap_or((&command, ""));
            (tag.to_string(), rest.to_string())
        };
        last_tag.clone_from(&tag);

        let Some(step) = steps.pop_front() else {
            let _ = write.write_all(b"* BYE script exhausted\r\n").await;
            return;
        };
        if let Some(gate) = &step.gate {
            gate.notified().await;
        }
        let reply = if rest.starts_with(&step.expect) {
            step.reply
        } else {
            vec![format!("{{tag}} BAD expected {}", step.expect)]
        };
        for line in reply {
            let line = line.replace("{tag}", &tag);
            if write.write_all(format!("{line}\r\n").as_bytes()).await.is_err() {
                return;
            }
        }
    }
}

pub const GREETING: &str = "* OK [CAPABILITY IMAP4rev1 IDLE UIDPLUS] ready";
pub const LOGGED_IN: &str = "{tag} OK [CAPABILITY IMAP4rev1 IDLE UIDPLUS] logged in";

pub fn config() -> Config {
    Config::builder("imap.test")
        .security(Security::None)
        .request_namespace_and_id(false)
        .build()
}

/// Greeting of a server without IDLE.
pub const PLAIN_GREETING: &str = "* OK [CAPABILITY IMAP4rev1] ready";
pub const PLAIN_LOGGED_IN: &str = "{tag} OK [CAPABILITY IMAP4rev1] logged in";

/// An unconnected session whose server greets with `greeting` and then
/// plays `steps`.
pub fn scripted(
    label: &'static str,
    greeting: &str,
    config: Config,
    steps: Vec<Step>,
    log: &WireLog,
) -> Session<ScriptedConnector> {
    let connector = ScriptedConnector::new(label, greeting, steps, log.clone());
    Session::with_connector(config, connector)
}

/// A session that logs in with `steps` following the LOGIN exchange.
pub async fn logged_in(
    label: &'static str,
    steps: Vec<Step>,
    log: &WireLog,
) -> Session<ScriptedConnector> {
    logged_in_to(label, GREETING, LOGGED_IN, config(), steps, log).await
}

/// As [`logged_in`], against a chosen greeting, LOGIN reply and config.
pub async fn logged_in_to(
    label: &'static str,
    greeting: &str,
    login_reply: &str,
    config: Config,
    steps: Vec<Step>,
    log: &WireLog,
) -> Session<ScriptedConnector> {
    let mut script = vec![step("LOGIN", &[login_reply])];
    script.extend(steps);
    let session = scripted(label, greeting, config, script, log);
    session
        .connect(Credentials::login("alice", "secret"))
        .await
        .unwrap();
    session
}

/// SELECT INBOX with two messages.
pub fn select_inbox() -> Step {
    step(
        "SELECT INBOX",
        &[
            "* 2 EXISTS",
            "* 0 RECENT",
            "* OK [UIDVALIDITY 7] UIDs valid",
            "* OK [UIDNEXT 10] predicted next UID",
            "* FLAGS (\\Seen \\Answered \\Deleted \\Draft \\Flagged)",
            "{tag} OK [READ-WRITE] SELECT completed",
        ],
    )
}
