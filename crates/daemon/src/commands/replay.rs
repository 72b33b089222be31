//! Replay command - feeds a conversation script through a live session.
//!
//! Script lines are either `sender<TAB>wire` (an envelope received from a
//! peer) or a local action:
//!
//! ```text
//! !type            keystroke, text left in the compose box
//! !clear           keystroke that empties the compose box
//! !send <text>     send a message
//! !file <path> <size>
//! !accept <id>     also !decline / !cancel
//! !wait <ms>       let timers run
//! !online / !offline
//! ```

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use lanchat_core::{
    Effect, EffectRouter, Envelope, HistorySink, LocalUser, LogEntry, LogSink, MessageKind, Peer, Roster, Session,
    SessionActor, SessionConfig, SessionHandle, Transport,
};
use std::time::Duration;
use tracing::{info, warn};

/// One parsed script line.
#[derive(Debug, PartialEq)]
enum Step {
    Receive { sender_id: String, wire: String },
    Type { buffer_empty: bool },
    Send(String),
    File { path: String, size: u64 },
    Accept(String),
    Decline(String),
    Cancel(String),
    Wait(Duration),
    Online(bool),
}

fn parse_line(line: &str) -> Result<Option<Step>> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let Some(directive) = line.strip_prefix('!') else {
        let (sender_id, wire) = line
            .split_once('\t')
            .ok_or_else(|| anyhow!("expected `sender<TAB>wire`: {}", line))?;
        return Ok(Some(Step::Receive {
            sender_id: sender_id.to_string(),
            wire: wire.to_string(),
        }));
    };

    let (name, arg) = directive
        .split_once(' ')
        .map(|(n, a)| (n, a.trim()))
        .unwrap_or((directive, ""));

    let step = match name {
        "type" => Step::Type { buffer_empty: false },
        "clear" => Step::Type { buffer_empty: true },
        "send" => Step::Send(arg.to_string()),
        "file" => {
            let (path, size) = arg
                .rsplit_once(' ')
                .ok_or_else(|| anyhow!("expected `!file <path> <size>`"))?;
            Step::File {
                path: path.to_string(),
                size: size.parse().context("invalid file size")?,
            }
        }
        "accept" => Step::Accept(arg.to_string()),
        "decline" => Step::Decline(arg.to_string()),
        "cancel" => Step::Cancel(arg.to_string()),
        "wait" => Step::Wait(Duration::from_millis(arg.parse().context("invalid wait")?)),
        "online" => Step::Online(true),
        "offline" => Step::Online(false),
        other => bail!("unknown directive: !{}", other),
    };
    Ok(Some(step))
}

fn parse_peer(arg: &str) -> Peer {
    match arg.split_once('=') {
        Some((id, name)) => Peer::new(id, name, "chat"),
        None => Peer::new(arg, arg, "chat"),
    }
}

/// Prints everything the session asks for.
#[derive(Clone)]
struct Stdout {
    config: SessionConfig,
    peer_name: String,
}

impl Transport for Stdout {
    fn send(&mut self, peer_id: &str, envelope: &Envelope) -> lanchat_core::Result<()> {
        println!("-> {:<10} {}", peer_id, envelope.encode());
        Ok(())
    }
}

impl LogSink for Stdout {
    fn append(&mut self, kind: MessageKind, sender_id: Option<&str>, sender_name: Option<&str>, envelope: &Envelope) {
        let entry = LogEntry {
            kind,
            sender_id: sender_id.map(str::to_string),
            sender_name: sender_name.map(str::to_string),
            envelope: envelope.clone(),
        };
        println!("{}", entry.render(&self.config));
    }

    fn present(&mut self, effect: &Effect) {
        match effect {
            Effect::Banner(Some(banner)) => println!("   banner: {}", banner.text(&self.peer_name)),
            Effect::Banner(None) => println!("   banner: hidden"),
            Effect::Title(title) => println!("   title: {}", title),
            Effect::TransferOffered(record) => {
                println!("   offer: {} {} ({})", record.id, record.file_name, record.display_size())
            }
            Effect::TransferUpdated(update) => println!("   transfer {}: {:?}", update.id, update.outcome),
            Effect::Alert { kind, sender_name } => println!("   alert: {:?} from {}", kind, sender_name),
            _ => {}
        }
    }
}

impl HistorySink for Stdout {
    fn save(&mut self, title: &str, at: DateTime<Utc>, entries: &[LogEntry]) -> lanchat_core::Result<()> {
        println!(
            "   history: {} entries for {:?} at {}",
            entries.len(),
            title,
            at.format("%Y-%m-%d %H:%M:%S")
        );
        Ok(())
    }
}

async fn run_step(handle: &SessionHandle, step: Step) -> lanchat_core::Result<()> {
    match step {
        Step::Receive { sender_id, wire } => handle.receive_wire(&sender_id, &wire).await,
        Step::Type { buffer_empty } => handle.key_pressed(buffer_empty).await,
        Step::Send(text) => handle.send_message(&text).await,
        Step::File { path, size } => handle.send_file(&path, size).await,
        Step::Accept(id) => handle.accept_transfer(id.as_str().into()).await,
        Step::Decline(id) => handle.decline_transfer(id.as_str().into()).await,
        Step::Cancel(id) => handle.cancel_transfer(id.as_str().into()).await,
        Step::Wait(delay) => {
            tokio::time::sleep(delay).await;
            Ok(())
        }
        Step::Online(connected) => handle.connection_changed(connected).await,
    }
}

pub async fn execute(file: &str, peers: &[String], group: Option<String>, connected: bool) -> Result<()> {
    let script = std::fs::read_to_string(file).with_context(|| format!("failed to read {}", file))?;

    let mut steps = Vec::new();
    for (number, line) in script.lines().enumerate() {
        match parse_line(line) {
            Ok(Some(step)) => steps.push(step),
            Ok(None) => {}
            Err(e) => warn!("line {}: {}", number + 1, e),
        }
    }

    let mut members = peers.iter().map(|p| parse_peer(p));
    let primary = members.next().unwrap_or_else(|| Peer::new("peer", "Peer", "chat"));
    let roster = match group {
        Some(thread) => Roster::group(thread, primary, members),
        None => Roster::direct(primary),
    };

    let config = SessionConfig::load_with_env()?;
    let local_name = if config.display_name.is_empty() {
        "Me".to_string()
    } else {
        config.display_name.clone()
    };
    let stdout = Stdout {
        config: config.clone(),
        peer_name: roster.primary().map(|p| p.name.clone()).unwrap_or_default(),
    };
    let session = Session::new(config, LocalUser::new("local", local_name), roster, connected);
    let router = EffectRouter::new(stdout.clone(), stdout.clone()).with_history(stdout);

    info!("Replaying {} steps", steps.len());
    let (handle, task) = SessionActor::spawn(session, router);
    for step in steps {
        run_step(&handle, step).await?;
    }

    let snapshot = handle.snapshot().await?;
    handle.close().await?;
    task.await?;

    println!();
    println!("Final presence: {:?}", snapshot.presence);
    println!("Transfers:      {}", snapshot.transfers.len());
    for record in &snapshot.transfers {
        println!("  {} {} {:?} {:?}", record.id, record.file_name, record.role, record.outcome);
    }

    Ok(())
}
