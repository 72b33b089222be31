//! Async driver for a [`Session`].
//!
//! The actor owns the session and its debounce timer on a tokio task. Commands
//! arrive over a channel, effects go through an [`EffectRouter`], and the timer
//! is replaced on every arm and dropped on cancel or teardown, so a stale
//! firing can never reach the session.

use crate::config::SessionConfig;
use crate::envelope::{Envelope, MessageKind};
use crate::error::{Error, Result};
use crate::presence::{PresenceState, TimerToken};
use crate::roster::Peer;
use crate::session::{Effect, Session};
use crate::sink::EffectRouter;
use crate::status::Banner;
use crate::transfer::{TransferId, TransferRecord};
use std::pin::Pin;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Sleep;
use tracing::{debug, info};

/// Command channel capacity.
const COMMAND_BUFFER: usize = 64;

/// Commands accepted by a running session.
#[derive(Debug)]
pub enum SessionCommand {
    /// A decoded envelope. `sender_id == None` marks a local one.
    Receive {
        kind: MessageKind,
        sender_id: Option<String>,
        envelope: Envelope,
    },
    /// Raw wire text from a peer.
    ReceiveWire { sender_id: String, wire: String },
    SendMessage(String),
    SendFile { file_path: String, size: u64 },
    KeyPressed { buffer_empty: bool },
    AcceptTransfer(TransferId),
    DeclineTransfer(TransferId),
    CancelTransfer(TransferId),
    ConnectionChanged(bool),
    SettingsChanged(SessionConfig),
    Join(Peer),
    Leave(String),
    Snapshot(oneshot::Sender<SessionSnapshot>),
    Close,
}

/// Point-in-time view of a session.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub title: String,
    pub presence: PresenceState,
    pub connected: bool,
    pub banner: Option<Banner>,
    pub peers: Vec<Peer>,
    pub transfers: Vec<TransferRecord>,
    pub log_len: usize,
    pub timer_armed: bool,
}

/// Cloneable handle to a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    async fn command(&self, command: SessionCommand) -> Result<()> {
        self.tx.send(command).await.map_err(|_| Error::SessionClosed)
    }

    pub async fn receive(&self, kind: MessageKind, sender_id: Option<&str>, envelope: Envelope) -> Result<()> {
        self.command(SessionCommand::Receive {
            kind,
            sender_id: sender_id.map(str::to_string),
            envelope,
        })
        .await
    }

    pub async fn receive_wire(&self, sender_id: &str, wire: &str) -> Result<()> {
        self.command(SessionCommand::ReceiveWire {
            sender_id: sender_id.to_string(),
            wire: wire.to_string(),
        })
        .await
    }

    pub async fn send_message(&self, text: &str) -> Result<()> {
        self.command(SessionCommand::SendMessage(text.to_string())).await
    }

    pub async fn send_file(&self, file_path: &str, size: u64) -> Result<()> {
        self.command(SessionCommand::SendFile {
            file_path: file_path.to_string(),
            size,
        })
        .await
    }

    pub async fn key_pressed(&self, buffer_empty: bool) -> Result<()> {
        self.command(SessionCommand::KeyPressed { buffer_empty }).await
    }

    pub async fn accept_transfer(&self, id: TransferId) -> Result<()> {
        self.command(SessionCommand::AcceptTransfer(id)).await
    }

    pub async fn decline_transfer(&self, id: TransferId) -> Result<()> {
        self.command(SessionCommand::DeclineTransfer(id)).await
    }

    pub async fn cancel_transfer(&self, id: TransferId) -> Result<()> {
        self.command(SessionCommand::CancelTransfer(id)).await
    }

    pub async fn connection_changed(&self, connected: bool) -> Result<()> {
        self.command(SessionCommand::ConnectionChanged(connected)).await
    }

    pub async fn settings_changed(&self, config: SessionConfig) -> Result<()> {
        self.command(SessionCommand::SettingsChanged(config)).await
    }

    pub async fn join(&self, peer: Peer) -> Result<()> {
        self.command(SessionCommand::Join(peer)).await
    }

    pub async fn leave(&self, peer_id: &str) -> Result<()> {
        self.command(SessionCommand::Leave(peer_id.to_string())).await
    }

    /// Fetch the session's current state.
    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.command(SessionCommand::Snapshot(tx)).await?;
        rx.await.map_err(|_| Error::SessionClosed)
    }

    /// Close the session. The actor task exits after carrying out the close effects.
    pub async fn close(&self) -> Result<()> {
        self.command(SessionCommand::Close).await
    }
}

struct PendingTimer {
    token: TimerToken,
    sleep: Pin<Box<Sleep>>,
}

enum Event {
    Command(Option<SessionCommand>),
    TimerFired(TimerToken),
}

/// Owns a session on its own task.
pub struct SessionActor {
    session: Session,
    router: EffectRouter,
    rx: mpsc::Receiver<SessionCommand>,
    timer: Option<PendingTimer>,
}

impl SessionActor {
    /// Spawn the actor and return a handle to it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(session: Session, router: EffectRouter) -> (SessionHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let mut actor = SessionActor {
            session,
            router,
            rx,
            timer: None,
        };

        let initial = actor.session.start();
        actor.apply(initial);

        let task = tokio::spawn(actor.run());
        (SessionHandle { tx }, task)
    }

    async fn run(mut self) {
        loop {
            let event = tokio::select! {
                command = self.rx.recv() => Event::Command(command),
                token = next_firing(&mut self.timer) => Event::TimerFired(token),
            };

            match event {
                Event::TimerFired(token) => {
                    self.timer = None;
                    let effects = self.session.debounce_fired(token);
                    self.apply(effects);
                }
                Event::Command(Some(command)) => {
                    if !self.handle(command) {
                        break;
                    }
                }
                Event::Command(None) => {
                    debug!("all session handles dropped");
                    self.handle(SessionCommand::Close);
                    break;
                }
            }
        }

        self.timer = None;
        info!("session actor stopped");
    }

    /// Run one command. Returns false once the session has closed.
    fn handle(&mut self, command: SessionCommand) -> bool {
        let effects = match command {
            SessionCommand::Receive {
                kind,
                sender_id,
                envelope,
            } => self.session.receive_message(kind, sender_id.as_deref(), &envelope),
            SessionCommand::ReceiveWire { sender_id, wire } => self.session.receive_wire(Some(&sender_id), &wire),
            SessionCommand::SendMessage(text) => self.session.send_message(&text),
            SessionCommand::SendFile { file_path, size } => self.session.send_file(&file_path, size),
            SessionCommand::KeyPressed { buffer_empty } => self.session.key_pressed(buffer_empty),
            SessionCommand::AcceptTransfer(id) => self.session.accept_transfer(&id),
            SessionCommand::DeclineTransfer(id) => self.session.decline_transfer(&id),
            SessionCommand::CancelTransfer(id) => self.session.cancel_transfer(&id),
            SessionCommand::ConnectionChanged(connected) => self.session.connection_state_changed(connected),
            SessionCommand::SettingsChanged(config) => self.session.settings_changed(config),
            SessionCommand::Join(peer) => self.session.join(peer),
            SessionCommand::Leave(peer_id) => self.session.leave(&peer_id),
            SessionCommand::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
                Vec::new()
            }
            SessionCommand::Close => self.session.close(),
        };
        self.apply(effects);
        !self.session.is_closed()
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for timer in self.router.apply(effects) {
            match timer {
                Effect::ArmTimer { token, delay } => {
                    debug!(token = token.0, ?delay, "debounce timer armed");
                    self.timer = Some(PendingTimer {
                        token,
                        sleep: Box::pin(tokio::time::sleep(delay)),
                    });
                }
                Effect::CancelTimer => {
                    if self.timer.take().is_some() {
                        debug!("debounce timer cancelled");
                    }
                }
                _ => {}
            }
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            title: self.session.title(),
            presence: self.session.presence(),
            connected: self.session.is_connected(),
            banner: self.session.banner(),
            peers: self.session.roster().peers().cloned().collect(),
            transfers: self.session.transfers().list(),
            log_len: self.session.log_entries().count(),
            timer_armed: self.timer.is_some(),
        }
    }
}

/// Resolves when the pending timer elapses, or never if none is armed.
async fn next_firing(timer: &mut Option<PendingTimer>) -> TimerToken {
    match timer {
        Some(pending) => {
            pending.sleep.as_mut().await;
            pending.token
        }
        None => std::future::pending().await,
    }
}
