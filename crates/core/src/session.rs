//! Session dispatcher.
//!
//! A [`Session`] owns the roster, presence machine and transfer negotiator of
//! one conversation. Every entry point returns the effects the caller must
//! carry out: log entries, banner changes, addressed outbound envelopes and
//! debounce timer requests. The session itself never performs IO.

use crate::config::{SessionConfig, Theme};
use crate::envelope::{field, Envelope, MessageKind};
use crate::platform;
use crate::presence::{PresenceEffect, PresenceMachine, PresenceState, TimerToken};
use crate::roster::{Peer, Roster};
use crate::status::{banner_for, classify, icon_for, Banner};
use crate::transfer::{FileOp, TransferId, TransferNegotiator, TransferOutcome, TransferRecord, TransferUpdate};
use crate::vocab::Vocabulary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Maximum number of log entries kept for history saving.
const MAX_LOG_ENTRIES: usize = 1000;

/// Title used when saving a group conversation.
const GROUP_HISTORY_TITLE: &str = "Group Conversation";

/// The local participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalUser {
    pub id: String,
    pub name: String,
}

impl LocalUser {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// One entry of the visible conversation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub kind: MessageKind,
    /// `None` for entries produced locally without a sender (errors, file echoes).
    pub sender_id: Option<String>,
    pub sender_name: Option<String>,
    pub envelope: Envelope,
}

impl LogEntry {
    /// Visible text of the entry.
    pub fn body(&self) -> &str {
        [field::MESSAGE, field::GROUP_MESSAGE, field::FILE_NAME, field::CHAT_STATE]
            .into_iter()
            .find_map(|name| self.envelope.data(name))
            .unwrap_or_default()
    }

    /// One-line rendering following the configured theme and time/date display.
    pub fn render(&self, config: &SessionConfig) -> String {
        let name = self.sender_name.as_deref().unwrap_or("-");
        let line = match config.theme {
            Theme::Classic => format!("[{}] {}: {}", self.kind, name, self.body()),
            Theme::Bubble => format!("{} > {}", name, self.body()),
            Theme::Plain => self.body().to_string(),
        };

        let stamp = config.timestamp_format().and_then(|format| {
            let millis = self.envelope.header(field::TIME)?.parse().ok()?;
            let at = DateTime::<Utc>::from_timestamp_millis(millis)?;
            Some(at.format(format).to_string())
        });
        match stamp {
            Some(stamp) => format!("({}) {}", stamp, line),
            None => line,
        }
    }
}

/// Why the user's attention is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertKind {
    NewMessage,
    Broadcast,
    NewFile,
}

/// Something the caller must carry out on the session's behalf.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Append to the conversation log.
    Log(LogEntry),
    /// Hand an envelope to the transport for one peer.
    Send { peer_id: String, envelope: Envelope },
    /// Show the banner, or hide it on `None`.
    Banner(Option<Banner>),
    /// Icon reflecting the primary peer's status.
    Icon(&'static str),
    /// Conversation title changed.
    Title(String),
    /// A participant's display name changed.
    UserName { user_id: String, name: String },
    /// A participant's avatar changed.
    Avatar { user_id: String, path: String },
    /// A peer offered us a file.
    TransferOffered(TransferRecord),
    /// A transfer record changed outcome.
    TransferUpdated(TransferUpdate),
    /// Request the user's attention (sound, window title).
    Alert { kind: AlertKind, sender_name: String },
    /// Schedule `debounce_fired(token)` after `delay`, replacing any pending timer.
    ArmTimer { token: TimerToken, delay: Duration },
    /// Drop the pending debounce timer.
    CancelTimer,
    /// Persist the finished conversation.
    SaveHistory {
        title: String,
        at: DateTime<Utc>,
        entries: Vec<LogEntry>,
    },
}

/// One chat conversation, direct or group.
pub struct Session {
    config: SessionConfig,
    local: LocalUser,
    roster: Roster,
    presence: PresenceMachine,
    transfers: TransferNegotiator,
    connected: bool,
    peer_banner: Option<Banner>,
    composition_empty: bool,
    log: VecDeque<LogEntry>,
    has_data: bool,
    history_saved: bool,
    closed: bool,
}

impl Session {
    /// Create a session. Call [`Session::start`] for the initial presentation effects.
    pub fn new(config: SessionConfig, local: LocalUser, roster: Roster, connected: bool) -> Self {
        let presence = PresenceMachine::new(config.pause_delay());
        let peer_banner = roster
            .primary()
            .and_then(|p| p.bucket())
            .and_then(banner_for);

        Self {
            config,
            local,
            roster,
            presence,
            transfers: TransferNegotiator::new(),
            connected,
            peer_banner,
            composition_empty: true,
            log: VecDeque::new(),
            has_data: false,
            history_saved: false,
            closed: false,
        }
    }

    /// Effects describing the session's initial appearance.
    pub fn start(&self) -> Vec<Effect> {
        info!(
            local = %self.local.id,
            peers = self.roster.len(),
            group = self.roster.is_group(),
            "chat session started"
        );

        let mut effects = vec![Effect::Title(self.title())];
        for user_id in std::iter::once(self.local.id.clone()).chain(self.roster.ids()) {
            let path = platform::avatar_path(&user_id).to_string_lossy().into_owned();
            effects.push(Effect::Avatar { user_id, path });
        }
        if let Some(bucket) = self.roster.primary().and_then(|p| p.bucket()) {
            effects.push(Effect::Icon(icon_for(bucket)));
        }
        effects.push(Effect::Banner(self.banner()));
        effects
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn local(&self) -> &LocalUser {
        &self.local
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn transfers(&self) -> &TransferNegotiator {
        &self.transfers
    }

    pub fn presence(&self) -> PresenceState {
        self.presence.state()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Entries recorded so far, oldest first.
    pub fn log_entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.log.iter()
    }

    /// Banner currently shown, by priority.
    pub fn banner(&self) -> Option<Banner> {
        if !self.connected {
            Some(Banner::Disconnected)
        } else if self.roster.is_group() {
            None
        } else {
            self.peer_banner
        }
    }

    /// Conversation title, e.g. `"Alice, Bob - Conversation"`.
    pub fn title(&self) -> String {
        self.roster.title()
    }

    // ==================== Inbound ====================

    /// Decode wire text and dispatch it. Undecodable messages are dropped.
    pub fn receive_wire(&mut self, sender_id: Option<&str>, wire: &str) -> Vec<Effect> {
        match Envelope::decode(wire) {
            Ok(envelope) => self.receive_message(envelope.kind, sender_id, &envelope),
            Err(e) if e.is_codec_error() => {
                warn!(sender = ?sender_id, error = %e, "dropping undecodable envelope");
                Vec::new()
            }
            Err(e) => {
                warn!(sender = ?sender_id, error = %e, "failed to read envelope");
                Vec::new()
            }
        }
    }

    /// Dispatch an envelope. `sender_id == None` marks a locally originated one.
    pub fn receive_message(&mut self, kind: MessageKind, sender_id: Option<&str>, envelope: &Envelope) -> Vec<Effect> {
        if self.closed {
            debug!(%kind, "session closed, ignoring message");
            return Vec::new();
        }

        let sender_id_owned = sender_id.unwrap_or(self.local.id.as_str()).to_string();
        let sender_name = match sender_id {
            Some(id) => self.roster.name_of(id).unwrap_or(id).to_string(),
            None => self.local.name.clone(),
        };

        match kind {
            MessageKind::Message | MessageKind::Broadcast | MessageKind::GroupMessage => {
                if !self.in_this_thread(envelope) {
                    debug!(thread = ?envelope.thread_id(), "message for another thread");
                    return Vec::new();
                }
                let mut effects = vec![self.log(kind, sender_id, Some(&sender_name), envelope.clone())];
                if sender_id.is_some() {
                    let alert = if kind == MessageKind::Broadcast {
                        AlertKind::Broadcast
                    } else {
                        AlertKind::NewMessage
                    };
                    effects.push(Effect::Alert {
                        kind: alert,
                        sender_name,
                    });
                }
                effects
            }

            MessageKind::ChatState | MessageKind::Failed | MessageKind::Error => {
                if !self.in_this_thread(envelope) {
                    debug!(thread = ?envelope.thread_id(), "state for another thread");
                    return Vec::new();
                }
                vec![self.log(kind, sender_id, Some(&sender_name), envelope.clone())]
            }

            MessageKind::Status => self.handle_status(&sender_id_owned, envelope),

            MessageKind::UserName => {
                let Some(name) = envelope.data(field::NAME).filter(|n| !n.is_empty()) else {
                    return Vec::new();
                };
                if sender_id.is_none() {
                    self.local.name = name.to_string();
                }
                let in_roster = self.roster.set_name(&sender_id_owned, name);

                let mut effects = vec![Effect::UserName {
                    user_id: sender_id_owned,
                    name: name.to_string(),
                }];
                if in_roster {
                    effects.push(Effect::Title(self.title()));
                }
                effects
            }

            MessageKind::Avatar | MessageKind::LocalAvatar => match envelope.data(field::FILE_PATH) {
                Some(path) => vec![Effect::Avatar {
                    user_id: sender_id_owned,
                    path: path.to_string(),
                }],
                None => Vec::new(),
            },

            MessageKind::File => {
                if envelope.data(field::FILE_OP) == Some(FileOp::Request.as_str()) {
                    match sender_id {
                        Some(id) => self.handle_offer(id, sender_name, envelope),
                        None => {
                            // Local offers are echoed as LocalFile by send_file
                            debug!("ignoring file request without a remote sender");
                            vec![self.log(kind, None, Some(&sender_name), envelope.clone())]
                        }
                    }
                } else {
                    match self.transfers.apply_envelope(envelope) {
                        Some(update) => vec![self.transfer_updated(update)],
                        None => Vec::new(),
                    }
                }
            }

            MessageKind::LocalFile => {
                if envelope.data(field::FILE_OP) != Some(FileOp::Request.as_str()) {
                    return Vec::new();
                }
                let Some(path) = envelope.data(field::FILE_PATH) else {
                    return Vec::new();
                };
                let size = envelope
                    .data(field::FILE_SIZE)
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0);
                self.send_file(path, size)
            }
        }
    }

    fn in_this_thread(&self, envelope: &Envelope) -> bool {
        match (self.roster.thread_id(), envelope.thread_id()) {
            (Some(ours), Some(theirs)) => ours == theirs,
            _ => true,
        }
    }

    fn handle_status(&mut self, sender_id: &str, envelope: &Envelope) -> Vec<Effect> {
        let code = envelope.data(field::STATUS).unwrap_or_default();
        let Some(bucket) = classify(code) else {
            debug!(code, "ignoring unknown status code");
            return Vec::new();
        };

        if !self.roster.set_status(sender_id, code) {
            return Vec::new();
        }
        if sender_id != self.roster.primary_id() {
            return Vec::new();
        }

        self.peer_banner = banner_for(bucket);
        vec![Effect::Icon(icon_for(bucket)), Effect::Banner(self.banner())]
    }

    fn handle_offer(&mut self, sender_id: &str, sender_name: String, envelope: &Envelope) -> Vec<Effect> {
        let Some(record) = self.transfers.offer_received(sender_id, envelope) else {
            return Vec::new();
        };

        vec![
            self.log(MessageKind::File, Some(sender_id), Some(&sender_name), envelope.clone()),
            Effect::TransferOffered(record),
            Effect::Alert {
                kind: AlertKind::NewFile,
                sender_name,
            },
        ]
    }

    // ==================== Outbound ====================

    /// Send the compose box contents to every roster member.
    pub fn send_message(&mut self, text: &str) -> Vec<Effect> {
        if self.closed {
            return Vec::new();
        }

        let text = if self.config.trim_message { text.trim() } else { text };
        if text.is_empty() {
            return Vec::new();
        }

        let mut effects = if self.connected {
            let kind = if self.roster.is_group() {
                MessageKind::GroupMessage
            } else {
                MessageKind::Message
            };

            let mut envelope = Envelope::new(kind)
                .with_header(field::TIME, Utc::now().timestamp_millis().to_string())
                .with_data(field::FONT, self.config.font.as_str())
                .with_data(field::COLOR, self.config.color.as_str());
            envelope = match self.roster.thread_id() {
                Some(thread) if self.roster.is_group() => envelope
                    .with_thread(thread)
                    .with_data(field::GROUP_MESSAGE, text),
                _ => envelope.with_data(field::MESSAGE, text),
            };

            let local_id = self.local.id.clone();
            let local_name = self.local.name.clone();
            let mut effects = vec![self.log(
                MessageKind::Message,
                Some(&local_id),
                Some(&local_name),
                envelope.clone(),
            )];
            effects.extend(self.fan_out(&envelope));
            effects
        } else {
            vec![self.not_connected()]
        };

        self.composition_empty = true;
        let presence = self.presence.message_sent();
        effects.extend(self.presence_effects(presence));
        effects
    }

    /// Offer a local file to every roster member.
    pub fn send_file(&mut self, file_path: &str, size: u64) -> Vec<Effect> {
        if self.closed {
            return Vec::new();
        }
        if !self.connected {
            return vec![self.not_connected()];
        }

        let record = self.transfers.request_send(file_path, size);
        let envelope = record.request_envelope();
        let primary_name = self.roster.primary().map(|p| p.name.clone());

        let mut effects = vec![self.log(MessageKind::LocalFile, None, primary_name.as_deref(), envelope.clone())];
        effects.extend(self.fan_out(&envelope));
        effects
    }

    /// Accept an incoming file offer.
    pub fn accept_transfer(&mut self, id: &TransferId) -> Vec<Effect> {
        self.answer_offer(id, true)
    }

    /// Decline an incoming file offer.
    pub fn decline_transfer(&mut self, id: &TransferId) -> Vec<Effect> {
        self.answer_offer(id, false)
    }

    fn answer_offer(&mut self, id: &TransferId, accept: bool) -> Vec<Effect> {
        if self.closed {
            return Vec::new();
        }
        if !self.connected {
            return vec![self.not_connected()];
        }

        let answered = if accept {
            self.transfers.accept(id)
        } else {
            self.transfers.decline(id)
        };
        let Some((update, reply)) = answered else {
            return Vec::new();
        };

        let peer_id = self
            .transfers
            .get(id, update.role)
            .and_then(|r| r.peer_id.clone());

        let mut effects = vec![self.transfer_updated(update)];
        if let Some(peer_id) = peer_id {
            effects.push(Effect::Send {
                peer_id,
                envelope: reply,
            });
        }
        effects
    }

    /// Cancel one of our outgoing transfers.
    pub fn cancel_transfer(&mut self, id: &TransferId) -> Vec<Effect> {
        if self.closed {
            return Vec::new();
        }
        if !self.connected {
            return vec![self.not_connected()];
        }

        let Some((update, reply)) = self.transfers.cancel(id) else {
            return Vec::new();
        };

        let mut effects = vec![self.transfer_updated(update)];
        effects.extend(self.fan_out(&reply));
        effects
    }

    /// Report an outcome change. Declined and cancelled records are archived right away.
    fn transfer_updated(&mut self, update: TransferUpdate) -> Effect {
        if matches!(update.outcome, TransferOutcome::Declined | TransferOutcome::Cancelled) {
            let archived = self.transfers.archive_terminal();
            debug!(file_id = %update.id, archived = archived.len(), "archived finished transfers");
        }
        Effect::TransferUpdated(update)
    }

    // ==================== Local activity ====================

    /// A key was pressed in the compose box; `buffer_empty` is its state afterwards.
    pub fn key_pressed(&mut self, buffer_empty: bool) -> Vec<Effect> {
        if self.closed {
            return Vec::new();
        }
        self.composition_empty = buffer_empty;
        let presence = self.presence.key_pressed();
        self.presence_effects(presence)
    }

    /// The debounce timer armed with `token` elapsed.
    pub fn debounce_fired(&mut self, token: TimerToken) -> Vec<Effect> {
        let presence = self.presence.debounce_fired(token, self.composition_empty);
        self.presence_effects(presence)
    }

    /// The link to the network came up or went down.
    pub fn connection_state_changed(&mut self, connected: bool) -> Vec<Effect> {
        if self.connected == connected {
            return Vec::new();
        }
        info!(connected, "session connection state changed");
        self.connected = connected;
        vec![Effect::Banner(self.banner())]
    }

    /// Apply new preferences.
    pub fn settings_changed(&mut self, config: SessionConfig) -> Vec<Effect> {
        let mut effects = Vec::new();
        if !config.display_name.is_empty() && config.display_name != self.local.name {
            self.local.name = config.display_name.clone();
            effects.push(Effect::UserName {
                user_id: self.local.id.clone(),
                name: self.local.name.clone(),
            });
        }
        self.presence.set_delay(config.pause_delay());
        self.config = config;
        effects
    }

    /// Add a participant to a group conversation.
    pub fn join(&mut self, peer: Peer) -> Vec<Effect> {
        let user_id = peer.id.clone();
        if !self.roster.join(peer) {
            return Vec::new();
        }
        let path = platform::avatar_path(&user_id).to_string_lossy().into_owned();
        vec![Effect::Avatar { user_id, path }, Effect::Title(self.title())]
    }

    /// Remove a participant from a group conversation.
    pub fn leave(&mut self, peer_id: &str) -> Vec<Effect> {
        match self.roster.leave(peer_id) {
            Some(_) => vec![Effect::Title(self.title())],
            None => Vec::new(),
        }
    }

    /// Tear the session down. Later calls are no-ops.
    pub fn close(&mut self) -> Vec<Effect> {
        if self.closed {
            return Vec::new();
        }

        let presence = self.presence.close();
        let mut effects = self.presence_effects(presence);
        // Inactive always leaves the timer cancelled, even if it was never armed
        if !effects.contains(&Effect::CancelTimer) {
            effects.push(Effect::CancelTimer);
        }

        if self.config.save_history && self.has_data && !self.history_saved {
            let title = if self.roster.is_group() {
                GROUP_HISTORY_TITLE.to_string()
            } else {
                self.roster
                    .primary()
                    .map(|p| p.name.clone())
                    .unwrap_or_default()
            };
            effects.push(Effect::SaveHistory {
                title,
                at: Utc::now(),
                entries: self.log.iter().cloned().collect(),
            });
            self.history_saved = true;
        }

        self.closed = true;
        info!(local = %self.local.id, "chat session closed");
        effects
    }

    // ==================== Helpers ====================

    fn log(&mut self, kind: MessageKind, sender_id: Option<&str>, sender_name: Option<&str>, envelope: Envelope) -> Effect {
        let entry = LogEntry {
            kind,
            sender_id: sender_id.map(str::to_string),
            sender_name: sender_name.map(str::to_string),
            envelope,
        };

        if !matches!(kind, MessageKind::ChatState | MessageKind::Error) {
            self.has_data = true;
        }
        self.log.push_back(entry.clone());
        while self.log.len() > MAX_LOG_ENTRIES {
            self.log.pop_front();
        }

        Effect::Log(entry)
    }

    fn not_connected(&mut self) -> Effect {
        warn!("outbound action while disconnected");
        let envelope = Envelope::new(MessageKind::Error)
            .with_header(field::TIME, Utc::now().timestamp_millis().to_string())
            .with_data(field::MESSAGE, crate::error::Error::NotConnected.to_string());
        self.log(MessageKind::Error, None, None, envelope)
    }

    /// One addressed copy of `envelope` per roster member.
    fn fan_out(&self, envelope: &Envelope) -> Vec<Effect> {
        self.roster
            .ids()
            .into_iter()
            .map(|peer_id| Effect::Send {
                peer_id,
                envelope: envelope.clone(),
            })
            .collect()
    }

    fn chat_state_envelope(&self, state: PresenceState) -> Envelope {
        let envelope = Envelope::new(MessageKind::ChatState);
        let envelope = match self.roster.thread_id() {
            Some(thread) if self.roster.is_group() => envelope.with_thread(thread),
            _ => envelope,
        };
        envelope.with_data(field::CHAT_STATE, state.as_str())
    }

    fn presence_effects(&self, effects: Vec<PresenceEffect>) -> Vec<Effect> {
        let mut out = Vec::new();
        for effect in effects {
            match effect {
                PresenceEffect::Notify(state) => {
                    if self.connected {
                        out.extend(self.fan_out(&self.chat_state_envelope(state)));
                    }
                }
                PresenceEffect::ArmTimer { token, delay } => out.push(Effect::ArmTimer { token, delay }),
                PresenceEffect::CancelTimer => out.push(Effect::CancelTimer),
            }
        }
        out
    }
}
