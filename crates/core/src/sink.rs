//! Collaborators that carry out session effects.
//!
//! The session only describes what should happen. A [`Transport`] puts
//! envelopes on the wire, a [`LogSink`] renders the conversation and a
//! [`HistorySink`] persists it. [`EffectRouter`] hands each effect to the
//! right one and passes timer requests back to the caller.

use crate::envelope::{Envelope, MessageKind};
use crate::error::Result;
use crate::session::{Effect, LogEntry};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

/// Delivers envelopes to peers.
pub trait Transport: Send {
    /// Send one envelope to one peer. Retries are the transport's business.
    fn send(&mut self, peer_id: &str, envelope: &Envelope) -> Result<()>;
}

/// Renders the conversation.
pub trait LogSink: Send {
    /// Append an entry to the visible log.
    fn append(&mut self, kind: MessageKind, sender_id: Option<&str>, sender_name: Option<&str>, envelope: &Envelope);

    /// Show a presentation change (banner, icon, title, avatar, alert, transfer).
    ///
    /// Default implementation ignores it.
    fn present(&mut self, _effect: &Effect) {}
}

/// Persists finished conversations.
pub trait HistorySink: Send {
    fn save(&mut self, title: &str, at: DateTime<Utc>, entries: &[LogEntry]) -> Result<()>;
}

/// Dispatches effects to their collaborators.
pub struct EffectRouter {
    transport: Box<dyn Transport>,
    log: Box<dyn LogSink>,
    history: Option<Box<dyn HistorySink>>,
}

impl EffectRouter {
    pub fn new(transport: impl Transport + 'static, log: impl LogSink + 'static) -> Self {
        Self {
            transport: Box::new(transport),
            log: Box::new(log),
            history: None,
        }
    }

    /// Attach a history sink. Without one, save requests are dropped.
    pub fn with_history(mut self, history: impl HistorySink + 'static) -> Self {
        self.history = Some(Box::new(history));
        self
    }

    /// Carry out `effects` in order.
    ///
    /// Timer effects cannot be handled here and are returned, in order, for
    /// the caller's clock.
    pub fn apply(&mut self, effects: Vec<Effect>) -> Vec<Effect> {
        let mut timers = Vec::new();

        for effect in effects {
            match effect {
                Effect::Send { peer_id, envelope } => {
                    if let Err(e) = self.transport.send(&peer_id, &envelope) {
                        warn!(peer = %peer_id, kind = %envelope.kind, error = %e, "transport send failed");
                    }
                }
                Effect::Log(entry) => {
                    self.log.append(
                        entry.kind,
                        entry.sender_id.as_deref(),
                        entry.sender_name.as_deref(),
                        &entry.envelope,
                    );
                }
                Effect::SaveHistory { title, at, entries } => match self.history.as_mut() {
                    Some(history) => {
                        if let Err(e) = history.save(&title, at, &entries) {
                            warn!(error = %e, "failed to save conversation history");
                        }
                    }
                    None => debug!("no history sink, skipping save"),
                },
                Effect::ArmTimer { .. } | Effect::CancelTimer => timers.push(effect),
                other => self.log.present(&other),
            }
        }

        timers
    }
}
