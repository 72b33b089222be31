//! File transfer negotiation.
//!
//! Each transfer is tracked per side: the sender holds a `Send` record and
//! each recipient a `Receive` record under the same file id. Records only
//! move forward:
//!
//! ```text
//! Requested -> Accepted -> Cancelled
//! Requested -> Declined
//! Requested -> Cancelled
//! ```

use crate::envelope::{field, Envelope, MessageKind};
use crate::files::{file_name_of, format_size, secure_filename};
use crate::vocab::Vocabulary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

/// File type tag sent with every request.
pub const FILE_TYPE_NORMAL: &str = "normal";

/// Unique identifier for a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransferId(pub String);

impl TransferId {
    /// Generate a new random transfer ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TransferId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TransferId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Operation carried by a file envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileOp {
    Request,
    Accept,
    Decline,
    Cancel,
}

impl Vocabulary for FileOp {
    const ALL: &'static [Self] = &[FileOp::Request, FileOp::Accept, FileOp::Decline, FileOp::Cancel];

    fn as_str(&self) -> &'static str {
        match self {
            FileOp::Request => "request",
            FileOp::Accept => "accept",
            FileOp::Decline => "decline",
            FileOp::Cancel => "cancel",
        }
    }
}

/// Which side of a transfer a record or envelope belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferRole {
    Send,
    Receive,
}

impl Vocabulary for TransferRole {
    const ALL: &'static [Self] = &[TransferRole::Send, TransferRole::Receive];

    fn as_str(&self) -> &'static str {
        match self {
            TransferRole::Send => "send",
            TransferRole::Receive => "receive",
        }
    }
}

/// Negotiation outcome of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferOutcome {
    Requested,
    Accepted,
    Declined,
    Cancelled,
}

impl TransferOutcome {
    /// Check if the negotiation has ended.
    ///
    /// `Accepted` hands the transfer over to the transport, so it counts as
    /// terminal for negotiation even though it can still be cancelled.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferOutcome::Accepted | TransferOutcome::Declined | TransferOutcome::Cancelled
        )
    }

    /// Whether `next` is a forward edge from this outcome.
    pub fn can_advance_to(&self, next: TransferOutcome) -> bool {
        use TransferOutcome::*;
        matches!(
            (*self, next),
            (Requested, Accepted) | (Requested, Declined) | (Requested, Cancelled) | (Accepted, Cancelled)
        )
    }
}

/// One side of a file transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub id: TransferId,
    pub role: TransferRole,
    pub outcome: TransferOutcome,
    pub file_path: String,
    pub file_name: String,
    pub size: u64,
    /// Sender of an incoming offer. Outgoing records address the whole roster.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl TransferRecord {
    /// Create a new outgoing request for a local file.
    pub fn new_send(file_path: &str, size: u64) -> Self {
        Self {
            id: TransferId::new(),
            role: TransferRole::Send,
            outcome: TransferOutcome::Requested,
            file_path: file_path.to_string(),
            file_name: file_name_of(file_path),
            size,
            peer_id: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Build the receiving side from a peer's request envelope.
    ///
    /// Returns `None` if the envelope carries no file id.
    pub fn from_request(peer_id: &str, envelope: &Envelope) -> Option<Self> {
        let id = envelope.data(field::FILE_ID).filter(|id| !id.is_empty())?;
        let file_path = envelope.data(field::FILE_PATH).unwrap_or_default();
        let file_name = envelope
            .data(field::FILE_NAME)
            .map(secure_filename)
            .unwrap_or_else(|| file_name_of(file_path));
        let size = envelope
            .data(field::FILE_SIZE)
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);

        Some(Self {
            id: TransferId::from(id),
            role: TransferRole::Receive,
            outcome: TransferOutcome::Requested,
            file_path: file_path.to_string(),
            file_name,
            size,
            peer_id: Some(peer_id.to_string()),
            created_at: Utc::now(),
            completed_at: None,
        })
    }

    /// The request envelope announcing this outgoing transfer.
    pub fn request_envelope(&self) -> Envelope {
        Envelope::new(MessageKind::File)
            .with_data(field::MODE, TransferRole::Send.as_str())
            .with_data(field::FILE_TYPE, FILE_TYPE_NORMAL)
            .with_data(field::FILE_OP, FileOp::Request.as_str())
            .with_data(field::FILE_ID, self.id.as_str())
            .with_data(field::FILE_PATH, self.file_path.as_str())
            .with_data(field::FILE_NAME, self.file_name.as_str())
            .with_data(field::FILE_SIZE, self.size.to_string())
    }

    /// A reply about this transfer, sent from this record's side.
    pub fn reply_envelope(&self, op: FileOp) -> Envelope {
        Envelope::new(MessageKind::File)
            .with_data(field::MODE, self.role.as_str())
            .with_data(field::FILE_OP, op.as_str())
            .with_data(field::FILE_ID, self.id.as_str())
            .with_data(field::FILE_NAME, self.file_name.as_str())
    }

    /// Human-readable size, e.g. `1.50 KB`.
    pub fn display_size(&self) -> String {
        format_size(self.size)
    }
}

/// A record changed outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferUpdate {
    pub id: TransferId,
    pub role: TransferRole,
    pub outcome: TransferOutcome,
}

/// Tracks every transfer record of one session.
#[derive(Debug, Clone, Default)]
pub struct TransferNegotiator {
    records: HashMap<(TransferId, TransferRole), TransferRecord>,
}

impl TransferNegotiator {
    /// Create a new negotiator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start an outgoing transfer for a local file.
    pub fn request_send(&mut self, file_path: &str, size: u64) -> TransferRecord {
        let record = TransferRecord::new_send(file_path, size);
        debug!(file_id = %record.id, name = %record.file_name, "outgoing transfer requested");
        self.records
            .insert((record.id.clone(), record.role), record.clone());
        record
    }

    /// Record an incoming offer. Duplicate offers for a known id are ignored.
    pub fn offer_received(&mut self, peer_id: &str, envelope: &Envelope) -> Option<TransferRecord> {
        let record = TransferRecord::from_request(peer_id, envelope)?;
        let key = (record.id.clone(), record.role);
        if self.records.contains_key(&key) {
            return None;
        }
        debug!(file_id = %record.id, from = peer_id, "incoming transfer offered");
        self.records.insert(key, record.clone());
        Some(record)
    }

    /// Apply a peer's reply given its raw op and mode tags.
    ///
    /// Unrecognised tags, unknown ids and backward edges are all no-ops.
    pub fn apply_remote(&mut self, op: &str, mode: &str, file_id: &str) -> Option<TransferUpdate> {
        let op = FileOp::resolve(op)?;
        let mode = TransferRole::resolve(mode)?;
        let id = TransferId::from(file_id);

        match op {
            FileOp::Cancel if mode == TransferRole::Send => {
                self.advance(&id, TransferRole::Receive, TransferOutcome::Cancelled)
            }
            FileOp::Accept => self.advance(&id, TransferRole::Send, TransferOutcome::Accepted),
            FileOp::Decline => self.advance(&id, TransferRole::Send, TransferOutcome::Declined),
            _ => None,
        }
    }

    /// Apply a non-request file envelope from a peer.
    pub fn apply_envelope(&mut self, envelope: &Envelope) -> Option<TransferUpdate> {
        self.apply_remote(
            envelope.data(field::FILE_OP).unwrap_or_default(),
            envelope.data(field::MODE).unwrap_or_default(),
            envelope.data(field::FILE_ID).unwrap_or_default(),
        )
    }

    /// Accept an incoming offer. Returns the update and the reply for the sender.
    pub fn accept(&mut self, id: &TransferId) -> Option<(TransferUpdate, Envelope)> {
        self.reply(id, TransferRole::Receive, FileOp::Accept, TransferOutcome::Accepted)
    }

    /// Decline an incoming offer.
    pub fn decline(&mut self, id: &TransferId) -> Option<(TransferUpdate, Envelope)> {
        self.reply(id, TransferRole::Receive, FileOp::Decline, TransferOutcome::Declined)
    }

    /// Cancel an outgoing transfer.
    pub fn cancel(&mut self, id: &TransferId) -> Option<(TransferUpdate, Envelope)> {
        self.reply(id, TransferRole::Send, FileOp::Cancel, TransferOutcome::Cancelled)
    }

    fn reply(
        &mut self,
        id: &TransferId,
        role: TransferRole,
        op: FileOp,
        outcome: TransferOutcome,
    ) -> Option<(TransferUpdate, Envelope)> {
        let update = self.advance(id, role, outcome)?;
        let envelope = self.records.get(&(id.clone(), role))?.reply_envelope(op);
        Some((update, envelope))
    }

    fn advance(&mut self, id: &TransferId, role: TransferRole, next: TransferOutcome) -> Option<TransferUpdate> {
        let record = self.records.get_mut(&(id.clone(), role))?;
        if !record.outcome.can_advance_to(next) {
            debug!(file_id = %id, from = ?record.outcome, to = ?next, "ignoring backward transfer edge");
            return None;
        }

        record.outcome = next;
        if next.is_terminal() {
            record.completed_at = Some(Utc::now());
        }

        Some(TransferUpdate {
            id: id.clone(),
            role,
            outcome: next,
        })
    }

    /// Get a record by id and role.
    pub fn get(&self, id: &TransferId, role: TransferRole) -> Option<&TransferRecord> {
        self.records.get(&(id.clone(), role))
    }

    /// Get all records, oldest first.
    pub fn list(&self) -> Vec<TransferRecord> {
        let mut records: Vec<_> = self.records.values().cloned().collect();
        records.sort_by_key(|r| r.created_at);
        records
    }

    /// Records still awaiting an answer.
    pub fn list_pending(&self) -> Vec<TransferRecord> {
        self.list()
            .into_iter()
            .filter(|r| !r.outcome.is_terminal())
            .collect()
    }

    /// Remove declined and cancelled records, returning them.
    ///
    /// Accepted records stay so that a later cancel can still reach them.
    pub fn archive_terminal(&mut self) -> Vec<TransferRecord> {
        let done: Vec<_> = self
            .records
            .iter()
            .filter(|(_, r)| matches!(r.outcome, TransferOutcome::Declined | TransferOutcome::Cancelled))
            .map(|(key, _)| key.clone())
            .collect();

        done.into_iter()
            .filter_map(|key| self.records.remove(&key))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer(id: &str) -> Envelope {
        Envelope::new(MessageKind::File)
            .with_data(field::MODE, "send")
            .with_data(field::FILE_OP, "request")
            .with_data(field::FILE_ID, id)
            .with_data(field::FILE_PATH, "/tmp/report.pdf")
            .with_data(field::FILE_NAME, "report.pdf")
            .with_data(field::FILE_SIZE, "2048")
    }

    #[test]
    fn test_request_envelope_fields() {
        let mut negotiator = TransferNegotiator::new();
        let record = negotiator.request_send("/home/alice/photo.png", 1536);

        assert_eq!(record.role, TransferRole::Send);
        assert_eq!(record.outcome, TransferOutcome::Requested);
        assert_eq!(record.file_name, "photo.png");
        assert_eq!(record.display_size(), "1.50 KB");
        assert!(!record.id.as_str().contains('-'));

        let envelope = record.request_envelope();
        assert_eq!(envelope.data(field::FILE_OP), Some("request"));
        assert_eq!(envelope.data(field::MODE), Some("send"));
        assert_eq!(envelope.data(field::FILE_SIZE), Some("1536"));
    }

    #[test]
    fn test_offer_received() {
        let mut negotiator = TransferNegotiator::new();
        let record = negotiator.offer_received("bob", &offer("f1")).unwrap();
        assert_eq!(record.role, TransferRole::Receive);
        assert_eq!(record.size, 2048);
        assert_eq!(record.peer_id.as_deref(), Some("bob"));

        assert!(negotiator.offer_received("bob", &offer("f1")).is_none());
        assert!(negotiator
            .offer_received("bob", &Envelope::new(MessageKind::File))
            .is_none());
    }

    #[test]
    fn test_cancel_from_sender_hits_receive_record_only() {
        let mut negotiator = TransferNegotiator::new();
        negotiator.offer_received("bob", &offer("f1"));
        negotiator.offer_received("bob", &offer("f2"));

        let update = negotiator.apply_remote("cancel", "send", "f1").unwrap();
        assert_eq!(update.role, TransferRole::Receive);
        assert_eq!(update.outcome, TransferOutcome::Cancelled);

        let f2 = negotiator.get(&"f2".into(), TransferRole::Receive).unwrap();
        assert_eq!(f2.outcome, TransferOutcome::Requested);
    }

    #[test]
    fn test_cancel_from_receiver_mode_ignored() {
        let mut negotiator = TransferNegotiator::new();
        negotiator.offer_received("bob", &offer("f1"));
        assert!(negotiator.apply_remote("cancel", "receive", "f1").is_none());
    }

    #[test]
    fn test_accept_and_decline_hit_send_record() {
        let mut negotiator = TransferNegotiator::new();
        let a = negotiator.request_send("/a.txt", 1).id;
        let b = negotiator.request_send("/b.txt", 1).id;

        let update = negotiator.apply_remote("accept", "receive", a.as_str()).unwrap();
        assert_eq!(update.outcome, TransferOutcome::Accepted);
        let update = negotiator.apply_remote("decline", "receive", b.as_str()).unwrap();
        assert_eq!(update.outcome, TransferOutcome::Declined);

        // Backward and repeated edges are ignored
        assert!(negotiator.apply_remote("decline", "receive", a.as_str()).is_none());
        assert!(negotiator.apply_remote("accept", "receive", b.as_str()).is_none());
    }

    #[test]
    fn test_unknown_vocabulary_ignored() {
        let mut negotiator = TransferNegotiator::new();
        let id = negotiator.request_send("/a.txt", 1).id;
        assert!(negotiator.apply_remote("explode", "receive", id.as_str()).is_none());
        assert!(negotiator.apply_remote("accept", "sideways", id.as_str()).is_none());
        assert!(negotiator.apply_remote("accept", "receive", "nope").is_none());
        assert_eq!(negotiator.list_pending().len(), 1);
    }

    #[test]
    fn test_local_replies() {
        let mut negotiator = TransferNegotiator::new();
        negotiator.offer_received("bob", &offer("f1"));

        let (update, reply) = negotiator.accept(&"f1".into()).unwrap();
        assert_eq!(update.outcome, TransferOutcome::Accepted);
        assert_eq!(reply.data(field::FILE_OP), Some("accept"));
        assert_eq!(reply.data(field::MODE), Some("receive"));
        assert!(negotiator.decline(&"f1".into()).is_none());

        let id = negotiator.request_send("/a.txt", 1).id;
        negotiator.apply_remote("accept", "receive", id.as_str());
        let (update, reply) = negotiator.cancel(&id).unwrap();
        assert_eq!(update.outcome, TransferOutcome::Cancelled);
        assert_eq!(reply.data(field::FILE_OP), Some("cancel"));
        assert_eq!(reply.data(field::MODE), Some("send"));
    }

    #[test]
    fn test_archive_terminal() {
        let mut negotiator = TransferNegotiator::new();
        let a = negotiator.request_send("/a.txt", 1).id;
        let b = negotiator.request_send("/b.txt", 1).id;
        negotiator.request_send("/c.txt", 1);
        negotiator.apply_remote("decline", "receive", a.as_str());
        negotiator.apply_remote("accept", "receive", b.as_str());

        let archived = negotiator.archive_terminal();
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].id, a);
        assert!(archived[0].completed_at.is_some());
        assert_eq!(negotiator.list().len(), 2);
    }
}
