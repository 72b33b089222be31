//! LAN Chat Core Library
//!
//! This crate provides the session engine for LAN chat conversations, including:
//! - The `||`-delimited envelope wire format
//! - Peer status classification and roster tracking
//! - The typing/presence state machine with its debounce timer
//! - File transfer negotiation
//! - The session dispatcher and its async driver
//!
//! It is used by the daemon crate and by any UI that hosts a conversation.

pub mod actor;
pub mod config;
pub mod envelope;
pub mod error;
pub mod files;
pub mod platform;
pub mod presence;
pub mod roster;
pub mod session;
pub mod sink;
pub mod status;
pub mod transfer;
pub mod version;
pub mod vocab;

// Re-export commonly used types
pub use actor::{SessionActor, SessionCommand, SessionHandle, SessionSnapshot};
pub use config::{SessionConfig, Theme};
pub use envelope::{Envelope, MessageKind};
pub use error::{Error, Result};
pub use presence::{PresenceMachine, PresenceState, TimerToken};
pub use roster::{Peer, Roster};
pub use session::{Effect, LocalUser, LogEntry, Session};
pub use sink::{EffectRouter, HistorySink, LogSink, Transport};
pub use status::{Banner, StatusBucket};
pub use transfer::{TransferId, TransferNegotiator, TransferOutcome, TransferRecord, TransferRole};
pub use vocab::Vocabulary;
