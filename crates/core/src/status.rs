//! Peer status codes and presence buckets.

use crate::vocab::{index_of, Vocabulary};
use serde::{Deserialize, Serialize};

/// Known status codes, in table order.
pub const STATUS_CODES: [&str; 6] = ["chat", "busy", "dnd", "brb", "away", "gone"];

/// Bucket for each entry of [`STATUS_CODES`], index for index.
pub const STATUS_BUCKETS: [StatusBucket; 6] = [
    StatusBucket::Online,
    StatusBucket::Busy,
    StatusBucket::Busy,
    StatusBucket::Away,
    StatusBucket::Away,
    StatusBucket::Offline,
];

/// Coarse presence classification of a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusBucket {
    Online,
    Away,
    Busy,
    Offline,
}

impl Vocabulary for StatusBucket {
    const ALL: &'static [Self] = &[
        StatusBucket::Online,
        StatusBucket::Away,
        StatusBucket::Busy,
        StatusBucket::Offline,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            StatusBucket::Online => "online",
            StatusBucket::Away => "away",
            StatusBucket::Busy => "busy",
            StatusBucket::Offline => "offline",
        }
    }
}

/// Informational banner shown above the conversation.
///
/// Variants are declared in display priority: when several conditions hold,
/// the first one wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Banner {
    Disconnected,
    Offline,
    Busy,
    Away,
}

impl Banner {
    /// Banner text for the given peer name.
    pub fn text(&self, peer_name: &str) -> String {
        match self {
            Banner::Disconnected => "You are no longer connected.".to_string(),
            Banner::Offline => format!("{} is offline.", peer_name),
            Banner::Busy => format!("{} is busy. You may be interrupting.", peer_name),
            Banner::Away => format!("{} is away.", peer_name),
        }
    }
}

/// Classify a raw status code. Unknown codes yield `None` and must be ignored.
pub fn classify(code: &str) -> Option<StatusBucket> {
    index_of(STATUS_CODES, code).map(|index| STATUS_BUCKETS[index])
}

/// Icon key for a presence bucket.
pub fn icon_for(bucket: StatusBucket) -> &'static str {
    match bucket {
        StatusBucket::Online => "bubble-online",
        StatusBucket::Away => "bubble-away",
        StatusBucket::Busy => "bubble-busy",
        StatusBucket::Offline => "bubble-offline",
    }
}

/// Peer-status banner for a bucket (the disconnected banner is session state).
pub fn banner_for(bucket: StatusBucket) -> Option<Banner> {
    match bucket {
        StatusBucket::Online => None,
        StatusBucket::Away => Some(Banner::Away),
        StatusBucket::Busy => Some(Banner::Busy),
        StatusBucket::Offline => Some(Banner::Offline),
    }
}
