//! Peers participating in a chat session.

use crate::status::{classify, StatusBucket};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A remote participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    /// Session-unique identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Last known raw status code.
    pub status: String,
}

impl Peer {
    pub fn new(id: impl Into<String>, name: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: status.into(),
        }
    }

    /// Presence bucket of the last known status, if the code is recognised.
    pub fn bucket(&self) -> Option<StatusBucket> {
        classify(&self.status)
    }
}

/// Peers addressed by one session.
///
/// A direct roster holds exactly one peer. A group roster holds any number,
/// one of which is the primary peer used for titles and banners.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Roster {
    peers: HashMap<String, Peer>,
    primary_id: String,
    group: bool,
    thread_id: Option<String>,
}

impl Roster {
    /// Roster for a one-to-one conversation.
    pub fn direct(peer: Peer) -> Self {
        let primary_id = peer.id.clone();
        let mut peers = HashMap::new();
        peers.insert(primary_id.clone(), peer);
        Self {
            peers,
            primary_id,
            group: false,
            thread_id: None,
        }
    }

    /// Roster for a group conversation identified by `thread_id`.
    pub fn group(thread_id: impl Into<String>, primary: Peer, others: impl IntoIterator<Item = Peer>) -> Self {
        let mut roster = Self::direct(primary);
        roster.group = true;
        roster.thread_id = Some(thread_id.into());
        for peer in others {
            roster.peers.insert(peer.id.clone(), peer);
        }
        roster
    }

    pub fn is_group(&self) -> bool {
        self.group
    }

    pub fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }

    pub fn primary_id(&self) -> &str {
        &self.primary_id
    }

    pub fn primary(&self) -> Option<&Peer> {
        self.peers.get(&self.primary_id)
    }

    pub fn get(&self, id: &str) -> Option<&Peer> {
        self.peers.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.peers.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// All peer ids, sorted for deterministic fan-out order.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.peers.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn peers(&self) -> impl Iterator<Item = &Peer> {
        self.peers.values()
    }

    /// Display name of a member, if present.
    pub fn name_of(&self, id: &str) -> Option<&str> {
        self.peers.get(id).map(|p| p.name.as_str())
    }

    /// Rename a member. Returns false for unknown ids.
    pub fn set_name(&mut self, id: &str, name: &str) -> bool {
        match self.peers.get_mut(id) {
            Some(peer) => {
                peer.name = name.to_string();
                true
            }
            None => false,
        }
    }

    /// Record a member's status code. Returns false for unknown ids.
    pub fn set_status(&mut self, id: &str, status: &str) -> bool {
        match self.peers.get_mut(id) {
            Some(peer) => {
                peer.status = status.to_string();
                true
            }
            None => false,
        }
    }

    /// Add a member to a group roster. Direct rosters never grow.
    pub fn join(&mut self, peer: Peer) -> bool {
        if !self.group || self.peers.contains_key(&peer.id) {
            return false;
        }
        self.peers.insert(peer.id.clone(), peer);
        true
    }

    /// Remove a member from a group roster. The primary peer cannot leave.
    pub fn leave(&mut self, id: &str) -> Option<Peer> {
        if !self.group || id == self.primary_id {
            return None;
        }
        self.peers.remove(id)
    }

    /// Conversation title, e.g. `"Alice, Bob - Conversation"`.
    pub fn title(&self) -> String {
        let mut names: Vec<&str> = self.peers.values().map(|p| p.name.as_str()).collect();
        names.sort_unstable();
        format!("{} - Conversation", names.join(", "))
    }
}
