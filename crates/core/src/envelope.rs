//! Message envelopes and their delimited wire form.
//!
//! An envelope travels as a single line of text:
//!
//! ```text
//! <kind>||<header count>||<name>||<value>...||<data count>||<name>||<value>...
//! ```
//!
//! Literal `|` and `\` inside any field are backslash-escaped, so a `||`
//! inside a value shows up on the wire as `\|\|`.

use crate::error::{Error, Result};
use crate::vocab::Vocabulary;
use serde::{Deserialize, Serialize};

/// Two-character field separator.
pub const DELIMITER: &str = "||";

const ESCAPE: char = '\\';
const PIPE: char = '|';

/// Names of header and data fields referenced by the engine.
pub mod field {
    pub const TIME: &str = "time";
    pub const FONT: &str = "font";
    pub const COLOR: &str = "color";
    pub const THREAD: &str = "thread";
    pub const MESSAGE: &str = "message";
    pub const GROUP_MESSAGE: &str = "groupmsg";
    pub const STATUS: &str = "status";
    pub const NAME: &str = "name";
    pub const FILE_PATH: &str = "filepath";
    pub const FILE_ID: &str = "fileid";
    pub const FILE_NAME: &str = "filename";
    pub const FILE_SIZE: &str = "filesize";
    pub const FILE_OP: &str = "fileop";
    pub const FILE_TYPE: &str = "filetype";
    pub const MODE: &str = "mode";
    pub const CHAT_STATE: &str = "chatstate";
}

/// Kind of message carried by an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Direct chat message.
    Message,
    /// Broadcast to everyone on the network.
    Broadcast,
    /// Message within a group conversation.
    GroupMessage,
    /// Typing/presence state.
    ChatState,
    /// Peer status code change.
    Status,
    /// Peer display name change.
    UserName,
    /// Avatar change announced by a peer.
    Avatar,
    /// Avatar change by the local user, or relayed into this session.
    LocalAvatar,
    /// File transfer negotiation.
    File,
    /// Local echo of a file transfer request.
    LocalFile,
    /// Delivery of an earlier message failed.
    Failed,
    /// Local-only error entry.
    Error,
}

impl Vocabulary for MessageKind {
    const ALL: &'static [Self] = &[
        MessageKind::Message,
        MessageKind::Broadcast,
        MessageKind::GroupMessage,
        MessageKind::ChatState,
        MessageKind::Status,
        MessageKind::UserName,
        MessageKind::Avatar,
        MessageKind::LocalAvatar,
        MessageKind::File,
        MessageKind::LocalFile,
        MessageKind::Failed,
        MessageKind::Error,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Message => "message",
            MessageKind::Broadcast => "broadcast",
            MessageKind::GroupMessage => "groupmessage",
            MessageKind::ChatState => "chatstate",
            MessageKind::Status => "status",
            MessageKind::UserName => "username",
            MessageKind::Avatar => "avatar",
            MessageKind::LocalAvatar => "localavatar",
            MessageKind::File => "file",
            MessageKind::LocalFile => "localfile",
            MessageKind::Failed => "failed",
            MessageKind::Error => "error",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered name/value pairs. Setting an existing name replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fields(Vec<(String, String)>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value for `name`, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Insert or replace a field.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self.0.iter().position(|(key, _)| key == name)?;
        Some(self.0.remove(index).1)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// A typed message unit exchanged between peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub kind: MessageKind,
    #[serde(default)]
    pub headers: Fields,
    #[serde(default)]
    pub data: Fields,
}

impl Envelope {
    /// Create an empty envelope of the given kind.
    pub fn new(kind: MessageKind) -> Self {
        Self {
            kind,
            headers: Fields::new(),
            data: Fields::new(),
        }
    }

    /// Builder-style header insertion.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    /// Builder-style data insertion.
    pub fn with_data(mut self, name: &str, value: impl Into<String>) -> Self {
        self.data.set(name, value);
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn data(&self, name: &str) -> Option<&str> {
        self.data.get(name)
    }

    /// Group conversation thread, if this envelope belongs to one.
    pub fn thread_id(&self) -> Option<&str> {
        self.data.get(field::THREAD)
    }

    pub fn with_thread(self, thread_id: impl Into<String>) -> Self {
        self.with_data(field::THREAD, thread_id)
    }

    /// Serialize to wire text.
    pub fn encode(&self) -> String {
        encode(self)
    }

    /// Parse wire text.
    pub fn decode(wire: &str) -> Result<Self> {
        decode(wire)
    }
}

/// Escape the delimiter characters of a single field value.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c == ESCAPE || c == PIPE {
            out.push(ESCAPE);
        }
        out.push(c);
    }
    out
}

/// Inverse of [`escape`]. A trailing lone backslash is kept literally.
pub fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == ESCAPE {
            match chars.next() {
                Some(next) => out.push(next),
                None => out.push(ESCAPE),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Serialize an envelope to its wire form.
pub fn encode(envelope: &Envelope) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(3 + 2 * (envelope.headers.len() + envelope.data.len()));
    parts.push(escape(envelope.kind.as_str()));
    for fields in [&envelope.headers, &envelope.data] {
        parts.push(fields.len().to_string());
        for (name, value) in fields.iter() {
            parts.push(escape(name));
            parts.push(escape(value));
        }
    }
    parts.join(DELIMITER)
}

/// Split wire text on unescaped delimiters, returning raw (still escaped) parts.
fn split_raw(wire: &str) -> Result<Vec<&str>> {
    let bytes = wire.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'|' => {
                if bytes.get(i + 1) != Some(&b'|') {
                    return Err(Error::MalformedEnvelope(format!(
                        "unescaped '|' at offset {}",
                        i
                    )));
                }
                parts.push(&wire[start..i]);
                i += 2;
                start = i;
            }
            _ => i += 1,
        }
    }
    parts.push(&wire[start.min(wire.len())..]);
    Ok(parts)
}

/// Parse an envelope from its wire form.
pub fn decode(wire: &str) -> Result<Envelope> {
    if wire.is_empty() {
        return Err(Error::MalformedEnvelope("empty input".to_string()));
    }

    let raw = split_raw(wire)?;
    let mut parts = raw.into_iter().map(unescape);

    let tag = parts
        .next()
        .ok_or_else(|| Error::MalformedEnvelope("missing message type".to_string()))?;
    let kind = MessageKind::resolve(&tag).ok_or(Error::UnknownMessageType(tag))?;

    let mut envelope = Envelope::new(kind);
    for section in ["header", "data"] {
        let count = parts
            .next()
            .ok_or_else(|| Error::MalformedEnvelope(format!("missing {} count", section)))?;
        let count: usize = count
            .parse()
            .map_err(|_| Error::MalformedEnvelope(format!("invalid {} count: {:?}", section, count)))?;

        for _ in 0..count {
            let (Some(name), Some(value)) = (parts.next(), parts.next()) else {
                return Err(Error::MalformedEnvelope(format!(
                    "truncated {} section",
                    section
                )));
            };
            if section == "header" {
                envelope.headers.set(name, value);
            } else {
                envelope.data.set(name, value);
            }
        }
    }

    if parts.next().is_some() {
        return Err(Error::MalformedEnvelope("trailing fields".to_string()));
    }

    Ok(envelope)
}
