//! Error types for the session engine.

use thiserror::Error;

/// Main error type for the core library.
#[derive(Error, Debug)]
pub enum Error {
    /// Wire text could not be split into a well-formed envelope
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Envelope kind tag is not part of the protocol vocabulary
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),

    /// Outbound action attempted while the session is disconnected
    #[error("not connected")]
    NotConnected,

    /// The session actor has shut down
    #[error("session closed")]
    SessionClosed,

    /// IO error
    #[error("IO error: {0}")]
    Io(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl Error {
    /// Whether this error only affects the single message being decoded.
    ///
    /// Codec errors drop the offending envelope; the session keeps running.
    pub fn is_codec_error(&self) -> bool {
        matches!(self, Error::MalformedEnvelope(_) | Error::UnknownMessageType(_))
    }
}
