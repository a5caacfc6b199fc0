//! Shared Error Types
//!
//! Failures of the envelope codec, used on both ends of the socket.
use thiserror::Error;

/// Envelope encoding or decoding failed
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SharedError {
    /// The frame is not a JSON object with a string `type`
    #[error("Malformed envelope: {message}")]
    MalformedEnvelope { message: String },

    /// An envelope could not be turned into a text frame
    #[error("Envelope encoding failed: {message}")]
    Encoding { message: String },
}

impl SharedError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedEnvelope {
            message: message.into(),
        }
    }

    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding {
            message: message.into(),
        }
    }

    /// True when the peer sent something unreadable
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedEnvelope { .. })
    }
}

impl From<serde_json::Error> for SharedError {
    fn from(err: serde_json::Error) -> Self {
        Self::malformed(err.to_string())
    }
}
