//! Session channel messages.
//!
//! Every frame on the channel is a JSON object `{ "type": ..., "requestId": ..., ... }`.
//! Responses correlate to requests through the echoed `requestId`.

use serde::{Deserialize, Serialize};

use crate::{RequestId, TranslationRequest, TranslationResult, WireError};

/// All possible session channel messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ChannelMessage {
    /// Ask the session peer / server to translate.
    Translate {
        /// Correlation id.
        request_id: RequestId,
        /// What to translate.
        request: TranslationRequest,
    },
    /// A completed translation (reply, or a replayed offline item).
    TranslationResult {
        /// The request this answers.
        request_id: RequestId,
        /// The translation.
        result: TranslationResult,
    },
    /// A request-scoped or session-scoped failure.
    Error {
        /// The request this answers, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<RequestId>,
        /// Machine-readable code.
        code: ErrorCode,
        /// Human-readable detail.
        message: String,
    },
    /// Keepalive request.
    Ping,
    /// Keepalive reply.
    Pong,
    /// The server ended the session; do not reconnect.
    SessionEnded {
        /// Optional reason.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

/// Error codes carried by [`ChannelMessage::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Token rejected.
    Unauthorized,
    /// No translation model for the language pair.
    Unavailable,
    /// Malformed request.
    BadRequest,
    /// Anything else.
    Internal,
}

impl ChannelMessage {
    /// Serialize to a JSON text frame.
    pub fn to_text(&self) -> Result<String, WireError> {
        serde_json::to_string(self).map_err(WireError::Serialization)
    }

    /// Deserialize from a JSON text frame.
    pub fn from_text(text: &str) -> Result<Self, WireError> {
        serde_json::from_str(text).map_err(WireError::Deserialization)
    }

    /// The correlation id, for messages that carry one.
    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            Self::Translate { request_id, .. } | Self::TranslationResult { request_id, .. } => {
                Some(*request_id)
            }
            Self::Error { request_id, .. } => *request_id,
            Self::Ping | Self::Pong | Self::SessionEnded { .. } => None,
        }
    }
}
