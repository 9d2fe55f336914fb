//! Translation requests and results.
//!
//! Field names on the wire follow the edge service's JSON API
//! (`sourceLanguage`, `targetLanguage`, `audioData`, ...).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Context used when the caller does not specify one.
pub const DEFAULT_CONTEXT: &str = "general";

fn default_context() -> String {
    DEFAULT_CONTEXT.to_string()
}

/// The closed set of translation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslationKind {
    /// Text in, text out.
    Text,
    /// Recorded audio in, text out.
    Audio,
}

impl TranslationKind {
    /// Stable tag used in fingerprints and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Audio => "audio",
        }
    }
}

impl fmt::Display for TranslationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// What is being translated.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TranslationPayload {
    /// Plain text.
    Text {
        /// Source text.
        text: String,
    },
    /// Base64-encoded audio recording.
    Audio {
        /// Base64 audio bytes, as accepted by `translate-audio`.
        #[serde(rename = "audioData")]
        audio_data: String,
    },
}

impl fmt::Debug for TranslationPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text { text } => f.debug_struct("Text").field("text", text).finish(),
            Self::Audio { audio_data } => f
                .debug_struct("Audio")
                .field("audio_data", &format!("[{} base64 chars]", audio_data.len()))
                .finish(),
        }
    }
}

/// A single translate-text or translate-audio request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationRequest {
    /// Language of the source content (e.g. `en`).
    pub source_language: String,
    /// Language to translate into (e.g. `es`).
    pub target_language: String,
    /// Domain context (e.g. `general`, `cardiology`).
    #[serde(default = "default_context")]
    pub context: String,
    /// The content itself.
    pub payload: TranslationPayload,
}

impl TranslationRequest {
    /// Create a text translation request with the default context.
    pub fn text(text: &str, source_language: &str, target_language: &str) -> Self {
        Self {
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
            context: default_context(),
            payload: TranslationPayload::Text {
                text: text.to_string(),
            },
        }
    }

    /// Create an audio translation request with the default context.
    pub fn audio(audio_data: &str, source_language: &str, target_language: &str) -> Self {
        Self {
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
            context: default_context(),
            payload: TranslationPayload::Audio {
                audio_data: audio_data.to_string(),
            },
        }
    }

    /// Set the domain context.
    pub fn with_context(mut self, context: &str) -> Self {
        self.context = context.to_string();
        self
    }

    /// The kind of this request.
    pub fn kind(&self) -> TranslationKind {
        match self.payload {
            TranslationPayload::Text { .. } => TranslationKind::Text,
            TranslationPayload::Audio { .. } => TranslationKind::Audio,
        }
    }

    /// The content identifier: the text, or the audio data.
    pub fn content(&self) -> &str {
        match &self.payload {
            TranslationPayload::Text { text } => text,
            TranslationPayload::Audio { audio_data } => audio_data,
        }
    }
}

/// A completed translation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationResult {
    /// Source text (transcript for audio requests), when the endpoint echoes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_text: Option<String>,
    /// The translation.
    pub translated_text: String,
    /// Endpoint-reported confidence (`high`, `medium`, `low`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<String>,
    /// Endpoint-reported processing time in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<f64>,
}

impl TranslationResult {
    /// A result carrying only the translated text.
    pub fn new(translated_text: &str) -> Self {
        Self {
            original_text: None,
            translated_text: translated_text.to_string(),
            confidence: None,
            processing_time: None,
        }
    }
}
