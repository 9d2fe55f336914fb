//! The active translation session.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A joined translation session.
///
/// Created on a successful join; destroyed on explicit end or when the
/// server rejects the session.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Server-assigned session id.
    pub session_id: String,
    /// Bearer token for the channel and session endpoints.
    pub auth_token: String,
    /// The local participant's language.
    pub language: String,
}

impl Session {
    /// Create a session value.
    pub fn new(session_id: &str, auth_token: &str, language: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            auth_token: auth_token.to_string(),
            language: language.to_string(),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("session_id", &self.session_id)
            .field("auth_token", &"[REDACTED]")
            .field("language", &self.language)
            .finish()
    }
}
