//! Translation API abstraction.
//!
//! Request/response endpoints used by the selector and dispatcher:
//! translate-text, translate-audio, edge health, edge discovery, and session
//! join/end. Edge and cloud speak the same translate API; discovery and
//! sessions are cloud-only.
//!
//! # Design
//!
//! - `HttpApi` talks to real endpoints over HTTP (reqwest)
//! - `MockApi` scripts responses per endpoint and counts calls, for tests

mod http;
mod mock;

pub use http::HttpApi;
pub use mock::MockApi;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use medsync_types::{EndpointDescriptor, Session, TranslationRequest, TranslationResult};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Body of an edge `GET /health` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeHealth {
    /// `ok` when the edge is serving.
    pub status: String,
    /// Edge software version.
    #[serde(default)]
    pub version: Option<String>,
    /// Loaded models keyed by language pair (e.g. `en-es`).
    #[serde(default)]
    pub models: BTreeMap<String, serde_json::Value>,
    /// When the edge last synced its models, if ever.
    #[serde(default)]
    pub last_sync: Option<String>,
}

impl EdgeHealth {
    /// A healthy report with no models.
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            version: None,
            models: BTreeMap::new(),
            last_sync: None,
        }
    }

    /// Whether the edge reports itself as serving.
    pub fn is_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case("ok")
    }
}

/// Request/response API used by the core.
#[async_trait]
pub trait TranslationApi: Send + Sync {
    /// Translate text or audio on `endpoint`, bounded by `timeout`.
    async fn translate(
        &self,
        endpoint: &EndpointDescriptor,
        request: &TranslationRequest,
        timeout: Duration,
    ) -> Result<TranslationResult, ApiError>;

    /// Health-check an edge endpoint.
    async fn health(
        &self,
        endpoint: &EndpointDescriptor,
        timeout: Duration,
    ) -> Result<EdgeHealth, ApiError>;

    /// Ask the cloud which edge devices it knows about. Returns base addresses.
    async fn discover_edge_devices(
        &self,
        cloud: &EndpointDescriptor,
        timeout: Duration,
    ) -> Result<Vec<String>, ApiError>;

    /// Join a session by code.
    async fn join_session(
        &self,
        cloud: &EndpointDescriptor,
        session_code: &str,
        language: &str,
    ) -> Result<Session, ApiError>;

    /// End a session.
    async fn end_session(&self, cloud: &EndpointDescriptor, session: &Session) -> Result<(), ApiError>;
}
