//! Translation endpoint descriptors.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Id of the fixed cloud descriptor.
pub const CLOUD_ENDPOINT_ID: &str = "cloud";

/// Where a translation endpoint lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    /// Local-network translation service.
    Edge,
    /// Always-available remote translation service.
    Cloud,
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Edge => f.pad("edge"),
            Self::Cloud => f.pad("cloud"),
        }
    }
}

/// An immutable snapshot of a translation endpoint.
///
/// Selection hands out copies of these; nothing mutates a shared address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointDescriptor {
    /// Stable identifier (`cloud`, or `edge:<address>`).
    pub id: String,
    /// Edge or cloud.
    pub kind: EndpointKind,
    /// Base URL, e.g. `http://192.168.1.20:3000`.
    pub address: String,
    /// Unix milliseconds of the last health check, if any.
    #[serde(default)]
    pub last_health_check: Option<u64>,
    /// Result of the last health check (always true for cloud).
    pub healthy: bool,
}

impl EndpointDescriptor {
    /// The fixed cloud fallback descriptor.
    pub fn cloud(address: &str) -> Self {
        Self {
            id: CLOUD_ENDPOINT_ID.to_string(),
            kind: EndpointKind::Cloud,
            address: address.trim_end_matches('/').to_string(),
            last_health_check: None,
            healthy: true,
        }
    }

    /// An edge descriptor that has not been health-checked yet.
    pub fn edge(address: &str) -> Self {
        let address = address.trim_end_matches('/').to_string();
        Self {
            id: format!("edge:{}", address),
            kind: EndpointKind::Edge,
            address,
            last_health_check: None,
            healthy: false,
        }
    }

    /// Whether this is an edge endpoint.
    pub fn is_edge(&self) -> bool {
        self.kind == EndpointKind::Edge
    }

    /// Join a path onto the base address.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.address, path.trim_start_matches('/'))
    }
}
