//! Discover and health-check edge endpoints.

use anyhow::{Context, Result};
use medsync_client::{OfflineCore, Transport};
use medsync_types::EndpointDescriptor;

/// Run the discover command.
pub async fn run<T: Transport>(core: &OfflineCore<T>) -> Result<Vec<EndpointDescriptor>> {
    let endpoints = core.discover().await.context("Discovery failed")?;
    let preferred = core.preferred_endpoint().await;

    for endpoint in &endpoints {
        let marker = if endpoint.id == preferred.id { "*" } else { " " };
        let health = if endpoint.healthy { "healthy" } else { "unreachable" };
        println!("{} {:<5} {:<11} {}", marker, endpoint.kind, health, endpoint.address);
    }
    println!();
    println!("* next translation goes to {}", preferred.address);

    Ok(endpoints)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::mock_core;
    use medsync_client::Connectivity;
    use tempfile::tempdir;

    #[tokio::test]
    async fn discovered_healthy_edge_becomes_preferred() {
        let dir = tempdir().unwrap();
        let (core, api) = mock_core(dir.path(), Connectivity::Online).await;
        api.set_discovered(&["http://192.168.1.20:3000", "http://192.168.1.21:3000"]);
        api.set_edge_health("http://192.168.1.21:3000", true);

        let endpoints = run(&core).await.unwrap();

        assert_eq!(endpoints.len(), 3);
        assert_eq!(core.preferred_endpoint().await.address, "http://192.168.1.21:3000");
    }

    #[tokio::test]
    async fn offline_discovery_keeps_cloud() {
        let dir = tempdir().unwrap();
        let (core, api) = mock_core(dir.path(), Connectivity::Offline).await;

        let endpoints = run(&core).await.unwrap();

        assert_eq!(api.discover_calls(), 0);
        assert_eq!(endpoints.len(), 1);
        assert!(!endpoints[0].is_edge());
    }
}
