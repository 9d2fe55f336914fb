//! Edge discovery, health checks and endpoint preference.

use std::sync::Arc;

use futures_util::future::join_all;
use medsync_core::EndpointTable;
use medsync_types::{unix_millis, EndpointDescriptor};
use tokio::sync::Mutex;

use crate::api::TranslationApi;
use crate::config::EdgeConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::error::StorageError;
use crate::store::{keys, load_json, save_json, KeyValueStore};

/// Picks the endpoint each request goes to.
///
/// Wraps an [`EndpointTable`] with discovery, health checks and persistence
/// of the discovered list (`edge_devices`) and the last used edge
/// (`preferred_edge`).
pub struct EndpointSelector {
    api: Arc<dyn TranslationApi>,
    store: Arc<dyn KeyValueStore>,
    connectivity: ConnectivityMonitor,
    config: EdgeConfig,
    table: Mutex<EndpointTable>,
}

impl EndpointSelector {
    /// Restore the persisted endpoint list and preference.
    pub async fn load(
        api: Arc<dyn TranslationApi>,
        store: Arc<dyn KeyValueStore>,
        connectivity: ConnectivityMonitor,
        cloud: EndpointDescriptor,
        config: EdgeConfig,
    ) -> Result<Self, StorageError> {
        let preferred: Option<String> = load_json(store.as_ref(), keys::PREFERRED_EDGE).await?;
        let known: Vec<EndpointDescriptor> = load_json(store.as_ref(), keys::EDGE_DEVICES)
            .await?
            .unwrap_or_default();

        let mut table = EndpointTable::new(cloud).with_preferred(preferred);
        table.apply_discovery(known);

        Ok(Self {
            api,
            store,
            connectivity,
            config,
            table: Mutex::new(table),
        })
    }

    /// Discover and health-check edge endpoints.
    ///
    /// Candidates are the configured addresses plus whatever the cloud
    /// reports (skipped while offline). Returns every known descriptor,
    /// edges first and the cloud last.
    pub async fn discover(&self) -> Result<Vec<EndpointDescriptor>, StorageError> {
        let mut candidates: Vec<String> = self.config.candidates.clone();

        if self.connectivity.is_online() {
            let cloud = self.table.lock().await.cloud().clone();
            match self
                .api
                .discover_edge_devices(&cloud, self.config.health_timeout())
                .await
            {
                Ok(addresses) => candidates.extend(addresses),
                Err(e) => tracing::warn!("Edge discovery via cloud failed: {}", e),
            }
        } else {
            tracing::debug!("Offline, skipping cloud edge discovery");
        }

        let mut seen = std::collections::HashSet::new();
        let descriptors: Vec<EndpointDescriptor> = candidates
            .iter()
            .map(|address| EndpointDescriptor::edge(address))
            .filter(|d| seen.insert(d.address.clone()))
            .collect();

        let timeout = self.config.health_timeout();
        let checks = descriptors.into_iter().map(|mut descriptor| async move {
            let healthy = match self.api.health(&descriptor, timeout).await {
                Ok(report) => report.is_ok(),
                Err(e) => {
                    tracing::debug!(address = %descriptor.address, "Health check failed: {}", e);
                    false
                }
            };
            descriptor.healthy = healthy;
            descriptor.last_health_check = Some(unix_millis());
            descriptor
        });
        let checked = join_all(checks).await;

        let healthy = checked.iter().filter(|d| d.healthy).count();
        tracing::info!(candidates = checked.len(), healthy, "Edge discovery complete");

        let mut table = self.table.lock().await;
        let mut next = table.clone();
        next.apply_discovery(checked);
        save_json(self.store.as_ref(), keys::EDGE_DEVICES, next.edges()).await?;
        *table = next;
        Ok(table.descriptors())
    }

    /// The endpoint a new request should try first.
    pub async fn preferred_endpoint(&self) -> EndpointDescriptor {
        self.table.lock().await.preferred()
    }

    /// Endpoints to try for one request: the preferred one, then the cloud
    /// if the preferred one is an edge.
    pub async fn attempt_plan(&self) -> Vec<EndpointDescriptor> {
        self.table.lock().await.attempt_plan()
    }

    /// Exclude an edge from preference until the next discovery.
    pub async fn mark_unhealthy(&self, descriptor: &EndpointDescriptor) {
        let mut table = self.table.lock().await;
        if !table.mark_unhealthy(&descriptor.id) {
            return;
        }
        tracing::warn!(endpoint = %descriptor.id, "Marked edge unhealthy");
        if let Err(e) = save_json(self.store.as_ref(), keys::EDGE_DEVICES, table.edges()).await {
            tracing::warn!("Failed to persist edge health: {}", e);
        }
    }

    /// Remember that `descriptor` just served a request.
    pub async fn record_success(&self, descriptor: &EndpointDescriptor) -> Result<(), StorageError> {
        let mut table = self.table.lock().await;
        let previous = table.preferred_edge_address().map(str::to_string);
        let Some(address) = table.record_success(descriptor) else {
            return Ok(());
        };
        if let Err(e) = save_json(self.store.as_ref(), keys::PREFERRED_EDGE, &address).await {
            *table = table.clone().with_preferred(previous);
            return Err(e);
        }
        tracing::debug!(%address, "Preferred edge updated");
        Ok(())
    }

    /// Every known descriptor without re-checking health.
    pub async fn descriptors(&self) -> Vec<EndpointDescriptor> {
        self.table.lock().await.descriptors()
    }
}
