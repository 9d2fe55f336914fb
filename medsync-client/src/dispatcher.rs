//! Single translate request execution.
//!
//! Order of resolution for one request:
//! 1. Cache hit → return it, no network (online or offline)
//! 2. Offline → enqueue, return `Deferred`
//! 3. Online → preferred endpoint, then at most one cloud attempt if the
//!    preferred endpoint was an edge; success is written back to the cache

use std::sync::Arc;
use std::time::Duration;

use medsync_core::fingerprint;
use medsync_types::{EndpointKind, QueueItemId, TranslationRequest, TranslationResult};

use crate::api::TranslationApi;
use crate::cache::ResultCache;
use crate::connectivity::ConnectivityMonitor;
use crate::error::{ApiError, DispatchError, FailedAttempt};
use crate::queue::PersistentQueue;
use crate::selector::EndpointSelector;

/// Where a returned result came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultSource {
    /// The local result cache.
    Cache,
    /// A translation endpoint.
    Endpoint {
        /// Descriptor id.
        id: String,
        /// Edge or cloud.
        kind: EndpointKind,
    },
}

/// A translation and its origin.
#[derive(Debug, Clone, PartialEq)]
pub struct Translation {
    /// The translation.
    pub result: TranslationResult,
    /// Where it came from.
    pub source: ResultSource,
}

/// Outcome of [`RequestDispatcher::translate`].
#[derive(Debug, Clone, PartialEq)]
pub enum TranslateOutcome {
    /// A result is available now.
    Translated(Translation),
    /// Offline with no cached result; the request was queued for replay.
    Deferred {
        /// Id of the queued item.
        queue_id: QueueItemId,
    },
}

/// Executes translate-text and translate-audio requests.
pub struct RequestDispatcher {
    api: Arc<dyn TranslationApi>,
    connectivity: ConnectivityMonitor,
    cache: Arc<ResultCache>,
    queue: Arc<PersistentQueue>,
    selector: Arc<EndpointSelector>,
    request_timeout: Duration,
}

impl RequestDispatcher {
    /// Create a dispatcher over shared components.
    pub fn new(
        api: Arc<dyn TranslationApi>,
        connectivity: ConnectivityMonitor,
        cache: Arc<ResultCache>,
        queue: Arc<PersistentQueue>,
        selector: Arc<EndpointSelector>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            api,
            connectivity,
            cache,
            queue,
            selector,
            request_timeout,
        }
    }

    /// Translate, falling back to the cache and the offline queue.
    ///
    /// # Errors
    ///
    /// `TranslationUnavailable` when online and every planned endpoint
    /// failed; `OfflineNoCache` when offline, uncached, and the request
    /// could not be queued.
    pub async fn translate(&self, request: TranslationRequest) -> Result<TranslateOutcome, DispatchError> {
        if let Some(translation) = self.cached(&request).await {
            return Ok(TranslateOutcome::Translated(translation));
        }

        if !self.connectivity.is_online() {
            let queue_id = self
                .queue
                .add(request)
                .await
                .map_err(DispatchError::OfflineNoCache)?;
            tracing::info!(%queue_id, "Offline, request deferred");
            return Ok(TranslateOutcome::Deferred { queue_id });
        }

        self.dispatch_uncached(&request)
            .await
            .map(TranslateOutcome::Translated)
    }

    /// Run only the online path. Never enqueues.
    ///
    /// Used for queue replay so a failed replay cannot re-enqueue itself.
    pub async fn dispatch_online(&self, request: &TranslationRequest) -> Result<Translation, DispatchError> {
        if let Some(translation) = self.cached(request).await {
            return Ok(translation);
        }
        self.dispatch_uncached(request).await
    }

    async fn cached(&self, request: &TranslationRequest) -> Option<Translation> {
        let fp = fingerprint(request);
        let entry = self.cache.get(&fp).await?;
        tracing::debug!(fingerprint = %fp, "Cache hit");
        Some(Translation {
            result: entry.translated_result,
            source: ResultSource::Cache,
        })
    }

    async fn dispatch_uncached(&self, request: &TranslationRequest) -> Result<Translation, DispatchError> {
        let plan = self.selector.attempt_plan().await;
        let mut attempts = Vec::with_capacity(plan.len());

        for endpoint in plan {
            let outcome = tokio::time::timeout(
                self.request_timeout,
                self.api.translate(&endpoint, request, self.request_timeout),
            )
            .await
            .unwrap_or(Err(ApiError::Timeout));

            match outcome {
                Ok(result) => {
                    if let Err(e) = self.cache.put(fingerprint(request), result.clone()).await {
                        tracing::warn!("Failed to cache translation result: {}", e);
                    }
                    if let Err(e) = self.selector.record_success(&endpoint).await {
                        tracing::warn!("Failed to persist preferred edge: {}", e);
                    }
                    return Ok(Translation {
                        result,
                        source: ResultSource::Endpoint {
                            id: endpoint.id,
                            kind: endpoint.kind,
                        },
                    });
                }
                Err(e) => {
                    tracing::warn!(endpoint = %endpoint.id, "Translate attempt failed: {}", e);
                    if endpoint.is_edge() {
                        self.selector.mark_unhealthy(&endpoint).await;
                    }
                    attempts.push(FailedAttempt {
                        endpoint_id: endpoint.id,
                        kind: endpoint.kind,
                        error: e.to_string(),
                    });
                }
            }
        }

        Err(DispatchError::TranslationUnavailable { attempts })
    }
}
