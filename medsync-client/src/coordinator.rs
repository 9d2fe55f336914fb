//! Offline queue replay.
//!
//! A drain walks the queue in insertion order and replays each non-failed
//! item through the online dispatch path. Only one drain runs at a time;
//! a second caller gets `None` back immediately.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use medsync_core::{QueueItem, QueueStatus, SyncFailure, SyncReport};
use medsync_types::{ChannelMessage, QueueItemId, RequestId};
use tokio::sync::Mutex;

use crate::channel::SessionChannel;
use crate::connectivity::ConnectivityMonitor;
use crate::dispatcher::RequestDispatcher;
use crate::queue::PersistentQueue;
use crate::transport::Transport;

/// Replays queued requests once connectivity returns.
pub struct SyncCoordinator {
    queue: Arc<PersistentQueue>,
    dispatcher: Arc<RequestDispatcher>,
    connectivity: ConnectivityMonitor,
    max_retries: u32,
    item_delay: Duration,
    running: Mutex<()>,
    cancelled: AtomicBool,
}

impl SyncCoordinator {
    /// Create a coordinator.
    ///
    /// `item_delay` is slept between consecutive replays.
    pub fn new(
        queue: Arc<PersistentQueue>,
        dispatcher: Arc<RequestDispatcher>,
        connectivity: ConnectivityMonitor,
        max_retries: u32,
        item_delay: Duration,
    ) -> Self {
        Self {
            queue,
            dispatcher,
            connectivity,
            max_retries,
            item_delay,
            running: Mutex::new(()),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Drain after an offline→online transition.
    ///
    /// Does nothing when the queue is empty.
    pub async fn on_connectivity_restored<T: Transport>(
        &self,
        channel: Option<&SessionChannel<T>>,
    ) -> Option<SyncReport> {
        if self.queue.is_empty().await {
            return None;
        }
        tracing::info!("Connectivity restored, replaying offline queue");
        self.drain(channel).await
    }

    /// Replay every pending item.
    ///
    /// Successful results are published on `channel` when it is connected,
    /// keyed by the queue item id. Returns `None` if another drain is
    /// already running.
    pub async fn drain<T: Transport>(&self, channel: Option<&SessionChannel<T>>) -> Option<SyncReport> {
        let Ok(_running) = self.running.try_lock() else {
            tracing::debug!("Drain already in progress");
            return None;
        };
        self.cancelled.store(false, Ordering::SeqCst);

        let pending: Vec<QueueItemId> = self
            .queue
            .list()
            .await
            .into_iter()
            .filter(QueueItem::is_replayable)
            .map(|item| item.id)
            .collect();

        let mut report = SyncReport::default();
        if pending.is_empty() {
            return Some(report);
        }
        tracing::info!(count = pending.len(), "Draining offline queue");

        for (index, id) in pending.into_iter().enumerate() {
            if index > 0 && !self.item_delay.is_zero() {
                tokio::time::sleep(self.item_delay).await;
            }
            if self.should_stop() {
                report.interrupted = true;
                break;
            }
            self.replay(id, channel, &mut report).await;
        }

        tracing::info!(
            synced = report.synced_count,
            failed = report.failed_count,
            interrupted = report.interrupted,
            "Drain finished"
        );
        Some(report)
    }

    async fn replay<T: Transport>(
        &self,
        id: QueueItemId,
        channel: Option<&SessionChannel<T>>,
        report: &mut SyncReport,
    ) {
        // Removed or retried elsewhere since the drain started.
        let Some(mut item) = self.queue.get(&id).await else {
            return;
        };
        if !item.is_replayable() {
            return;
        }

        if let Err(e) = self.queue.update_status(&id, QueueStatus::Syncing).await {
            report.record_failure(failure(&item, e.to_string(), false));
            return;
        }

        match self.dispatcher.dispatch_online(&item.request).await {
            Ok(translation) => {
                if let Some(channel) = channel {
                    let message = ChannelMessage::TranslationResult {
                        request_id: RequestId::from(id),
                        result: translation.result,
                    };
                    if !channel.send(&message).await {
                        tracing::debug!(%id, "Channel not connected, replayed result not published");
                    }
                }
                match self.queue.remove(&id).await {
                    Ok(_) => report.record_synced(),
                    Err(e) => {
                        tracing::warn!(%id, "Replayed item could not be removed: {}", e);
                        report.record_failure(failure(&item, e.to_string(), false));
                    }
                }
            }
            Err(e) => {
                let status = item.record_failure(self.max_retries);
                let terminal = status == QueueStatus::Failed;
                if terminal {
                    tracing::warn!(%id, retries = item.retry_count, "Queued item failed permanently: {}", e);
                } else {
                    tracing::debug!(%id, retries = item.retry_count, "Replay failed: {}", e);
                }
                let entry = failure(&item, e.to_string(), terminal);
                if let Err(store_err) = self.queue.update(item).await {
                    tracing::warn!(%id, "Failed to persist retry count: {}", store_err);
                }
                report.record_failure(entry);
            }
        }
    }

    fn should_stop(&self) -> bool {
        if self.cancelled.load(Ordering::SeqCst) {
            tracing::info!("Drain cancelled");
            return true;
        }
        if !self.connectivity.is_online() {
            tracing::info!("Connectivity lost, drain interrupted");
            return true;
        }
        false
    }

    /// Stop a running drain after its current item.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether a drain is in progress.
    pub fn is_draining(&self) -> bool {
        self.running.try_lock().is_err()
    }
}

fn failure(item: &QueueItem, error: String, terminal: bool) -> SyncFailure {
    SyncFailure {
        item_id: item.id,
        kind: item.kind,
        error,
        retry_count: item.retry_count,
        terminal,
    }
}
