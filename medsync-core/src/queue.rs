//! Offline queue model.
//!
//! This module provides the in-memory side of the offline queue:
//! - FIFO ordering by insertion (never reordered)
//! - Per-item status tracking (`pending` → `syncing` → removed or back to `pending`/`failed`)
//! - Max size limits to prevent unbounded growth
//!
//! Durability lives in medsync-client, which writes the item list through to
//! the key-value store after every mutation.

use std::collections::VecDeque;

use medsync_types::{unix_millis, QueueItemId, TranslationKind, TranslationRequest};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default upper bound on queued items.
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 10_000;

/// Error type for queue operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// Queue is at capacity.
    #[error("queue full (capacity: {capacity})")]
    Full {
        /// Current queue capacity.
        capacity: usize,
    },
    /// No item with this id.
    #[error("queue item not found: {0}")]
    NotFound(QueueItemId),
}

/// Replay status of a queued item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    /// Waiting for the next drain.
    Pending,
    /// Being replayed by the current drain.
    Syncing,
    /// Retry cap exceeded; skipped by drains until retried manually.
    Failed,
}

/// A translation performed while offline, awaiting replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    /// Generated at enqueue time.
    pub id: QueueItemId,
    /// Text or audio.
    pub kind: TranslationKind,
    /// The original request.
    pub request: TranslationRequest,
    /// Unix milliseconds at enqueue time.
    pub created_at: u64,
    /// Replay status.
    pub status: QueueStatus,
    /// Failed replay attempts so far.
    pub retry_count: u32,
}

impl QueueItem {
    /// Wrap a request as a fresh pending item.
    pub fn new(request: TranslationRequest) -> Self {
        Self {
            id: QueueItemId::new(),
            kind: request.kind(),
            request,
            created_at: unix_millis(),
            status: QueueStatus::Pending,
            retry_count: 0,
        }
    }

    /// Record a failed replay attempt.
    ///
    /// Increments the retry count and returns the resulting status:
    /// `Failed` once the count exceeds `max_retries`, `Pending` otherwise.
    pub fn record_failure(&mut self, max_retries: u32) -> QueueStatus {
        self.retry_count = self.retry_count.saturating_add(1);
        self.status = if self.retry_count > max_retries {
            QueueStatus::Failed
        } else {
            QueueStatus::Pending
        };
        self.status
    }

    /// Whether a drain should replay this item.
    pub fn is_replayable(&self) -> bool {
        self.status != QueueStatus::Failed
    }
}

/// Ordered offline queue.
///
/// Items are appended with `push()` and leave only through `remove()`.
/// Status changes happen in place so insertion order is preserved.
#[derive(Debug, Clone)]
pub struct OfflineQueue {
    max_size: usize,
    items: VecDeque<QueueItem>,
}

impl OfflineQueue {
    /// Create an empty queue with the given maximum size.
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            items: VecDeque::new(),
        }
    }

    /// Rebuild a queue from persisted items.
    ///
    /// Items persisted as `syncing` belong to a drain that never finished;
    /// they come back as `pending`.
    pub fn from_items(max_size: usize, items: Vec<QueueItem>) -> Self {
        let items = items
            .into_iter()
            .map(|mut item| {
                if item.status == QueueStatus::Syncing {
                    item.status = QueueStatus::Pending;
                }
                item
            })
            .collect();
        Self { max_size, items }
    }

    /// Append an item at the tail.
    pub fn push(&mut self, item: QueueItem) -> Result<QueueItemId, QueueError> {
        if self.items.len() >= self.max_size {
            return Err(QueueError::Full {
                capacity: self.max_size,
            });
        }
        let id = item.id;
        self.items.push_back(item);
        Ok(id)
    }

    /// Remove an item. Returns it if it was present.
    pub fn remove(&mut self, id: &QueueItemId) -> Option<QueueItem> {
        let index = self.items.iter().position(|item| item.id == *id)?;
        self.items.remove(index)
    }

    /// Look up an item.
    pub fn get(&self, id: &QueueItemId) -> Option<&QueueItem> {
        self.items.iter().find(|item| item.id == *id)
    }

    /// Change an item's status in place.
    pub fn set_status(&mut self, id: &QueueItemId, status: QueueStatus) -> Result<(), QueueError> {
        let item = self
            .items
            .iter_mut()
            .find(|item| item.id == *id)
            .ok_or(QueueError::NotFound(*id))?;
        item.status = status;
        Ok(())
    }

    /// Replace the stored copy of an item (matched by id), keeping its position.
    pub fn replace(&mut self, updated: QueueItem) -> Result<(), QueueError> {
        let slot = self
            .items
            .iter_mut()
            .find(|item| item.id == updated.id)
            .ok_or(QueueError::NotFound(updated.id))?;
        *slot = updated;
        Ok(())
    }

    /// Snapshot of all items in FIFO order.
    pub fn list(&self) -> Vec<QueueItem> {
        self.items.iter().cloned().collect()
    }

    /// Iterate items in FIFO order.
    pub fn items(&self) -> impl Iterator<Item = &QueueItem> {
        self.items.iter()
    }

    /// Number of items (all statuses).
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.max_size
    }
}

impl Default for OfflineQueue {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_QUEUE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_item(text: &str) -> QueueItem {
        QueueItem::new(TranslationRequest::text(text, "en", "es"))
    }

    #[test]
    fn new_item_is_pending() {
        let item = make_item("hello");
        assert_eq!(item.status, QueueStatus::Pending);
        assert_eq!(item.retry_count, 0);
        assert_eq!(item.kind, TranslationKind::Text);
        assert!(item.created_at > 0);
    }

    #[test]
    fn queue_preserves_insertion_order() {
        let mut queue = OfflineQueue::new(100);
        let a = queue.push(make_item("a")).unwrap();
        let b = queue.push(make_item("b")).unwrap();
        let c = queue.push(make_item("c")).unwrap();

        let ids: Vec<_> = queue.list().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![a, b, c]);
    }

    #[test]
    fn queue_respects_max_size() {
        let mut queue = OfflineQueue::new(2);

        queue.push(make_item("a")).unwrap();
        queue.push(make_item("b")).unwrap();
        let overflow = queue.push(make_item("c"));

        assert_eq!(overflow, Err(QueueError::Full { capacity: 2 }));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn status_change_keeps_position() {
        let mut queue = OfflineQueue::new(100);
        let a = queue.push(make_item("a")).unwrap();
        let b = queue.push(make_item("b")).unwrap();

        queue.set_status(&a, QueueStatus::Syncing).unwrap();

        let list = queue.list();
        assert_eq!(list[0].id, a);
        assert_eq!(list[0].status, QueueStatus::Syncing);
        assert_eq!(list[1].id, b);
    }

    #[test]
    fn set_status_unknown_id() {
        let mut queue = OfflineQueue::new(100);
        let missing = QueueItemId::new();
        assert_eq!(
            queue.set_status(&missing, QueueStatus::Failed),
            Err(QueueError::NotFound(missing))
        );
    }

    #[test]
    fn remove_middle_item() {
        let mut queue = OfflineQueue::new(100);
        let a = queue.push(make_item("a")).unwrap();
        let b = queue.push(make_item("b")).unwrap();
        let c = queue.push(make_item("c")).unwrap();

        let removed = queue.remove(&b).unwrap();
        assert_eq!(removed.id, b);

        let ids: Vec<_> = queue.list().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![a, c]);
        assert!(queue.remove(&b).is_none());
    }

    #[test]
    fn rehydrate_resets_syncing() {
        let mut stuck = make_item("a");
        stuck.status = QueueStatus::Syncing;
        let mut dead = make_item("b");
        dead.status = QueueStatus::Failed;

        let queue = OfflineQueue::from_items(100, vec![stuck.clone(), dead.clone()]);

        assert_eq!(queue.get(&stuck.id).unwrap().status, QueueStatus::Pending);
        assert_eq!(queue.get(&dead.id).unwrap().status, QueueStatus::Failed);
    }

    #[test]
    fn record_failure_reaches_failed_after_cap() {
        let mut item = make_item("a");
        assert_eq!(item.record_failure(2), QueueStatus::Pending);
        assert_eq!(item.record_failure(2), QueueStatus::Pending);
        assert_eq!(item.record_failure(2), QueueStatus::Failed);
        assert_eq!(item.retry_count, 3);
        assert!(!item.is_replayable());
    }

    #[test]
    fn replace_updates_in_place() {
        let mut queue = OfflineQueue::new(100);
        let a = queue.push(make_item("a")).unwrap();
        queue.push(make_item("b")).unwrap();

        let mut updated = queue.get(&a).unwrap().clone();
        updated.record_failure(3);
        queue.replace(updated).unwrap();

        assert_eq!(queue.list()[0].retry_count, 1);
    }

    #[test]
    fn item_json_shape() {
        let item = make_item("hello");
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["kind"], "text");
        assert_eq!(json["retryCount"], 0);
        assert!(json["createdAt"].is_u64());
    }
}
