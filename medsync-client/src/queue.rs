//! Durable offline queue.
//!
//! Wraps [`OfflineQueue`] with write-through persistence: every mutation is
//! applied to a copy, persisted under `offline_queue`, and only then made
//! visible. A failed write leaves the queue as it was.

use std::sync::Arc;

use medsync_core::{OfflineQueue, QueueError, QueueItem, QueueStatus};
use medsync_types::{QueueItemId, TranslationRequest};
use tokio::sync::Mutex;

use crate::error::StorageError;
use crate::store::{keys, load_json, save_json, KeyValueStore};

/// Ordered, persisted queue of translations made while offline.
pub struct PersistentQueue {
    store: Arc<dyn KeyValueStore>,
    queue: Mutex<OfflineQueue>,
}

impl PersistentQueue {
    /// Rehydrate from the store.
    ///
    /// Items left `syncing` by an interrupted drain come back as `pending`.
    pub async fn load(store: Arc<dyn KeyValueStore>, max_size: usize) -> Result<Self, StorageError> {
        let items: Vec<QueueItem> = load_json(store.as_ref(), keys::OFFLINE_QUEUE)
            .await?
            .unwrap_or_default();
        if !items.is_empty() {
            tracing::info!(count = items.len(), "Rehydrated offline queue");
        }
        Ok(Self {
            store,
            queue: Mutex::new(OfflineQueue::from_items(max_size, items)),
        })
    }

    /// Apply `mutate` to a copy, persist it, then commit.
    async fn mutate<R>(
        &self,
        mutate: impl FnOnce(&mut OfflineQueue) -> Result<R, QueueError>,
    ) -> Result<R, StorageError> {
        let mut guard = self.queue.lock().await;
        let mut next = guard.clone();
        let result = mutate(&mut next)?;
        self.persist(&next).await?;
        *guard = next;
        Ok(result)
    }

    async fn persist(&self, queue: &OfflineQueue) -> Result<(), StorageError> {
        if let Err(e) = save_json(self.store.as_ref(), keys::OFFLINE_QUEUE, &queue.list()).await {
            tracing::error!("Failed to persist offline queue: {}", e);
            return Err(e);
        }
        Ok(())
    }

    /// Enqueue a request. Returns the new item's id.
    pub async fn add(&self, request: TranslationRequest) -> Result<QueueItemId, StorageError> {
        let item = QueueItem::new(request);
        let kind = item.kind;
        let id = self.mutate(move |q| q.push(item)).await?;
        tracing::debug!(%id, %kind, "Queued offline request");
        Ok(id)
    }

    /// Remove an item (replayed, or deleted by the user).
    ///
    /// Returns the removed item, or `None` if it was not queued.
    pub async fn remove(&self, id: &QueueItemId) -> Result<Option<QueueItem>, StorageError> {
        let mut guard = self.queue.lock().await;
        let mut next = guard.clone();
        let Some(item) = next.remove(id) else {
            return Ok(None);
        };
        self.persist(&next).await?;
        *guard = next;
        Ok(Some(item))
    }

    /// Change an item's status.
    pub async fn update_status(&self, id: &QueueItemId, status: QueueStatus) -> Result<(), StorageError> {
        let id = *id;
        self.mutate(move |q| q.set_status(&id, status)).await
    }

    /// Persist a changed item (status and retry count).
    pub async fn update(&self, item: QueueItem) -> Result<(), StorageError> {
        self.mutate(move |q| q.replace(item)).await
    }

    /// Reset a `failed` item to `pending` with a fresh retry budget.
    ///
    /// Returns false if the item is not queued or not `failed`.
    pub async fn retry(&self, id: &QueueItemId) -> Result<bool, StorageError> {
        let Some(mut item) = self.get(id).await else {
            return Ok(false);
        };
        if item.status != QueueStatus::Failed {
            return Ok(false);
        }
        item.status = QueueStatus::Pending;
        item.retry_count = 0;
        self.update(item).await?;
        Ok(true)
    }

    /// Look up an item.
    pub async fn get(&self, id: &QueueItemId) -> Option<QueueItem> {
        self.queue.lock().await.get(id).cloned()
    }

    /// All items in FIFO order.
    pub async fn list(&self) -> Vec<QueueItem> {
        self.queue.lock().await.list()
    }

    /// Number of queued items (all statuses).
    pub async fn len(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// Check if the queue is empty.
    pub async fn is_empty(&self) -> bool {
        self.queue.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    async fn make_queue(store: &MemoryStore) -> PersistentQueue {
        PersistentQueue::load(Arc::new(store.clone()), 100).await.unwrap()
    }

    fn req(text: &str) -> TranslationRequest {
        TranslationRequest::text(text, "en", "es")
    }

    #[tokio::test]
    async fn add_persists_in_fifo_order() {
        let store = MemoryStore::new();
        let queue = make_queue(&store).await;

        let a = queue.add(req("a")).await.unwrap();
        let b = queue.add(req("b")).await.unwrap();

        let reloaded = make_queue(&store).await;
        let ids: Vec<_> = reloaded.list().await.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![a, b]);
    }

    #[tokio::test]
    async fn rehydrate_turns_syncing_into_pending() {
        let store = MemoryStore::new();
        let queue = make_queue(&store).await;
        let id = queue.add(req("a")).await.unwrap();
        queue.update_status(&id, QueueStatus::Syncing).await.unwrap();

        let reloaded = make_queue(&store).await;
        assert_eq!(reloaded.get(&id).await.unwrap().status, QueueStatus::Pending);
    }

    #[tokio::test]
    async fn failed_write_rolls_back_add() {
        let store = MemoryStore::new();
        let queue = make_queue(&store).await;
        queue.add(req("a")).await.unwrap();

        store.fail_writes(true);
        let result = queue.add(req("b")).await;

        assert!(matches!(result, Err(StorageError::Backend { .. })));
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn failed_write_rolls_back_status() {
        let store = MemoryStore::new();
        let queue = make_queue(&store).await;
        let id = queue.add(req("a")).await.unwrap();

        store.fail_writes(true);
        assert!(queue.update_status(&id, QueueStatus::Syncing).await.is_err());
        assert_eq!(queue.get(&id).await.unwrap().status, QueueStatus::Pending);
    }

    #[tokio::test]
    async fn remove_absent_is_none() {
        let store = MemoryStore::new();
        let queue = make_queue(&store).await;
        let id = queue.add(req("a")).await.unwrap();

        assert!(queue.remove(&id).await.unwrap().is_some());
        assert!(queue.remove(&id).await.unwrap().is_none());
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn concurrent_removes_of_one_item_both_succeed() {
        let store = MemoryStore::new();
        let queue = make_queue(&store).await;
        let id = queue.add(req("a")).await.unwrap();
        let writes = store.write_count();

        let (first, second) = tokio::join!(queue.remove(&id), queue.remove(&id));

        let removed = [first.unwrap(), second.unwrap()];
        assert_eq!(removed.iter().filter(|r| r.is_some()).count(), 1);
        assert_eq!(store.write_count(), writes + 1);
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn remove_absent_does_not_write() {
        let store = MemoryStore::new();
        let queue = make_queue(&store).await;
        store.fail_writes(true);

        assert!(queue.remove(&QueueItemId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn full_queue_is_reported() {
        let store = MemoryStore::new();
        let queue = PersistentQueue::load(Arc::new(store.clone()), 1).await.unwrap();
        queue.add(req("a")).await.unwrap();

        let result = queue.add(req("b")).await;
        assert!(matches!(
            result,
            Err(StorageError::Queue(QueueError::Full { capacity: 1 }))
        ));
    }

    #[tokio::test]
    async fn retry_resets_failed_item() {
        let store = MemoryStore::new();
        let queue = make_queue(&store).await;
        let id = queue.add(req("a")).await.unwrap();

        assert!(!queue.retry(&id).await.unwrap());

        let mut item = queue.get(&id).await.unwrap();
        item.retry_count = 4;
        item.status = QueueStatus::Failed;
        queue.update(item).await.unwrap();

        assert!(queue.retry(&id).await.unwrap());
        let item = queue.get(&id).await.unwrap();
        assert_eq!(item.status, QueueStatus::Pending);
        assert_eq!(item.retry_count, 0);
    }

    #[tokio::test]
    async fn corrupt_queue_value_fails_load() {
        let store = MemoryStore::new();
        store.insert_raw(keys::OFFLINE_QUEUE, "{\"not\":\"an array\"}");
        let result = PersistentQueue::load(Arc::new(store), 100).await;
        assert!(matches!(result, Err(StorageError::Decode { .. })));
    }
}
