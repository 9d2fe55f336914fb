//! The `OfflineCore` facade.
//!
//! Wires the store, API, connectivity monitor and channel transport into the
//! dispatcher, selector and coordinator, and exposes the operations the host
//! application calls: translate, connectivity changes, queue drain and size,
//! plus session join/end and queue management.

use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use medsync_core::{ChannelEvent, QueueItem, SyncReport};
use medsync_types::{EndpointDescriptor, QueueItemId, Session, TranslationRequest};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

use crate::api::TranslationApi;
use crate::cache::ResultCache;
use crate::channel::{ChannelSettings, ConnectOutcome, SessionChannel};
use crate::config::CoreConfig;
use crate::connectivity::{Connectivity, ConnectivityMonitor};
use crate::coordinator::SyncCoordinator;
use crate::dispatcher::{RequestDispatcher, TranslateOutcome};
use crate::error::{DispatchError, SessionError, StorageError};
use crate::queue::PersistentQueue;
use crate::selector::EndpointSelector;
use crate::store::{keys, load_json, save_json, KeyValueStore};
use crate::transport::Transport;

/// Connectivity and offline-synchronization core.
pub struct OfflineCore<T: Transport> {
    api: Arc<dyn TranslationApi>,
    store: Arc<dyn KeyValueStore>,
    cloud: EndpointDescriptor,
    connectivity: ConnectivityMonitor,
    queue: Arc<PersistentQueue>,
    selector: Arc<EndpointSelector>,
    dispatcher: Arc<RequestDispatcher>,
    coordinator: Arc<SyncCoordinator>,
    channel: Arc<SessionChannel<T>>,
    session: Arc<Mutex<Option<Session>>>,
    reports: broadcast::Sender<SyncReport>,
    listener: StdMutex<Option<JoinHandle<()>>>,
}

const REPORT_CAPACITY: usize = 16;

impl<T: Transport> OfflineCore<T> {
    /// Build the core and rehydrate queue, cache, endpoints and session
    /// from `store`.
    ///
    /// The channel stays disconnected until [`join_session`](Self::join_session)
    /// or [`resume_session`](Self::resume_session).
    pub async fn load(
        config: CoreConfig,
        store: Arc<dyn KeyValueStore>,
        api: Arc<dyn TranslationApi>,
        transport: T,
        initial: Connectivity,
    ) -> Result<Self, StorageError> {
        let connectivity = ConnectivityMonitor::new(initial);
        let cloud = EndpointDescriptor::cloud(&config.cloud.base_url);

        let queue = Arc::new(PersistentQueue::load(Arc::clone(&store), config.sync.max_queue_size).await?);
        let cache = Arc::new(ResultCache::load(Arc::clone(&store)).await?);
        let selector = Arc::new(
            EndpointSelector::load(
                Arc::clone(&api),
                Arc::clone(&store),
                connectivity.clone(),
                cloud.clone(),
                config.edge.clone(),
            )
            .await?,
        );
        let dispatcher = Arc::new(RequestDispatcher::new(
            Arc::clone(&api),
            connectivity.clone(),
            cache,
            Arc::clone(&queue),
            Arc::clone(&selector),
            config.requests.timeout(),
        ));
        let coordinator = Arc::new(SyncCoordinator::new(
            Arc::clone(&queue),
            Arc::clone(&dispatcher),
            connectivity.clone(),
            config.sync.max_retries,
            config.sync.item_delay(),
        ));
        let channel = Arc::new(SessionChannel::new(
            transport,
            ChannelSettings::from_config(&config),
            connectivity.clone(),
        ));
        let session = Arc::new(Mutex::new(load_session(store.as_ref()).await?));

        let (reports, _) = broadcast::channel(REPORT_CAPACITY);

        let listener = tokio::spawn(listen(
            channel.subscribe_events(),
            Arc::clone(&channel),
            Arc::clone(&coordinator),
            Arc::clone(&queue),
            Arc::clone(&store),
            Arc::clone(&session),
            reports.clone(),
        ));

        let queued = queue.len().await;
        tracing::info!(
            queued,
            online = connectivity.is_online(),
            "Offline core loaded"
        );

        Ok(Self {
            api,
            store,
            cloud,
            connectivity,
            queue,
            selector,
            dispatcher,
            coordinator,
            channel,
            session,
            reports,
            listener: StdMutex::new(Some(listener)),
        })
    }

    // =========================================================================
    // Translation and sync
    // =========================================================================

    /// Translate text or audio. Offline misses are deferred to the queue.
    pub async fn translate(&self, request: TranslationRequest) -> Result<TranslateOutcome, DispatchError> {
        self.dispatcher.translate(request).await
    }

    /// Report a reachability change from the host.
    ///
    /// An offline→online transition drains the queue and returns the report.
    pub async fn on_connectivity_change(&self, state: Connectivity) -> Option<SyncReport> {
        if !self.connectivity.set(state) {
            return None;
        }
        if !state.is_online() {
            return None;
        }
        let report = self
            .coordinator
            .on_connectivity_restored(Some(self.channel.as_ref()))
            .await;
        self.publish(report)
    }

    /// Replay the offline queue now.
    ///
    /// Returns `None` when a drain is already running.
    pub async fn drain_queue(&self) -> Option<SyncReport> {
        let report = self.coordinator.drain(Some(self.channel.as_ref())).await;
        self.publish(report)
    }

    /// Subscribe to the report of every completed drain, including the ones
    /// started in the background when the channel connects.
    pub fn subscribe_reports(&self) -> broadcast::Receiver<SyncReport> {
        self.reports.subscribe()
    }

    fn publish(&self, report: Option<SyncReport>) -> Option<SyncReport> {
        if let Some(report) = &report {
            let _ = self.reports.send(report.clone());
        }
        report
    }

    /// Stop a running drain after its current item.
    pub fn cancel_drain(&self) {
        self.coordinator.cancel();
    }

    /// Number of queued items, failed ones included.
    pub async fn queue_size(&self) -> usize {
        self.queue.len().await
    }

    /// Queued items in replay order.
    pub async fn queued_items(&self) -> Vec<QueueItem> {
        self.queue.list().await
    }

    /// Reset a failed item so the next drain replays it.
    pub async fn retry_item(&self, id: &QueueItemId) -> Result<bool, StorageError> {
        self.queue.retry(id).await
    }

    /// Delete a queued item.
    pub async fn remove_item(&self, id: &QueueItemId) -> Result<Option<QueueItem>, StorageError> {
        self.queue.remove(id).await
    }

    // =========================================================================
    // Endpoints
    // =========================================================================

    /// Discover and health-check edge endpoints.
    pub async fn discover(&self) -> Result<Vec<EndpointDescriptor>, StorageError> {
        self.selector.discover().await
    }

    /// The endpoint the next translation would try first.
    pub async fn preferred_endpoint(&self) -> EndpointDescriptor {
        self.selector.preferred_endpoint().await
    }

    /// Known endpoints, edges first and the cloud last.
    pub async fn endpoints(&self) -> Vec<EndpointDescriptor> {
        self.selector.descriptors().await
    }

    /// Current reachability. Changes go through
    /// [`on_connectivity_change`](Self::on_connectivity_change).
    pub fn connectivity(&self) -> Connectivity {
        self.connectivity.current()
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// Join a session by code, persist it and open its channel.
    pub async fn join_session(&self, code: &str, language: &str) -> Result<ConnectOutcome, SessionError> {
        let session = self.api.join_session(&self.cloud, code, language).await?;
        persist_session(self.store.as_ref(), &session).await?;
        tracing::info!(session_id = %session.session_id, "Joined session");

        let outcome = self.channel.connect(&session).await?;
        *self.session.lock().await = Some(session);
        Ok(outcome)
    }

    /// Reopen the channel for a session restored from the store.
    ///
    /// Returns `None` when no session was persisted.
    pub async fn resume_session(&self) -> Result<Option<ConnectOutcome>, SessionError> {
        let Some(session) = self.session.lock().await.clone() else {
            return Ok(None);
        };
        Ok(Some(self.channel.connect(&session).await?))
    }

    /// End the active session.
    ///
    /// The channel is closed and the session keys are cleared even when the
    /// end request itself fails; that failure is still returned.
    pub async fn end_session(&self) -> Result<(), SessionError> {
        let session = self.session.lock().await.take().ok_or(SessionError::NoSession)?;
        self.channel.disconnect().await;

        let ended = self.api.end_session(&self.cloud, &session).await;
        clear_session(self.store.as_ref()).await?;
        tracing::info!(session_id = %session.session_id, "Session ended");
        ended.map_err(SessionError::from)
    }

    /// The active session, if any.
    pub async fn session(&self) -> Option<Session> {
        self.session.lock().await.clone()
    }

    /// The session channel.
    pub fn channel(&self) -> &SessionChannel<T> {
        &self.channel
    }
}

impl<T: Transport> Drop for OfflineCore<T> {
    fn drop(&mut self) {
        let handle = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

/// React to channel events: drain on connect, forget the session when the
/// server ends it.
async fn listen<T: Transport>(
    mut events: broadcast::Receiver<ChannelEvent>,
    channel: Arc<SessionChannel<T>>,
    coordinator: Arc<SyncCoordinator>,
    queue: Arc<PersistentQueue>,
    store: Arc<dyn KeyValueStore>,
    session: Arc<Mutex<Option<Session>>>,
    reports: broadcast::Sender<SyncReport>,
) {
    loop {
        match events.recv().await {
            Ok(ChannelEvent::Connected) => {
                if queue.is_empty().await {
                    continue;
                }
                if let Some(report) = coordinator.drain(Some(channel.as_ref())).await {
                    let _ = reports.send(report);
                }
            }
            Ok(ChannelEvent::SessionEnded { .. }) => {
                session.lock().await.take();
                if let Err(e) = clear_session(store.as_ref()).await {
                    tracing::error!("Failed to clear ended session: {}", e);
                }
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Channel event listener lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

async fn load_session(store: &dyn KeyValueStore) -> Result<Option<Session>, StorageError> {
    let id: Option<String> = load_json(store, keys::SESSION_ID).await?;
    let token: Option<String> = load_json(store, keys::SESSION_TOKEN).await?;
    let language: Option<String> = load_json(store, keys::USER_LANGUAGE).await?;
    Ok(match (id, token) {
        (Some(id), Some(token)) => Some(Session::new(&id, &token, language.as_deref().unwrap_or_default())),
        _ => None,
    })
}

async fn persist_session(store: &dyn KeyValueStore, session: &Session) -> Result<(), StorageError> {
    save_json(store, keys::SESSION_ID, &session.session_id).await?;
    save_json(store, keys::SESSION_TOKEN, &session.auth_token).await?;
    save_json(store, keys::USER_LANGUAGE, &session.language).await
}

async fn clear_session(store: &dyn KeyValueStore) -> Result<(), StorageError> {
    for key in [keys::SESSION_ID, keys::SESSION_TOKEN, keys::USER_LANGUAGE] {
        store.remove(key).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockApi;
    use crate::error::ApiError;
    use crate::store::MemoryStore;
    use crate::transport::MockTransport;
    use medsync_core::ConnectionState;
    use medsync_types::{ChannelMessage, TranslationRequest};
    use std::time::Duration;

    struct Fixture {
        api: MockApi,
        store: MemoryStore,
        transport: MockTransport,
        core: OfflineCore<MockTransport>,
    }

    fn config() -> CoreConfig {
        let mut config = CoreConfig::default();
        config.cloud.base_url = "https://cloud.example".into();
        config.sync.item_delay_ms = 0;
        config
    }

    async fn fixture_with(store: MemoryStore, initial: Connectivity) -> Fixture {
        let api = MockApi::new();
        let transport = MockTransport::new();
        let core = OfflineCore::load(
            config(),
            Arc::new(store.clone()),
            Arc::new(api.clone()),
            transport.clone(),
            initial,
        )
        .await
        .unwrap();
        Fixture {
            api,
            store,
            transport,
            core,
        }
    }

    async fn fixture(initial: Connectivity) -> Fixture {
        fixture_with(MemoryStore::new(), initial).await
    }

    fn req(text: &str) -> TranslationRequest {
        TranslationRequest::text(text, "en", "es")
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    // ===========================================
    // Upward operations
    // ===========================================

    #[tokio::test]
    async fn offline_translate_defers_then_reconnect_drains() {
        let f = fixture(Connectivity::Offline).await;

        let outcome = f.core.translate(req("hello")).await.unwrap();
        assert!(matches!(outcome, TranslateOutcome::Deferred { .. }));
        assert_eq!(f.core.queue_size().await, 1);

        let report = f.core.on_connectivity_change(Connectivity::Online).await.unwrap();
        assert_eq!(report.synced_count, 1);
        assert_eq!(f.core.queue_size().await, 0);

        // The replayed result is now cached.
        f.core.on_connectivity_change(Connectivity::Offline).await;
        let outcome = f.core.translate(req("hello")).await.unwrap();
        assert!(matches!(outcome, TranslateOutcome::Translated(_)));
        assert_eq!(f.api.total_translate_calls(), 1);
    }

    #[tokio::test]
    async fn repeated_connectivity_state_is_ignored() {
        let f = fixture(Connectivity::Online).await;
        assert!(f.core.on_connectivity_change(Connectivity::Online).await.is_none());
    }

    #[tokio::test]
    async fn queue_survives_restart() {
        let store = MemoryStore::new();
        let first = fixture_with(store.clone(), Connectivity::Offline).await;
        first.core.translate(req("one")).await.unwrap();
        first.core.translate(req("two")).await.unwrap();
        drop(first);

        let second = fixture_with(store, Connectivity::Offline).await;
        let items = second.core.queued_items().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].request.content(), "one");
    }

    #[tokio::test]
    async fn manual_retry_and_remove() {
        let f = fixture(Connectivity::Offline).await;
        let id = match f.core.translate(req("hello")).await.unwrap() {
            TranslateOutcome::Deferred { queue_id } => queue_id,
            other => panic!("Expected Deferred, got {:?}", other),
        };

        assert!(!f.core.retry_item(&id).await.unwrap());
        assert!(f.core.remove_item(&id).await.unwrap().is_some());
        assert_eq!(f.core.queue_size().await, 0);
    }

    // ===========================================
    // Session lifecycle
    // ===========================================

    #[tokio::test]
    async fn join_persists_session_and_connects() {
        let f = fixture(Connectivity::Online).await;

        let outcome = f.core.join_session("ABC123", "es").await.unwrap();

        assert_eq!(outcome, ConnectOutcome::Connected);
        assert_eq!(f.core.channel().state().await, ConnectionState::Connected);
        assert_eq!(f.store.raw(keys::SESSION_ID).as_deref(), Some("\"sess-ABC123\""));
        assert_eq!(f.store.raw(keys::SESSION_TOKEN).as_deref(), Some("\"token-ABC123\""));
        assert_eq!(f.store.raw(keys::USER_LANGUAGE).as_deref(), Some("\"es\""));
        assert_eq!(
            f.transport.connected_urls(),
            vec!["wss://cloud.example/sess-ABC123?token=token-ABC123".to_string()]
        );
    }

    #[tokio::test]
    async fn session_restored_and_resumed_after_restart() {
        let store = MemoryStore::new();
        let first = fixture_with(store.clone(), Connectivity::Online).await;
        first.core.join_session("ABC123", "es").await.unwrap();
        first.core.channel().disconnect().await;
        drop(first);

        let second = fixture_with(store, Connectivity::Online).await;
        let session = second.core.session().await.unwrap();
        assert_eq!(session.session_id, "sess-ABC123");
        assert_eq!(
            second.core.resume_session().await.unwrap(),
            Some(ConnectOutcome::Connected)
        );
    }

    #[tokio::test]
    async fn end_session_clears_keys() {
        let f = fixture(Connectivity::Online).await;
        f.core.join_session("ABC123", "es").await.unwrap();

        f.core.end_session().await.unwrap();

        assert_eq!(f.api.ended_sessions(), vec!["sess-ABC123".to_string()]);
        assert!(f.store.raw(keys::SESSION_TOKEN).is_none());
        assert!(f.core.session().await.is_none());
        assert_eq!(f.core.channel().state().await, ConnectionState::Disconnected);
        assert!(matches!(f.core.end_session().await, Err(SessionError::NoSession)));
    }

    #[tokio::test]
    async fn server_ended_session_is_forgotten() {
        let f = fixture(Connectivity::Online).await;
        f.core.join_session("ABC123", "es").await.unwrap();

        let text = ChannelMessage::SessionEnded { reason: None }.to_text().unwrap();
        f.transport.push_incoming(&text);
        settle().await;

        assert!(f.core.session().await.is_none());
        assert!(f.store.raw(keys::SESSION_ID).is_none());
    }

    #[tokio::test]
    async fn channel_connect_drains_pending_queue() {
        let f = fixture(Connectivity::Online).await;
        f.api.fail_endpoint("cloud", ApiError::Network("down".into()));
        f.core.on_connectivity_change(Connectivity::Offline).await;
        f.core.translate(req("hello")).await.unwrap();
        f.core.on_connectivity_change(Connectivity::Online).await;
        assert_eq!(f.core.queue_size().await, 1);

        f.api.restore_endpoint("cloud");
        let mut reports = f.core.subscribe_reports();
        f.core.join_session("ABC123", "es").await.unwrap();

        let report = reports.recv().await.unwrap();
        assert_eq!(report.synced_count, 1);
        assert_eq!(f.core.queue_size().await, 0);
        let published: Vec<ChannelMessage> = f
            .transport
            .sent_messages()
            .iter()
            .map(|text| ChannelMessage::from_text(text).unwrap())
            .collect();
        assert!(matches!(
            published.as_slice(),
            [ChannelMessage::TranslationResult { .. }]
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn channel_recovers_after_offline_period() {
        let f = fixture(Connectivity::Online).await;
        f.core.join_session("ABC123", "es").await.unwrap();

        f.core.on_connectivity_change(Connectivity::Offline).await;
        assert_eq!(f.core.connectivity(), Connectivity::Offline);
        f.transport.fail_all_connects(Some("unreachable"));
        f.transport.drop_connection();
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert_eq!(f.transport.connect_attempts(), 1);
        assert!(f.core.channel().state().await.is_connecting());

        f.transport.fail_all_connects(None);
        let mut events = f.core.channel().subscribe_events();
        f.core.on_connectivity_change(Connectivity::Online).await;
        loop {
            let event = tokio::time::timeout(Duration::from_secs(60), events.recv())
                .await
                .unwrap()
                .unwrap();
            if event == ChannelEvent::Connected {
                break;
            }
        }
        assert_eq!(f.core.channel().state().await, ConnectionState::Connected);
        assert_eq!(f.transport.connect_attempts(), 2);
    }
}
