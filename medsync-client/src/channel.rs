//! Persistent session channel with automatic reconnect.
//!
//! `SessionChannel` owns the reconnect state machine from medsync-core and
//! executes its actions: handshakes with a bounded timeout, a reader that
//! fans incoming messages out to subscribers, and backoff timers.
//!
//! All background work for a channel runs in one driver task that
//! alternates between reading and waiting out a backoff. `disconnect()`
//! (or dropping the channel) aborts it.
//!
//! Reconnect attempts are held while the connectivity monitor reports
//! offline, so an outage does not use up the attempt budget.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use medsync_core::{Action, ChannelEvent, ConnectionState, Event, ReconnectPolicy};
use medsync_types::{ChannelMessage, ErrorCode, Session};
use thiserror::Error;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;

use crate::config::CoreConfig;
use crate::connectivity::{Connectivity, ConnectivityMonitor};
use crate::transport::Transport;

const SUBSCRIBER_CAPACITY: usize = 64;

/// Channel errors.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The channel URL could not be built.
    #[error("invalid channel url: {0}")]
    InvalidUrl(String),
}

/// Result of [`SessionChannel::connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// Handshake completed.
    Connected,
    /// Handshake failed or timed out; reconnecting in the background
    /// (or already `Failed` if no attempts are allowed).
    TimedOut,
}

/// Channel tuning.
#[derive(Debug, Clone)]
pub struct ChannelSettings {
    /// `ws://` or `wss://` base URL.
    pub base_url: String,
    /// Bound on each handshake.
    pub handshake_timeout: Duration,
    /// Reconnect backoff.
    pub policy: ReconnectPolicy,
}

impl ChannelSettings {
    /// Settings from the `[channel]` and `[cloud]` config sections.
    pub fn from_config(config: &CoreConfig) -> Self {
        Self {
            base_url: config.channel.resolve_ws_url(&config.cloud.base_url),
            handshake_timeout: config.channel.handshake_timeout(),
            policy: config.channel.reconnect_policy(),
        }
    }
}

/// Build `<base>/<sessionId>?token=<token>`.
fn channel_url(base: &str, session: &Session) -> Result<String, ChannelError> {
    let mut url = reqwest::Url::parse(base).map_err(|e| ChannelError::InvalidUrl(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| ChannelError::InvalidUrl(format!("{} cannot be a base", base)))?
        .pop_if_empty()
        .push(&session.session_id);
    url.query_pairs_mut().append_pair("token", &session.auth_token);
    Ok(url.to_string())
}

/// What the driver does next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Read,
    Backoff(Duration),
    Stop,
}

struct Shared {
    state: Mutex<ConnectionState>,
    events: broadcast::Sender<ChannelEvent>,
    messages: broadcast::Sender<ChannelMessage>,
}

/// Everything the driver task needs.
struct Driver<T: Transport> {
    transport: Arc<T>,
    shared: Arc<Shared>,
    url: String,
    handshake_timeout: Duration,
    policy: ReconnectPolicy,
    connectivity: watch::Receiver<Connectivity>,
}

impl<T: Transport> Driver<T> {
    /// Feed one event through the state machine and broadcast its
    /// notifications. Returns the remaining actions.
    async fn apply(&self, event: Event) -> Vec<Action> {
        let mut state = self.shared.state.lock().await;
        let (next, actions) = state.clone().on_event(event, &self.policy);
        if next != *state {
            tracing::debug!(from = ?*state, to = ?next, "Channel state transition");
        }
        *state = next;
        drop(state);

        actions
            .into_iter()
            .filter_map(|action| match action {
                Action::EmitEvent(event) => {
                    log_event(&event);
                    // No subscribers is fine.
                    let _ = self.shared.events.send(event);
                    None
                }
                other => Some(other),
            })
            .collect()
    }

    /// Execute actions until none remain and decide the next phase.
    async fn execute(&self, actions: Vec<Action>) -> Phase {
        let mut pending: VecDeque<Action> = actions.into();
        let mut backoff = None;

        while let Some(action) = pending.pop_front() {
            match action {
                Action::OpenChannel => {
                    let event = self.handshake().await;
                    let opened = event == Event::HandshakeSucceeded;
                    pending.extend(self.apply(event).await);
                    // A disconnect raced the handshake; the new connection is unowned.
                    if opened && !self.shared.state.lock().await.is_connected() {
                        tracing::debug!("Handshake completed after disconnect, closing");
                        if let Err(e) = self.transport.close().await {
                            tracing::debug!("Transport close: {}", e);
                        }
                    }
                }
                Action::CloseChannel => {
                    if let Err(e) = self.transport.close().await {
                        tracing::debug!("Transport close: {}", e);
                    }
                }
                Action::StartBackoffTimer { delay, .. } => backoff = Some(delay),
                Action::CancelBackoff | Action::EmitEvent(_) => {}
            }
        }

        match (&*self.shared.state.lock().await, backoff) {
            (ConnectionState::Connected, _) => Phase::Read,
            (ConnectionState::Reconnecting { .. }, Some(delay)) => Phase::Backoff(delay),
            _ => Phase::Stop,
        }
    }

    async fn handshake(&self) -> Event {
        match tokio::time::timeout(self.handshake_timeout, self.transport.connect(&self.url)).await {
            Ok(Ok(())) => Event::HandshakeSucceeded,
            Ok(Err(e)) => Event::HandshakeFailed {
                error: e.to_string(),
            },
            Err(_) => Event::HandshakeFailed {
                error: format!("handshake timed out after {:?}", self.handshake_timeout),
            },
        }
    }

    /// Park until the monitor reports online.
    async fn wait_for_network(&self) {
        let mut connectivity = self.connectivity.clone();
        let online = connectivity.borrow().is_online();
        if online {
            return;
        }
        tracing::info!("Offline, holding reconnect until the network returns");
        // Monitor gone: nothing will report online again, so just try.
        let _ = connectivity.wait_for(|state| state.is_online()).await;
    }

    /// Main loop of the driver task.
    async fn run(self, mut phase: Phase) {
        loop {
            phase = match phase {
                Phase::Read => self.read_until_lost().await,
                Phase::Backoff(delay) => {
                    tokio::time::sleep(delay).await;
                    self.wait_for_network().await;
                    let actions = self.apply(Event::BackoffElapsed).await;
                    self.execute(actions).await
                }
                Phase::Stop => return,
            };
        }
    }

    async fn read_until_lost(&self) -> Phase {
        loop {
            let text = match self.transport.recv().await {
                Ok(text) => text,
                Err(e) => {
                    let actions = self
                        .apply(Event::ChannelLost {
                            reason: e.to_string(),
                        })
                        .await;
                    return self.execute(actions).await;
                }
            };

            let message = match ChannelMessage::from_text(&text) {
                Ok(message) => message,
                Err(e) => {
                    tracing::warn!("Dropping malformed channel frame: {}", e);
                    continue;
                }
            };

            let end_reason = match &message {
                ChannelMessage::Ping => {
                    if let Ok(pong) = ChannelMessage::Pong.to_text() {
                        if let Err(e) = self.transport.send(&pong).await {
                            tracing::debug!("Pong failed: {}", e);
                        }
                    }
                    continue;
                }
                ChannelMessage::SessionEnded { reason } => Some(reason.clone()),
                ChannelMessage::Error {
                    request_id: None,
                    code: ErrorCode::Unauthorized,
                    message,
                } => Some(Some(message.clone())),
                _ => None,
            };

            let _ = self.shared.messages.send(message);

            if let Some(reason) = end_reason {
                let actions = self.apply(Event::SessionEnded { reason }).await;
                return self.execute(actions).await;
            }
        }
    }
}

fn log_event(event: &ChannelEvent) {
    match event {
        ChannelEvent::Connected => tracing::info!("Session channel connected"),
        ChannelEvent::Connecting { attempt } => {
            tracing::debug!(attempt, "Session channel connecting")
        }
        ChannelEvent::ConnectionFailed { attempt, error } => {
            tracing::warn!(attempt, "Session channel handshake failed: {}", error)
        }
        ChannelEvent::Disconnected { reason } => {
            tracing::info!("Session channel disconnected: {}", reason)
        }
        ChannelEvent::Reconnecting { attempt, delay } => {
            tracing::info!(attempt, ?delay, "Session channel reconnecting")
        }
        ChannelEvent::ConnectionLost { attempts } => {
            tracing::error!(attempts, "Session channel gave up reconnecting")
        }
        ChannelEvent::SessionEnded { reason } => {
            tracing::info!(?reason, "Session ended by server")
        }
    }
}

/// Persistent bidirectional channel for one session.
pub struct SessionChannel<T: Transport> {
    transport: Arc<T>,
    shared: Arc<Shared>,
    settings: ChannelSettings,
    connectivity: ConnectivityMonitor,
    driver: StdMutex<Option<JoinHandle<()>>>,
}

impl<T: Transport> SessionChannel<T> {
    /// Create a disconnected channel that reconnects only while
    /// `connectivity` reports online.
    pub fn new(transport: T, settings: ChannelSettings, connectivity: ConnectivityMonitor) -> Self {
        let (events, _) = broadcast::channel(SUBSCRIBER_CAPACITY);
        let (messages, _) = broadcast::channel(SUBSCRIBER_CAPACITY);
        Self {
            transport: Arc::new(transport),
            shared: Arc::new(Shared {
                state: Mutex::new(ConnectionState::new()),
                events,
                messages,
            }),
            settings,
            connectivity,
            driver: StdMutex::new(None),
        }
    }

    /// Connect for `session`.
    ///
    /// Performs the first handshake inline. On failure the channel keeps
    /// reconnecting in the background and this returns `TimedOut`.
    /// Connecting while already connected tears the old connection down first.
    pub async fn connect(&self, session: &Session) -> Result<ConnectOutcome, ChannelError> {
        let url = channel_url(&self.settings.base_url, session)?;

        let idle = matches!(
            *self.shared.state.lock().await,
            ConnectionState::Disconnected | ConnectionState::Failed { .. }
        );
        if !idle {
            self.disconnect().await;
        }
        self.stop_driver().await;

        tracing::info!(session_id = %session.session_id, "Connecting session channel");
        let driver = self.driver_for(url);

        let actions = driver.apply(Event::ConnectRequested).await;
        let phase = driver.execute(actions).await;
        let outcome = if phase == Phase::Read {
            ConnectOutcome::Connected
        } else {
            ConnectOutcome::TimedOut
        };

        if phase != Phase::Stop {
            let handle = tokio::spawn(driver.run(phase));
            *self.driver.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        }
        Ok(outcome)
    }

    /// Send a message. Returns false unless the channel is `Connected`.
    ///
    /// Nothing is queued; a rejected message is the caller's to retry.
    pub async fn send(&self, message: &ChannelMessage) -> bool {
        if !self.shared.state.lock().await.is_connected() {
            return false;
        }
        let text = match message.to_text() {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Failed to encode channel message: {}", e);
                return false;
            }
        };
        match self.transport.send(&text).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Channel send failed: {}", e);
                false
            }
        }
    }

    /// Close the channel and stop reconnecting.
    pub async fn disconnect(&self) {
        self.stop_driver().await;
        let driver = self.driver_for(String::new());
        let actions = driver.apply(Event::DisconnectRequested).await;
        driver.execute(actions).await;
        if let Err(e) = self.transport.close().await {
            tracing::debug!("Transport close: {}", e);
        }
    }

    fn driver_for(&self, url: String) -> Driver<T> {
        Driver {
            transport: Arc::clone(&self.transport),
            shared: Arc::clone(&self.shared),
            url,
            handshake_timeout: self.settings.handshake_timeout,
            policy: self.settings.policy.clone(),
            connectivity: self.connectivity.subscribe(),
        }
    }

    async fn stop_driver(&self) {
        let handle = self
            .driver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
            // Wait until the task is really gone so it cannot race the caller.
            let _ = handle.await;
        }
    }

    /// Current connection state.
    pub async fn state(&self) -> ConnectionState {
        self.shared.state.lock().await.clone()
    }

    /// Whether messages can be sent right now.
    pub async fn is_connected(&self) -> bool {
        self.shared.state.lock().await.is_connected()
    }

    /// Subscribe to state-transition events. Dropping the receiver unsubscribes.
    pub fn subscribe_events(&self) -> broadcast::Receiver<ChannelEvent> {
        self.shared.events.subscribe()
    }

    /// Subscribe to incoming messages. Dropping the receiver unsubscribes.
    pub fn subscribe_messages(&self) -> broadcast::Receiver<ChannelMessage> {
        self.shared.messages.subscribe()
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T: Transport> Drop for SessionChannel<T> {
    fn drop(&mut self) {
        let handle = self
            .driver
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}
