//! Mock transport for testing.
//!
//! Allows scripting connect outcomes, injecting incoming frames and dropping
//! the connection, and captures sent frames for verification.

use super::{Transport, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, Notify};

/// Scripted outcome of one `connect()` call.
#[derive(Debug, Clone)]
enum ConnectScript {
    Fail(String),
    Hang,
    Hold(Arc<Notify>),
}

/// Mock transport for testing.
///
/// Each successful `connect()` opens a fresh in-memory connection; frames
/// pushed with [`push_incoming`](Self::push_incoming) are returned by
/// `recv()`, and [`drop_connection`](Self::drop_connection) makes the
/// pending `recv()` fail as if the socket died.
#[derive(Debug, Default, Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
    incoming: Arc<tokio::sync::Mutex<Option<mpsc::UnboundedReceiver<String>>>>,
}

#[derive(Debug, Default)]
struct MockTransportInner {
    connected: bool,
    connected_urls: Vec<String>,
    connect_attempts: usize,
    sent_messages: Vec<String>,
    connect_script: VecDeque<ConnectScript>,
    fail_all_connects: Option<String>,
    fail_next_send: Option<String>,
    incoming_tx: Option<mpsc::UnboundedSender<String>>,
    backlog: VecDeque<String>,
}

impl MockTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockTransportInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver a frame to the current connection, or to the next one if
    /// not connected.
    pub fn push_incoming(&self, text: &str) {
        let mut inner = self.lock();
        let undelivered = match &inner.incoming_tx {
            Some(tx) => tx.send(text.to_string()).err().map(|e| e.0),
            None => Some(text.to_string()),
        };
        if let Some(text) = undelivered {
            inner.backlog.push_back(text);
        }
    }

    /// Kill the current connection. The pending `recv()` fails.
    pub fn drop_connection(&self) {
        let mut inner = self.lock();
        inner.connected = false;
        inner.incoming_tx = None;
    }

    /// Cause the next connect() to fail with the given error.
    pub fn fail_next_connect(&self, error: &str) {
        self.lock()
            .connect_script
            .push_back(ConnectScript::Fail(error.to_string()));
    }

    /// Cause the next connect() to never complete.
    pub fn hang_next_connect(&self) {
        self.lock().connect_script.push_back(ConnectScript::Hang);
    }

    /// Hold the next connect() until the returned handle is notified; it
    /// then succeeds.
    pub fn hold_next_connect(&self) -> Arc<Notify> {
        let release = Arc::new(Notify::new());
        self.lock()
            .connect_script
            .push_back(ConnectScript::Hold(Arc::clone(&release)));
        release
    }

    /// Make every connect() fail until cleared with `None`.
    pub fn fail_all_connects(&self, error: Option<&str>) {
        self.lock().fail_all_connects = error.map(str::to_string);
    }

    /// Cause the next send() to fail with the given error.
    pub fn fail_next_send(&self, error: &str) {
        self.lock().fail_next_send = Some(error.to_string());
    }

    /// Get all frames that were sent.
    pub fn sent_messages(&self) -> Vec<String> {
        self.lock().sent_messages.clone()
    }

    /// URLs of successful connects, in order.
    pub fn connected_urls(&self) -> Vec<String> {
        self.lock().connected_urls.clone()
    }

    /// Number of connect() calls, successful or not.
    pub fn connect_attempts(&self) -> usize {
        self.lock().connect_attempts
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, url: &str) -> Result<(), TransportError> {
        let script = {
            let mut inner = self.lock();
            inner.connect_attempts += 1;
            if let Some(error) = inner.fail_all_connects.clone() {
                return Err(TransportError::ConnectionFailed(error));
            }
            inner.connect_script.pop_front()
        };

        match script {
            Some(ConnectScript::Fail(error)) => return Err(TransportError::ConnectionFailed(error)),
            Some(ConnectScript::Hang) => std::future::pending::<()>().await,
            Some(ConnectScript::Hold(release)) => release.notified().await,
            None => {}
        }

        let (tx, rx) = mpsc::unbounded_channel();
        *self.incoming.lock().await = Some(rx);

        let mut inner = self.lock();
        for text in inner.backlog.drain(..) {
            let _ = tx.send(text);
        }
        inner.incoming_tx = Some(tx);
        inner.connected = true;
        inner.connected_urls.push(url.to_string());
        Ok(())
    }

    async fn send(&self, text: &str) -> Result<(), TransportError> {
        let mut inner = self.lock();

        if !inner.connected {
            return Err(TransportError::NotConnected);
        }

        // Check for forced failure
        if let Some(error) = inner.fail_next_send.take() {
            return Err(TransportError::SendFailed(error));
        }

        inner.sent_messages.push(text.to_string());
        Ok(())
    }

    async fn recv(&self) -> Result<String, TransportError> {
        let mut incoming = self.incoming.lock().await;
        let rx = incoming.as_mut().ok_or(TransportError::NotConnected)?;
        rx.recv().await.ok_or(TransportError::ConnectionClosed)
    }

    fn is_connected(&self) -> bool {
        self.lock().connected
    }

    async fn close(&self) -> Result<(), TransportError> {
        {
            let mut inner = self.lock();
            inner.connected = false;
            inner.incoming_tx = None;
        }
        *self.incoming.lock().await = None;
        Ok(())
    }
}
