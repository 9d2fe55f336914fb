//! Network reachability tracking.

use tokio::sync::watch;

/// Reachability as last reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    /// The network is reachable.
    Online,
    /// The network is unreachable.
    Offline,
}

impl Connectivity {
    /// Convenience constructor from a boolean.
    pub fn from_online(online: bool) -> Self {
        if online {
            Self::Online
        } else {
            Self::Offline
        }
    }

    /// Whether this is `Online`.
    pub fn is_online(self) -> bool {
        self == Self::Online
    }
}

/// Observes reachability and notifies subscribers of transitions.
///
/// Cloning yields a handle to the same state.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    tx: watch::Sender<Connectivity>,
}

impl ConnectivityMonitor {
    /// Create a monitor with an initial state.
    pub fn new(initial: Connectivity) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Report a reachability change.
    ///
    /// Returns true when the state actually changed; subscribers are only
    /// woken on changes.
    pub fn set(&self, state: Connectivity) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        if changed {
            tracing::info!(?state, "Connectivity changed");
        }
        changed
    }

    /// Current state.
    pub fn current(&self) -> Connectivity {
        *self.tx.borrow()
    }

    /// Whether the network is currently reachable.
    pub fn is_online(&self) -> bool {
        self.current().is_online()
    }

    /// Subscribe to transitions. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> watch::Receiver<Connectivity> {
        self.tx.subscribe()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(Connectivity::Online)
    }
}
