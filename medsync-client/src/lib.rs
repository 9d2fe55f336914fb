//! # medsync-client
//!
//! Connectivity and offline-synchronization core for the medsync translation
//! app.
//!
//! This is the library host applications embed. It keeps a translation
//! session alive across an unreliable network, routes requests to a local
//! edge endpoint or the cloud, and queues work performed offline for replay.
//!
//! ## Features
//!
//! - **Offline Queue**: Durable FIFO queue, written through to a key-value store
//! - **Result Cache**: Fingerprint-keyed results served while offline
//! - **Edge Failover**: Preferred edge, then exactly one cloud attempt
//! - **Session Channel**: WebSocket channel with bounded exponential reconnect
//! - **Pure State Machine**: Uses medsync-core for side-effect-free logic
//!
//! ## Example
//!
//! ```ignore
//! use medsync_client::{Connectivity, CoreConfig, FileStore, HttpApi, OfflineCore, WsTransport};
//!
//! let core = OfflineCore::load(
//!     CoreConfig::default(),
//!     Arc::new(FileStore::new("state.json")),
//!     Arc::new(HttpApi::new()),
//!     WsTransport::new(),
//!     Connectivity::Online,
//! )
//! .await?;
//!
//! let outcome = core.translate(TranslationRequest::text("hello", "en", "es")).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod cache;
pub mod channel;
pub mod config;
pub mod connectivity;
pub mod coordinator;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod queue;
pub mod selector;
pub mod store;
pub mod transport;

pub use api::{EdgeHealth, HttpApi, MockApi, TranslationApi};
pub use cache::ResultCache;
pub use channel::{ChannelError, ChannelSettings, ConnectOutcome, SessionChannel};
pub use config::{ConfigError, CoreConfig};
pub use connectivity::{Connectivity, ConnectivityMonitor};
pub use coordinator::SyncCoordinator;
pub use dispatcher::{RequestDispatcher, ResultSource, TranslateOutcome, Translation};
pub use engine::OfflineCore;
pub use error::{ApiError, DispatchError, FailedAttempt, SessionError, StorageError};
pub use queue::PersistentQueue;
pub use selector::EndpointSelector;
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use transport::{MockTransport, Transport, TransportError, WsTransport};
