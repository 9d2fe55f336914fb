//! # medsync-core
//!
//! Pure logic for medsync (no I/O, instant tests).
//!
//! This crate implements the state machines and policies of the offline
//! translation core without any network or disk I/O, enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about state transitions
//!
//! The actual I/O (network, key-value store) is performed by `medsync-client`,
//! which interprets the actions produced by these state machines.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backoff;
pub mod cache;
pub mod endpoint;
pub mod fingerprint;
pub mod queue;
pub mod report;
pub mod state;

pub use backoff::ReconnectPolicy;
pub use cache::{CacheEntry, CacheTable};
pub use endpoint::EndpointTable;
pub use fingerprint::fingerprint;
pub use queue::{OfflineQueue, QueueError, QueueItem, QueueStatus, DEFAULT_MAX_QUEUE_SIZE};
pub use report::{SyncFailure, SyncReport};
pub use state::{Action, ChannelEvent, ConnectionState, Event};
