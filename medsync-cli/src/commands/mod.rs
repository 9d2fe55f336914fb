//! CLI command implementations.
//!
//! Every command takes an already-loaded [`OfflineCore`](medsync_client::OfflineCore),
//! so tests drive them with the mock API and transport.

pub mod discover;
pub mod drain;
pub mod queue;
pub mod session;
pub mod status;
pub mod translate;
