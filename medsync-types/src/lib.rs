//! # medsync-types
//!
//! Wire and data model types for the medsync offline translation core.
//!
//! This crate provides the foundational types used across all medsync crates:
//! - [`QueueItemId`], [`RequestId`], [`Fingerprint`] - Identity types
//! - [`TranslationRequest`], [`TranslationResult`] - Translation payloads
//! - [`EndpointDescriptor`] - Edge / cloud endpoint values
//! - [`Session`] - The active translation session
//! - [`ChannelMessage`] - Session channel envelope
//! - [`WireError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod endpoint;
mod error;
mod ids;
mod messages;
mod session;
mod time;
mod translation;

pub use endpoint::{EndpointDescriptor, EndpointKind, CLOUD_ENDPOINT_ID};
pub use error::WireError;
pub use ids::{Fingerprint, QueueItemId, RequestId};
pub use messages::{ChannelMessage, ErrorCode};
pub use session::Session;
pub use time::unix_millis;
pub use translation::{
    TranslationKind, TranslationPayload, TranslationRequest, TranslationResult, DEFAULT_CONTEXT,
};
