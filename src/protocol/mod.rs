//! Page-channel protocol message types.
//!
//! This module defines the message format exchanged with the hosting page
//! over the opaque text channel.
//!
//! # Protocol Overview
//!
//! | Message | Direction | Purpose |
//! |---------|-----------|---------|
//! | `onAccessTokenRequire` | Session → Page | Request the access token (startup) |
//! | `onAccessTokenReceived` | Page → Session | Deliver the token + option overrides |
//! | `onLongPollDataReceived` | Session → Page | Update batch, or resolution error (`errorId: 1`) |
//! | `onLongPollConnectionError` | Session → Page | Poll transport failure (`errorId: 2`) |
//!
//! Every outbound message is wrapped in an [`Envelope`] stamping the fixed
//! `version` and `agent` metadata. Inbound traffic is parsed tolerantly:
//! the channel is shared, and anything unrelated is dropped with a log
//! line at most.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `inbound` | Page → session messages and the tolerant parser |
//! | `outbound` | Session → page envelopes and error codes |

// ============================================================================
// Submodules
// ============================================================================

/// Page → session messages.
pub mod inbound;

/// Session → page messages.
pub mod outbound;

// ============================================================================
// Re-exports
// ============================================================================

pub use inbound::{AccessTokenGrant, Inbound, parse_page_message};
pub use outbound::{
    ERROR_NO_RESPONSE, ERROR_POLL_REQUEST, Envelope, METHOD_ACCESS_TOKEN_RECEIVED, Outbound,
    PROTOCOL_AGENT, PROTOCOL_VERSION,
};
