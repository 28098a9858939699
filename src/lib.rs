//! VK long-poll relay - page-to-background message bridge with a
//! long-poll client session.
//!
//! This library relays messages between a hosting page context and a
//! background process, and maintains a long-lived polling loop against
//! the VK long-poll API to receive near-real-time update batches.
//!
//! # Architecture
//!
//! Two cooperating pieces:
//!
//! - **Relay**: exchanges JSON envelopes with the page over an opaque
//!   text channel: the access token comes in, update batches and error
//!   notifications go out.
//! - **Session**: resolves a server lease (`endpoint + key + cursor`),
//!   then issues back-to-back long-poll requests, renewing the lease
//!   when the server expires it and recovering from transport failures
//!   by re-resolving.
//!
//! Key design principles:
//!
//! - Exactly one network request outstanding per session at any instant
//! - The cursor only ever advances to server-provided values
//! - The next poll hits the wire before a batch is dispatched
//! - Failures are notifications toward the page, never panics
//!
//! # Quick Start
//!
//! ```no_run
//! use tokio::sync::mpsc;
//! use vk_longpoll_relay::{DEFAULT_API_BASE, Relay, Result, SessionOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // The page channel: raw JSON text in both directions.
//!     let (to_relay, inbound) = mpsc::unbounded_channel();
//!     let (outbound, mut from_relay) = mpsc::unbounded_channel();
//!
//!     let relay = Relay::over_http(DEFAULT_API_BASE, SessionOptions::default())?;
//!     let task = relay.spawn(inbound, outbound);
//!
//!     // Page side: answer the token request, then consume updates.
//!     to_relay
//!         .send(r#"{"method":"onAccessTokenReceived","useraccesstoken":"token"}"#.into())
//!         .ok();
//!     while let Some(text) = from_relay.recv().await {
//!         println!("{text}");
//!     }
//!
//!     task.await.ok();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`api`] | Remote API client and the long-poll transport seam |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`protocol`] | Page-channel message types (internal wire format) |
//! | [`relay`] | Page channel ↔ session binding |
//! | [`session`] | Polling session: state machine and loop |
//!
//! # Caveats
//!
//! Poll failures are recovered by immediately re-resolving the server,
//! with no delay and no retry cap. If the remote API is persistently
//! unreachable this loops as fast as requests fail; gate externally if
//! you need backoff.

// ============================================================================
// Modules
// ============================================================================

/// Remote API access: method calls and the long-poll transport.
pub mod api;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Page-channel protocol message types.
pub mod protocol;

/// Message relay between the page channel and the session.
pub mod relay;

/// Polling session: lifecycle state machine and the long-poll loop.
pub mod session;

// ============================================================================
// Re-exports
// ============================================================================

// API types
pub use api::{
    Client, Cursor, DEFAULT_API_BASE, HttpTransport, LongPollTransport, PollReply, PollRequest,
    ResolveRequest, ServerLease,
};

// Error types
pub use error::{Error, Result};

// Protocol types
pub use protocol::{AccessTokenGrant, Envelope, Inbound, Outbound};

// Relay types
pub use relay::Relay;

// Session types
pub use session::{Session, SessionEvent, SessionOptions, SessionState};
