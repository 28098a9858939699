//! Remote API access layer.
//!
//! Two halves:
//!
//! | Module | Description |
//! |--------|-------------|
//! | `client` | Form-encoded method calls and the response envelope |
//! | `longpoll` | Long-poll wire types and the transport seam |
//!
//! The session loop talks to the network exclusively through
//! [`LongPollTransport`]; [`HttpTransport`] is the production
//! implementation.

// ============================================================================
// Submodules
// ============================================================================

/// Remote API method invocation.
pub mod client;

/// Long-poll wire types and transport.
pub mod longpoll;

// ============================================================================
// Re-exports
// ============================================================================

pub use client::{Client, DEFAULT_API_BASE};
pub use longpoll::{
    Cursor, HttpTransport, LongPollTransport, PollReply, PollRequest, ResolveRequest, ServerLease,
};
