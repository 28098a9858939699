//! Polling session module.
//!
//! This module owns the long-poll loop against the remote API.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Session`] | Handle to one polling loop |
//! | [`SessionOptions`] | Static session configuration |
//! | [`SessionState`] | Lifecycle state (`Idle`/`Resolving`/`Polling`/`Stopped`) |
//! | [`SessionEvent`] | Notifications pushed toward the relay |
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokio::sync::mpsc;
//! use vk_longpoll_relay::{HttpTransport, Session, SessionOptions};
//!
//! # fn example() -> vk_longpoll_relay::Result<()> {
//! let transport = Arc::new(HttpTransport::new(vk_longpoll_relay::DEFAULT_API_BASE)?);
//! let (events_tx, _events_rx) = mpsc::unbounded_channel();
//!
//! let session = Session::new(transport, SessionOptions::default(), events_tx);
//! session.start("access-token");
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Session core: state machine and polling loop.
pub mod core;

/// Session configuration options.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use self::core::{Session, SessionEvent, SessionState};
pub use options::{
    DEFAULT_API_VERSION, DEFAULT_LONGPOLL_VERSION, DEFAULT_MODE, DEFAULT_USER_AGENT, DEFAULT_WAIT,
    SessionOptions,
};

// ============================================================================
// Test Support
// ============================================================================
