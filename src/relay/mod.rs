//! Message relay module.
//!
//! The relay binds the page channel to a polling session:
//!
//! ```text
//! ┌──────────────┐   text channel    ┌───────────┐   events    ┌─────────────┐
//! │ Hosting page │◄─────────────────►│   Relay   │◄───────────►│   Session   │
//! │              │  JSON envelopes   │           │             │ (long-poll) │
//! └──────────────┘                   └───────────┘             └─────────────┘
//! ```
//!
//! # Lifecycle
//!
//! 1. `Relay::spawn` emits `onAccessTokenRequire` toward the page
//! 2. Page answers `onAccessTokenReceived`; the session starts
//! 3. Session events flow back as `onLongPollDataReceived` /
//!    `onLongPollConnectionError` envelopes
//! 4. Page channel closes; the session is aborted and the task ends

// ============================================================================
// Submodules
// ============================================================================

/// Relay loop and session ownership.
pub mod core;

// ============================================================================
// Re-exports
// ============================================================================

pub use self::core::Relay;
