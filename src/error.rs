//! Error types for the long-poll relay.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use vk_longpoll_relay::{Result, Error};
//!
//! async fn example(client: &Client) -> Result<()> {
//!     let lease = client.resolve_server("token").await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Remote API | [`Error::NoResponse`] |
//! | Transport | [`Error::Transport`], [`Error::Http`] |
//! | Protocol | [`Error::Protocol`] |
//! | Channel | [`Error::ChannelClosed`] |
//! | External | [`Error::Json`], [`Error::Url`] |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use serde_json::Value;
use thiserror::Error;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when session or client configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Remote API Errors
    // ========================================================================
    /// The remote API answered without a successful response envelope.
    ///
    /// Returned when a method call yields `{ error: {...} }` instead of
    /// `{ response: {...} }`. The raw error payload is preserved so it can
    /// be forwarded to the page verbatim.
    #[error("No response from remote API: {error}")]
    NoResponse {
        /// Error payload as returned by the API.
        error: Value,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// Transport failure during a long-poll request.
    ///
    /// Returned when the poll request fails at the network level or the
    /// body cannot be read.
    #[error("Long-poll request failed: {message}")]
    Transport {
        /// Description of the transport failure.
        message: String,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Unexpected response shape from the remote service.
    ///
    /// Returned when a response parses as JSON but does not match the
    /// expected wire format.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // Channel Errors
    // ========================================================================
    /// The page message channel is closed.
    ///
    /// Returned when an outbound message cannot be delivered because the
    /// hosting page went away.
    #[error("Page channel closed")]
    ChannelClosed,

    // ========================================================================
    // External Errors
    // ========================================================================
    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a no-response error from an API error payload.
    #[inline]
    pub fn no_response(error: Value) -> Self {
        Self::NoResponse { error }
    }

    /// Creates a transport error.
    #[inline]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a transport-level failure.
    ///
    /// Transport failures are reported to the page with error code 2 and
    /// recovered by re-resolving the server.
    #[inline]
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Http(_))
    }

    /// Returns `true` if the remote API refused the request.
    #[inline]
    #[must_use]
    pub fn is_api_error(&self) -> bool {
        matches!(self, Self::NoResponse { .. })
    }

    /// Returns the API error payload, if any.
    ///
    /// Used to forward the raw error to the page.
    #[must_use]
    pub fn api_payload(&self) -> Option<&Value> {
        match self {
            Self::NoResponse { error } => Some(error),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
