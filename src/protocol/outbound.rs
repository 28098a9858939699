//! Outbound message types (session → page).
//!
//! Every message sent to the hosting page is wrapped in an [`Envelope`]
//! carrying the fixed protocol `version` and `agent` fields plus an
//! optional `callback` hint naming the inbound method the page should
//! answer with.
//!
//! # Format
//!
//! ```json
//! {
//!   "method": "onLongPollDataReceived",
//!   "updates": [ ... ],
//!   "version": 3.3,
//!   "agent": "all"
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;
use serde_json::Value;

use crate::error::Result;

// ============================================================================
// Constants
// ============================================================================

/// Protocol version stamped on every outbound envelope.
pub const PROTOCOL_VERSION: f64 = 3.3;

/// Agent tag stamped on every outbound envelope.
///
/// Also doubles as the marker that lets the inbound parser recognize the
/// relay's own messages echoed back on the shared channel.
pub const PROTOCOL_AGENT: &str = "all";

/// Error code: the remote API gave no successful response.
pub const ERROR_NO_RESPONSE: u8 = 1;

/// Error code: the long-poll request itself failed.
pub const ERROR_POLL_REQUEST: u8 = 2;

/// Inbound method the page answers the token request with.
pub const METHOD_ACCESS_TOKEN_RECEIVED: &str = "onAccessTokenReceived";

// ============================================================================
// Outbound
// ============================================================================

/// Payload of an outbound message, tagged by wire method name.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "method")]
pub enum Outbound {
    /// Request the access token from the page. Sent once at startup.
    #[serde(rename = "onAccessTokenRequire")]
    AccessTokenRequire,

    /// Long-poll data notification.
    ///
    /// Carries either a batch of updates or, with
    /// [`ERROR_NO_RESPONSE`], the API error from server resolution.
    #[serde(rename = "onLongPollDataReceived")]
    LongPollData {
        /// Update batch as returned by the server.
        #[serde(skip_serializing_if = "Option::is_none")]
        updates: Option<Vec<Value>>,

        /// Fixed error code, present only on the error shape.
        #[serde(rename = "errorId", skip_serializing_if = "Option::is_none")]
        error_id: Option<u8>,

        /// Error payload, present only on the error shape.
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<Value>,
    },

    /// Transport failure during polling.
    #[serde(rename = "onLongPollConnectionError")]
    ConnectionError {
        /// Fixed error code ([`ERROR_POLL_REQUEST`]).
        #[serde(rename = "errorId")]
        error_id: u8,

        /// Error description.
        error: Value,
    },
}

impl Outbound {
    /// Returns the wire method name.
    #[inline]
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::AccessTokenRequire => "onAccessTokenRequire",
            Self::LongPollData { .. } => "onLongPollDataReceived",
            Self::ConnectionError { .. } => "onLongPollConnectionError",
        }
    }
}

// ============================================================================
// Envelope
// ============================================================================

/// A complete outbound message: payload plus fixed metadata fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    /// Method-tagged payload, flattened into the envelope object.
    #[serde(flatten)]
    pub payload: Outbound,

    /// Protocol version ([`PROTOCOL_VERSION`]).
    pub version: f64,

    /// Agent tag ([`PROTOCOL_AGENT`]).
    pub agent: String,

    /// Inbound method the page should answer with, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback: Option<String>,
}

impl Envelope {
    /// Wraps a payload in the standard envelope with no callback.
    #[inline]
    #[must_use]
    pub fn new(payload: Outbound) -> Self {
        Self {
            payload,
            version: PROTOCOL_VERSION,
            agent: PROTOCOL_AGENT.to_string(),
            callback: None,
        }
    }

    /// Creates the startup token request.
    ///
    /// The page is expected to answer with
    /// [`METHOD_ACCESS_TOKEN_RECEIVED`].
    #[must_use]
    pub fn access_token_require() -> Self {
        let mut envelope = Self::new(Outbound::AccessTokenRequire);
        envelope.callback = Some(METHOD_ACCESS_TOKEN_RECEIVED.to_string());
        envelope
    }

    /// Creates an update-batch notification.
    #[must_use]
    pub fn updates(updates: Vec<Value>) -> Self {
        Self::new(Outbound::LongPollData {
            updates: Some(updates),
            error_id: None,
            error: None,
        })
    }

    /// Creates the no-response-from-API notification
    /// ([`ERROR_NO_RESPONSE`]).
    #[must_use]
    pub fn no_response(error: Value) -> Self {
        Self::new(Outbound::LongPollData {
            updates: None,
            error_id: Some(ERROR_NO_RESPONSE),
            error: Some(error),
        })
    }

    /// Creates the poll-transport-failure notification
    /// ([`ERROR_POLL_REQUEST`]).
    #[must_use]
    pub fn connection_error(error: Value) -> Self {
        Self::new(Outbound::ConnectionError {
            error_id: ERROR_POLL_REQUEST,
            error,
        })
    }

    /// Returns the wire method name of the payload.
    #[inline]
    #[must_use]
    pub fn method(&self) -> &'static str {
        self.payload.method()
    }

    /// Serializes the envelope to its wire representation.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// Tests
// ============================================================================
