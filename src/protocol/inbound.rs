//! Inbound message types (page → session).
//!
//! The page channel is shared with unrelated traffic, so parsing is
//! tolerant: anything that is not a JSON object carrying a `method` field
//! is dropped with at most a log line. Messages carrying an `agent` field
//! are the relay's own envelopes echoed back and are dropped as well.

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde_json::{Number, Value};
use tracing::{trace, warn};

// ============================================================================
// Inbound
// ============================================================================

/// A recognized message from the hosting page, tagged by wire method name.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "method")]
pub enum Inbound {
    /// The page delivered the access token (and optional overrides).
    #[serde(rename = "onAccessTokenReceived")]
    AccessTokenReceived(AccessTokenGrant),
}

// ============================================================================
// AccessTokenGrant
// ============================================================================

/// Payload of `onAccessTokenReceived`.
///
/// The optional fields override the session defaults for the lifetime of
/// the session started by this grant.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessTokenGrant {
    /// Opaque credential used for every remote API request.
    pub useraccesstoken: String,

    /// User agent to present to the remote API.
    #[serde(rename = "userAgent", default)]
    pub user_agent: Option<String>,

    /// Remote API version override.
    ///
    /// Arrives as a JSON number on the wire (e.g. `5.119`).
    #[serde(rename = "apiVersion", default)]
    pub api_version: Option<Number>,

    /// Update-category bitmask override.
    #[serde(default)]
    pub mode: Option<u32>,

    /// Long-poll protocol version override.
    #[serde(rename = "longpollVersion", default)]
    pub longpoll_version: Option<u8>,
}

// ============================================================================
// Parsing
// ============================================================================

/// Parses raw page-channel text into a recognized inbound message.
///
/// Returns `None` for anything that is not addressed to us: non-JSON
/// text, objects without a `method`, our own echoed envelopes (objects
/// with an `agent` field), and unknown methods. Malformed payloads for a
/// known method are logged and dropped, never fatal.
#[must_use]
pub fn parse_page_message(text: &str) -> Option<Inbound> {
    let trimmed = text.trim();

    // The channel carries plenty of non-protocol traffic; only object
    // literals are candidates.
    if !(trimmed.starts_with('{') && trimmed.ends_with('}')) {
        return None;
    }

    let value: Value = match serde_json::from_str(trimmed) {
        Ok(value) => value,
        Err(error) => {
            trace!(%error, "Ignoring unparsable page message");
            return None;
        }
    };

    if value.get("agent").is_some() {
        // One of our own envelopes reflected back on the shared channel.
        return None;
    }

    let method = value.get("method").and_then(Value::as_str)?;

    match method {
        "onAccessTokenReceived" => match serde_json::from_value::<Inbound>(value.clone()) {
            Ok(message) => Some(message),
            Err(error) => {
                warn!(method, %error, "Malformed inbound page message");
                None
            }
        },
        other => {
            trace!(method = other, "Ignoring unrelated page message");
            None
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
