//! Long-poll wire types and transport.
//!
//! Server resolution yields a [`ServerLease`] (endpoint + session key +
//! cursor); each poll request hangs until data arrives or the wait
//! interval elapses and answers with a [`PollReply`]. The
//! [`LongPollTransport`] trait is the seam between the session loop and
//! the network, so tests can substitute an instrumented transport.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use serde_json::Value;
use tracing::trace;
use url::Url;

use crate::api::client::Client;
use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Slack added to the server-side wait interval before the HTTP request
/// itself is considered hung.
const POLL_GRACE: Duration = Duration::from_secs(15);

// ============================================================================
// Cursor
// ============================================================================

/// Opaque server-issued position in the update stream.
///
/// The server returns it as a JSON number or string depending on protocol
/// version; both are accepted and the original text is preserved. The
/// cursor is never interpreted numerically; it is only ever replaced by
/// the value from the next successful response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cursor(String);

impl Cursor {
    /// Creates a cursor from its wire text.
    #[inline]
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the wire text of the cursor.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Cursor {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl Serialize for Cursor {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Cursor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(text) => Ok(Self(text)),
            Value::Number(number) => Ok(Self(number.to_string())),
            other => Err(de::Error::custom(format!("invalid cursor: {other}"))),
        }
    }
}

// ============================================================================
// ServerLease
// ============================================================================

/// Connection parameters returned by server resolution.
///
/// The lease stays valid until the server answers a poll with a `failed`
/// marker, at which point a fresh lease must be resolved.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerLease {
    /// Poll endpoint, host and path without a scheme.
    pub server: String,

    /// Session key presented on every poll.
    pub key: String,

    /// Cursor to start polling from.
    pub ts: Cursor,
}

// ============================================================================
// PollReply
// ============================================================================

/// Body of a poll response.
///
/// Either a `failed` marker (lease expired), or a cursor plus a batch of
/// updates (possibly empty, when the wait interval elapsed quietly).
#[derive(Debug, Clone, Deserialize)]
pub struct PollReply {
    /// Lease-expiry marker; the numeric reason is logged but otherwise
    /// every reason is handled the same way.
    #[serde(default)]
    pub failed: Option<u8>,

    /// Cursor for the next poll.
    #[serde(default)]
    pub ts: Option<Cursor>,

    /// Updates received since the previous cursor.
    #[serde(default)]
    pub updates: Vec<Value>,
}

impl PollReply {
    /// Returns `true` if the server declared the lease expired.
    #[inline]
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.failed.is_some()
    }
}

// ============================================================================
// Requests
// ============================================================================

/// Parameters of a server-resolution call.
#[derive(Debug, Clone)]
pub struct ResolveRequest {
    /// Credential for the API call.
    pub access_token: String,

    /// Long-poll protocol version (`lp_version`).
    pub lp_version: u8,

    /// API version (`v`).
    pub api_version: String,

    /// User agent presented to the API.
    pub user_agent: String,
}

/// Parameters of a single poll request.
#[derive(Debug, Clone)]
pub struct PollRequest {
    /// Poll endpoint from the current lease.
    pub server: String,

    /// Session key from the current lease.
    pub key: String,

    /// Cursor to poll from.
    pub ts: Cursor,

    /// Server-side wait interval in seconds.
    pub wait_secs: u64,

    /// Update-category bitmask.
    pub mode: u32,

    /// Long-poll protocol version.
    pub version: u8,

    /// User agent presented to the server.
    pub user_agent: String,
}

impl PollRequest {
    /// Builds the poll URL.
    ///
    /// Lease endpoints carry no scheme and default to TLS; an explicit
    /// scheme is kept as-is.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Url`] if the endpoint does not parse.
    pub fn endpoint(&self) -> Result<Url> {
        let raw = if self.server.contains("://") {
            self.server.clone()
        } else {
            format!("https://{}", self.server)
        };

        let mut url = Url::parse(&raw)?;
        url.query_pairs_mut()
            .append_pair("act", "a_check")
            .append_pair("key", &self.key)
            .append_pair("ts", self.ts.as_str())
            .append_pair("wait", &self.wait_secs.to_string())
            .append_pair("mode", &self.mode.to_string())
            .append_pair("version", &self.version.to_string());

        Ok(url)
    }
}

// ============================================================================
// LongPollTransport
// ============================================================================

/// Network operations the polling session depends on.
///
/// Implemented over HTTP by [`HttpTransport`]; tests substitute an
/// in-memory transport to script outcomes and observe request traffic.
#[async_trait]
pub trait LongPollTransport: Send + Sync {
    /// Resolves a fresh server lease.
    async fn resolve_server(&self, request: &ResolveRequest) -> Result<ServerLease>;

    /// Issues one long-lived poll request against the current lease.
    async fn poll(&self, request: &PollRequest) -> Result<PollReply>;
}

// ============================================================================
// HttpTransport
// ============================================================================

/// HTTP implementation of [`LongPollTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    /// API client used for resolution; its HTTP client is reused for
    /// poll requests.
    api: Client,
}

impl HttpTransport {
    /// Creates a transport against the given API base URL.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`Client`] construction error.
    pub fn new(api_base: &str) -> Result<Self> {
        Ok(Self {
            api: Client::new(api_base)?,
        })
    }

    /// Creates a transport over an existing API client.
    #[inline]
    #[must_use]
    pub fn with_client(api: Client) -> Self {
        Self { api }
    }
}

#[async_trait]
impl LongPollTransport for HttpTransport {
    async fn resolve_server(&self, request: &ResolveRequest) -> Result<ServerLease> {
        let params = [
            ("access_token", request.access_token.clone()),
            ("lp_version", request.lp_version.to_string()),
            ("v", request.api_version.clone()),
        ];

        let payload = self
            .api
            .call("messages.getLongPollServer", &request.user_agent, &params)
            .await?;

        serde_json::from_value(payload)
            .map_err(|error| Error::protocol(format!("unexpected lease payload: {error}")))
    }

    async fn poll(&self, request: &PollRequest) -> Result<PollReply> {
        let url = request.endpoint()?;
        trace!(ts = %request.ts, "Issuing poll request");

        let response = self
            .api
            .http()
            .get(url)
            .header(USER_AGENT, &request.user_agent)
            .timeout(Duration::from_secs(request.wait_secs) + POLL_GRACE)
            .send()
            .await?;

        Ok(response.json::<PollReply>().await?)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_cursor_from_number() {
        let cursor: Cursor = serde_json::from_value(json!(1690000001)).expect("number cursor");
        assert_eq!(cursor.as_str(), "1690000001");
    }

    #[test]
    fn test_cursor_from_string() {
        let cursor: Cursor = serde_json::from_value(json!("101")).expect("string cursor");
        assert_eq!(cursor, Cursor::from("101"));
    }

    #[test]
    fn test_cursor_rejects_other_shapes() {
        assert!(serde_json::from_value::<Cursor>(json!([1])).is_err());
        assert!(serde_json::from_value::<Cursor>(json!(null)).is_err());
    }

    #[test]
    fn test_lease_parsing() {
        let lease: ServerLease = serde_json::from_value(json!({
            "server": "im.example.com/nim123",
            "key": "abcdef",
            "ts": 1690000001,
        }))
        .expect("lease");

        assert_eq!(lease.server, "im.example.com/nim123");
        assert_eq!(lease.key, "abcdef");
        assert_eq!(lease.ts.as_str(), "1690000001");
    }

    #[test]
    fn test_poll_reply_with_data() {
        let reply: PollReply = serde_json::from_str(r#"{"ts":"101","updates":[[4,1],[8,2]]}"#)
            .expect("reply");

        assert!(!reply.is_failed());
        assert_eq!(reply.ts, Some(Cursor::from("101")));
        assert_eq!(reply.updates.len(), 2);
    }

    #[test]
    fn test_poll_reply_failed() {
        let reply: PollReply = serde_json::from_str(r#"{"failed":2}"#).expect("reply");

        assert!(reply.is_failed());
        assert!(reply.ts.is_none());
        assert!(reply.updates.is_empty());
    }

    #[test]
    fn test_poll_endpoint_defaults_to_tls() {
        let request = PollRequest {
            server: "im.example.com/nim123".to_string(),
            key: "k ey".to_string(),
            ts: Cursor::from("100"),
            wait_secs: 25,
            mode: 202,
            version: 3,
            user_agent: "UA/1.0".to_string(),
        };

        let url = request.endpoint().expect("url");
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("im.example.com"));
        assert_eq!(url.path(), "/nim123");

        let query = url.query().expect("query");
        assert!(query.contains("act=a_check"));
        assert!(query.contains("key=k+ey"));
        assert!(query.contains("ts=100"));
        assert!(query.contains("wait=25"));
        assert!(query.contains("mode=202"));
        assert!(query.contains("version=3"));
    }

    #[test]
    fn test_poll_endpoint_keeps_explicit_scheme() {
        let request = PollRequest {
            server: "http://127.0.0.1:8080/poll".to_string(),
            key: "key".to_string(),
            ts: Cursor::from("1"),
            wait_secs: 25,
            mode: 202,
            version: 3,
            user_agent: "UA/1.0".to_string(),
        };

        let url = request.endpoint().expect("url");
        assert_eq!(url.scheme(), "http");
        assert_eq!(url.port(), Some(8080));
    }
}
