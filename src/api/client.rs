//! Remote API method invocation.
//!
//! Thin client for calling remote API methods as form-encoded POSTs
//! against `{base}/{method}` and unwrapping the standard
//! `{ response }` / `{ error }` envelope.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use reqwest::header::USER_AGENT;
use serde_json::Value;
use tracing::{debug, trace};
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default API base URL. Method names are appended to this.
pub const DEFAULT_API_BASE: &str = "https://api.vk.com/method/";

/// Timeout for plain method calls (server resolution is quick; only the
/// poll request is expected to hang).
const CALL_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Client
// ============================================================================

/// Remote API client.
///
/// Cheap to clone; the underlying HTTP client is reference-counted.
#[derive(Debug, Clone)]
pub struct Client {
    /// Shared HTTP client.
    http: reqwest::Client,
    /// Base URL method names are joined onto.
    base: Url,
}

impl Client {
    /// Creates a client for the given API base URL.
    ///
    /// # Errors
    ///
    /// - [`Error::Url`] if the base does not parse
    /// - [`Error::Config`] if the base cannot carry a method path
    /// - [`Error::Http`] if the HTTP client fails to build
    pub fn new(api_base: &str) -> Result<Self> {
        let base = Url::parse(api_base)?;
        if base.cannot_be_a_base() {
            return Err(Error::config(format!("API base is not joinable: {base}")));
        }

        let http = reqwest::Client::builder().build()?;

        Ok(Self { http, base })
    }

    /// Returns the underlying HTTP client.
    #[inline]
    #[must_use]
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Calls an API method with form-encoded parameters.
    ///
    /// Returns the `response` payload of the standard envelope.
    ///
    /// # Errors
    ///
    /// - [`Error::NoResponse`] if the envelope carries no `response`
    ///   field; the `error` payload (or the whole body) is preserved
    /// - [`Error::Http`] on transport failure or a non-JSON body
    pub async fn call(
        &self,
        method: &str,
        user_agent: &str,
        params: &[(&str, String)],
    ) -> Result<Value> {
        let url = self.base.join(method)?;
        debug!(method, "Calling remote API");

        let response = self
            .http
            .post(url)
            .header(USER_AGENT, user_agent)
            .timeout(CALL_TIMEOUT)
            .form(params)
            .send()
            .await?;

        let envelope: Value = response.json().await?;
        trace!(method, "API response received");

        match envelope.get("response") {
            Some(payload) => Ok(payload.clone()),
            None => {
                let error = envelope.get("error").cloned().unwrap_or(envelope);
                Err(Error::no_response(error))
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio_test::{assert_err, assert_ok};

    /// One-shot HTTP stub: accepts a single request, captures it, and
    /// answers with the given JSON body.
    async fn spawn_http_stub(body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.expect("accept");
            let mut captured = Vec::new();
            let mut buf = [0u8; 4096];

            loop {
                let n = stream.read(&mut buf).await.expect("read");
                captured.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&captured);
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text
                        .lines()
                        .find_map(|line| {
                            line.to_ascii_lowercase()
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().expect("length"))
                        })
                        .unwrap_or(0);
                    if captured.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
            }

            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).await.expect("write");
            stream.shutdown().await.ok();

            String::from_utf8_lossy(&captured).into_owned()
        });

        (format!("http://{addr}/method/"), handle)
    }

    #[test]
    fn test_rejects_unjoinable_base() {
        let result = Client::new("mailto:someone@example.com");
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_rejects_invalid_base() {
        let result = Client::new("not a url");
        assert!(matches!(result, Err(Error::Url(_))));
    }

    #[tokio::test]
    async fn test_call_posts_form_and_unwraps_response() {
        let (base, stub) = spawn_http_stub(r#"{"response":{"server":"srv","key":"k","ts":1}}"#).await;
        let client = Client::new(&base).expect("client");

        let payload = tokio_test::assert_ok!(
            client
                .call(
                    "messages.getLongPollServer",
                    "UA/1.0",
                    &[
                        ("access_token", "secret".to_string()),
                        ("lp_version", "3".to_string()),
                        ("v", "5.119".to_string()),
                    ],
                )
                .await
        );

        assert_eq!(payload["server"], "srv");

        let request = stub.await.expect("stub");
        assert!(request.starts_with("POST /method/messages.getLongPollServer HTTP/1.1"));
        assert!(request.contains("access_token=secret"));
        assert!(request.contains("lp_version=3"));
        assert!(request.contains("v=5.119"));

        let headers = request.to_ascii_lowercase();
        assert!(headers.contains("content-type: application/x-www-form-urlencoded"));
        assert!(headers.contains("user-agent: ua/1.0"));
    }

    #[tokio::test]
    async fn test_call_surfaces_error_envelope() {
        let (base, stub) =
            spawn_http_stub(r#"{"error":{"error_code":5,"error_msg":"User authorization failed"}}"#)
                .await;
        let client = Client::new(&base).expect("client");

        let err = tokio_test::assert_err!(
            client
                .call("messages.getLongPollServer", "UA/1.0", &[])
                .await
        );

        let payload = err.api_payload().expect("api payload");
        assert_eq!(payload["error_code"], 5);
        stub.await.expect("stub");
    }

    #[tokio::test]
    async fn test_call_without_error_field_keeps_body() {
        let (base, stub) = spawn_http_stub(r#"{"unexpected":true}"#).await;
        let client = Client::new(&base).expect("client");

        let err = client
            .call("messages.getLongPollServer", "UA/1.0", &[])
            .await
            .expect_err("no response field");

        let payload = err.api_payload().expect("api payload");
        assert_eq!(payload["unexpected"], true);
        stub.await.expect("stub");
    }
}
