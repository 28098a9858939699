//! Message relay between the page channel and the polling session.
//!
//! The relay is the owner of the session lifecycle: it requests the
//! access token at startup, starts the session when the page answers,
//! converts session events into protocol envelopes, and tears the
//! session down when the page channel closes.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::api::{HttpTransport, LongPollTransport};
use crate::error::{Error, Result};
use crate::protocol::{AccessTokenGrant, Envelope, Inbound, parse_page_message};
use crate::session::{Session, SessionEvent, SessionOptions};

// ============================================================================
// Relay
// ============================================================================

/// Relay between a page message channel and one polling session.
///
/// The page channel is a pair of text channels carrying JSON messages;
/// the transport behind them (extension messaging, a socket, stdio) is
/// the caller's concern.
pub struct Relay {
    /// Network operations handed to the session.
    transport: Arc<dyn LongPollTransport>,
    /// Session defaults; the token grant may override them.
    options: SessionOptions,
}

// ============================================================================
// Relay - Public API
// ============================================================================

impl Relay {
    /// Creates a relay over an explicit transport.
    #[must_use]
    pub fn new(transport: Arc<dyn LongPollTransport>, options: SessionOptions) -> Self {
        Self { transport, options }
    }

    /// Creates a relay over the HTTP transport.
    ///
    /// # Errors
    ///
    /// Returns the [`HttpTransport`] construction error.
    pub fn over_http(api_base: &str, options: SessionOptions) -> Result<Self> {
        Ok(Self::new(Arc::new(HttpTransport::new(api_base)?), options))
    }

    /// Spawns the relay loop over the given page channel.
    ///
    /// `inbound` carries raw text from the page; `outbound` receives
    /// serialized protocol envelopes. The task ends when the inbound
    /// channel closes or the outbound receiver is dropped, aborting the
    /// session either way.
    #[must_use]
    pub fn spawn(
        self,
        inbound: mpsc::UnboundedReceiver<String>,
        outbound: mpsc::UnboundedSender<String>,
    ) -> JoinHandle<()> {
        tokio::spawn(self.run(inbound, outbound))
    }

    /// Relay loop body.
    async fn run(
        self,
        mut inbound: mpsc::UnboundedReceiver<String>,
        outbound: mpsc::UnboundedSender<String>,
    ) {
        info!("Relay started, requesting access token");

        if send_to_page(&outbound, &Envelope::access_token_require()).is_err() {
            debug!("Page channel closed before startup");
            return;
        }

        // Keep our own sender alive so `events.recv()` never closes while
        // no session exists yet.
        let (events_tx, mut events) = mpsc::unbounded_channel();
        let mut session: Option<Session> = None;

        loop {
            tokio::select! {
                message = inbound.recv() => match message {
                    Some(text) => self.handle_page_message(&text, &mut session, &events_tx),
                    None => {
                        debug!("Page channel closed, tearing down");
                        break;
                    }
                },

                event = events.recv() => {
                    let Some(event) = event else { break };
                    if send_to_page(&outbound, &envelope_for(event)).is_err() {
                        warn!("Page receiver dropped, tearing down");
                        break;
                    }
                }
            }
        }

        if let Some(session) = &session {
            session.abort();
        }
    }

    /// Handles one raw message from the page channel.
    fn handle_page_message(
        &self,
        text: &str,
        session: &mut Option<Session>,
        events_tx: &mpsc::UnboundedSender<SessionEvent>,
    ) {
        let Some(message) = parse_page_message(text) else {
            return;
        };

        match message {
            Inbound::AccessTokenReceived(grant) => {
                debug!("Access token received from page");
                let session = session.get_or_insert_with(|| {
                    Session::new(
                        Arc::clone(&self.transport),
                        self.options_for(&grant),
                        events_tx.clone(),
                    )
                });
                session.start(grant.useraccesstoken);
            }
        }
    }

    /// Applies the grant's overrides to the relay's session defaults.
    fn options_for(&self, grant: &AccessTokenGrant) -> SessionOptions {
        let mut options = self.options.clone();

        if let Some(user_agent) = &grant.user_agent {
            options.user_agent = user_agent.clone();
        }
        if let Some(api_version) = &grant.api_version {
            options.api_version = api_version.to_string();
        }
        if let Some(mode) = grant.mode {
            options.mode = mode;
        }
        if let Some(longpoll_version) = grant.longpoll_version {
            options.longpoll_version = longpoll_version;
        }

        options
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Converts a session event into its outbound envelope.
fn envelope_for(event: SessionEvent) -> Envelope {
    match event {
        SessionEvent::UpdatesReceived { updates } => Envelope::updates(updates),
        SessionEvent::ResolveFailed { error } => Envelope::no_response(error),
        SessionEvent::PollFailed { error } => Envelope::connection_error(error),
    }
}

/// Serializes an envelope and delivers it to the page.
///
/// Serialization failures are logged and swallowed; only a closed
/// channel is an error, so the caller can tear down.
fn send_to_page(outbound: &mpsc::UnboundedSender<String>, envelope: &Envelope) -> Result<()> {
    let text = match envelope.to_json() {
        Ok(text) => text,
        Err(err) => {
            error!(method = envelope.method(), error = %err, "Failed to serialize envelope");
            return Ok(());
        }
    };

    debug!(method = envelope.method(), "Sending event to page");
    outbound.send(text).map_err(|_| Error::ChannelClosed)
}

// ============================================================================
// Tests
// ============================================================================
