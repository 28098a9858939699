//! Polling session core.
//!
//! A [`Session`] owns one long-poll loop against the remote API:
//! resolve a server lease, then poll it until the lease expires or the
//! session is aborted. The loop runs on a single spawned task; `start`
//! and `abort` only touch the lifecycle state and the cancellation
//! token.
//!
//! # State Machine
//!
//! ```text
//! Idle → Resolving → Polling ⇄ Resolving → Stopped
//!                                 (abort reaches Stopped from any state)
//! ```
//!
//! `Stopped` is terminal: a session that was aborted (or died resolving)
//! ignores further `start` calls. Sessions are cheap; create a new one
//! to poll again.
//!
//! # Retry Policy
//!
//! Poll failures are recovered by re-resolving the lease immediately,
//! with no delay and no retry cap. If the remote API is persistently
//! unreachable this loops as fast as requests fail; integrators who need
//! backoff must gate externally.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::api::{Cursor, LongPollTransport, PollReply, PollRequest, ResolveRequest, ServerLease};
use crate::error::Result;

use super::options::SessionOptions;

// ============================================================================
// SessionState
// ============================================================================

/// Lifecycle state of a polling session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, not started.
    Idle,
    /// Resolving a server lease.
    Resolving,
    /// A poll request is outstanding.
    Polling,
    /// Terminal: aborted, or resolution failed.
    Stopped,
}

// ============================================================================
// SessionEvent
// ============================================================================

/// Notification emitted by the session toward the relay.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A batch of updates arrived.
    UpdatesReceived {
        /// Updates as returned by the server.
        updates: Vec<Value>,
    },

    /// Server resolution failed; the session is stopping.
    ///
    /// Relayed to the page with error code 1.
    ResolveFailed {
        /// API error payload, or a description of the failure.
        error: Value,
    },

    /// A poll request failed; the session is re-resolving.
    ///
    /// Relayed to the page with error code 2.
    PollFailed {
        /// Description of the transport failure.
        error: Value,
    },
}

// ============================================================================
// Session
// ============================================================================

/// Handle to a polling session.
///
/// Cloning shares the same session. All methods are non-blocking; the
/// polling loop itself runs on a spawned task.
#[derive(Clone)]
pub struct Session {
    /// Shared inner state.
    inner: Arc<SessionInner>,
}

/// State shared between the handle and the polling task.
struct SessionInner {
    /// Network operations.
    transport: Arc<dyn LongPollTransport>,
    /// Static session configuration.
    options: SessionOptions,
    /// Sink for session notifications.
    events: mpsc::UnboundedSender<SessionEvent>,
    /// Lifecycle state.
    state: Mutex<SessionState>,
    /// Cooperative cancellation for the polling task.
    cancel: CancellationToken,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Session - Public API
// ============================================================================

impl Session {
    /// Creates a session.
    ///
    /// Nothing happens until [`start`](Self::start) is called. Events are
    /// delivered through `events`; if the receiver is dropped the session
    /// stops itself.
    #[must_use]
    pub fn new(
        transport: Arc<dyn LongPollTransport>,
        options: SessionOptions,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                transport,
                options,
                events,
                state: Mutex::new(SessionState::Idle),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Starts the polling loop with the given access token.
    ///
    /// Idempotent: calling `start` while the session is running is a
    /// no-op, as is calling it after [`abort`](Self::abort).
    pub fn start(&self, access_token: impl Into<String>) {
        {
            let mut state = self.inner.state.lock();
            match *state {
                SessionState::Idle => *state = SessionState::Resolving,
                SessionState::Stopped => {
                    debug!("Session is stopped, ignoring start");
                    return;
                }
                _ => {
                    debug!("Session already running, ignoring start");
                    return;
                }
            }
        }

        info!("Starting long-poll session");
        let inner = Arc::clone(&self.inner);
        tokio::spawn(run(inner, access_token.into()));
    }

    /// Aborts the session and cancels any in-flight request.
    ///
    /// Safe to call multiple times, and before any `start`.
    pub fn abort(&self) {
        let previous = {
            let mut state = self.inner.state.lock();
            std::mem::replace(&mut *state, SessionState::Stopped)
        };

        self.inner.cancel.cancel();

        if previous != SessionState::Stopped {
            debug!(?previous, "Session aborted");
        }
    }

    /// Returns the current lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.inner.state.lock()
    }
}

// ============================================================================
// SessionInner
// ============================================================================

impl SessionInner {
    /// Moves to `next` unless the session has already stopped.
    fn advance_state(&self, next: SessionState) {
        let mut state = self.state.lock();
        if *state != SessionState::Stopped {
            *state = next;
        }
    }

    /// Marks the session terminally stopped.
    fn stop(&self) {
        *self.state.lock() = SessionState::Stopped;
        self.cancel.cancel();
    }

    /// Delivers an event unless the session was cancelled.
    ///
    /// A dropped receiver stops the session: there is nobody left to
    /// poll for.
    fn emit(&self, event: SessionEvent) {
        if self.cancel.is_cancelled() {
            return;
        }
        if self.events.send(event).is_err() {
            debug!("Event receiver dropped, stopping session");
            self.stop();
        }
    }
}

// ============================================================================
// Polling Loop
// ============================================================================

/// Drives resolve → poll → (renew | recover) until cancelled.
async fn run(inner: Arc<SessionInner>, access_token: String) {
    let Some(mut lease) = resolve(&inner, &access_token).await else {
        return;
    };

    let mut pending = spawn_poll(&inner, &lease);

    loop {
        let joined = tokio::select! {
            () = inner.cancel.cancelled() => {
                pending.abort();
                debug!("Cancelling in-flight poll");
                return;
            }
            joined = &mut pending => joined,
        };

        // The abort may have raced the poll completing; late responses
        // must not be dispatched.
        if inner.cancel.is_cancelled() {
            return;
        }

        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(join_error) => {
                if !join_error.is_cancelled() {
                    error!(error = %join_error, "Poll task failed");
                    inner.stop();
                }
                return;
            }
        };

        match poll_step(outcome) {
            Step::Advance { ts, updates } => {
                lease.ts = ts;
                pending = spawn_poll(&inner, &lease);
                // The replacement poll must reach the wire before the
                // batch is handed off.
                tokio::task::yield_now().await;
                if inner.cancel.is_cancelled() {
                    pending.abort();
                    return;
                }
                inner.emit(SessionEvent::UpdatesReceived { updates });
            }

            Step::Renew { failed } => {
                debug!(failed, "Lease expired, re-resolving server");
                let Some(next) = resolve(&inner, &access_token).await else {
                    return;
                };
                lease = next;
                pending = spawn_poll(&inner, &lease);
            }

            Step::Recover { error } => {
                warn!(%error, "Long-poll request failed");
                inner.emit(SessionEvent::PollFailed {
                    error: Value::String(error),
                });
                let Some(next) = resolve(&inner, &access_token).await else {
                    return;
                };
                lease = next;
                pending = spawn_poll(&inner, &lease);
            }
        }
    }
}

/// What the loop does with one poll outcome.
enum Step {
    /// Advance the cursor and dispatch the batch.
    Advance { ts: Cursor, updates: Vec<Value> },
    /// The lease expired; resolve a fresh one. Not an error.
    Renew { failed: u8 },
    /// Transport failure; notify and resolve a fresh lease.
    Recover { error: String },
}

fn poll_step(outcome: Result<PollReply>) -> Step {
    match outcome {
        Ok(reply) if reply.is_failed() => Step::Renew {
            failed: reply.failed.unwrap_or_default(),
        },
        Ok(reply) => match reply.ts {
            Some(ts) => Step::Advance {
                ts,
                updates: reply.updates,
            },
            // A success body with no cursor cannot drive the next poll.
            None => Step::Recover {
                error: "poll reply carried no cursor".to_string(),
            },
        },
        Err(error) => Step::Recover {
            error: error.to_string(),
        },
    }
}

/// Resolves a fresh server lease.
///
/// Returns `None` when the session should end: cancellation, or a
/// resolution failure (terminal for this attempt; reported with error
/// code 1, never retried automatically).
async fn resolve(inner: &Arc<SessionInner>, access_token: &str) -> Option<ServerLease> {
    if inner.cancel.is_cancelled() {
        return None;
    }

    inner.advance_state(SessionState::Resolving);

    let request = ResolveRequest {
        access_token: access_token.to_string(),
        lp_version: inner.options.longpoll_version,
        api_version: inner.options.api_version.clone(),
        user_agent: inner.options.user_agent.clone(),
    };

    let resolved = tokio::select! {
        () = inner.cancel.cancelled() => return None,
        resolved = inner.transport.resolve_server(&request) => resolved,
    };

    if inner.cancel.is_cancelled() {
        return None;
    }

    match resolved {
        Ok(lease) => {
            debug!(server = %lease.server, ts = %lease.ts, "Server lease resolved");
            Some(lease)
        }
        Err(error) => {
            warn!(%error, "Failed to resolve long-poll server");
            let payload = error
                .api_payload()
                .cloned()
                .unwrap_or_else(|| Value::String(error.to_string()));
            inner.emit(SessionEvent::ResolveFailed { error: payload });
            inner.stop();
            None
        }
    }
}

/// Spawns the next poll request.
///
/// The request runs on its own task so it stays on the wire while the
/// loop dispatches the previous batch; the returned handle is the
/// ownership of the in-flight request and aborting it cancels the
/// transport.
fn spawn_poll(inner: &Arc<SessionInner>, lease: &ServerLease) -> JoinHandle<Result<PollReply>> {
    inner.advance_state(SessionState::Polling);

    let transport = Arc::clone(&inner.transport);
    let request = PollRequest {
        server: lease.server.clone(),
        key: lease.key.clone(),
        ts: lease.ts.clone(),
        wait_secs: inner.options.wait.as_secs(),
        mode: inner.options.mode,
        version: inner.options.longpoll_version,
        user_agent: inner.options.user_agent.clone(),
    };

    tokio::spawn(async move { transport.poll(&request).await })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use serde_json::json;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::time::{sleep, timeout};

    use crate::session::testing::{FakeTransport, ScriptedPoll, ScriptedResolve};

    fn session_with(
        fake: &Arc<FakeTransport>,
    ) -> (Session, UnboundedReceiver<SessionEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let transport: Arc<dyn LongPollTransport> = fake.clone();
        let session = Session::new(transport, SessionOptions::default(), events_tx);
        (session, events_rx)
    }

    async fn wait_for(condition: impl Fn() -> bool) {
        timeout(Duration::from_secs(2), async {
            while !condition() {
                sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("condition within deadline");
    }

    async fn next_event(events: &mut UnboundedReceiver<SessionEvent>) -> SessionEvent {
        timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("event within deadline")
            .expect("channel open")
    }

    #[tokio::test]
    async fn test_resolve_failure_is_terminal() {
        let fake = Arc::new(FakeTransport::new());
        fake.script_resolve(ScriptedResolve::ApiError(json!({"error_code": 5})));
        let (session, mut events) = session_with(&fake);

        session.start("token");

        let event = next_event(&mut events).await;
        assert_eq!(
            event,
            SessionEvent::ResolveFailed {
                error: json!({"error_code": 5})
            }
        );

        wait_for(|| session.state() == SessionState::Stopped).await;
        assert_eq!(fake.poll_count(), 0);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_updates_advance_cursor_and_reissue_before_dispatch() {
        let fake = Arc::new(FakeTransport::new());
        fake.script_resolve(ScriptedResolve::lease("srv", "key", "100"));
        fake.script_poll(ScriptedPoll::data("101", vec![json!({"id": 1})]));
        let (session, mut events) = session_with(&fake);

        session.start("token");

        let event = next_event(&mut events).await;
        assert_eq!(
            event,
            SessionEvent::UpdatesReceived {
                updates: vec![json!({"id": 1})]
            }
        );

        // The follow-up poll was already issued, carrying the new cursor.
        assert_eq!(fake.poll_count(), 2);
        assert_eq!(fake.poll_cursors(), vec!["100", "101"]);
        assert_eq!(session.state(), SessionState::Polling);
    }

    #[tokio::test]
    async fn test_cursor_is_replaced_never_regresses() {
        let fake = Arc::new(FakeTransport::new());
        fake.script_resolve(ScriptedResolve::lease("srv", "key", "100"));
        fake.script_poll(ScriptedPoll::data("101", vec![json!([4, 1])]));
        fake.script_poll(ScriptedPoll::data("102", vec![json!([4, 2])]));
        fake.script_poll(ScriptedPoll::data("103", vec![json!([4, 3])]));
        let (session, mut events) = session_with(&fake);

        session.start("token");

        for _ in 0..3 {
            let _ = next_event(&mut events).await;
        }

        wait_for(|| fake.poll_count() == 4).await;
        assert_eq!(fake.poll_cursors(), vec!["100", "101", "102", "103"]);
        assert_eq!(fake.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_failed_lease_renews_without_notification() {
        let fake = Arc::new(FakeTransport::new());
        fake.script_resolve(ScriptedResolve::lease("srv", "key", "100"));
        fake.script_resolve(ScriptedResolve::lease("srv2", "key2", "200"));
        fake.script_poll(ScriptedPoll::Failed(2));
        let (session, mut events) = session_with(&fake);

        session.start("token");

        wait_for(|| fake.poll_count() == 2).await;
        assert_eq!(fake.resolve_count(), 2);
        assert_eq!(fake.poll_cursors(), vec!["100", "200"]);
        // Lease expiry is not an error.
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_poll_failure_notifies_then_renews() {
        let fake = Arc::new(FakeTransport::new());
        fake.script_resolve(ScriptedResolve::lease("srv", "key", "100"));
        fake.script_resolve(ScriptedResolve::lease("srv", "key", "100"));
        fake.script_poll(ScriptedPoll::Error("connection reset".to_string()));
        let (session, mut events) = session_with(&fake);

        session.start("token");

        let event = next_event(&mut events).await;
        match event {
            SessionEvent::PollFailed { error } => {
                let text = error.as_str().expect("string payload");
                assert!(text.contains("connection reset"));
            }
            other => panic!("unexpected event: {other:?}"),
        }

        wait_for(|| fake.resolve_count() == 2 && fake.poll_count() == 2).await;
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_missing_cursor_is_a_transport_failure() {
        let fake = Arc::new(FakeTransport::new());
        fake.script_resolve(ScriptedResolve::lease("srv", "key", "100"));
        fake.script_resolve(ScriptedResolve::lease("srv", "key", "150"));
        fake.script_poll(ScriptedPoll::data_without_cursor(vec![json!([4, 1])]));
        let (session, mut events) = session_with(&fake);

        session.start("token");

        let event = next_event(&mut events).await;
        assert!(matches!(event, SessionEvent::PollFailed { .. }));
        wait_for(|| fake.resolve_count() == 2).await;
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let fake = Arc::new(FakeTransport::new());
        fake.script_resolve(ScriptedResolve::lease("srv", "key", "100"));
        let (session, _events) = session_with(&fake);

        session.start("token");
        session.start("token");

        wait_for(|| fake.poll_count() == 1).await;
        assert_eq!(fake.resolve_count(), 1);
    }

    #[tokio::test]
    async fn test_abort_cancels_in_flight_poll() {
        let fake = Arc::new(FakeTransport::new());
        fake.script_resolve(ScriptedResolve::lease("srv", "key", "100"));
        let (session, mut events) = session_with(&fake);

        session.start("token");
        wait_for(|| fake.poll_count() == 1).await;

        session.abort();
        assert_eq!(session.state(), SessionState::Stopped);

        sleep(Duration::from_millis(10)).await;
        assert_eq!(fake.poll_count(), 1);
        assert_eq!(fake.resolve_count(), 1);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_completed_response_after_abort_is_discarded() {
        let fake = Arc::new(FakeTransport::new());
        fake.script_resolve(ScriptedResolve::lease("srv", "key", "100"));
        let gate = fake.script_gated_poll("101", vec![json!({"id": 1})]);
        let (session, mut events) = session_with(&fake);

        session.start("token");
        wait_for(|| fake.poll_count() == 1).await;

        session.abort();
        gate.notify_one();

        sleep(Duration::from_millis(10)).await;
        assert!(events.try_recv().is_err());
        assert_eq!(fake.poll_count(), 1);
    }

    #[tokio::test]
    async fn test_abort_is_reentrant_and_safe_without_start() {
        let fake = Arc::new(FakeTransport::new());
        let (session, _events) = session_with(&fake);

        session.abort();
        session.abort();
        assert_eq!(session.state(), SessionState::Stopped);

        // Stopped is terminal: a later start must not touch the network.
        session.start("token");
        sleep(Duration::from_millis(10)).await;
        assert_eq!(fake.resolve_count(), 0);
    }

    #[tokio::test]
    async fn test_dropped_event_receiver_stops_session() {
        let fake = Arc::new(FakeTransport::new());
        fake.script_resolve(ScriptedResolve::lease("srv", "key", "100"));
        fake.script_poll(ScriptedPoll::data("101", vec![json!([4, 1])]));
        let (session, events) = session_with(&fake);

        drop(events);
        session.start("token");

        wait_for(|| session.state() == SessionState::Stopped).await;
    }
}
