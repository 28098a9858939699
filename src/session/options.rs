//! Session configuration options.
//!
//! All values are static for the lifetime of a session; the page may
//! override them once, in the token grant that starts the session.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use vk_longpoll_relay::SessionOptions;
//!
//! let options = SessionOptions::new()
//!     .with_mode(2 | 8)
//!     .with_wait(Duration::from_secs(10));
//!
//! assert_eq!(options.mode, 10);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

// ============================================================================
// Constants
// ============================================================================

/// Default remote API version (`v` parameter).
pub const DEFAULT_API_VERSION: &str = "5.119";

/// Default long-poll protocol version.
pub const DEFAULT_LONGPOLL_VERSION: u8 = 3;

/// Default update-category bitmask.
pub const DEFAULT_MODE: u32 = 2 | 8 | 64 | 128;

/// Default server-side wait interval.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(25);

/// Default user agent presented to the remote API.
pub const DEFAULT_USER_AGENT: &str = "VKAndroidApp/4.12-1118";

// ============================================================================
// SessionOptions
// ============================================================================

/// Polling session configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Remote API version (`v` parameter).
    pub api_version: String,

    /// Long-poll protocol version (`lp_version` / `version` parameters).
    pub longpoll_version: u8,

    /// Bitmask controlling which update categories the server includes.
    pub mode: u32,

    /// Server-side wait interval for each poll.
    pub wait: Duration,

    /// User agent presented on every request.
    pub user_agent: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            api_version: DEFAULT_API_VERSION.to_string(),
            longpoll_version: DEFAULT_LONGPOLL_VERSION,
            mode: DEFAULT_MODE,
            wait: DEFAULT_WAIT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl SessionOptions {
    /// Creates options with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the remote API version.
    #[inline]
    #[must_use]
    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// Sets the long-poll protocol version.
    #[inline]
    #[must_use]
    pub fn with_longpoll_version(mut self, version: u8) -> Self {
        self.longpoll_version = version;
        self
    }

    /// Sets the update-category bitmask.
    #[inline]
    #[must_use]
    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the server-side wait interval.
    #[inline]
    #[must_use]
    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    /// Sets the user agent.
    #[inline]
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = SessionOptions::default();

        assert_eq!(options.api_version, "5.119");
        assert_eq!(options.longpoll_version, 3);
        assert_eq!(options.mode, 202);
        assert_eq!(options.wait, Duration::from_secs(25));
        assert_eq!(options.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_builder_methods() {
        let options = SessionOptions::new()
            .with_api_version("5.199")
            .with_longpoll_version(12)
            .with_mode(2)
            .with_wait(Duration::from_secs(10))
            .with_user_agent("UA/1.0");

        assert_eq!(options.api_version, "5.199");
        assert_eq!(options.longpoll_version, 12);
        assert_eq!(options.mode, 2);
        assert_eq!(options.wait, Duration::from_secs(10));
        assert_eq!(options.user_agent, "UA/1.0");
    }
}
