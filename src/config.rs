//! Client configuration.
//!
//! [`ClientConfig`] carries every tunable with a default. The server address
//! and the reconnect policy can also come from the environment:
//!
//! | Variable                               | Field                    |
//! |----------------------------------------|--------------------------|
//! | `CONNECT_FOUR_WS_URL`                  | `server_url`             |
//! | `CONNECT_FOUR_MAX_RECONNECT_ATTEMPTS`  | `max_reconnect_attempts` |
//! | `CONNECT_FOUR_RECONNECT_BASE_DELAY_MS` | `reconnect_base_delay`   |

use std::str::FromStr;
use std::time::Duration;

use crate::countdown::{DEFAULT_MATCHMAKING_SECS, DEFAULT_OPPONENT_GRACE_SECS};
use crate::error::{ClientError, Result};
use crate::reconnect::{ReconnectPolicy, DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS};
use crate::recovery::{SessionRecovery, DEFAULT_PROMPT_DEBOUNCE, DEFAULT_REJOIN_INTERVAL};

/// Default game server address.
pub const DEFAULT_SERVER_URL: &str = "ws://localhost:3001";

pub const ENV_SERVER_URL: &str = "CONNECT_FOUR_WS_URL";
pub const ENV_MAX_RECONNECT_ATTEMPTS: &str = "CONNECT_FOUR_MAX_RECONNECT_ATTEMPTS";
pub const ENV_RECONNECT_BASE_DELAY_MS: &str = "CONNECT_FOUR_RECONNECT_BASE_DELAY_MS";

/// Default capacity of the bounded event channel.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default timeout for the graceful shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Default time a server error stays on screen.
const DEFAULT_ERROR_DISPLAY: Duration = Duration::from_millis(5000);

/// Default WebSocket handshake timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for a [`GameClient`](crate::GameClient).
///
/// # Example
///
/// ```
/// use connect_four_client::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::new("ws://game.example:3001")
///     .with_max_reconnect_attempts(3)
///     .with_reconnect_base_delay(Duration::from_millis(500));
/// assert_eq!(config.reconnect_policy().delay_for(2), Duration::from_secs(1));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Address of the game server.
    pub server_url: String,
    /// Ceiling for both transport reconnects and rejoin attempts.
    ///
    /// Defaults to **5**.
    pub max_reconnect_attempts: u32,
    /// Transport retry `n` waits `n` times this long.
    ///
    /// Defaults to **2 seconds**.
    pub reconnect_base_delay: Duration,
    /// Gap between rejoin attempts within one episode.
    ///
    /// Defaults to **2 seconds**.
    pub rejoin_interval: Duration,
    /// Wait after a mid-game drop before showing the reconnect prompt.
    ///
    /// Defaults to **3 seconds**.
    pub prompt_debounce: Duration,
    /// Seconds a disconnected opponent has to return.
    ///
    /// Defaults to **30**.
    pub opponent_grace_secs: u32,
    /// Matchmaking countdown shown before the server's first `waiting`.
    ///
    /// Defaults to **10**.
    pub matchmaking_secs: u32,
    /// How long a server error stays visible.
    ///
    /// Defaults to **5 seconds**.
    pub error_display: Duration,
    /// WebSocket handshake timeout used by the default connector.
    ///
    /// Defaults to **10 seconds**.
    pub connect_timeout: Duration,
    /// Capacity of the bounded event channel.
    ///
    /// Snapshots are dropped with a warning when the consumer falls behind.
    /// Defaults to **256**. Values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// Time [`GameClient::shutdown`](crate::GameClient::shutdown) waits
    /// before aborting the background tasks.
    ///
    /// Defaults to **1 second**.
    pub shutdown_timeout: Duration,
}

impl ClientConfig {
    /// Defaults for everything except the server address.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            max_reconnect_attempts: DEFAULT_MAX_ATTEMPTS,
            reconnect_base_delay: DEFAULT_BASE_DELAY,
            rejoin_interval: DEFAULT_REJOIN_INTERVAL,
            prompt_debounce: DEFAULT_PROMPT_DEBOUNCE,
            opponent_grace_secs: DEFAULT_OPPONENT_GRACE_SECS,
            matchmaking_secs: DEFAULT_MATCHMAKING_SECS,
            error_display: DEFAULT_ERROR_DISPLAY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Defaults overridden by the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] if a variable is set but unparseable.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    /// Blank values count as unset.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] if a value is present but unparseable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let value = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self::default();
        if let Some(url) = value(ENV_SERVER_URL) {
            config.server_url = url;
        }
        if let Some(raw) = value(ENV_MAX_RECONNECT_ATTEMPTS) {
            config.max_reconnect_attempts = parse(ENV_MAX_RECONNECT_ATTEMPTS, &raw)?;
        }
        if let Some(raw) = value(ENV_RECONNECT_BASE_DELAY_MS) {
            config.reconnect_base_delay =
                Duration::from_millis(parse(ENV_RECONNECT_BASE_DELAY_MS, &raw)?);
        }
        Ok(config)
    }

    #[must_use]
    pub fn with_server_url(mut self, server_url: impl Into<String>) -> Self {
        self.server_url = server_url.into();
        self
    }

    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_reconnect_base_delay(mut self, delay: Duration) -> Self {
        self.reconnect_base_delay = delay;
        self
    }

    #[must_use]
    pub fn with_rejoin_interval(mut self, interval: Duration) -> Self {
        self.rejoin_interval = interval;
        self
    }

    #[must_use]
    pub fn with_prompt_debounce(mut self, debounce: Duration) -> Self {
        self.prompt_debounce = debounce;
        self
    }

    #[must_use]
    pub fn with_opponent_grace_secs(mut self, secs: u32) -> Self {
        self.opponent_grace_secs = secs;
        self
    }

    #[must_use]
    pub fn with_matchmaking_secs(mut self, secs: u32) -> Self {
        self.matchmaking_secs = secs;
        self
    }

    #[must_use]
    pub fn with_error_display(mut self, display: Duration) -> Self {
        self.error_display = display;
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    /// A zero timeout aborts the background tasks without waiting.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// The transport retry policy these settings describe.
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(self.max_reconnect_attempts, self.reconnect_base_delay)
    }

    /// A fresh recovery controller for these settings.
    pub fn session_recovery(&self) -> SessionRecovery {
        SessionRecovery::new(
            self.max_reconnect_attempts,
            self.rejoin_interval,
            self.prompt_debounce,
        )
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SERVER_URL)
    }
}

fn parse<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| ClientError::Config(format!("{key}={raw:?}: {e}")))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn config_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.server_url, "ws://localhost:3001");
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.reconnect_base_delay, Duration::from_millis(2000));
        assert_eq!(config.rejoin_interval, Duration::from_millis(2000));
        assert_eq!(config.prompt_debounce, Duration::from_millis(3000));
        assert_eq!(config.opponent_grace_secs, 30);
        assert_eq!(config.matchmaking_secs, 10);
        assert_eq!(config.error_display, Duration::from_millis(5000));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.event_channel_capacity, 256);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
    }

    #[test]
    fn config_builder_methods() {
        let config = ClientConfig::new("ws://a")
            .with_server_url("ws://b")
            .with_max_reconnect_attempts(2)
            .with_event_channel_capacity(0)
            .with_opponent_grace_secs(5);
        assert_eq!(config.server_url, "ws://b");
        assert_eq!(config.reconnect_policy().max_attempts, 2);
        assert_eq!(config.session_recovery().max_attempts(), 2);
        assert_eq!(config.event_channel_capacity, 1);
        assert_eq!(config.opponent_grace_secs, 5);
    }

    #[test]
    fn lookup_overrides_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[
            (ENV_SERVER_URL, "wss://prod.example/ws"),
            (ENV_MAX_RECONNECT_ATTEMPTS, "8"),
            (ENV_RECONNECT_BASE_DELAY_MS, " 250 "),
        ]))
        .unwrap();
        assert_eq!(config.server_url, "wss://prod.example/ws");
        assert_eq!(config.max_reconnect_attempts, 8);
        assert_eq!(config.reconnect_base_delay, Duration::from_millis(250));
    }

    #[test]
    fn blank_values_are_unset() {
        let config = ClientConfig::from_lookup(lookup(&[(ENV_SERVER_URL, "  ")])).unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn unparseable_values_are_config_errors() {
        let err = ClientConfig::from_lookup(lookup(&[(ENV_MAX_RECONNECT_ATTEMPTS, "five")]))
            .unwrap_err();
        match err {
            ClientError::Config(msg) => assert!(msg.contains(ENV_MAX_RECONNECT_ATTEMPTS)),
            other => panic!("expected Config error, got {other:?}"),
        }

        assert!(matches!(
            ClientConfig::from_lookup(lookup(&[(ENV_RECONNECT_BASE_DELAY_MS, "-1")])),
            Err(ClientError::Config(_))
        ));
    }
}
