//! Transport-level reconnect policy.
//!
//! [`ReconnectController`] is a sans-IO state machine: the connection task
//! feeds it open/close observations and performs the [`ReconnectAction`] it
//! returns. Backoff is linear: attempt `n` waits `n × base_delay`.
//!
//! ```text
//!   Idle ──start──▶ Connecting ──opened──▶ Open
//!                      ▲   │                 │
//!           retry_due  │   │ failed          │ closed
//!                      │   ▼                 ▼
//!                    Retrying ◀──────────────┘
//!                      │
//!                      └── attempts exhausted ──▶ GivenUp
//! ```

use std::time::Duration;

/// Default ceiling on automatic reconnect attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default base delay; attempt `n` waits `n` times this long.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(2000);

/// Bounded linear retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl ReconnectPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_BASE_DELAY)
    }
}

/// Where the controller is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectState {
    Idle,
    Connecting,
    Open,
    /// A retry is scheduled.
    Retrying { attempt: u32 },
    /// Attempts exhausted; only an explicit connect starts over.
    GivenUp,
}

/// What the connection task should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectAction {
    /// Dial `address` now.
    Connect { address: String },
    /// Dial again after `delay`.
    ScheduleRetry { attempt: u32, delay: Duration },
    /// Stop retrying.
    GiveUp,
    /// Nothing to do.
    None,
}

/// Transport reconnect state machine.
#[derive(Debug, Clone)]
pub struct ReconnectController {
    policy: ReconnectPolicy,
    state: ReconnectState,
    attempts: u32,
    address: Option<String>,
}

impl ReconnectController {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            state: ReconnectState::Idle,
            attempts: 0,
            address: None,
        }
    }

    pub fn state(&self) -> ReconnectState {
        self.state
    }

    /// Retries made since the last successful open.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn policy(&self) -> ReconnectPolicy {
        self.policy
    }

    /// The address every retry reuses.
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    /// Begin connecting to `address`. Also used for explicit reconnects,
    /// which start from a clean counter.
    pub fn start(&mut self, address: impl Into<String>) -> ReconnectAction {
        let address = address.into();
        self.address = Some(address.clone());
        self.attempts = 0;
        self.state = ReconnectState::Connecting;
        ReconnectAction::Connect { address }
    }

    /// The channel opened.
    pub fn on_open(&mut self) {
        self.state = ReconnectState::Open;
        self.attempts = 0;
    }

    /// The channel closed, or an open attempt failed.
    pub fn on_closed(&mut self) -> ReconnectAction {
        match self.state {
            ReconnectState::Open | ReconnectState::Connecting | ReconnectState::Retrying { .. } => {}
            ReconnectState::Idle | ReconnectState::GivenUp => return ReconnectAction::None,
        }
        if self.address.is_none() {
            self.state = ReconnectState::Idle;
            return ReconnectAction::None;
        }

        if self.attempts < self.policy.max_attempts {
            self.attempts += 1;
            self.state = ReconnectState::Retrying {
                attempt: self.attempts,
            };
            ReconnectAction::ScheduleRetry {
                attempt: self.attempts,
                delay: self.policy.delay_for(self.attempts),
            }
        } else {
            self.state = ReconnectState::GivenUp;
            ReconnectAction::GiveUp
        }
    }

    /// A scheduled retry is due.
    pub fn on_retry_due(&mut self) -> ReconnectAction {
        match (&self.state, &self.address) {
            (ReconnectState::Retrying { .. }, Some(address)) => {
                let address = address.clone();
                self.state = ReconnectState::Connecting;
                ReconnectAction::Connect { address }
            }
            _ => ReconnectAction::None,
        }
    }

    /// Clear the counter and leave `GivenUp`, keeping the last address.
    pub fn reset(&mut self) {
        self.attempts = 0;
        if self.state == ReconnectState::GivenUp {
            self.state = ReconnectState::Idle;
        }
    }

    /// Stop everything. Returns `true` if a scheduled retry was cancelled.
    pub fn teardown(&mut self) -> bool {
        let pending = matches!(self.state, ReconnectState::Retrying { .. });
        self.state = ReconnectState::Idle;
        pending
    }
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

    fn controller(max: u32) -> ReconnectController {
        ReconnectController::new(ReconnectPolicy::new(max, Duration::from_millis(100)))
    }

    #[test]
    fn start_connects_to_address() {
        let mut c = controller(3);
        assert_eq!(c.state(), ReconnectState::Idle);
        assert_eq!(
            c.start("ws://a"),
            ReconnectAction::Connect {
                address: "ws://a".into()
            }
        );
        assert_eq!(c.state(), ReconnectState::Connecting);
    }

    #[test]
    fn backoff_is_linear_not_exponential() {
        let mut c = controller(5);
        c.start("ws://a");
        c.on_open();

        let mut delays = Vec::new();
        for _ in 0..4 {
            match c.on_closed() {
                ReconnectAction::ScheduleRetry { delay, .. } => delays.push(delay),
                other => panic!("expected retry, got {other:?}"),
            }
            assert!(matches!(c.on_retry_due(), ReconnectAction::Connect { .. }));
        }
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(300),
                Duration::from_millis(400),
            ]
        );
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let mut c = controller(2);
        c.start("ws://a");
        c.on_open();

        assert!(matches!(
            c.on_closed(),
            ReconnectAction::ScheduleRetry { attempt: 1, .. }
        ));
        c.on_retry_due();
        assert!(matches!(
            c.on_closed(),
            ReconnectAction::ScheduleRetry { attempt: 2, .. }
        ));
        c.on_retry_due();
        assert_eq!(c.on_closed(), ReconnectAction::GiveUp);
        assert_eq!(c.state(), ReconnectState::GivenUp);
        assert!(c.attempts() <= 2);

        // Further closes do nothing once given up.
        assert_eq!(c.on_closed(), ReconnectAction::None);
    }

    #[test]
    fn successful_open_resets_attempts() {
        let mut c = controller(3);
        c.start("ws://a");
        c.on_closed();
        c.on_retry_due();
        assert_eq!(c.attempts(), 1);

        c.on_open();
        assert_eq!(c.attempts(), 0);
        assert_eq!(c.state(), ReconnectState::Open);
    }

    #[test]
    fn retries_reuse_last_address() {
        let mut c = controller(3);
        c.start("ws://first");
        c.start("ws://second");
        c.on_closed();
        assert_eq!(
            c.on_retry_due(),
            ReconnectAction::Connect {
                address: "ws://second".into()
            }
        );
    }

    #[test]
    fn teardown_cancels_pending_retry() {
        let mut c = controller(3);
        c.start("ws://a");
        c.on_open();
        c.on_closed();
        assert!(c.teardown());
        assert_eq!(c.on_retry_due(), ReconnectAction::None);
        assert_eq!(c.on_closed(), ReconnectAction::None);
    }

    #[test]
    fn reset_leaves_given_up() {
        let mut c = controller(1);
        c.start("ws://a");
        c.on_closed();
        c.on_retry_due();
        assert_eq!(c.on_closed(), ReconnectAction::GiveUp);

        c.reset();
        assert_eq!(c.attempts(), 0);
        assert_eq!(c.state(), ReconnectState::Idle);
        assert_eq!(c.address(), Some("ws://a"));
    }

    #[test]
    fn close_while_idle_is_ignored() {
        let mut c = controller(3);
        assert_eq!(c.on_closed(), ReconnectAction::None);
    }

    #[test]
    fn explicit_start_recovers_from_given_up() {
        let mut c = controller(0);
        c.start("ws://a");
        assert_eq!(c.on_closed(), ReconnectAction::GiveUp);
        assert!(matches!(c.start("ws://a"), ReconnectAction::Connect { .. }));
        assert_eq!(c.state(), ReconnectState::Connecting);
    }
}
