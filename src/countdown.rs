//! Whole-second countdowns driven by explicit deadlines.
//!
//! A [`Countdown`] never sleeps on its own. The owning task asks for the
//! next [`deadline`](Countdown::deadline), sleeps until then, and calls
//! [`on_deadline`](Countdown::on_deadline). Clearing the countdown removes
//! the deadline, so a cancelled timer can never fire into stale state.

use std::time::Duration;

use tokio::time::Instant;

/// Interval between ticks.
pub const TICK: Duration = Duration::from_secs(1);

/// Default opponent reconnect window, in seconds.
pub const DEFAULT_OPPONENT_GRACE_SECS: u32 = 30;

/// Default matchmaking timeout, in seconds.
pub const DEFAULT_MATCHMAKING_SECS: u32 = 10;

/// Sleep until `deadline`, or forever when there is none.
pub(crate) async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// A countdown in whole seconds that stops at zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Countdown {
    remaining: Option<u32>,
    next_tick: Option<Instant>,
}

impl Countdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// (Re)start at `seconds`, discarding any tick in flight.
    pub fn start(&mut self, seconds: u32, now: Instant) {
        self.remaining = Some(seconds);
        self.next_tick = (seconds > 0).then(|| now + TICK);
    }

    /// Stop and forget the countdown. Returns `true` if it was running.
    pub fn clear(&mut self) -> bool {
        let was_active = self.is_active();
        self.remaining = None;
        self.next_tick = None;
        was_active
    }

    /// Whether the countdown has been started and not cleared. A countdown
    /// that reached zero is still active.
    pub fn is_active(&self) -> bool {
        self.remaining.is_some()
    }

    /// Seconds left, or `None` when not active.
    pub fn remaining(&self) -> Option<u32> {
        self.remaining
    }

    /// When the next tick is due. `None` once the countdown reaches zero.
    pub fn deadline(&self) -> Option<Instant> {
        self.next_tick
    }

    /// Apply every tick due at `now`. Returns `true` if the value changed.
    pub fn on_deadline(&mut self, now: Instant) -> bool {
        let mut changed = false;
        while let (Some(due), Some(remaining)) = (self.next_tick, self.remaining) {
            if due > now {
                break;
            }
            let next = remaining.saturating_sub(1);
            self.remaining = Some(next);
            self.next_tick = (next > 0).then(|| due + TICK);
            changed = true;
        }
        changed
    }
}

/// The window in which a disconnected opponent may return.
///
/// The client only displays this window; the server decides the forfeit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpponentLiveness {
    grace: u32,
    countdown: Countdown,
}

impl OpponentLiveness {
    pub fn new(grace_secs: u32) -> Self {
        Self {
            grace: grace_secs,
            countdown: Countdown::new(),
        }
    }

    /// The opponent dropped: restart the window at full length.
    pub fn on_opponent_disconnected(&mut self, now: Instant) {
        self.countdown.start(self.grace, now);
    }

    /// The opponent is back, the game ended, or the client left the board.
    pub fn clear(&mut self) -> bool {
        self.countdown.clear()
    }

    pub fn is_opponent_disconnected(&self) -> bool {
        self.countdown.is_active()
    }

    /// Seconds left in the window; the full grace period when idle.
    pub fn time_left(&self) -> u32 {
        self.countdown.remaining().unwrap_or(self.grace)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.countdown.deadline()
    }

    pub fn on_deadline(&mut self, now: Instant) -> bool {
        self.countdown.on_deadline(now)
    }
}

impl Default for OpponentLiveness {
    fn default() -> Self {
        Self::new(DEFAULT_OPPONENT_GRACE_SECS)
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

    #[test]
    fn counts_down_once_per_second_to_zero() {
        let t0 = Instant::now();
        let mut countdown = Countdown::new();
        countdown.start(3, t0);
        assert_eq!(countdown.deadline(), Some(t0 + TICK));

        assert!(!countdown.on_deadline(t0 + Duration::from_millis(999)));
        assert_eq!(countdown.remaining(), Some(3));

        assert!(countdown.on_deadline(t0 + TICK));
        assert_eq!(countdown.remaining(), Some(2));

        assert!(countdown.on_deadline(t0 + TICK * 2));
        assert!(countdown.on_deadline(t0 + TICK * 3));
        assert_eq!(countdown.remaining(), Some(0));
        assert_eq!(countdown.deadline(), None);

        // Never negative, never ticks again.
        assert!(!countdown.on_deadline(t0 + TICK * 10));
        assert_eq!(countdown.remaining(), Some(0));
        assert!(countdown.is_active());
    }

    #[test]
    fn late_wakeup_catches_up_without_underflow() {
        let t0 = Instant::now();
        let mut countdown = Countdown::new();
        countdown.start(2, t0);
        assert!(countdown.on_deadline(t0 + TICK * 5));
        assert_eq!(countdown.remaining(), Some(0));
    }

    #[test]
    fn restart_discards_pending_tick() {
        let t0 = Instant::now();
        let mut countdown = Countdown::new();
        countdown.start(10, t0);
        countdown.on_deadline(t0 + TICK * 4);
        assert_eq!(countdown.remaining(), Some(6));

        let t1 = t0 + Duration::from_millis(4500);
        countdown.start(10, t1);
        assert_eq!(countdown.remaining(), Some(10));
        assert_eq!(countdown.deadline(), Some(t1 + TICK));
    }

    #[test]
    fn cleared_countdown_has_no_deadline() {
        let t0 = Instant::now();
        let mut countdown = Countdown::new();
        countdown.start(5, t0);
        assert!(countdown.clear());
        assert!(!countdown.clear());
        assert_eq!(countdown.deadline(), None);
        assert!(!countdown.on_deadline(t0 + TICK * 2));
        assert_eq!(countdown.remaining(), None);
    }

    #[test]
    fn zero_start_is_active_but_idle() {
        let mut countdown = Countdown::new();
        countdown.start(0, Instant::now());
        assert_eq!(countdown.remaining(), Some(0));
        assert_eq!(countdown.deadline(), None);
    }

    #[test]
    fn liveness_window_reports_full_grace_when_idle() {
        let t0 = Instant::now();
        let mut liveness = OpponentLiveness::default();
        assert!(!liveness.is_opponent_disconnected());
        assert_eq!(liveness.time_left(), 30);

        liveness.on_opponent_disconnected(t0);
        liveness.on_deadline(t0 + TICK * 12);
        assert_eq!(liveness.time_left(), 18);

        liveness.on_opponent_disconnected(t0 + TICK * 12);
        assert_eq!(liveness.time_left(), 30);

        assert!(liveness.clear());
        assert!(!liveness.is_opponent_disconnected());
        assert_eq!(liveness.deadline(), None);
    }
}
