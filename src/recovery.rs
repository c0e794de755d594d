//! Application-level session recovery.
//!
//! Reopening the transport is not enough to get back into a game: the
//! server must be told which game and player to resume. [`SessionRecovery`]
//! decides when to send that `rejoin` handshake, retries it on a fixed
//! interval, and escalates to a manual-reconnect prompt when a bounded
//! episode of attempts fails.
//!
//! Like [`ReconnectController`](crate::reconnect::ReconnectController) it is
//! sans-IO. The session driver feeds it observations and the current time,
//! sends the rejoins it asks for, and sleeps until [`deadline`](SessionRecovery::deadline).

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::store::SessionRecord;

/// Default delay between rejoin attempts within one episode.
pub const DEFAULT_REJOIN_INTERVAL: Duration = Duration::from_millis(2000);

/// Default wait before surfacing the prompt after a drop mid-game.
pub const DEFAULT_PROMPT_DEBOUNCE: Duration = Duration::from_millis(3000);

/// What the session driver should do after a manual reconnect request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManualReconnect {
    /// The transport is open: send a rejoin for this record now.
    Rejoin(SessionRecord),
    /// Reopen the transport; the episode starts once it is open.
    OpenTransport,
    /// Open, but there is nothing to rejoin.
    Idle,
}

/// Rejoin episode and prompt state.
#[derive(Debug, Clone)]
pub struct SessionRecovery {
    max_attempts: u32,
    interval: Duration,
    debounce: Duration,
    attempts: u32,
    disconnected: bool,
    next_attempt: Option<Instant>,
    prompt_due: Option<Instant>,
    prompt_visible: bool,
    awaiting_manual_open: bool,
}

impl SessionRecovery {
    pub fn new(max_attempts: u32, interval: Duration, debounce: Duration) -> Self {
        Self {
            max_attempts,
            interval,
            debounce,
            attempts: 0,
            disconnected: false,
            next_attempt: None,
            prompt_due: None,
            prompt_visible: false,
            awaiting_manual_open: false,
        }
    }

    // ── Read accessors ──────────────────────────────────────────────

    /// Rejoin attempts made in the current episode.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether the client was mid-game when the transport last dropped.
    pub fn was_disconnected(&self) -> bool {
        self.disconnected
    }

    pub fn is_prompt_visible(&self) -> bool {
        self.prompt_visible
    }

    /// Whether a rejoin episode is running.
    pub fn in_episode(&self) -> bool {
        self.next_attempt.is_some()
    }

    /// The earliest pending timer, if any.
    pub fn deadline(&self) -> Option<Instant> {
        match (self.next_attempt, self.prompt_due) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    // ── Resets ──────────────────────────────────────────────────────

    /// Zero the counter and cancel the episode's pending attempt.
    pub fn reset_attempts(&mut self) {
        self.attempts = 0;
        self.next_attempt = None;
    }

    pub fn clear_disconnect_flag(&mut self) {
        self.disconnected = false;
    }

    pub fn hide_prompt(&mut self) {
        self.prompt_visible = false;
        self.prompt_due = None;
    }

    /// Forget everything, cancelling every timer.
    pub fn reset(&mut self) {
        self.reset_attempts();
        self.clear_disconnect_flag();
        self.hide_prompt();
        self.awaiting_manual_open = false;
    }

    // ── Observations ────────────────────────────────────────────────

    /// A session record survived a restart: the first open should rejoin.
    pub fn on_startup(&mut self, record: Option<&SessionRecord>) {
        if let Some(record) = record {
            info!(game_id = %record.game_id, "found saved session, will rejoin once connected");
            self.disconnected = true;
        }
    }

    /// The transport opened. Returns the record to rejoin with if an
    /// episode starts.
    pub fn on_transport_open(
        &mut self,
        record: Option<&SessionRecord>,
        now: Instant,
    ) -> Option<SessionRecord> {
        self.prompt_due = None;
        let wanted = self.disconnected || self.awaiting_manual_open;
        self.awaiting_manual_open = false;

        match record {
            Some(record) if wanted => {
                self.attempts = 0;
                self.attempt(record, now)
            }
            _ => None,
        }
    }

    /// The transport closed.
    pub fn on_transport_closed(&mut self, playing: bool, has_record: bool, now: Instant) {
        if self.next_attempt.take().is_some() {
            debug!("transport closed, rejoin episode cancelled");
        }
        if !(playing && has_record) {
            return;
        }
        self.disconnected = true;
        if self.prompt_due.is_none() && !self.prompt_visible {
            self.prompt_due = Some(now + self.debounce);
        }
    }

    /// The server confirmed the rejoin. Repeats are harmless.
    pub fn on_rejoin_success(&mut self) {
        if self.in_episode() || self.disconnected || self.prompt_visible {
            info!(attempts = self.attempts, "rejoined game");
        }
        self.reset();
    }

    /// Run whatever timers are due at `now`. Returns the record to rejoin
    /// with if another attempt is due.
    pub fn on_deadline(
        &mut self,
        now: Instant,
        record: Option<&SessionRecord>,
        transport_open: bool,
    ) -> Option<SessionRecord> {
        if self.prompt_due.is_some_and(|due| due <= now) {
            self.prompt_due = None;
            if !transport_open {
                debug!("still disconnected after debounce, showing reconnect prompt");
                self.prompt_visible = true;
            }
        }

        if !self.next_attempt.is_some_and(|due| due <= now) {
            return None;
        }
        self.next_attempt = None;

        let record = record?;
        if self.attempts >= self.max_attempts {
            warn!(attempts = self.attempts, "rejoin attempts exhausted, showing reconnect prompt");
            self.prompt_visible = true;
            return None;
        }
        self.attempt(record, now)
    }

    /// The user asked to reconnect.
    pub fn manual_reconnect(
        &mut self,
        record: Option<&SessionRecord>,
        transport_open: bool,
        now: Instant,
    ) -> ManualReconnect {
        self.reset_attempts();
        self.hide_prompt();

        if !transport_open {
            self.awaiting_manual_open = true;
            return ManualReconnect::OpenTransport;
        }
        match record.and_then(|record| self.attempt(record, now)) {
            Some(record) => ManualReconnect::Rejoin(record),
            None => ManualReconnect::Idle,
        }
    }

    /// Reopening the transport for a manual reconnect failed.
    pub fn on_manual_open_failed(&mut self) {
        self.awaiting_manual_open = false;
        self.prompt_visible = true;
    }

    fn attempt(&mut self, record: &SessionRecord, now: Instant) -> Option<SessionRecord> {
        if self.attempts >= self.max_attempts {
            self.prompt_visible = true;
            return None;
        }
        self.attempts += 1;
        info!(
            attempt = self.attempts,
            max = self.max_attempts,
            game_id = %record.game_id,
            "sending rejoin"
        );
        self.next_attempt = Some(now + self.interval);
        Some(record.clone())
    }
}

impl Default for SessionRecovery {
    fn default() -> Self {
        Self::new(
            crate::reconnect::DEFAULT_MAX_ATTEMPTS,
            DEFAULT_REJOIN_INTERVAL,
            DEFAULT_PROMPT_DEBOUNCE,
        )
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

    const INTERVAL: Duration = Duration::from_millis(2000);
    const DEBOUNCE: Duration = Duration::from_millis(3000);

    fn recovery() -> SessionRecovery {
        SessionRecovery::new(5, INTERVAL, DEBOUNCE)
    }

    fn record() -> SessionRecord {
        SessionRecord::new("g1", "alice")
    }

    #[test]
    fn open_without_flag_does_nothing() {
        let mut r = recovery();
        assert_eq!(r.on_transport_open(Some(&record()), Instant::now()), None);
        assert!(!r.in_episode());
    }

    #[test]
    fn open_with_flag_but_no_record_does_nothing() {
        let mut r = recovery();
        r.on_transport_closed(true, true, Instant::now());
        assert_eq!(r.on_transport_open(None, Instant::now()), None);
        assert_eq!(r.attempts(), 0);
    }

    #[test]
    fn episode_retries_then_prompts_exactly_once() {
        let t0 = Instant::now();
        let rec = record();
        let mut r = recovery();
        r.on_startup(Some(&rec));

        assert_eq!(r.on_transport_open(Some(&rec), t0), Some(rec.clone()));
        let mut sent = 1;
        let mut now = t0;
        for _ in 0..10 {
            now += INTERVAL;
            if r.on_deadline(now, Some(&rec), true).is_some() {
                sent += 1;
            }
            assert!(r.attempts() <= 5);
        }

        assert_eq!(sent, 5);
        assert!(r.is_prompt_visible());
        assert!(!r.in_episode());
        assert_eq!(r.deadline(), None);
    }

    #[test]
    fn prompt_waits_for_the_interval_after_the_last_attempt() {
        let t0 = Instant::now();
        let rec = record();
        let mut r = SessionRecovery::new(1, INTERVAL, DEBOUNCE);
        r.on_startup(Some(&rec));
        r.on_transport_open(Some(&rec), t0);

        assert!(!r.is_prompt_visible());
        r.on_deadline(t0 + INTERVAL - Duration::from_millis(1), Some(&rec), true);
        assert!(!r.is_prompt_visible());
        r.on_deadline(t0 + INTERVAL, Some(&rec), true);
        assert!(r.is_prompt_visible());
    }

    #[test]
    fn success_cancels_episode_and_duplicates_are_noops() {
        let t0 = Instant::now();
        let rec = record();
        let mut r = recovery();
        r.on_startup(Some(&rec));
        r.on_transport_open(Some(&rec), t0);
        r.on_deadline(t0 + INTERVAL, Some(&rec), true);
        assert_eq!(r.attempts(), 2);

        r.on_rejoin_success();
        assert_eq!(r.attempts(), 0);
        assert!(!r.was_disconnected());
        assert!(!r.in_episode());

        r.on_rejoin_success();
        assert_eq!(r.attempts(), 0);
        assert_eq!(r.on_deadline(t0 + INTERVAL * 5, Some(&rec), true), None);
        assert!(!r.is_prompt_visible());
    }

    #[test]
    fn close_while_playing_sets_flag_and_debounces_prompt() {
        let t0 = Instant::now();
        let mut r = recovery();
        r.on_transport_closed(true, true, t0);
        assert!(r.was_disconnected());
        assert_eq!(r.deadline(), Some(t0 + DEBOUNCE));

        // A second close does not push the prompt back.
        r.on_transport_closed(true, true, t0 + Duration::from_secs(2));
        assert_eq!(r.deadline(), Some(t0 + DEBOUNCE));

        r.on_deadline(t0 + DEBOUNCE, None, false);
        assert!(r.is_prompt_visible());
    }

    #[test]
    fn reopen_before_debounce_suppresses_prompt() {
        let t0 = Instant::now();
        let rec = record();
        let mut r = recovery();
        r.on_transport_closed(true, true, t0);

        assert!(r
            .on_transport_open(Some(&rec), t0 + Duration::from_secs(1))
            .is_some());
        r.on_deadline(t0 + DEBOUNCE, Some(&rec), true);
        assert!(!r.is_prompt_visible());
    }

    #[test]
    fn close_outside_a_game_does_not_flag() {
        let t0 = Instant::now();
        let mut r = recovery();
        r.on_transport_closed(false, true, t0);
        r.on_transport_closed(true, false, t0);
        assert!(!r.was_disconnected());
        assert_eq!(r.deadline(), None);
    }

    #[test]
    fn close_cancels_running_episode() {
        let t0 = Instant::now();
        let rec = record();
        let mut r = recovery();
        r.on_startup(Some(&rec));
        r.on_transport_open(Some(&rec), t0);
        assert!(r.in_episode());

        r.on_transport_closed(true, true, t0 + Duration::from_millis(500));
        assert!(!r.in_episode());
        assert_eq!(r.on_deadline(t0 + INTERVAL, Some(&rec), false), None);
    }

    #[test]
    fn manual_reconnect_while_open_rejoins_immediately() {
        let t0 = Instant::now();
        let rec = record();
        let mut r = recovery();
        r.on_transport_closed(true, true, t0);
        r.on_deadline(t0 + DEBOUNCE, Some(&rec), false);
        assert!(r.is_prompt_visible());

        let action = r.manual_reconnect(Some(&rec), true, t0 + DEBOUNCE);
        assert_eq!(action, ManualReconnect::Rejoin(rec));
        assert!(!r.is_prompt_visible());
        assert_eq!(r.attempts(), 1);
    }

    #[test]
    fn manual_reconnect_while_closed_waits_for_open() {
        let t0 = Instant::now();
        let rec = record();
        let mut r = recovery();

        assert_eq!(
            r.manual_reconnect(Some(&rec), false, t0),
            ManualReconnect::OpenTransport
        );
        // No flag was set, but the pending manual request still rejoins.
        assert_eq!(r.on_transport_open(Some(&rec), t0), Some(rec));
    }

    #[test]
    fn failed_manual_open_reshows_prompt() {
        let mut r = recovery();
        r.manual_reconnect(Some(&record()), false, Instant::now());
        r.on_manual_open_failed();
        assert!(r.is_prompt_visible());
        assert_eq!(r.on_transport_open(Some(&record()), Instant::now()), None);
    }

    #[test]
    fn manual_reconnect_without_record_is_idle() {
        let mut r = recovery();
        assert_eq!(
            r.manual_reconnect(None, true, Instant::now()),
            ManualReconnect::Idle
        );
    }
}
