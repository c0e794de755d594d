//! Local game and UI state.
//!
//! [`AppState`] is everything the dispatcher and the user intents mutate.
//! [`Snapshot`] is the read-only view handed to the presentation layer; it
//! adds what the session driver owns separately (connection phase, recovery
//! and countdown state).

use std::time::Duration;

use crate::connection::ConnectionPhase;
use crate::protocol::{Board, LeaderboardEntry, Opponent, Outcome, PlayerColor};

/// Which screen the presentation layer should show.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Screen {
    #[default]
    Login,
    Waiting,
    Playing,
    Finished,
}

/// How a concluded game went for the local player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameResult {
    Win,
    Lose,
    Draw,
}

impl GameResult {
    pub fn message(self) -> &'static str {
        match self {
            Self::Win => "You Win!",
            Self::Lose => "You Lose",
            Self::Draw => "It's a Draw!",
        }
    }
}

/// The authoritative game snapshot most recently pushed by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameState {
    pub game_id: String,
    pub your_color: PlayerColor,
    pub current_player: PlayerColor,
    pub board: Board,
    pub opponent: Option<Opponent>,
    /// Set iff the game has concluded.
    pub outcome: Option<Outcome>,
}

impl GameState {
    pub fn is_over(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn is_my_turn(&self) -> bool {
        !self.is_over() && self.current_player == self.your_color
    }

    /// Win, lose or draw from the local player's point of view.
    pub fn result(&self) -> Option<GameResult> {
        self.outcome.map(|outcome| match outcome.winner() {
            None => GameResult::Draw,
            Some(color) if color == self.your_color => GameResult::Win,
            Some(_) => GameResult::Lose,
        })
    }

    /// Opponent name for display; empty when unknown.
    pub fn opponent_name(&self) -> &str {
        self.opponent.as_ref().map_or("", Opponent::display_name)
    }
}

/// How long a [`Notice`] stays visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLifetime {
    /// The configured error display time (5 s by default).
    Standard,
    /// A short hint for a rejected action.
    Brief,
}

impl NoticeLifetime {
    /// Display time for a brief notice.
    pub const BRIEF: Duration = Duration::from_millis(3000);

    /// Resolve against the configured standard display time.
    pub fn duration(self, standard: Duration) -> Duration {
        match self {
            Self::Standard => standard,
            Self::Brief => Self::BRIEF,
        }
    }
}

/// A transient message shown to the user until it expires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
}

/// Game state plus UI flags.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppState {
    pub screen: Screen,
    /// The player's name once a join was sent or a session was restored.
    pub username: Option<String>,
    pub game: Option<GameState>,
    /// A `join` is in flight.
    pub joining: bool,
    pub exit_confirm_visible: bool,
    pub error: Option<Notice>,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub leaderboard_visible: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_playing(&self) -> bool {
        self.screen == Screen::Playing
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(Notice {
            message: message.into(),
        });
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|notice| notice.message.as_str())
    }
}

/// Everything the presentation layer renders, at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub app: AppState,
    pub phase: ConnectionPhase,
    pub reconnect_prompt_visible: bool,
    pub rejoin_attempts: u32,
    pub opponent_disconnected: bool,
    /// Seconds left for a disconnected opponent to return.
    pub opponent_time_left: u32,
    /// Seconds left before matchmaking falls back to a bot.
    pub matchmaking_time_left: u32,
}

impl Snapshot {
    pub fn screen(&self) -> Screen {
        self.app.screen
    }

    pub fn game(&self) -> Option<&GameState> {
        self.app.game.as_ref()
    }

    /// Result banner for a finished game.
    pub fn result_message(&self) -> Option<&'static str> {
        self.game().and_then(GameState::result).map(GameResult::message)
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

    fn game(your_color: PlayerColor, outcome: Option<Outcome>) -> GameState {
        GameState {
            game_id: "g1".into(),
            your_color,
            current_player: PlayerColor::Red,
            board: Board::empty(),
            opponent: Some(Opponent::Bot),
            outcome,
        }
    }

    #[test]
    fn result_is_relative_to_local_color() {
        assert_eq!(game(PlayerColor::Red, None).result(), None);
        assert_eq!(
            game(PlayerColor::Red, Some(Outcome::Red)).result(),
            Some(GameResult::Win)
        );
        assert_eq!(
            game(PlayerColor::Yellow, Some(Outcome::Red)).result(),
            Some(GameResult::Lose)
        );
        assert_eq!(
            game(PlayerColor::Yellow, Some(Outcome::Draw)).result(),
            Some(GameResult::Draw)
        );
    }

    #[test]
    fn turn_requires_no_outcome() {
        assert!(game(PlayerColor::Red, None).is_my_turn());
        assert!(!game(PlayerColor::Yellow, None).is_my_turn());
        assert!(!game(PlayerColor::Red, Some(Outcome::Draw)).is_my_turn());
    }

    #[test]
    fn bot_opponent_displays_as_bot() {
        assert_eq!(game(PlayerColor::Red, None).opponent_name(), "Bot");
        let mut g = game(PlayerColor::Red, None);
        g.opponent = None;
        assert_eq!(g.opponent_name(), "");
    }

    #[test]
    fn error_notice_round_trip() {
        let mut app = AppState::new();
        assert_eq!(app.error_message(), None);
        app.set_error("Not connected to server");
        assert_eq!(app.error_message(), Some("Not connected to server"));
        app.clear_error();
        assert_eq!(app.error, None);
    }
}
